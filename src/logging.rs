use core::fmt;

use log::{LevelFilter, Log, Metadata, Record};

/// Log through an explicitly held logger instead of the global facade.
///
/// `emit!(self.logger, Level::Debug, "have {} bytes", n)`
macro_rules! emit {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger: &dyn ::log::Log = &$logger;
        let level: ::log::Level = $level;
        if logger.enabled(
            &::log::Metadata::builder()
                .level(level)
                .target(module_path!())
                .build(),
        ) {
            logger.log(
                &::log::Record::builder()
                    .level(level)
                    .target(module_path!())
                    .module_path_static(Some(module_path!()))
                    .file_static(Some(file!()))
                    .line(Some(line!()))
                    .args(format_args!($($arg)+))
                    .build(),
            );
        }
    }};
}

/// Forwards to whatever logger was installed with `log::set_logger`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            log::logger().log(record);
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// Space separated upper case hex, `71 C8 01 10`.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Maps the level names used in gateway config files to a filter.
/// Anything unrecognised falls back to `Info`.
pub fn level_from_name(name: &str) -> LevelFilter {
    match name {
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}
