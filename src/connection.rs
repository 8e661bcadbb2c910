//! The serial link to the heat pump as the rest of a gateway sees it.
//!
//! A [`Connection`] has no thread of its own. The caller drives it:
//! [`poll`](Connection::poll) on a fixed tick to collect datagrams and
//! [`send_command`](Connection::send_command) between polls. Both take
//! `&mut self`, so reads and writes on one port are never interleaved.

use core::fmt;
use core::time::Duration;

use embedded_io::{ErrorType, Read, Write};
use log::{Level, Log};

use crate::assembler::FrameAssembler;
use crate::checksum;
use crate::datagram::{Datagram, FrameError};
use crate::logging::{GlobalLogger, HexDump};
use crate::policy::{FaultAction, ReconnectPolicy, ReopenOnce};
use crate::serial::{Connector, Port, SerialConfig};
use crate::stats::Statistics;

/// Most bytes taken from the port in one poll.
pub const READ_CHUNK: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Payload,
    Checksum,
    Flush,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteStage::Payload => "command",
            WriteStage::Checksum => "checksum",
            WriteStage::Flush => "flush",
        })
    }
}

#[derive(Debug)]
pub enum ConnectionError<O, P> {
    /// The connector could not open the port.
    Open(O),
    Write { stage: WriteStage, source: P },
    Close(P),
    /// No port is held; call `open` first.
    NotOpen,
}

impl<O: fmt::Debug, P: fmt::Debug> fmt::Display for ConnectionError<O, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Open(e) => write!(f, "failed to open serial port: {e:?}"),
            ConnectionError::Write { stage, source } => {
                write!(f, "failed to write {stage}: {source:?}")
            }
            ConnectionError::Close(e) => write!(f, "failed to close serial port: {e:?}"),
            ConnectionError::NotOpen => f.write_str("serial port is not open"),
        }
    }
}

/// [`ConnectionError`] with both halves taken from a [`Connector`].
pub type Error<C> =
    ConnectionError<<C as Connector>::Error, <<C as Connector>::Port as ErrorType>::Error>;

pub struct Connection<C: Connector, L: Log = GlobalLogger, P: ReconnectPolicy = ReopenOnce> {
    connector: C,
    /// Set by a successful `open`, kept across internal reconnects, cleared
    /// by `close` or a failed `open`.
    config: Option<SerialConfig>,
    port: Option<C::Port>,
    assembler: FrameAssembler<L>,
    policy: P,
}

impl<C: Connector> Connection<C> {
    pub fn new(connector: C) -> Connection<C> {
        Connection::with_logger(connector, GlobalLogger)
    }
}

impl<C: Connector, L: Log> Connection<C, L> {
    pub fn with_logger(connector: C, logger: L) -> Connection<C, L> {
        Connection {
            connector,
            config: None,
            port: None,
            assembler: FrameAssembler::with_logger(logger),
            policy: ReopenOnce,
        }
    }
}

impl<C: Connector, L: Log, P: ReconnectPolicy> Connection<C, L, P> {
    pub fn with_policy<Q: ReconnectPolicy>(self, policy: Q) -> Connection<C, L, Q> {
        Connection {
            connector: self.connector,
            config: self.config,
            port: self.port,
            assembler: self.assembler,
            policy,
        }
    }

    /// Opens `port` at 9600 8E1 and starts with an empty receive buffer.
    ///
    /// An already open port is closed first. Failure is returned as is; there
    /// is no retry here.
    pub fn open(&mut self, port: &str, read_timeout: Duration) -> Result<(), Error<C>> {
        let config = SerialConfig::new(port, read_timeout);
        // Stays unset unless the new port opens.
        self.config = None;
        if let Some(old) = self.port.take() {
            if let Err(e) = old.close() {
                emit!(self.assembler.logger, Level::Error, "Failed to close serial port: {:?}", e);
            }
        }
        self.assembler.clear();
        let opened = connect(&mut self.connector, &self.assembler.logger, &config)
            .map_err(ConnectionError::Open)?;
        self.port = Some(opened);
        self.config = Some(config);
        Ok(())
    }

    /// Releases the port. Calling it with nothing open is fine.
    pub fn close(&mut self) -> Result<(), Error<C>> {
        self.config = None;
        match self.port.take() {
            Some(port) => port.close().map_err(ConnectionError::Close),
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn config(&self) -> Option<&SerialConfig> {
        self.config.as_ref()
    }

    pub fn statistics(&self) -> Statistics {
        self.assembler.statistics()
    }

    /// Bytes read from the port but not yet framed.
    pub fn buffered(&self) -> usize {
        self.assembler.buffered()
    }

    /// Noise bytes dropped while hunting for the sync byte.
    pub fn discarded(&self) -> u64 {
        self.assembler.discarded()
    }

    pub fn logger(&self) -> &L {
        self.assembler.logger()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// One receive cycle: read what the port has, then try to frame one
    /// datagram.
    ///
    /// Returns `None` while a datagram is incomplete, after a bad frame was
    /// skipped, and while the port is down. Call it again on the next tick.
    pub fn poll(&mut self) -> Option<Datagram> {
        self.read_to_buffer();

        match self.assembler.next_datagram() {
            Ok(datagram) => Some(datagram),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(e)) => {
                match e {
                    FrameError::ChecksumMismatch { .. } => {
                        emit!(self.assembler.logger, Level::Error, "Invalid checksum on receive! {}", e)
                    }
                    FrameError::UnrecognizedLength { length } => emit!(
                        self.assembler.logger,
                        Level::Info,
                        "Received an unknown datagram. Can't decode this (yet?). Length: {}",
                        length
                    ),
                    _ => emit!(self.assembler.logger, Level::Debug, "{}", e),
                }
                None
            }
        }
    }

    /// Sends `command` followed by its checksum byte.
    pub fn send_command(&mut self, command: &[u8]) -> Result<(), Error<C>> {
        let port = self.port.as_mut().ok_or(ConnectionError::NotOpen)?;
        let chk = checksum::send_checksum(command);

        port.write_all(command).map_err(|source| ConnectionError::Write {
            stage: WriteStage::Payload,
            source,
        })?;
        port.write_all(&[chk]).map_err(|source| ConnectionError::Write {
            stage: WriteStage::Checksum,
            source,
        })?;
        port.flush().map_err(|source| ConnectionError::Write {
            stage: WriteStage::Flush,
            source,
        })?;

        emit!(self.assembler.logger, Level::Debug, "Send: {} {:02X}", HexDump(command), chk);
        Ok(())
    }

    fn read_to_buffer(&mut self) {
        let Some(config) = self.config.as_ref() else {
            // Never opened, closed on purpose, or the last open failed.
            return;
        };

        match self.port.as_mut() {
            Some(port) => {
                let mut chunk = [0; READ_CHUNK];
                match port.read(&mut chunk) {
                    Ok(n) => {
                        self.assembler.push(&chunk[..n]);
                        return;
                    }
                    Err(e) => {
                        emit!(self.assembler.logger, Level::Error, "Serial read error: {:?}", e)
                    }
                }
            }
            None => emit!(
                self.assembler.logger,
                Level::Debug,
                "Serial port {} is down",
                config.port
            ),
        }

        let attempts = match self.policy.on_fault() {
            FaultAction::Wait => {
                emit!(self.assembler.logger, Level::Debug, "Reconnect deferred");
                return;
            }
            FaultAction::Reopen { attempts } => attempts.max(1),
        };

        if let Some(port) = self.port.take() {
            if let Err(e) = port.close() {
                emit!(self.assembler.logger, Level::Error, "Failed to close serial port: {:?}", e);
            }
        }

        for attempt in 1..=attempts {
            match connect(&mut self.connector, &self.assembler.logger, config) {
                Ok(port) => {
                    self.port = Some(port);
                    self.policy.on_reopened();
                    return;
                }
                Err(e) => emit!(
                    self.assembler.logger,
                    Level::Error,
                    "Failed to reconnect ({}/{}): {:?}",
                    attempt,
                    attempts,
                    e
                ),
            }
        }
        self.policy.on_reopen_failed();
    }
}

fn connect<C: Connector, L: Log>(
    connector: &mut C,
    logger: &L,
    config: &SerialConfig,
) -> Result<C::Port, C::Error> {
    emit!(*logger, Level::Info, "Opening serial port {}", config.port);
    let mut port = connector.open(config)?;

    emit!(*logger, Level::Debug, "Flushing serial port buffer");
    if let Err(e) = port.purge() {
        emit!(*logger, Level::Error, "Failed to flush serial port: {:?}", e);
    }
    Ok(port)
}
