//! The seam between the protocol and whatever actually moves bytes.
//!
//! A [`Connector`] opens a [`Port`] from a [`SerialConfig`]; the port is an
//! `embedded_io` reader/writer. [`NbPort`] lifts a byte-at-a-time
//! `embedded-hal-nb` UART into that shape.

use alloc::string::String;
use core::time::Duration;

use embedded_hal_nb::serial;
use embedded_io::{ErrorKind, Read, Write};

/// The heat pump only talks 9600 8E1.
pub const BAUD_RATE: u32 = 9600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Upper bound on how long a single read may block.
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, read_timeout: Duration) -> SerialConfig {
        SerialConfig {
            port: port.into(),
            baud_rate: BAUD_RATE,
            parity: Parity::Even,
            stop_bits: StopBits::One,
            read_timeout,
        }
    }
}

/// An open serial device.
///
/// `read` returning `Ok(0)` means nothing arrived before the timeout (or the
/// stream ended); it is not treated as a fault.
pub trait Port: Read + Write {
    /// Throw away anything the device has pending in either direction.
    fn purge(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn close(self) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        Ok(())
    }
}

pub trait Connector {
    type Port: Port;
    type Error: core::fmt::Debug;

    fn open(&mut self, config: &SerialConfig) -> Result<Self::Port, Self::Error>;
}

#[derive(Debug)]
pub struct ErrorShim<T: serial::Error>(pub T);

impl<T: serial::Error> embedded_io::Error for ErrorShim<T> {
    fn kind(&self) -> ErrorKind {
        match self.0.kind() {
            serial::ErrorKind::Overrun => ErrorKind::OutOfMemory,
            serial::ErrorKind::FrameFormat
            | serial::ErrorKind::Parity
            | serial::ErrorKind::Noise => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        }
    }
}

impl<T: serial::Error> From<T> for ErrorShim<T> {
    fn from(value: T) -> Self {
        ErrorShim(value)
    }
}

/// A non-blocking HAL UART seen as a [`Port`].
#[derive(Debug)]
pub struct NbPort<S: serial::ErrorType> {
    serial: S,
    /// Error hit after some bytes were already read; reported on the next read.
    pending: Option<S::Error>,
}

impl<S: serial::ErrorType> NbPort<S> {
    pub fn new(serial: S) -> NbPort<S> {
        NbPort {
            serial,
            pending: None,
        }
    }

    pub fn into_inner(self) -> S {
        self.serial
    }
}

impl<S: serial::ErrorType> embedded_io::ErrorType for NbPort<S> {
    type Error = ErrorShim<S::Error>;
}

impl<S: serial::Read> Read for NbPort<S> {
    /// Drains whatever the UART has until it would block or `buf` is full.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if let Some(e) = self.pending.take() {
            return Err(ErrorShim(e));
        }
        let mut n = 0;
        while n < buf.len() {
            match serial::Read::read(&mut self.serial) {
                Ok(b) => {
                    buf[n] = b;
                    n += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) if n == 0 => return Err(ErrorShim(e)),
                Err(nb::Error::Other(e)) => {
                    self.pending = Some(e);
                    break;
                }
            }
        }
        Ok(n)
    }
}

impl<S: serial::Write> Write for NbPort<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for b in buf {
            nb::block!(serial::Write::write(&mut self.serial, *b)).map_err(ErrorShim)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        nb::block!(serial::Write::flush(&mut self.serial)).map_err(ErrorShim)
    }
}

impl<S: serial::Read + serial::Write> Port for NbPort<S> {
    fn purge(&mut self) -> Result<(), Self::Error> {
        loop {
            match serial::Read::read(&mut self.serial) {
                Ok(_) => {}
                Err(nb::Error::WouldBlock) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(ErrorShim(e)),
            }
        }
    }
}
