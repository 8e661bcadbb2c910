//! Test doubles: a scripted connector/port pair, a HAL UART and a logger that
//! remembers what it was told.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::Mutex;

use embedded_hal_nb::serial;
use log::{Level, Log, Metadata, Record};

use crate::serial::{Connector, Port, SerialConfig};

#[derive(Debug, Default)]
pub struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl CaptureLogger {
    pub fn contains(&self, needle: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .iter()
            .any(|(_, msg)| msg.contains(needle))
    }

    pub fn count(&self, level: Level) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    Open,
    Read,
    Write,
    Close,
}

impl embedded_io::Error for MockError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockError::Open => embedded_io::ErrorKind::NotFound,
            MockError::Read => embedded_io::ErrorKind::TimedOut,
            MockError::Write => embedded_io::ErrorKind::BrokenPipe,
            MockError::Close => embedded_io::ErrorKind::Other,
        }
    }
}

/// What the far end of the line looks like, shared between the test, the
/// connector and every port it hands out.
#[derive(Debug, Default)]
pub struct Wire {
    /// Consumed one per `read`; an empty script reads 0 bytes.
    pub reads: VecDeque<Result<Vec<u8>, MockError>>,
    /// One entry per successful `write` call.
    pub written: Vec<Vec<u8>>,
    /// Fail the `write` call with this index (counting every attempt).
    pub fail_write_at: Option<usize>,
    pub write_calls: usize,
    pub fail_flush: bool,
    /// How many of the upcoming opens fail.
    pub fail_opens: usize,
    pub fail_close: bool,
    pub opens: usize,
    pub open_attempts: usize,
    pub closes: usize,
    pub purges: usize,
    pub flushes: usize,
    pub configs: Vec<SerialConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub wire: Rc<RefCell<Wire>>,
}

impl MockConnector {
    pub fn feed(&self, bytes: &[u8]) {
        self.wire.borrow_mut().reads.push_back(Ok(bytes.to_vec()));
    }

    pub fn fail_read(&self) {
        self.wire.borrow_mut().reads.push_back(Err(MockError::Read));
    }
}

impl Connector for MockConnector {
    type Port = MockPort;
    type Error = MockError;

    fn open(&mut self, config: &SerialConfig) -> Result<MockPort, MockError> {
        let mut wire = self.wire.borrow_mut();
        wire.open_attempts += 1;
        if wire.fail_opens > 0 {
            wire.fail_opens -= 1;
            return Err(MockError::Open);
        }
        wire.opens += 1;
        wire.configs.push(config.clone());
        Ok(MockPort {
            wire: self.wire.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MockPort {
    wire: Rc<RefCell<Wire>>,
}

impl embedded_io::ErrorType for MockPort {
    type Error = MockError;
}

impl embedded_io::Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MockError> {
        let mut wire = self.wire.borrow_mut();
        match wire.reads.pop_front() {
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    wire.reads.push_front(Ok(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

impl embedded_io::Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> Result<usize, MockError> {
        let mut wire = self.wire.borrow_mut();
        let call = wire.write_calls;
        wire.write_calls += 1;
        if wire.fail_write_at == Some(call) {
            return Err(MockError::Write);
        }
        wire.written.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), MockError> {
        let mut wire = self.wire.borrow_mut();
        if wire.fail_flush {
            return Err(MockError::Write);
        }
        wire.flushes += 1;
        Ok(())
    }
}

impl Port for MockPort {
    fn purge(&mut self) -> Result<(), MockError> {
        self.wire.borrow_mut().purges += 1;
        Ok(())
    }

    fn close(self) -> Result<(), MockError> {
        let mut wire = self.wire.borrow_mut();
        wire.closes += 1;
        if wire.fail_close {
            return Err(MockError::Close);
        }
        Ok(())
    }
}

/// Byte-at-a-time UART, `WouldBlock` once the receive queue runs dry.
#[derive(Debug, Default)]
pub struct HalSerial {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub flushes: usize,
    /// Returned instead of `WouldBlock` on every read of an empty queue.
    pub rx_error: Option<serial::ErrorKind>,
    /// Returned once, after this many bytes have been read.
    pub rx_error_after: Option<(usize, serial::ErrorKind)>,
    reads: usize,
}

impl HalSerial {
    pub fn with_rx(bytes: &[u8]) -> HalSerial {
        HalSerial {
            rx: bytes.iter().copied().collect(),
            ..HalSerial::default()
        }
    }
}

impl serial::ErrorType for HalSerial {
    type Error = serial::ErrorKind;
}

impl serial::Read for HalSerial {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if let Some((after, kind)) = self.rx_error_after {
            if self.reads == after {
                self.rx_error_after = None;
                return Err(nb::Error::Other(kind));
            }
        }
        match self.rx.pop_front() {
            Some(b) => {
                self.reads += 1;
                Ok(b)
            }
            None => match self.rx_error {
                Some(kind) => Err(nb::Error::Other(kind)),
                None => Err(nb::Error::WouldBlock),
            },
        }
    }
}

impl serial::Write for HalSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.tx.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

/// A UART that never fails, for code that only needs the `Infallible` path.
#[derive(Debug, Default)]
pub struct LoopbackSerial(pub VecDeque<u8>);

impl serial::ErrorType for LoopbackSerial {
    type Error = Infallible;
}

impl serial::Read for LoopbackSerial {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.0.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl serial::Write for LoopbackSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.0.push_back(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}
