//! Reassembles datagrams out of the raw receive stream.
//!
//! The assembler never touches a port: bytes are [`push`](FrameAssembler::push)ed
//! in and [`next_datagram`](FrameAssembler::next_datagram) is stepped to pull at
//! most one frame out. Everything it has not consumed stays buffered for the
//! next step.

use alloc::collections::VecDeque;

use log::{Level, Log};

use crate::Decode;
use crate::checksum;
use crate::datagram::{Datagram, FrameError, Header, SYNC_BYTE};
use crate::logging::{GlobalLogger, HexDump};
use crate::stats::Statistics;

/// An RX summary is logged at info every time this many frames were checked.
pub const SUMMARY_INTERVAL: u64 = 150;

#[derive(Debug)]
pub struct FrameAssembler<L: Log = GlobalLogger> {
    buf: VecDeque<u8>,
    good_reads: u64,
    total_reads: u64,
    discarded: u64,
    pub(crate) logger: L,
}

impl FrameAssembler<GlobalLogger> {
    pub fn new() -> FrameAssembler<GlobalLogger> {
        FrameAssembler::with_logger(GlobalLogger)
    }
}

impl Default for FrameAssembler<GlobalLogger> {
    fn default() -> Self {
        FrameAssembler::new()
    }
}

impl<L: Log> FrameAssembler<L> {
    pub fn with_logger(logger: L) -> FrameAssembler<L> {
        FrameAssembler {
            buf: VecDeque::new(),
            good_reads: 0,
            total_reads: 0,
            discarded: 0,
            logger,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend(data);
    }

    /// Bytes waiting to be framed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drops buffered bytes. Counters are kept.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Noise bytes skipped while hunting for a sync byte.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::new(self.good_reads, self.total_reads)
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    /// Try to take one datagram off the front of the buffer.
    ///
    /// `WouldBlock` means there is not enough data yet and nothing that
    /// matters was consumed. A [`FrameError`] means one byte (the sync byte of
    /// a bad candidate) or one unusable frame was consumed, and the caller can
    /// step again.
    pub fn next_datagram(&mut self) -> nb::Result<Datagram, FrameError> {
        if self.buf.is_empty() {
            return Err(nb::Error::WouldBlock);
        }

        match self.buf.iter().position(|b| *b == SYNC_BYTE) {
            None => {
                // Left in place; it gets dropped once a sync byte shows up behind it.
                emit!(
                    self.logger,
                    Level::Debug,
                    "No header found in {} buffered bytes",
                    self.buf.len()
                );
                return Err(nb::Error::WouldBlock);
            }
            Some(0) => {}
            Some(n) => {
                let data = self.buf.make_contiguous();
                emit!(
                    self.logger,
                    Level::Debug,
                    "Discarding {} bytes before header: {}",
                    n,
                    HexDump(&data[..n])
                );
                self.buf.drain(..n);
                self.discarded += n as u64;
            }
        }

        let data = self.buf.make_contiguous();
        let header = match Header::decode(data) {
            Ok(h) => h,
            Err(FrameError::DecodeBufferTooSmall { .. }) => return Err(nb::Error::WouldBlock),
            Err(e) => {
                // Not a real header, step past this sync byte.
                self.buf.pop_front();
                return Err(nb::Error::Other(e));
            }
        };

        let length = header.frame_len();
        if data.len() < length {
            emit!(
                self.logger,
                Level::Debug,
                "Waiting for more data. Have {}, need {}",
                data.len(),
                length
            );
            return Err(nb::Error::WouldBlock);
        }

        self.total_reads += 1;
        let frame = &data[..length];
        if !checksum::is_valid_receive_checksum(frame) {
            let sum = checksum::sum(frame);
            // Only the sync byte goes; the rest is rescanned for another 0x71.
            self.buf.pop_front();
            return Err(nb::Error::Other(FrameError::ChecksumMismatch { length, sum }));
        }

        self.good_reads += 1;
        emit!(self.logger, Level::Debug, "Received: {}", HexDump(frame));
        let datagram = Datagram::from_frame(frame);
        self.buf.drain(..length);

        if self.total_reads % SUMMARY_INTERVAL == 0 {
            let stats = self.statistics();
            emit!(
                self.logger,
                Level::Info,
                "RX: {} RX errors: {} ({:.2} %)",
                stats.total_reads,
                stats.errors(),
                stats.error_percentage()
            );
        }

        datagram.map_err(nb::Error::Other)
    }
}
