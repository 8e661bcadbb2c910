#![cfg_attr(not(test), no_std)]

//! Frame assembly for the heat-pump controller's serial protocol.
//!
//! Bytes arrive on a 9600 8E1 line with no framing beyond a `0x71` sync byte,
//! a length byte and a trailing additive checksum. [`Connection`] polls the
//! port, feeds a [`FrameAssembler`] and hands back whole [`Datagram`]s.

extern crate alloc;

#[macro_use]
mod logging;

pub mod assembler;
pub mod checksum;
pub mod connection;
pub mod datagram;
pub mod policy;
pub mod serial;
pub mod stats;

#[cfg(test)]
mod mock;

pub trait Encode {
    type Error;

    /// Writes `self` into the front of `buffer`, returning how many bytes were used.
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Decode<'a> where Self: Sized {
    type Error;

    fn decode(data: &'a [u8]) -> Result<Self, Self::Error>;
}

pub use assembler::FrameAssembler;
pub use checksum::{is_valid_receive_checksum, send_checksum};
pub use connection::{Connection, ConnectionError, Error, WriteStage};
pub use datagram::{Datagram, DatagramKind, FrameError, Header};
pub use logging::{GlobalLogger, HexDump, level_from_name};
pub use policy::{BoundedRetry, CycleBackoff, FaultAction, ReconnectPolicy, ReopenOnce};
pub use serial::{Connector, ErrorShim, NbPort, Parity, Port, SerialConfig, StopBits};
pub use stats::Statistics;
