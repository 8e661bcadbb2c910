//! Wire layout of the datagrams the heat pump sends.
//!
//! ```text
//! | 0x71 | len | 0x01 | kind | payload ... | chk |
//! |<----------- len + 3 bytes ------------------>|
//! ```
//!
//! Only two shapes exist in practice: the optional PCB datagram
//! (`71 11 01 50`, 20 bytes) and the main data datagram (`71 C8 01 10`,
//! 203 bytes).

use core::fmt;

use bilge::prelude::*;

use crate::{Decode, Encode, checksum};

pub const SYNC_BYTE: u8 = 0x71;
pub const SUBTYPE: u8 = 0x01;
pub const HEADER_LEN: usize = 4;
/// Bytes of a frame not counted by the length field: sync, the length byte, checksum.
pub const LENGTH_OVERHEAD: usize = 3;
pub const OPTIONAL_DATAGRAM_LEN: usize = 20;
pub const DATA_DATAGRAM_LEN: usize = 203;
pub const MAX_FRAME_LEN: usize = u8::MAX as usize + LENGTH_OVERHEAD;

#[bitsize(8)]
#[derive(FromBits, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramKind {
    Data = 0x10,
    Optional = 0x50,
    #[fallback]
    Unknown,
}

impl DatagramKind {
    /// Full frame length, checksum included.
    pub fn frame_len(self) -> Option<usize> {
        match self {
            DatagramKind::Data => Some(DATA_DATAGRAM_LEN),
            DatagramKind::Optional => Some(OPTIONAL_DATAGRAM_LEN),
            DatagramKind::Unknown => None,
        }
    }

    fn from_frame_len(len: usize) -> Option<DatagramKind> {
        match len {
            DATA_DATAGRAM_LEN => Some(DatagramKind::Data),
            OPTIONAL_DATAGRAM_LEN => Some(DatagramKind::Optional),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    DecodeBufferTooSmall {
        expected_at_least: usize,
        found: usize,
    },
    EncodeBufferTooSmall {
        expected: usize,
        found: usize,
    },
    /// Sync byte found but the rest of the header is not one we know.
    InvalidHeader {
        header: [u8; HEADER_LEN],
    },
    ChecksumMismatch {
        length: usize,
        sum: u8,
    },
    /// Frame passed its checksum but is neither 20 nor 203 bytes long.
    UnrecognizedLength {
        length: usize,
    },
    PayloadLength {
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::DecodeBufferTooSmall {
                expected_at_least,
                found,
            } => write!(f, "need at least {expected_at_least} bytes, have {found}"),
            FrameError::EncodeBufferTooSmall { expected, found } => {
                write!(f, "encode buffer holds {found} bytes, need {expected}")
            }
            FrameError::InvalidHeader { header } => {
                write!(f, "invalid header bytes: {}", crate::HexDump(header))
            }
            FrameError::ChecksumMismatch { length, sum } => {
                write!(f, "invalid checksum on {length} byte frame (sum {sum:#04x})")
            }
            FrameError::UnrecognizedLength { length } => {
                write!(f, "unknown datagram length {length}")
            }
            FrameError::PayloadLength { expected, found } => {
                write!(f, "payload is {found} bytes, datagram needs {expected}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    length: u8,
    kind: DatagramKind,
}

impl Header {
    pub fn for_kind(kind: DatagramKind) -> Option<Header> {
        let len = kind.frame_len()?;
        Some(Header {
            length: (len - LENGTH_OVERHEAD) as u8,
            kind,
        })
    }

    pub fn kind(&self) -> DatagramKind {
        self.kind
    }

    /// Raw value of byte 1.
    pub fn length_field(&self) -> u8 {
        self.length
    }

    /// Length of the whole frame this header announces.
    pub fn frame_len(&self) -> usize {
        self.length as usize + LENGTH_OVERHEAD
    }

    fn bytes(&self) -> [u8; HEADER_LEN] {
        [SYNC_BYTE, self.length, SUBTYPE, self.kind as u8]
    }
}

impl Encode for Header {
    type Error = FrameError;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        if buffer.len() < HEADER_LEN {
            return Err(FrameError::EncodeBufferTooSmall {
                expected: HEADER_LEN,
                found: buffer.len(),
            });
        }
        buffer[..HEADER_LEN].copy_from_slice(&self.bytes());
        Ok(HEADER_LEN)
    }
}

impl Decode<'_> for Header {
    type Error = FrameError;

    fn decode(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::DecodeBufferTooSmall {
                expected_at_least: HEADER_LEN,
                found: data.len(),
            });
        }
        let mut header = [0; HEADER_LEN];
        header.copy_from_slice(&data[..HEADER_LEN]);

        let kind = DatagramKind::from(header[3]);
        if header[0] != SYNC_BYTE || header[2] != SUBTYPE || kind == DatagramKind::Unknown {
            return Err(FrameError::InvalidHeader { header });
        }
        Ok(Header {
            length: header[1],
            kind,
        })
    }
}

/// One checksum-valid frame, header and checksum included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    kind: DatagramKind,
    bytes: heapless::Vec<u8, DATA_DATAGRAM_LEN>,
}

impl Datagram {
    /// Builds a frame of `kind` around `payload` and appends the checksum.
    pub fn new(kind: DatagramKind, payload: &[u8]) -> Result<Datagram, FrameError> {
        let header = Header::for_kind(kind).ok_or(FrameError::InvalidHeader {
            header: [SYNC_BYTE, 0, SUBTYPE, kind as u8],
        })?;
        let len = header.frame_len();
        let expected = len - HEADER_LEN - 1;
        if payload.len() != expected {
            return Err(FrameError::PayloadLength {
                expected,
                found: payload.len(),
            });
        }

        let mut buf = [0; DATA_DATAGRAM_LEN];
        header.encode(&mut buf)?;
        buf[HEADER_LEN..len - 1].copy_from_slice(payload);
        buf[len - 1] = checksum::send_checksum(&buf[..len - 1]);
        Datagram::from_frame(&buf[..len])
    }

    /// Wraps an already validated frame. The shape is taken from its length.
    pub(crate) fn from_frame(frame: &[u8]) -> Result<Datagram, FrameError> {
        let length = frame.len();
        let kind =
            DatagramKind::from_frame_len(length).ok_or(FrameError::UnrecognizedLength { length })?;
        let bytes = heapless::Vec::from_slice(frame)
            .map_err(|_| FrameError::UnrecognizedLength { length })?;
        Ok(Datagram { kind, bytes })
    }

    pub fn kind(&self) -> DatagramKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.bytes[..HEADER_LEN]
    }

    /// Everything between the header and the checksum byte.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..self.bytes.len() - 1]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }
}

impl AsRef<[u8]> for Datagram {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
