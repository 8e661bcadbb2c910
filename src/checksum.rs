//! Additive checksum used on both directions of the link.
//!
//! Outbound: append `(sum ^ 0xFF) + 1`, the two's complement of the byte sum.
//! Inbound: every byte of a frame, checksum included, must sum to zero.

/// Wrapping byte sum.
pub fn sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Checksum byte to send after `payload`.
pub fn send_checksum(payload: &[u8]) -> u8 {
    (sum(payload) ^ 0xFF).wrapping_add(1)
}

/// True when `frame` (trailing checksum included) sums to zero.
pub fn is_valid_receive_checksum(frame: &[u8]) -> bool {
    sum(frame) == 0
}
