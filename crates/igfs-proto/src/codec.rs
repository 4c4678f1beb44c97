// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-width integer conversion between host and wire byte order.
//!
//! Integers are moved through the transport as raw host-order bytes and
//! byte-swapped when the host and wire orders differ. The decision is taken
//! once, when the codec is built, and single bytes are never swapped.

/// Byte order used for multi-byte integers on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WireOrder {
    /// Network order, as spoken by IGFS servers.
    #[default]
    BigEndian,
    LittleEndian,
}

impl WireOrder {
    fn is_little(self) -> bool {
        matches!(self, WireOrder::LittleEndian)
    }
}

/// Converts 16/32/64-bit integers between host order and wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteOrderCodec {
    should_swap: bool,
}

impl Default for ByteOrderCodec {
    fn default() -> Self {
        Self::new(WireOrder::default())
    }
}

impl ByteOrderCodec {
    /// Build a codec for the given wire order on the current host.
    pub fn new(wire: WireOrder) -> Self {
        let host_is_little = cfg!(target_endian = "little");
        Self {
            should_swap: wire.is_little() != host_is_little,
        }
    }

    /// Build a codec with an explicit swap decision, independent of the host.
    pub fn with_swap(should_swap: bool) -> Self {
        Self { should_swap }
    }

    pub fn should_swap(&self) -> bool {
        self.should_swap
    }

    #[inline]
    pub fn encode_i16(&self, value: i16) -> [u8; 2] {
        self.swap16(value).to_ne_bytes()
    }

    #[inline]
    pub fn encode_i32(&self, value: i32) -> [u8; 4] {
        self.swap32(value).to_ne_bytes()
    }

    #[inline]
    pub fn encode_i64(&self, value: i64) -> [u8; 8] {
        self.swap64(value).to_ne_bytes()
    }

    #[inline]
    pub fn decode_i16(&self, raw: [u8; 2]) -> i16 {
        self.swap16(i16::from_ne_bytes(raw))
    }

    #[inline]
    pub fn decode_i32(&self, raw: [u8; 4]) -> i32 {
        self.swap32(i32::from_ne_bytes(raw))
    }

    #[inline]
    pub fn decode_i64(&self, raw: [u8; 8]) -> i64 {
        self.swap64(i64::from_ne_bytes(raw))
    }

    #[inline]
    fn swap16(&self, v: i16) -> i16 {
        if self.should_swap { v.swap_bytes() } else { v }
    }

    #[inline]
    fn swap32(&self, v: i32) -> i32 {
        if self.should_swap { v.swap_bytes() } else { v }
    }

    #[inline]
    fn swap64(&self, v: i64) -> i64 {
        if self.should_swap { v.swap_bytes() } else { v }
    }
}
