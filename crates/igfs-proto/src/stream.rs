// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Framed stream: transport plus a per-frame cursor.
//!
//! Header fields sit at fixed offsets from the start of a frame, so every
//! read and write advances a cursor that [`FramedStream::skip_to_pos`] and
//! [`FramedStream::fill_with_zeros_until`] use to compute padding. The cursor
//! is frame-relative and must be zeroed between frames; [`FramedStream::frame`]
//! hands out a guard that does so when it goes out of scope.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::codec::ByteOrderCodec;
use crate::error::{ProtoError, ProtoResult};
use crate::transport::Transport;

/// Largest byte length a 16-bit-prefixed string can carry.
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

const SKIP_CHUNK: usize = 64;

/// Transport wrapper tracking the byte offset within the current frame.
#[derive(Debug)]
pub struct FramedStream<T> {
    transport: T,
    codec: ByteOrderCodec,
    pos: usize,
}

impl<T: Transport> FramedStream<T> {
    pub fn new(transport: T, codec: ByteOrderCodec) -> Self {
        Self {
            transport,
            codec,
            pos: 0,
        }
    }

    pub fn codec(&self) -> ByteOrderCodec {
        self.codec
    }

    /// Bytes read or written since the last reset.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self) {
        if self.pos != 0 {
            trace!(frame_len = self.pos, "frame cursor reset");
        }
        self.pos = 0;
    }

    /// Enter a frame. The cursor is zeroed when the returned guard drops,
    /// whether the frame completed or failed part way.
    pub fn frame(&mut self) -> FrameGuard<'_, T> {
        FrameGuard { stream: self }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn flush(&mut self) -> ProtoResult<()> {
        self.transport.flush()
    }

    pub fn read_data(&mut self, buf: &mut [u8]) -> ProtoResult<()> {
        self.transport.read_data(buf)?;
        self.pos += buf.len();
        Ok(())
    }

    pub fn write_data(&mut self, buf: &[u8]) -> ProtoResult<()> {
        self.transport.write_data(buf)?;
        self.pos += buf.len();
        Ok(())
    }

    /// Discard incoming bytes until the cursor reaches `target`.
    pub fn skip_to_pos(&mut self, target: usize) -> ProtoResult<()> {
        let mut scratch = [0u8; SKIP_CHUNK];
        while self.pos < target {
            let n = (target - self.pos).min(SKIP_CHUNK);
            self.read_data(&mut scratch[..n])?;
        }
        Ok(())
    }

    /// Emit zero bytes until the cursor reaches `target`.
    pub fn fill_with_zeros_until(&mut self, target: usize) -> ProtoResult<()> {
        let zeros = [0u8; SKIP_CHUNK];
        while self.pos < target {
            let n = (target - self.pos).min(SKIP_CHUNK);
            self.write_data(&zeros[..n])?;
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> ProtoResult<u8> {
        let mut raw = [0u8; 1];
        self.read_data(&mut raw)?;
        Ok(raw[0])
    }

    pub fn write_u8(&mut self, value: u8) -> ProtoResult<()> {
        self.write_data(&[value])
    }

    pub fn read_bool(&mut self) -> ProtoResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn write_bool(&mut self, value: bool) -> ProtoResult<()> {
        self.write_u8(u8::from(value))
    }

    pub fn read_i16(&mut self) -> ProtoResult<i16> {
        let mut raw = [0u8; 2];
        self.read_data(&mut raw)?;
        Ok(self.codec.decode_i16(raw))
    }

    pub fn write_i16(&mut self, value: i16) -> ProtoResult<()> {
        let raw = self.codec.encode_i16(value);
        self.write_data(&raw)
    }

    pub fn read_i32(&mut self) -> ProtoResult<i32> {
        let mut raw = [0u8; 4];
        self.read_data(&mut raw)?;
        Ok(self.codec.decode_i32(raw))
    }

    pub fn write_i32(&mut self, value: i32) -> ProtoResult<()> {
        let raw = self.codec.encode_i32(value);
        self.write_data(&raw)
    }

    pub fn read_i64(&mut self) -> ProtoResult<i64> {
        let mut raw = [0u8; 8];
        self.read_data(&mut raw)?;
        Ok(self.codec.decode_i64(raw))
    }

    pub fn write_i64(&mut self, value: i64) -> ProtoResult<()> {
        let raw = self.codec.encode_i64(value);
        self.write_data(&raw)
    }

    /// Unsigned 16-bit length followed by the bytes. Invalid UTF-8 is replaced.
    pub fn read_utf(&mut self) -> ProtoResult<String> {
        let len = self.read_i16()? as u16 as usize;
        let mut bytes = vec![0u8; len];
        self.read_data(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn write_utf(&mut self, value: &str) -> ProtoResult<()> {
        check_utf_len(value)?;
        self.write_i16(value.len() as u16 as i16)?;
        self.write_data(value.as_bytes())
    }

    /// Is-null byte, then a UTF string when the byte is zero. Null reads as "".
    pub fn read_nullable_string(&mut self) -> ProtoResult<String> {
        if self.read_bool()? {
            return Ok(String::new());
        }
        self.read_utf()
    }

    /// Empty strings go out as null: a single `0x01` byte.
    pub fn write_nullable_string(&mut self, value: &str) -> ProtoResult<()> {
        if value.is_empty() {
            return self.write_bool(true);
        }
        check_utf_len(value)?;
        self.write_bool(false)?;
        self.write_utf(value)
    }

    /// Signed 32-bit count then that many key/value UTF pairs.
    /// A negative count is treated as an empty map.
    pub fn read_string_map(&mut self) -> ProtoResult<BTreeMap<String, String>> {
        let count = self.read_i32()?;
        let mut map = BTreeMap::new();
        for _ in 0..count.max(0) {
            let key = self.read_utf()?;
            let value = self.read_utf()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    pub fn write_string_map(&mut self, map: &BTreeMap<String, String>) -> ProtoResult<()> {
        for (key, value) in map {
            check_utf_len(key)?;
            check_utf_len(value)?;
        }
        let count = i32::try_from(map.len()).map_err(|_| ProtoError::InvalidLength {
            field: "string map",
            len: map.len() as i64,
        })?;
        self.write_i32(count)?;
        for (key, value) in map {
            self.write_utf(key)?;
            self.write_utf(value)?;
        }
        Ok(())
    }
}

pub(crate) fn check_utf_len(value: &str) -> ProtoResult<()> {
    if value.len() > MAX_UTF_LEN {
        return Err(ProtoError::StringTooLong { len: value.len() });
    }
    Ok(())
}

/// Scoped frame on a [`FramedStream`]; resets the cursor on drop.
pub struct FrameGuard<'a, T: Transport> {
    stream: &'a mut FramedStream<T>,
}

impl<T: Transport> Deref for FrameGuard<'_, T> {
    type Target = FramedStream<T>;

    fn deref(&self) -> &Self::Target {
        self.stream
    }
}

impl<T: Transport> DerefMut for FrameGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stream
    }
}

impl<T: Transport> Drop for FrameGuard<'_, T> {
    fn drop(&mut self) {
        self.stream.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireOrder;
    use crate::transport::{MemoryTransport, MockTransport};

    fn stream() -> FramedStream<MemoryTransport> {
        FramedStream::new(MemoryTransport::new(), ByteOrderCodec::new(WireOrder::BigEndian))
    }

    #[igfs_test_utils::logged_test]
    fn nullable_empty_string_is_a_single_null_byte() {
        let mut s = stream();
        s.write_nullable_string("").unwrap();
        assert_eq!(s.transport().bytes(), vec![0x01]);
        assert_eq!(s.position(), 1);
    }

    #[igfs_test_utils::logged_test]
    fn nullable_string_has_null_flag_length_and_bytes() {
        let mut s = stream();
        s.write_nullable_string("ab").unwrap();
        assert_eq!(s.transport().bytes(), vec![0x00, 0x00, 0x02, b'a', b'b']);

        s.reset();
        assert_eq!(s.read_nullable_string().unwrap(), "ab");
        assert_eq!(s.position(), 5);
    }

    #[igfs_test_utils::logged_test]
    fn string_map_round_trips_with_count_prefix() {
        let mut s = stream();
        let map = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        s.write_string_map(&map).unwrap();
        assert_eq!(&s.transport().bytes()[..4], &[0, 0, 0, 2]);

        s.reset();
        assert_eq!(s.read_string_map().unwrap(), map);
    }

    #[igfs_test_utils::logged_test]
    fn negative_map_count_reads_as_empty() {
        let mut s = FramedStream::new(
            MemoryTransport::from_bytes((-3i32).to_be_bytes()),
            ByteOrderCodec::default(),
        );
        assert!(s.read_string_map().unwrap().is_empty());
    }

    #[igfs_test_utils::logged_test]
    fn oversized_string_is_rejected_before_writing() {
        let mut s = stream();
        let long = "x".repeat(MAX_UTF_LEN + 1);
        let err = s.write_nullable_string(&long).unwrap_err();
        assert!(matches!(err, ProtoError::StringTooLong { len } if len == MAX_UTF_LEN + 1));
        assert_eq!(s.transport().pending(), 0);
        assert_eq!(s.position(), 0);
    }

    #[igfs_test_utils::logged_test]
    fn utf_length_above_i16_max_is_unsigned() {
        let mut s = stream();
        let text = "y".repeat(40_000);
        s.write_utf(&text).unwrap();
        s.reset();
        assert_eq!(s.read_utf().unwrap().len(), 40_000);
    }

    #[igfs_test_utils::logged_test]
    fn padding_and_skipping_follow_the_cursor() {
        let mut s = stream();
        s.write_u8(0).unwrap();
        s.fill_with_zeros_until(8).unwrap();
        s.write_i32(7).unwrap();
        s.fill_with_zeros_until(24).unwrap();
        // Already past the target: nothing more is written.
        s.fill_with_zeros_until(10).unwrap();
        assert_eq!(s.position(), 24);
        assert_eq!(s.transport().pending(), 24);

        s.reset();
        s.skip_to_pos(8).unwrap();
        assert_eq!(s.read_i32().unwrap(), 7);
        s.skip_to_pos(24).unwrap();
        assert_eq!(s.transport().pending(), 0);
    }

    #[igfs_test_utils::logged_test]
    fn frame_guard_resets_cursor_on_drop() {
        let mut s = stream();
        {
            let mut frame = s.frame();
            frame.write_i64(42).unwrap();
            assert_eq!(frame.position(), 8);
        }
        assert_eq!(s.position(), 0);
    }

    #[igfs_test_utils::logged_test]
    fn frame_guard_resets_cursor_after_failure() {
        let mut s = FramedStream::new(MemoryTransport::from_bytes([1, 2, 3]), ByteOrderCodec::default());
        {
            let mut frame = s.frame();
            frame.read_u8().unwrap();
            assert!(frame.read_i32().is_err());
        }
        assert_eq!(s.position(), 0);
    }

    #[igfs_test_utils::logged_test]
    fn transport_failure_does_not_advance_cursor() {
        let mut transport = MockTransport::new();
        transport
            .expect_write_data()
            .returning(|_| Err(ProtoError::NotConnected));
        let mut s = FramedStream::new(transport, ByteOrderCodec::default());

        assert!(matches!(s.write_i32(1), Err(ProtoError::NotConnected)));
        assert_eq!(s.position(), 0);
    }
}
