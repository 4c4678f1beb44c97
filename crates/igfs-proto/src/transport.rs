// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Byte-stream transport boundary and an in-memory implementation.

use std::collections::VecDeque;

use crate::error::{ProtoError, ProtoResult};

/// Blocking, ordered, reliable byte stream to one IGFS endpoint.
///
/// `read_data` and `write_data` either transfer the whole buffer or fail;
/// there is no partial-length success.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn connect(&mut self) -> ProtoResult<()>;

    fn disconnect(&mut self) -> ProtoResult<()>;

    fn is_connected(&self) -> bool;

    /// Fill `buf` completely from the stream.
    fn read_data(&mut self, buf: &mut [u8]) -> ProtoResult<()>;

    /// Write all of `buf` to the stream.
    fn write_data(&mut self, buf: &[u8]) -> ProtoResult<()>;

    /// Push any buffered output to the peer. Called once per request frame.
    fn flush(&mut self) -> ProtoResult<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> ProtoResult<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> ProtoResult<()> {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> ProtoResult<()> {
        (**self).read_data(buf)
    }

    fn write_data(&mut self, buf: &[u8]) -> ProtoResult<()> {
        (**self).write_data(buf)
    }

    fn flush(&mut self) -> ProtoResult<()> {
        (**self).flush()
    }
}

/// Loopback transport over an in-memory byte queue.
///
/// Written bytes become readable in the order they were written, which makes
/// it suitable both for encode/decode round trips and for feeding captured
/// frames into a decoder.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    buffer: VecDeque<u8>,
    connected: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            connected: true,
        }
    }

    /// Transport whose readable side is pre-loaded with `bytes`.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            buffer: bytes.as_ref().iter().copied().collect(),
            connected: true,
        }
    }

    /// Bytes written but not yet read.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drain everything not yet read.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.buffer.drain(..).collect()
    }

    /// Peek at the unread bytes without consuming them.
    pub fn bytes(&self) -> Vec<u8> {
        self.buffer.iter().copied().collect()
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self) -> ProtoResult<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> ProtoResult<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_data(&mut self, buf: &mut [u8]) -> ProtoResult<()> {
        if !self.connected {
            return Err(ProtoError::NotConnected);
        }
        if self.buffer.len() < buf.len() {
            return Err(ProtoError::ShortRead {
                expected: buf.len(),
                available: self.buffer.len(),
            });
        }
        let n = buf.len();
        let drained: Vec<u8> = self.buffer.drain(..n).collect();
        buf.copy_from_slice(&drained);
        Ok(())
    }

    fn write_data(&mut self, buf: &[u8]) -> ProtoResult<()> {
        if !self.connected {
            return Err(ProtoError::NotConnected);
        }
        self.buffer.extend(buf.iter().copied());
        Ok(())
    }
}
