// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! IGFS message catalog
//!
//! Every frame starts with a one byte marker, is zero padded to offset 8,
//! carries a 32-bit command id (requests) or request id (responses) and is
//! padded again to [`HEADER_SIZE`]. What follows depends on the frame kind:
//! see [`request`] and [`response`].

pub mod request;
pub mod response;

use crate::error::ProtoResult;
use crate::stream::FramedStream;
use crate::transport::Transport;

pub use request::*;
pub use response::*;

/// Size of the common frame header.
pub const HEADER_SIZE: usize = 24;

/// Size of the response header that follows the common header: result type,
/// has-error flag and payload length.
pub const RESPONSE_HEADER_SIZE: usize = 9;

/// Offset of the command id in requests and the request id in responses.
pub const ID_OFFSET: usize = 8;

/// Error code carried by successful responses.
pub const OK_ERROR_CODE: i32 = -1;

/// Result type reported when a stream-control request names an unknown stream.
pub const RES_TYPE_ERR_STREAM_ID: i32 = 9;

/// Value that can be written to a framed stream.
pub trait WireEncode {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()>;
}

/// Value that can be read from a framed stream.
pub trait WireDecode: Sized {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self>;
}

/// Optional values: presence byte, then the value when present.
impl<V: WireEncode> WireEncode for Option<V> {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.write_bool(self.is_some())?;
        if let Some(value) = self {
            value.encode(out)?;
        }
        Ok(())
    }
}

impl<V: WireDecode> WireDecode for Option<V> {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        if input.read_bool()? {
            Ok(Some(V::decode(input)?))
        } else {
            Ok(None)
        }
    }
}

impl WireEncode for bool {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.write_bool(*self)
    }
}

impl WireDecode for bool {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        input.read_bool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteOrderCodec;
    use crate::transport::MemoryTransport;

    #[igfs_test_utils::logged_test]
    fn optional_writes_presence_byte_first() {
        let mut s = FramedStream::new(MemoryTransport::new(), ByteOrderCodec::default());
        Some(true).encode(&mut s).unwrap();
        None::<bool>.encode(&mut s).unwrap();
        assert_eq!(s.transport().bytes(), vec![1, 1, 0]);

        s.reset();
        assert_eq!(Option::<bool>::decode(&mut s).unwrap(), Some(true));
        assert_eq!(Option::<bool>::decode(&mut s).unwrap(), None);
    }
}
