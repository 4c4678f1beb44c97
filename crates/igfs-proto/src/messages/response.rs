// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Response frames
//!
//! After the common header a response carries a 32-bit result type and a
//! has-error byte. Error responses continue with a UTF message and a 32-bit
//! error code and end there. Successful responses pad to offset 29, carry a
//! 32-bit payload length, pad to offset 33 and then hold the payload.

use std::collections::BTreeMap;

use super::{
    WireDecode, WireEncode, HEADER_SIZE, ID_OFFSET, OK_ERROR_CODE, RESPONSE_HEADER_SIZE,
    RES_TYPE_ERR_STREAM_ID,
};
use crate::error::{ProtoError, ProtoResult};
use crate::stream::FramedStream;
use crate::transport::Transport;

const LENGTH_OFFSET: usize = HEADER_SIZE + 5;
const PAYLOAD_OFFSET: usize = HEADER_SIZE + RESPONSE_HEADER_SIZE;

/// Common part of every response frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Echoed request id. Never correlated: one request is in flight at a time.
    pub request_id: i32,
    pub result_type: i32,
    /// [`OK_ERROR_CODE`] on success.
    pub error_code: i32,
    pub error_message: String,
    /// Payload length. Only meaningful for block reads.
    pub length: i32,
}

impl ResponseHeader {
    pub fn ok() -> Self {
        Self {
            request_id: 0,
            result_type: 0,
            error_code: OK_ERROR_CODE,
            error_message: String::new(),
            length: 0,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_message: message.into(),
            ..Self::ok()
        }
    }

    pub fn with_result_type(mut self, result_type: i32) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == OK_ERROR_CODE
    }

    /// The server did not recognise the stream id of a stream-control request.
    pub fn is_stream_id_error(&self) -> bool {
        self.result_type == RES_TYPE_ERR_STREAM_ID
    }
}

impl Default for ResponseHeader {
    fn default() -> Self {
        Self::ok()
    }
}

impl WireDecode for ResponseHeader {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        input.read_u8()?;
        input.skip_to_pos(ID_OFFSET)?;
        let request_id = input.read_i32()?;
        input.skip_to_pos(HEADER_SIZE)?;
        let result_type = input.read_i32()?;

        if input.read_bool()? {
            let error_message = input.read_utf()?;
            let error_code = input.read_i32()?;
            return Ok(Self {
                request_id,
                result_type,
                error_code,
                error_message,
                length: 0,
            });
        }

        input.skip_to_pos(LENGTH_OFFSET)?;
        let length = input.read_i32()?;
        input.skip_to_pos(PAYLOAD_OFFSET)?;
        Ok(Self {
            request_id,
            result_type,
            length,
            ..Self::ok()
        })
    }
}

impl WireEncode for ResponseHeader {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.write_u8(0)?;
        out.fill_with_zeros_until(ID_OFFSET)?;
        out.write_i32(self.request_id)?;
        out.fill_with_zeros_until(HEADER_SIZE)?;
        out.write_i32(self.result_type)?;
        out.write_bool(!self.is_ok())?;

        if !self.is_ok() {
            out.write_utf(&self.error_message)?;
            return out.write_i32(self.error_code);
        }

        out.fill_with_zeros_until(LENGTH_OFFSET)?;
        out.write_i32(self.length)?;
        out.fill_with_zeros_until(PAYLOAD_OFFSET)
    }
}

/// Response header plus a payload that is present only on success.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope<R> {
    pub header: ResponseHeader,
    payload: Option<R>,
}

impl<R> Envelope<R> {
    pub fn ok(payload: R) -> Self {
        Self {
            header: ResponseHeader::ok(),
            payload: Some(payload),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            header: ResponseHeader::error(code, message),
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.header.is_ok()
    }

    pub fn error_code(&self) -> i32 {
        self.header.error_code
    }

    pub fn error_message(&self) -> &str {
        &self.header.error_message
    }

    pub fn payload(&self) -> Option<&R> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<R> {
        self.payload
    }
}

impl<R: WireDecode> WireDecode for Envelope<R> {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        let header = ResponseHeader::decode(input)?;
        let payload = if header.is_ok() {
            Some(R::decode(input)?)
        } else {
            None
        };
        Ok(Self { header, payload })
    }
}

impl<R: WireEncode> WireEncode for Envelope<R> {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        self.header.encode(out)?;
        match (&self.payload, self.header.is_ok()) {
            (Some(payload), true) => payload.encode(out),
            _ => Ok(()),
        }
    }
}

/// Block read, decoded straight into a caller-owned buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadBlockResponse {
    pub header: ResponseHeader,
    /// Bytes placed at the front of the destination buffer.
    pub bytes_read: usize,
}

impl ReadBlockResponse {
    pub fn is_ok(&self) -> bool {
        self.header.is_ok()
    }

    /// Decode a block-read response, copying the payload into `dst`.
    pub fn decode_into<T: Transport>(
        input: &mut FramedStream<T>,
        dst: &mut [u8],
    ) -> ProtoResult<Self> {
        let header = ResponseHeader::decode(input)?;
        if !header.is_ok() {
            return Ok(Self {
                header,
                bytes_read: 0,
            });
        }

        let len = usize::try_from(header.length).map_err(|_| ProtoError::InvalidLength {
            field: "read block",
            len: i64::from(header.length),
        })?;
        if len > dst.len() {
            return Err(ProtoError::BufferTooSmall {
                needed: len,
                capacity: dst.len(),
            });
        }
        input.read_data(&mut dst[..len])?;
        Ok(Self {
            header,
            bytes_read: len,
        })
    }

    /// Write a successful block-read response carrying `data`.
    pub fn encode_block<T: Transport>(
        out: &mut FramedStream<T>,
        header: ResponseHeader,
        data: &[u8],
    ) -> ProtoResult<()> {
        let length =
            i32::try_from(data.len()).map_err(|_| ProtoError::BlockTooLarge { len: data.len() })?;
        header.with_length(length).encode(out)?;
        out.write_data(data)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub fs_name: String,
    pub block_size: i64,
    pub sampling: Option<bool>,
}

impl WireDecode for HandshakeResponse {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            fs_name: input.read_nullable_string()?,
            block_size: input.read_i64()?,
            sampling: Option::<bool>::decode(input)?,
        })
    }
}

impl WireEncode for HandshakeResponse {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.write_nullable_string(&self.fs_name)?;
        out.write_i64(self.block_size)?;
        self.sampling.encode(out)
    }
}

/// Responses whose payload is a single boolean.
macro_rules! flag_responses {
    ($($(#[$meta:meta])* $name:ident { $field:ident })*) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name {
            pub $field: bool,
        }

        impl WireDecode for $name {
            fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
                Ok(Self { $field: input.read_bool()? })
            }
        }

        impl WireEncode for $name {
            fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
                out.write_bool(self.$field)
            }
        }
    )*};
}

flag_responses! {
    ExistsResponse { exists }
    /// `exists` is false when there was nothing to delete.
    DeleteResponse { exists }
    MkDirResponse { successful }
    RenameResponse { successful }
    CloseResponse { successful }
}

/// Responses whose payload is a freshly opened stream id.
macro_rules! stream_responses {
    ($($name:ident)*) => {$(
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name {
            pub stream_id: i64,
        }

        impl WireDecode for $name {
            fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
                Ok(Self { stream_id: input.read_i64()? })
            }
        }

        impl WireEncode for $name {
            fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
                out.write_i64(self.stream_id)
            }
        }
    )*};
}

stream_responses! {
    OpenCreateResponse
    OpenAppendResponse
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenReadResponse {
    pub stream_id: i64,
    /// File length at open time.
    pub length: i64,
}

impl WireDecode for OpenReadResponse {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            stream_id: input.read_i64()?,
            length: input.read_i64()?,
        })
    }
}

impl WireEncode for OpenReadResponse {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.write_i64(self.stream_id)?;
        out.write_i64(self.length)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct IgfsPath {
    pub path: String,
}

impl IgfsPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl WireDecode for IgfsPath {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            path: input.read_nullable_string()?,
        })
    }
}

impl WireEncode for IgfsPath {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.write_nullable_string(&self.path)
    }
}

/// File or directory metadata.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FileInfo {
    pub path: Option<IgfsPath>,
    pub block_size: i32,
    pub group_block_size: i64,
    pub length: i64,
    pub properties: BTreeMap<String, String>,
    pub access_time: i64,
    pub modification_time: i64,
    pub flags: u8,
}

impl FileInfo {
    pub const FLAG_DIRECTORY: u8 = 0x1;

    pub fn is_directory(&self) -> bool {
        self.flags & Self::FLAG_DIRECTORY != 0
    }

    pub fn path_str(&self) -> &str {
        self.path.as_ref().map_or("", |p| p.path.as_str())
    }
}

impl WireDecode for FileInfo {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            path: Option::<IgfsPath>::decode(input)?,
            block_size: input.read_i32()?,
            group_block_size: input.read_i64()?,
            length: input.read_i64()?,
            properties: input.read_string_map()?,
            access_time: input.read_i64()?,
            modification_time: input.read_i64()?,
            flags: input.read_u8()?,
        })
    }
}

impl WireEncode for FileInfo {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        self.path.encode(out)?;
        out.write_i32(self.block_size)?;
        out.write_i64(self.group_block_size)?;
        out.write_i64(self.length)?;
        out.write_string_map(&self.properties)?;
        out.write_i64(self.access_time)?;
        out.write_i64(self.modification_time)?;
        out.write_u8(self.flags)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InfoResponse {
    pub file_info: FileInfo,
}

impl WireDecode for InfoResponse {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            file_info: FileInfo::decode(input)?,
        })
    }
}

impl WireEncode for InfoResponse {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        self.file_info.encode(out)
    }
}

fn decode_list<T: Transport, V: WireDecode>(input: &mut FramedStream<T>) -> ProtoResult<Vec<V>> {
    let count = input.read_i32()?;
    let count = usize::try_from(count).map_err(|_| ProtoError::InvalidLength {
        field: "list",
        len: i64::from(count),
    })?;
    // Entries are at least one byte each; bound the reservation accordingly.
    let mut entries = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        entries.push(V::decode(input)?);
    }
    Ok(entries)
}

fn encode_list<T: Transport, V: WireEncode>(
    out: &mut FramedStream<T>,
    entries: &[V],
) -> ProtoResult<()> {
    let count = i32::try_from(entries.len()).map_err(|_| ProtoError::InvalidLength {
        field: "list",
        len: entries.len() as i64,
    })?;
    out.write_i32(count)?;
    entries.iter().try_for_each(|entry| entry.encode(out))
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ListFilesResponse {
    pub entries: Vec<FileInfo>,
}

impl WireDecode for ListFilesResponse {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            entries: decode_list(input)?,
        })
    }
}

impl WireEncode for ListFilesResponse {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        encode_list(out, &self.entries)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ListPathsResponse {
    pub entries: Vec<IgfsPath>,
}

impl WireDecode for ListPathsResponse {
    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            entries: decode_list(input)?,
        })
    }
}

impl WireEncode for ListPathsResponse {
    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        encode_list(out, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteOrderCodec;
    use crate::transport::MemoryTransport;

    fn stream_with(bytes: Vec<u8>) -> FramedStream<MemoryTransport> {
        FramedStream::new(MemoryTransport::from_bytes(bytes), ByteOrderCodec::default())
    }

    fn error_frame(code: i32, message: &str) -> Vec<u8> {
        let mut frame = vec![0u8; 8];
        frame.extend_from_slice(&42i32.to_be_bytes());
        frame.resize(HEADER_SIZE, 0);
        frame.extend_from_slice(&0i32.to_be_bytes());
        frame.push(1);
        frame.extend_from_slice(&(message.len() as u16).to_be_bytes());
        frame.extend_from_slice(message.as_bytes());
        frame.extend_from_slice(&code.to_be_bytes());
        frame
    }

    fn ok_frame(length: i32, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; HEADER_SIZE];
        frame.extend_from_slice(&0i32.to_be_bytes());
        frame.push(0);
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[igfs_test_utils::logged_test]
    fn error_response_decodes_code_and_message() {
        let mut s = stream_with(error_frame(5, "boom"));
        let envelope = Envelope::<ExistsResponse>::decode(&mut s).unwrap();

        assert!(!envelope.is_ok());
        assert_eq!(envelope.error_code(), 5);
        assert_eq!(envelope.error_message(), "boom");
        assert_eq!(envelope.header.request_id, 42);
        assert!(envelope.payload().is_none());
        assert_eq!(s.transport().pending(), 0);
    }

    #[igfs_test_utils::logged_test]
    fn ok_response_payload_starts_at_offset_33() {
        let frame = ok_frame(0, &[1]);
        assert_eq!(frame.len(), PAYLOAD_OFFSET + 1);

        let mut s = stream_with(frame);
        let envelope = Envelope::<DeleteResponse>::decode(&mut s).unwrap();
        assert!(envelope.is_ok());
        assert_eq!(envelope.into_payload(), Some(DeleteResponse { exists: true }));
    }

    #[igfs_test_utils::logged_test]
    fn header_encoding_matches_handwritten_frames() {
        let mut s = stream_with(Vec::new());
        let mut header = ResponseHeader::error(5, "boom");
        header.request_id = 42;
        header.encode(&mut s).unwrap();
        assert_eq!(s.transport().bytes(), error_frame(5, "boom"));

        let mut s = stream_with(Vec::new());
        ResponseHeader::ok().with_length(7).encode(&mut s).unwrap();
        assert_eq!(s.transport().bytes(), ok_frame(7, &[]));
    }

    #[igfs_test_utils::logged_test]
    fn stream_id_error_is_flagged_by_result_type() {
        let header = ResponseHeader::error(1, "no such stream").with_result_type(RES_TYPE_ERR_STREAM_ID);
        assert!(header.is_stream_id_error());
        assert!(!ResponseHeader::ok().is_stream_id_error());
    }

    #[igfs_test_utils::logged_test]
    fn read_block_fills_caller_buffer() {
        let mut s = stream_with(ok_frame(5, b"hello"));
        let mut buf = [0u8; 16];

        let response = ReadBlockResponse::decode_into(&mut s, &mut buf).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.bytes_read, 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[igfs_test_utils::logged_test]
    fn read_block_rejects_negative_and_oversized_lengths() {
        let mut s = stream_with(ok_frame(-1, &[]));
        let err = ReadBlockResponse::decode_into(&mut s, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidLength { len: -1, .. }));

        let mut s = stream_with(ok_frame(8, &[0; 8]));
        let err = ReadBlockResponse::decode_into(&mut s, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, ProtoError::BufferTooSmall { needed: 8, capacity: 4 }));
    }

    #[igfs_test_utils::logged_test]
    fn read_block_error_leaves_buffer_untouched() {
        let mut s = stream_with(error_frame(3, "bad stream"));
        let mut buf = [7u8; 4];
        let response = ReadBlockResponse::decode_into(&mut s, &mut buf).unwrap();

        assert!(!response.is_ok());
        assert_eq!(response.bytes_read, 0);
        assert_eq!(buf, [7; 4]);
    }

    #[igfs_test_utils::logged_test]
    fn handshake_payload_is_optional() {
        let mut payload = vec![1u8, 0, 0, 3];
        payload.extend_from_slice(b"igf");
        payload.extend_from_slice(&65536i64.to_be_bytes());
        payload.extend_from_slice(&[1, 1]);

        let mut s = stream_with(ok_frame(0, &payload));
        let envelope = Envelope::<Option<HandshakeResponse>>::decode(&mut s).unwrap();
        let handshake = envelope.into_payload().flatten().unwrap();
        assert_eq!(handshake.fs_name, "igf");
        assert_eq!(handshake.block_size, 65536);
        assert_eq!(handshake.sampling, Some(true));
    }

    #[igfs_test_utils::logged_test]
    fn file_info_listing_round_trips() {
        let listing = ListFilesResponse {
            entries: vec![
                FileInfo {
                    path: Some(IgfsPath::new("/dir/a")),
                    block_size: 4096,
                    length: 11,
                    modification_time: 1_700_000_000_000,
                    ..FileInfo::default()
                },
                FileInfo {
                    path: Some(IgfsPath::new("/dir/sub")),
                    properties: BTreeMap::from([("perm".to_string(), "0755".to_string())]),
                    flags: FileInfo::FLAG_DIRECTORY,
                    ..FileInfo::default()
                },
            ],
        };

        let mut s = stream_with(Vec::new());
        Envelope::ok(listing.clone()).encode(&mut s).unwrap();
        s.reset();
        let decoded = Envelope::<ListFilesResponse>::decode(&mut s).unwrap();

        let entries = decoded.into_payload().unwrap().entries;
        assert_eq!(entries, listing.entries);
        assert!(!entries[0].is_directory());
        assert!(entries[1].is_directory());
        assert_eq!(entries[1].path_str(), "/dir/sub");
    }

    #[igfs_test_utils::logged_test]
    fn negative_list_count_is_invalid() {
        let mut s = stream_with(ok_frame(0, &(-1i32).to_be_bytes()));
        let err = Envelope::<ListPathsResponse>::decode(&mut s).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidLength { field: "list", len: -1 }));
    }
}
