// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request frames
//!
//! Two shapes exist besides the handshake. Path-control requests pad the
//! header to [`HEADER_SIZE`] and carry user name, path, destination path,
//! flag, collocate and a property map. Stream-control requests put a 64-bit
//! stream id and a 32-bit length straight after the command id, which ends
//! the header at exactly [`HEADER_SIZE`].

use std::borrow::Cow;
use std::collections::BTreeMap;

use super::response::{
    CloseResponse, DeleteResponse, ExistsResponse, HandshakeResponse, InfoResponse,
    ListFilesResponse, ListPathsResponse, MkDirResponse, OpenAppendResponse, OpenCreateResponse,
    OpenReadResponse, RenameResponse,
};
use super::{WireDecode, WireEncode, HEADER_SIZE, ID_OFFSET};
use crate::command::Command;
use crate::error::{ProtoError, ProtoResult};
use crate::stream::{check_utf_len, FramedStream};
use crate::transport::Transport;

/// Marker byte at offset 0 of every frame.
const FRAME_MARKER: u8 = 0;

/// Write marker, padding and command id. Leaves the cursor at offset 12.
pub fn write_request_header<T: Transport>(
    out: &mut FramedStream<T>,
    command: Command,
) -> ProtoResult<()> {
    out.write_u8(FRAME_MARKER)?;
    out.fill_with_zeros_until(ID_OFFSET)?;
    out.write_i32(command.id())
}

/// Read marker, padding and command id. Leaves the cursor at offset 12.
pub fn read_request_header<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Command> {
    input.read_u8()?;
    input.skip_to_pos(ID_OFFSET)?;
    Command::try_from(input.read_i32()?)
}

/// A complete request frame for one command.
pub trait RequestFrame: Sized {
    const COMMAND: Command;

    /// Everything after the command id.
    fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()>;

    fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self>;

    /// Checks that would otherwise fail halfway through the frame. Runs
    /// before the header is written.
    fn validate(&self) -> ProtoResult<()> {
        Ok(())
    }

    fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        self.validate()?;
        write_request_header(out, Self::COMMAND)?;
        self.encode_body(out)
    }

    fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        let actual = read_request_header(input)?;
        if actual != Self::COMMAND {
            return Err(ProtoError::UnexpectedCommand {
                expected: Self::COMMAND,
                actual,
            });
        }
        Self::decode_body(input)
    }
}

/// Request answered by a regular response envelope carrying `Response`.
pub trait Operation: RequestFrame {
    type Response: WireDecode + WireEncode;
}

/// Common body of path-addressed requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathControlRequest {
    pub user_name: String,
    pub path: String,
    pub destination_path: String,
    pub flag: bool,
    pub collocate: bool,
    pub properties: BTreeMap<String, String>,
}

impl PathControlRequest {
    /// Request for `path` issued as `user_name`, collocated, with no flag.
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            path: path.into(),
            destination_path: String::new(),
            flag: false,
            collocate: true,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_flag(mut self, flag: bool) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_destination(mut self, destination_path: impl Into<String>) -> Self {
        self.destination_path = destination_path.into();
        self
    }

    /// Every string must fit its 16-bit length prefix.
    pub fn validate(&self) -> ProtoResult<()> {
        check_utf_len(&self.user_name)?;
        check_utf_len(&self.path)?;
        check_utf_len(&self.destination_path)?;
        for (key, value) in &self.properties {
            check_utf_len(key)?;
            check_utf_len(value)?;
        }
        Ok(())
    }

    pub fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.fill_with_zeros_until(HEADER_SIZE)?;
        out.write_nullable_string(&self.user_name)?;
        write_path(out, &self.path)?;
        write_path(out, &self.destination_path)?;
        out.write_bool(self.flag)?;
        out.write_bool(self.collocate)?;
        out.write_string_map(&self.properties)
    }

    pub fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        input.skip_to_pos(HEADER_SIZE)?;
        Ok(Self {
            user_name: input.read_nullable_string()?,
            path: read_path(input)?,
            destination_path: read_path(input)?,
            flag: input.read_bool()?,
            collocate: input.read_bool()?,
            properties: input.read_string_map()?,
        })
    }
}

/// Presence byte (set for non-empty paths), then the nullable string.
fn write_path<T: Transport>(out: &mut FramedStream<T>, path: &str) -> ProtoResult<()> {
    out.write_bool(!path.is_empty())?;
    if !path.is_empty() {
        out.write_nullable_string(path)?;
    }
    Ok(())
}

fn read_path<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<String> {
    if input.read_bool()? {
        input.read_nullable_string()
    } else {
        Ok(String::new())
    }
}

/// Common body of stream-addressed requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamControlRequest {
    pub stream_id: i64,
    pub length: i32,
}

impl StreamControlRequest {
    pub fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.write_i64(self.stream_id)?;
        out.write_i32(self.length)
    }

    pub fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            stream_id: input.read_i64()?,
            length: input.read_i32()?,
        })
    }
}

/// First request on every connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub fs_name: String,
    pub log_dir: String,
}

impl HandshakeRequest {
    pub fn new(fs_name: impl Into<String>) -> Self {
        Self {
            fs_name: fs_name.into(),
            log_dir: String::new(),
        }
    }
}

impl RequestFrame for HandshakeRequest {
    const COMMAND: Command = Command::Handshake;

    fn validate(&self) -> ProtoResult<()> {
        check_utf_len(&self.fs_name)?;
        check_utf_len(&self.log_dir)
    }

    fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        out.fill_with_zeros_until(HEADER_SIZE)?;
        out.write_nullable_string(&self.fs_name)?;
        out.write_nullable_string(&self.log_dir)
    }

    fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        input.skip_to_pos(HEADER_SIZE)?;
        Ok(Self {
            fs_name: input.read_nullable_string()?,
            log_dir: input.read_nullable_string()?,
        })
    }
}

impl Operation for HandshakeRequest {
    type Response = Option<HandshakeResponse>;
}

/// Path-control requests with no trailing fields.
macro_rules! path_requests {
    ($($(#[$meta:meta])* $name:ident => $command:ident, $response:ty;)*) => {$(
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            pub control: PathControlRequest,
        }

        impl RequestFrame for $name {
            const COMMAND: Command = Command::$command;

            fn validate(&self) -> ProtoResult<()> {
                self.control.validate()
            }

            fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
                self.control.encode_body(out)
            }

            fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
                Ok(Self {
                    control: PathControlRequest::decode_body(input)?,
                })
            }
        }

        impl Operation for $name {
            type Response = $response;
        }
    )*};
}

path_requests! {
    ExistsRequest => Exists, ExistsResponse;
    InfoRequest => Info, InfoResponse;
    /// `destination_path` carries the new name.
    RenameRequest => Rename, RenameResponse;
    /// `flag` requests recursive deletion.
    DeleteRequest => Delete, DeleteResponse;
    MkDirRequest => MkDir, MkDirResponse;
    ListPathsRequest => ListPaths, ListPathsResponse;
    ListFilesRequest => ListFiles, ListFilesResponse;
    OpenAppendRequest => OpenAppend, OpenAppendResponse;
}

impl ExistsRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
        }
    }
}

impl InfoRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
        }
    }
}

impl RenameRequest {
    pub fn new(
        user_name: impl Into<String>,
        path: impl Into<String>,
        destination_path: impl Into<String>,
    ) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path).with_destination(destination_path),
        }
    }
}

impl DeleteRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>, recursive: bool) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path).with_flag(recursive),
        }
    }

    pub fn recursive(&self) -> bool {
        self.control.flag
    }
}

impl MkDirRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
        }
    }
}

impl ListPathsRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
        }
    }
}

impl ListFilesRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
        }
    }
}

impl OpenAppendRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
        }
    }
}

/// Open a file for reading. The prefetch hint travels only when `flag` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenReadRequest {
    pub control: PathControlRequest,
    pub sequential_reads_before_prefetch: i32,
}

impl OpenReadRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
            sequential_reads_before_prefetch: 0,
        }
    }

    /// Ask the server to prefetch after `reads` sequential block reads.
    pub fn with_prefetch(mut self, reads: i32) -> Self {
        self.control.flag = true;
        self.sequential_reads_before_prefetch = reads;
        self
    }
}

impl RequestFrame for OpenReadRequest {
    const COMMAND: Command = Command::OpenRead;

    fn validate(&self) -> ProtoResult<()> {
        self.control.validate()
    }

    fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        self.control.encode_body(out)?;
        if self.control.flag {
            out.write_i32(self.sequential_reads_before_prefetch)?;
        }
        Ok(())
    }

    fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        let control = PathControlRequest::decode_body(input)?;
        let sequential_reads_before_prefetch = if control.flag { input.read_i32()? } else { 0 };
        Ok(Self {
            control,
            sequential_reads_before_prefetch,
        })
    }
}

impl Operation for OpenReadRequest {
    type Response = Option<OpenReadResponse>;
}

/// Create (or overwrite) a file and open it for writing.
///
/// Zero replication and block size let the server pick its defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenCreateRequest {
    pub control: PathControlRequest,
    pub replication: i32,
    pub block_size: i64,
}

impl OpenCreateRequest {
    pub fn new(user_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            control: PathControlRequest::new(user_name, path),
            replication: 0,
            block_size: 0,
        }
    }
}

impl RequestFrame for OpenCreateRequest {
    const COMMAND: Command = Command::OpenCreate;

    fn validate(&self) -> ProtoResult<()> {
        self.control.validate()
    }

    fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        self.control.encode_body(out)?;
        out.write_i32(self.replication)?;
        out.write_i64(self.block_size)
    }

    fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(Self {
            control: PathControlRequest::decode_body(input)?,
            replication: input.read_i32()?,
            block_size: input.read_i64()?,
        })
    }
}

impl Operation for OpenCreateRequest {
    type Response = OpenCreateResponse;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloseRequest {
    pub stream_id: i64,
}

impl CloseRequest {
    pub fn new(stream_id: i64) -> Self {
        Self { stream_id }
    }
}

impl RequestFrame for CloseRequest {
    const COMMAND: Command = Command::Close;

    fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        StreamControlRequest {
            stream_id: self.stream_id,
            length: 0,
        }
        .encode_body(out)
    }

    fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        let control = StreamControlRequest::decode_body(input)?;
        Ok(Self {
            stream_id: control.stream_id,
        })
    }
}

impl Operation for CloseRequest {
    type Response = CloseResponse;
}

/// Read up to `length` bytes of an open stream starting at `pos`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadBlockRequest {
    pub stream_id: i64,
    pub pos: i64,
    pub length: i32,
}

impl ReadBlockRequest {
    pub fn new(stream_id: i64, pos: i64, length: i32) -> Self {
        Self {
            stream_id,
            pos,
            length,
        }
    }
}

impl RequestFrame for ReadBlockRequest {
    const COMMAND: Command = Command::ReadBlock;

    fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        StreamControlRequest {
            stream_id: self.stream_id,
            length: self.length,
        }
        .encode_body(out)?;
        out.write_i64(self.pos)
    }

    fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        let control = StreamControlRequest::decode_body(input)?;
        Ok(Self {
            stream_id: control.stream_id,
            length: control.length,
            pos: input.read_i64()?,
        })
    }
}

/// Append `data` to an open stream. The server does not reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteBlockRequest<'a> {
    pub stream_id: i64,
    pub data: Cow<'a, [u8]>,
}

impl<'a> WriteBlockRequest<'a> {
    pub fn new(stream_id: i64, data: &'a [u8]) -> Self {
        Self {
            stream_id,
            data: Cow::Borrowed(data),
        }
    }

    fn block_length(&self) -> ProtoResult<i32> {
        i32::try_from(self.data.len())
            .map_err(|_| ProtoError::BlockTooLarge { len: self.data.len() })
    }

    pub fn into_owned(self) -> WriteBlockRequest<'static> {
        WriteBlockRequest {
            stream_id: self.stream_id,
            data: Cow::Owned(self.data.into_owned()),
        }
    }
}

impl RequestFrame for WriteBlockRequest<'_> {
    const COMMAND: Command = Command::WriteBlock;

    fn validate(&self) -> ProtoResult<()> {
        self.block_length().map(|_| ())
    }

    fn encode_body<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        let length = self.block_length()?;
        StreamControlRequest {
            stream_id: self.stream_id,
            length,
        }
        .encode_body(out)?;
        out.write_data(&self.data)
    }

    fn decode_body<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        let control = StreamControlRequest::decode_body(input)?;
        let len = usize::try_from(control.length).map_err(|_| ProtoError::InvalidLength {
            field: "write block",
            len: i64::from(control.length),
        })?;
        let mut data = vec![0u8; len];
        input.read_data(&mut data)?;
        Ok(Self {
            stream_id: control.stream_id,
            data: Cow::Owned(data),
        })
    }
}

/// Any request frame, as seen by a server reading the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgfsRequest {
    Handshake(HandshakeRequest),
    Exists(ExistsRequest),
    Info(InfoRequest),
    Rename(RenameRequest),
    Delete(DeleteRequest),
    MkDir(MkDirRequest),
    ListPaths(ListPathsRequest),
    ListFiles(ListFilesRequest),
    OpenRead(OpenReadRequest),
    OpenAppend(OpenAppendRequest),
    OpenCreate(OpenCreateRequest),
    Close(CloseRequest),
    ReadBlock(ReadBlockRequest),
    WriteBlock(WriteBlockRequest<'static>),
}

impl IgfsRequest {
    pub fn command(&self) -> Command {
        match self {
            IgfsRequest::Handshake(_) => Command::Handshake,
            IgfsRequest::Exists(_) => Command::Exists,
            IgfsRequest::Info(_) => Command::Info,
            IgfsRequest::Rename(_) => Command::Rename,
            IgfsRequest::Delete(_) => Command::Delete,
            IgfsRequest::MkDir(_) => Command::MkDir,
            IgfsRequest::ListPaths(_) => Command::ListPaths,
            IgfsRequest::ListFiles(_) => Command::ListFiles,
            IgfsRequest::OpenRead(_) => Command::OpenRead,
            IgfsRequest::OpenAppend(_) => Command::OpenAppend,
            IgfsRequest::OpenCreate(_) => Command::OpenCreate,
            IgfsRequest::Close(_) => Command::Close,
            IgfsRequest::ReadBlock(_) => Command::ReadBlock,
            IgfsRequest::WriteBlock(_) => Command::WriteBlock,
        }
    }

    /// Path-control body, for requests that have one.
    pub fn path_control(&self) -> Option<&PathControlRequest> {
        match self {
            IgfsRequest::Exists(r) => Some(&r.control),
            IgfsRequest::Info(r) => Some(&r.control),
            IgfsRequest::Rename(r) => Some(&r.control),
            IgfsRequest::Delete(r) => Some(&r.control),
            IgfsRequest::MkDir(r) => Some(&r.control),
            IgfsRequest::ListPaths(r) => Some(&r.control),
            IgfsRequest::ListFiles(r) => Some(&r.control),
            IgfsRequest::OpenRead(r) => Some(&r.control),
            IgfsRequest::OpenAppend(r) => Some(&r.control),
            IgfsRequest::OpenCreate(r) => Some(&r.control),
            IgfsRequest::Handshake(_)
            | IgfsRequest::Close(_)
            | IgfsRequest::ReadBlock(_)
            | IgfsRequest::WriteBlock(_) => None,
        }
    }

    pub fn encode<T: Transport>(&self, out: &mut FramedStream<T>) -> ProtoResult<()> {
        match self {
            IgfsRequest::Handshake(r) => r.encode(out),
            IgfsRequest::Exists(r) => r.encode(out),
            IgfsRequest::Info(r) => r.encode(out),
            IgfsRequest::Rename(r) => r.encode(out),
            IgfsRequest::Delete(r) => r.encode(out),
            IgfsRequest::MkDir(r) => r.encode(out),
            IgfsRequest::ListPaths(r) => r.encode(out),
            IgfsRequest::ListFiles(r) => r.encode(out),
            IgfsRequest::OpenRead(r) => r.encode(out),
            IgfsRequest::OpenAppend(r) => r.encode(out),
            IgfsRequest::OpenCreate(r) => r.encode(out),
            IgfsRequest::Close(r) => r.encode(out),
            IgfsRequest::ReadBlock(r) => r.encode(out),
            IgfsRequest::WriteBlock(r) => r.encode(out),
        }
    }

    /// Read one complete request frame, dispatching on its command id.
    pub fn decode<T: Transport>(input: &mut FramedStream<T>) -> ProtoResult<Self> {
        Ok(match read_request_header(input)? {
            Command::Handshake => IgfsRequest::Handshake(HandshakeRequest::decode_body(input)?),
            Command::Exists => IgfsRequest::Exists(ExistsRequest::decode_body(input)?),
            Command::Info => IgfsRequest::Info(InfoRequest::decode_body(input)?),
            Command::Rename => IgfsRequest::Rename(RenameRequest::decode_body(input)?),
            Command::Delete => IgfsRequest::Delete(DeleteRequest::decode_body(input)?),
            Command::MkDir => IgfsRequest::MkDir(MkDirRequest::decode_body(input)?),
            Command::ListPaths => IgfsRequest::ListPaths(ListPathsRequest::decode_body(input)?),
            Command::ListFiles => IgfsRequest::ListFiles(ListFilesRequest::decode_body(input)?),
            Command::OpenRead => IgfsRequest::OpenRead(OpenReadRequest::decode_body(input)?),
            Command::OpenAppend => IgfsRequest::OpenAppend(OpenAppendRequest::decode_body(input)?),
            Command::OpenCreate => IgfsRequest::OpenCreate(OpenCreateRequest::decode_body(input)?),
            Command::Close => IgfsRequest::Close(CloseRequest::decode_body(input)?),
            Command::ReadBlock => IgfsRequest::ReadBlock(ReadBlockRequest::decode_body(input)?),
            Command::WriteBlock => IgfsRequest::WriteBlock(WriteBlockRequest::decode_body(input)?),
        })
    }
}
