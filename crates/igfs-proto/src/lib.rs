// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! IGFS protocol: wire codec and message catalog
//!
//! This crate defines the byte-exact framing spoken by IGFS servers:
//! integer byte-order handling, the frame-relative cursor used to place
//! header fields at fixed offsets, and the request/response types for every
//! file-system operation the client issues.

pub mod codec;
pub mod command;
pub mod error;
pub mod messages;
pub mod stream;
pub mod transport;

// Re-export key types
pub use codec::{ByteOrderCodec, WireOrder};
pub use command::Command;
pub use error::{ProtoError, ProtoResult};
pub use messages::{
    read_request_header,
    write_request_header,
    CloseRequest,
    CloseResponse,
    DeleteRequest,
    DeleteResponse,
    Envelope,
    ExistsRequest,
    ExistsResponse,
    FileInfo,
    HandshakeRequest,
    HandshakeResponse,
    IgfsPath,
    IgfsRequest,
    InfoRequest,
    InfoResponse,
    ListFilesRequest,
    ListFilesResponse,
    ListPathsRequest,
    ListPathsResponse,
    MkDirRequest,
    MkDirResponse,
    OpenAppendRequest,
    OpenAppendResponse,
    OpenCreateRequest,
    OpenCreateResponse,
    OpenReadRequest,
    OpenReadResponse,
    Operation,
    PathControlRequest,
    ReadBlockRequest,
    ReadBlockResponse,
    RenameRequest,
    RenameResponse,
    RequestFrame,
    ResponseHeader,
    StreamControlRequest,
    WireDecode,
    WireEncode,
    WriteBlockRequest,
    // Wire constants
    HEADER_SIZE,
    OK_ERROR_CODE,
    RESPONSE_HEADER_SIZE,
    RES_TYPE_ERR_STREAM_ID,
};
pub use stream::{FrameGuard, FramedStream};
pub use transport::{MemoryTransport, Transport};
