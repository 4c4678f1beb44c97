// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Protocol client: one request/response round trip per call.
//!
//! Calls are strictly half-duplex. A transport failure in any phase leaves
//! the connection at an unknown position within a frame, so the client moves
//! to [`ConnectionState::Broken`] and refuses further calls without touching
//! the transport. Server-reported errors are ordinary results: inspect
//! [`Envelope::is_ok`].
//!
//! A client created over an unconnected transport connects on its first
//! call. It never reconnects: after [`IgfsClient::disconnect`] or a broken
//! connection, create a new client.

use igfs_proto::{
    ByteOrderCodec, CloseRequest, CloseResponse, Command, DeleteRequest, DeleteResponse, Envelope,
    ExistsRequest, ExistsResponse, FramedStream, HandshakeRequest, HandshakeResponse, InfoRequest,
    InfoResponse, ListFilesRequest, ListFilesResponse, ListPathsRequest, ListPathsResponse,
    MkDirRequest, MkDirResponse, OpenAppendRequest, OpenAppendResponse, OpenCreateRequest,
    OpenCreateResponse, OpenReadRequest, OpenReadResponse, Operation, ProtoError, ProtoResult,
    ReadBlockRequest, ReadBlockResponse, RenameRequest, RenameResponse, RequestFrame, Transport,
    WireDecode, WriteBlockRequest,
};
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::tcp::TcpTransport;

/// Where the connection stands between and during calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Writing,
    Reading,
    /// A transport failure occurred; every later call fails.
    Broken,
    /// Closed by [`IgfsClient::disconnect`]; every later call fails.
    Closed,
}

/// Client bound to a single connection.
///
/// Handshake must be the first call on a fresh connection; the client does
/// not enforce this.
pub struct IgfsClient<T: Transport> {
    stream: FramedStream<T>,
    fs_name: String,
    user_name: String,
    state: ConnectionState,
}

impl IgfsClient<TcpTransport> {
    /// Connect to the endpoint in `config` right away.
    pub fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let mut transport = TcpTransport::new(config);
        transport.connect().map_err(|err| match err {
            ProtoError::Io(source) => ClientError::Connect {
                addr: config.addr(),
                source,
            },
            other => ClientError::Proto(other),
        })?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> IgfsClient<T> {
    /// Client over an arbitrary transport. An unconnected transport is
    /// connected on the first call.
    pub fn with_transport(transport: T, config: &ClientConfig) -> Self {
        Self {
            stream: FramedStream::new(transport, ByteOrderCodec::new(config.byte_order())),
            fs_name: config.fs_name().to_string(),
            user_name: config.user_name().to_string(),
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn fs_name(&self) -> &str {
        &self.fs_name
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.state, ConnectionState::Broken | ConnectionState::Closed)
            && self.stream.transport().is_connected()
    }

    pub fn transport(&self) -> &T {
        self.stream.transport()
    }

    /// Close the connection. Later calls fail with `NotConnected`.
    pub fn disconnect(&mut self) -> ClientResult<()> {
        self.stream.reset();
        if self.state != ConnectionState::Broken {
            self.state = ConnectionState::Closed;
        }
        self.stream.transport_mut().disconnect()?;
        Ok(())
    }

    pub fn handshake(&mut self) -> ClientResult<Envelope<Option<HandshakeResponse>>> {
        let request = HandshakeRequest::new(self.fs_name.clone());
        let response = self.call(&request)?;
        if let Some(Some(handshake)) = response.payload() {
            debug!(
                fs_name = %handshake.fs_name,
                block_size = handshake.block_size,
                sampling = ?handshake.sampling,
                "handshake accepted"
            );
        }
        Ok(response)
    }

    pub fn exists(&mut self, path: &str) -> ClientResult<Envelope<ExistsResponse>> {
        self.call(&ExistsRequest::new(self.user_name.clone(), path))
    }

    pub fn info(&mut self, path: &str) -> ClientResult<Envelope<InfoResponse>> {
        self.call(&InfoRequest::new(self.user_name.clone(), path))
    }

    pub fn rename(
        &mut self,
        source: &str,
        destination: &str,
    ) -> ClientResult<Envelope<RenameResponse>> {
        self.call(&RenameRequest::new(self.user_name.clone(), source, destination))
    }

    pub fn delete(&mut self, path: &str, recursive: bool) -> ClientResult<Envelope<DeleteResponse>> {
        self.call(&DeleteRequest::new(self.user_name.clone(), path, recursive))
    }

    pub fn mkdir(&mut self, path: &str) -> ClientResult<Envelope<MkDirResponse>> {
        self.call(&MkDirRequest::new(self.user_name.clone(), path))
    }

    pub fn list_paths(&mut self, path: &str) -> ClientResult<Envelope<ListPathsResponse>> {
        self.call(&ListPathsRequest::new(self.user_name.clone(), path))
    }

    pub fn list_files(&mut self, path: &str) -> ClientResult<Envelope<ListFilesResponse>> {
        self.call(&ListFilesRequest::new(self.user_name.clone(), path))
    }

    /// Open for reading. An absent payload means the server found no such file.
    pub fn open_read(&mut self, path: &str) -> ClientResult<Envelope<Option<OpenReadResponse>>> {
        self.call(&OpenReadRequest::new(self.user_name.clone(), path))
    }

    /// Open for reading, asking the server to prefetch after `reads`
    /// sequential block reads.
    pub fn open_read_with_prefetch(
        &mut self,
        path: &str,
        reads: i32,
    ) -> ClientResult<Envelope<Option<OpenReadResponse>>> {
        self.call(&OpenReadRequest::new(self.user_name.clone(), path).with_prefetch(reads))
    }

    pub fn open_append(&mut self, path: &str) -> ClientResult<Envelope<OpenAppendResponse>> {
        self.call(&OpenAppendRequest::new(self.user_name.clone(), path))
    }

    /// Create `path` with server-default replication and block size.
    pub fn open_create(&mut self, path: &str) -> ClientResult<Envelope<OpenCreateResponse>> {
        self.call(&OpenCreateRequest::new(self.user_name.clone(), path))
    }

    pub fn close(&mut self, stream_id: i64) -> ClientResult<Envelope<CloseResponse>> {
        self.call(&CloseRequest::new(stream_id))
    }

    /// Read up to `dst.len()` bytes at `pos` straight into `dst`.
    ///
    /// `bytes_read` in the result tells how much of `dst` was filled.
    pub fn read_block(
        &mut self,
        stream_id: i64,
        pos: i64,
        dst: &mut [u8],
    ) -> ClientResult<ReadBlockResponse> {
        let length = i32::try_from(dst.len()).unwrap_or(i32::MAX);
        let request = ReadBlockRequest::new(stream_id, pos, length);
        self.send(&request)?;
        let response = self.receive(|stream| ReadBlockResponse::decode_into(stream, dst))?;

        if response.is_ok() {
            debug!(stream_id, pos, len = response.bytes_read, "read block");
        } else {
            warn!(
                stream_id,
                pos,
                code = response.header.error_code,
                message = %response.header.error_message,
                "read block rejected"
            );
        }
        Ok(response)
    }

    /// Append `data` to an open stream.
    ///
    /// The server never answers this request; a failed write surfaces on the
    /// next call that reads a response, typically [`IgfsClient::close`].
    pub fn write_block(&mut self, stream_id: i64, data: &[u8]) -> ClientResult<()> {
        self.send(&WriteBlockRequest::new(stream_id, data))?;
        debug!(stream_id, len = data.len(), "wrote block");
        Ok(())
    }

    fn call<R: Operation>(&mut self, request: &R) -> ClientResult<Envelope<R::Response>> {
        self.send(request)?;
        let response = self.receive(Envelope::<R::Response>::decode)?;

        if response.is_ok() {
            debug!(op = %R::COMMAND, request_id = response.header.request_id, "round trip complete");
        } else {
            warn!(
                op = %R::COMMAND,
                code = response.error_code(),
                message = %response.error_message(),
                "server reported an error"
            );
        }
        Ok(response)
    }

    /// Write one request frame and flush it.
    fn send<R: RequestFrame>(&mut self, request: &R) -> ClientResult<()> {
        // Nothing reaches the wire for a request that cannot be encoded.
        request.validate()?;
        self.ensure_connected()?;
        self.state = ConnectionState::Writing;
        let result = {
            let mut frame = self.stream.frame();
            request.encode(&mut *frame).and_then(|()| frame.flush())
        };
        self.settle(R::COMMAND, result)?;
        if !R::COMMAND.expects_response() {
            self.state = ConnectionState::Idle;
        }
        Ok(())
    }

    /// Read one response frame with `decode`.
    fn receive<V>(
        &mut self,
        decode: impl FnOnce(&mut FramedStream<T>) -> ProtoResult<V>,
    ) -> ClientResult<V> {
        self.state = ConnectionState::Reading;
        let result = {
            let mut frame = self.stream.frame();
            decode(&mut *frame)
        };
        let value = self.settle_read(result)?;
        self.state = ConnectionState::Idle;
        Ok(value)
    }

    fn ensure_connected(&mut self) -> ClientResult<()> {
        match self.state {
            ConnectionState::Broken => return Err(ClientError::ConnectionBroken),
            ConnectionState::Closed => return Err(ProtoError::NotConnected.into()),
            ConnectionState::Idle => {}
            // A previous call was abandoned mid-frame.
            ConnectionState::Writing | ConnectionState::Reading => {
                self.state = ConnectionState::Broken;
                return Err(ClientError::ConnectionBroken);
            }
        }

        if !self.stream.transport().is_connected() {
            if let Err(err) = self.stream.transport_mut().connect() {
                error!(error = %err, "lazy connect failed");
                self.state = ConnectionState::Broken;
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn settle(&mut self, command: Command, result: ProtoResult<()>) -> ClientResult<()> {
        result.map_err(|err| {
            error!(op = %command, phase = "write", error = %err, "transport failure, connection is now broken");
            self.state = ConnectionState::Broken;
            err.into()
        })
    }

    fn settle_read<V>(&mut self, result: ProtoResult<V>) -> ClientResult<V> {
        result.map_err(|err| {
            error!(phase = "read", error = %err, "transport failure, connection is now broken");
            self.state = ConnectionState::Broken;
            err.into()
        })
    }
}

impl<T: Transport> Drop for IgfsClient<T> {
    fn drop(&mut self) {
        if self.stream.transport().is_connected() {
            if let Err(err) = self.stream.transport_mut().disconnect() {
                debug!(error = %err, "disconnect on drop failed");
            }
        }
    }
}
