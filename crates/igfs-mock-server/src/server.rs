// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request handling for the mock server

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use igfs_proto::{
    ByteOrderCodec, CloseResponse, Command, DeleteResponse, Envelope, ExistsResponse,
    FramedStream, HandshakeResponse, IgfsPath, IgfsRequest, InfoResponse, ListFilesResponse,
    ListPathsResponse, MemoryTransport, MkDirResponse, OpenAppendResponse, OpenCreateResponse,
    OpenReadResponse, ProtoResult, ReadBlockResponse, RenameResponse, ResponseHeader, WireEncode,
};
use tracing::{debug, warn};

use crate::namespace::{
    Namespace, ServerError, ServerResult, ERR_IS_DIRECTORY, ERR_UNKNOWN_FILE_SYSTEM,
};
use crate::transport::MockTransport;

pub const DEFAULT_FS_NAME: &str = "myFileSystem";
pub const DEFAULT_BLOCK_SIZE: i32 = 64 * 1024;

/// Error injected for the next request carrying `command`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptedFailure {
    pub command: Command,
    pub error: ServerError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamMode {
    Read,
    Write,
}

#[derive(Clone, Debug)]
struct OpenStream {
    path: String,
    mode: StreamMode,
    /// Set by a rejected WriteBlock; reported when the stream is closed.
    deferred_error: Option<ServerError>,
}

#[derive(Debug)]
pub(crate) struct ServerState {
    fs_name: String,
    block_size: i32,
    pub(crate) namespace: Namespace,
    streams: HashMap<i64, OpenStream>,
    next_stream_id: i64,
    failures: VecDeque<ScriptedFailure>,
    history: Vec<IgfsRequest>,
    pub(crate) connections: usize,
    pub(crate) severed: bool,
}

/// In-process IGFS server shared by every transport it hands out.
#[derive(Clone, Debug)]
pub struct MockIgfsServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for MockIgfsServer {
    fn default() -> Self {
        Self::new(DEFAULT_FS_NAME)
    }
}

impl MockIgfsServer {
    pub fn new(fs_name: impl Into<String>) -> Self {
        Self::with_block_size(fs_name, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(fs_name: impl Into<String>, block_size: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                fs_name: fs_name.into(),
                block_size,
                namespace: Namespace::new(block_size),
                streams: HashMap::new(),
                next_stream_id: 1,
                failures: VecDeque::new(),
                history: Vec::new(),
                connections: 0,
                severed: false,
            })),
        }
    }

    /// A fresh, unconnected transport talking to this server.
    pub fn transport(&self) -> MockTransport {
        MockTransport::new(self.clone())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ServerState> {
        // A test thread that panicked while holding the lock leaves the state usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a file, creating its parent directories.
    pub fn put_file(&self, path: &str, data: &[u8]) -> ServerResult<()> {
        self.lock().namespace.put_file(path, data)
    }

    pub fn mkdirs(&self, path: &str) -> bool {
        self.lock().namespace.mkdirs(path)
    }

    /// Contents of a stored file.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        state
            .namespace
            .get(path)
            .filter(|entry| !entry.is_directory())
            .map(|entry| entry.data.clone())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().namespace.exists(path)
    }

    /// Answer the next `command` request with a server error.
    pub fn fail_command(&self, command: Command, code: i32, message: impl Into<String>) {
        self.lock().failures.push_back(ScriptedFailure {
            command,
            error: ServerError::new(code, message),
        });
    }

    /// Make every transport of this server fail all further I/O.
    pub fn sever(&self) {
        self.lock().severed = true;
    }

    pub fn is_severed(&self) -> bool {
        self.lock().severed
    }

    /// Requests handled so far, oldest first.
    pub fn history(&self) -> Vec<IgfsRequest> {
        self.lock().history.clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.lock().history.iter().map(IgfsRequest::command).collect()
    }

    pub fn open_streams(&self) -> usize {
        self.lock().streams.len()
    }

    /// Number of successful transport connects.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Handle one decoded request, returning the encoded response frame.
    /// WriteBlock yields `None`.
    pub(crate) fn handle(
        &self,
        request: IgfsRequest,
        codec: ByteOrderCodec,
    ) -> ProtoResult<Option<Vec<u8>>> {
        let mut state = self.lock();
        let command = request.command();
        debug!(op = %command, "mock server handling request");
        state.history.push(request.clone());

        let mut out = FramedStream::new(MemoryTransport::new(), codec);
        let injected = state.take_failure(command);

        if let IgfsRequest::WriteBlock(write) = request {
            let outcome = match injected {
                Some(err) => Err(err),
                None => state.write_block(write.stream_id, &write.data),
            };
            if let Err(err) = outcome {
                warn!(stream_id = write.stream_id, error = %err, "write block rejected");
                if let Some(stream) = state.streams.get_mut(&write.stream_id) {
                    stream.deferred_error.get_or_insert(err);
                }
            }
            return Ok(None);
        }

        if let Some(err) = injected {
            write_error(&mut out, &err)?;
            return Ok(Some(out.into_transport().take_bytes()));
        }

        match request {
            IgfsRequest::Handshake(r) => {
                let result = state.handshake(&r.fs_name);
                respond(&mut out, result)?
            }
            IgfsRequest::Exists(r) => {
                let exists = state.namespace.exists(&r.control.path);
                respond(&mut out, Ok(ExistsResponse { exists }))?
            }
            IgfsRequest::Info(r) => {
                let result = state
                    .namespace
                    .info(&r.control.path)
                    .map(|file_info| InfoResponse { file_info });
                respond(&mut out, result)?
            }
            IgfsRequest::Rename(r) => {
                let result = state
                    .namespace
                    .rename(&r.control.path, &r.control.destination_path)
                    .map(|successful| RenameResponse { successful });
                respond(&mut out, result)?
            }
            IgfsRequest::Delete(r) => {
                let result = state
                    .namespace
                    .delete(&r.control.path, r.recursive())
                    .map(|exists| DeleteResponse { exists });
                respond(&mut out, result)?
            }
            IgfsRequest::MkDir(r) => {
                let successful = state.namespace.mkdirs(&r.control.path);
                respond(&mut out, Ok(MkDirResponse { successful }))?
            }
            IgfsRequest::ListPaths(r) => {
                let result = state.namespace.list(&r.control.path).map(|infos| ListPathsResponse {
                    entries: infos
                        .into_iter()
                        .map(|info| IgfsPath::new(info.path_str()))
                        .collect(),
                });
                respond(&mut out, result)?
            }
            IgfsRequest::ListFiles(r) => {
                let result = state
                    .namespace
                    .list(&r.control.path)
                    .map(|entries| ListFilesResponse { entries });
                respond(&mut out, result)?
            }
            IgfsRequest::OpenRead(r) => {
                let result = state.open_read(&r.control.path);
                respond(&mut out, result)?
            }
            IgfsRequest::OpenAppend(r) => {
                let result = state
                    .namespace
                    .prepare_append(&r.control.path)
                    .map(|()| OpenAppendResponse {
                        stream_id: state.open_stream(&r.control.path, StreamMode::Write),
                    });
                respond(&mut out, result)?
            }
            IgfsRequest::OpenCreate(r) => {
                let result = state
                    .namespace
                    .create_file(&r.control.path)
                    .map(|()| OpenCreateResponse {
                        stream_id: state.open_stream(&r.control.path, StreamMode::Write),
                    });
                respond(&mut out, result)?
            }
            IgfsRequest::Close(r) => {
                let result = state.close(r.stream_id);
                respond(&mut out, result)?
            }
            IgfsRequest::ReadBlock(r) => match state.read_block(r.stream_id, r.pos, r.length) {
                Ok(data) => ReadBlockResponse::encode_block(&mut out, ResponseHeader::ok(), &data)?,
                Err(err) => write_error(&mut out, &err)?,
            },
            IgfsRequest::WriteBlock(_) => return Ok(None),
        }

        Ok(Some(out.into_transport().take_bytes()))
    }
}

impl ServerState {
    fn take_failure(&mut self, command: Command) -> Option<ServerError> {
        let idx = self.failures.iter().position(|f| f.command == command)?;
        self.failures.remove(idx).map(|f| f.error)
    }

    fn handshake(&self, requested: &str) -> ServerResult<Option<HandshakeResponse>> {
        if !requested.is_empty() && requested != self.fs_name {
            return Err(ServerError::new(
                ERR_UNKNOWN_FILE_SYSTEM,
                format!("file system {} is not configured", requested),
            ));
        }
        Ok(Some(HandshakeResponse {
            fs_name: self.fs_name.clone(),
            block_size: i64::from(self.block_size),
            sampling: None,
        }))
    }

    fn open_stream(&mut self, path: &str, mode: StreamMode) -> i64 {
        let stream_id = self.next_stream_id;
        self.next_stream_id += 1;
        self.streams.insert(
            stream_id,
            OpenStream {
                path: path.to_string(),
                mode,
                deferred_error: None,
            },
        );
        stream_id
    }

    /// Missing files open to an absent payload rather than an error.
    fn open_read(&mut self, path: &str) -> ServerResult<Option<OpenReadResponse>> {
        match self.namespace.get(path) {
            None => Ok(None),
            Some(entry) if entry.is_directory() => Err(ServerError::new(
                ERR_IS_DIRECTORY,
                format!("{} is a directory", path),
            )),
            Some(_) => {
                let length = self.namespace.file_len(path)?;
                let stream_id = self.open_stream(path, StreamMode::Read);
                Ok(Some(OpenReadResponse { stream_id, length }))
            }
        }
    }

    fn close(&mut self, stream_id: i64) -> ServerResult<CloseResponse> {
        let stream = self
            .streams
            .remove(&stream_id)
            .ok_or_else(|| ServerError::invalid_stream(stream_id))?;
        match stream.deferred_error {
            Some(err) => Err(err),
            None => Ok(CloseResponse { successful: true }),
        }
    }

    fn stream(&self, stream_id: i64, mode: StreamMode) -> ServerResult<String> {
        match self.streams.get(&stream_id) {
            Some(stream) if stream.mode == mode => Ok(stream.path.clone()),
            _ => Err(ServerError::invalid_stream(stream_id)),
        }
    }

    fn read_block(&mut self, stream_id: i64, pos: i64, length: i32) -> ServerResult<Vec<u8>> {
        let path = self.stream(stream_id, StreamMode::Read)?;
        self.namespace.read(&path, pos, length)
    }

    fn write_block(&mut self, stream_id: i64, data: &[u8]) -> ServerResult<()> {
        let path = self.stream(stream_id, StreamMode::Write)?;
        self.namespace.append(&path, data)
    }
}

fn respond<R: WireEncode>(
    out: &mut FramedStream<MemoryTransport>,
    result: ServerResult<R>,
) -> ProtoResult<()> {
    match result {
        Ok(payload) => Envelope::ok(payload).encode(out),
        Err(err) => write_error(out, &err),
    }
}

fn write_error(out: &mut FramedStream<MemoryTransport>, err: &ServerError) -> ProtoResult<()> {
    ResponseHeader::error(err.code, err.message.clone())
        .with_result_type(err.result_type)
        .encode(out)
}
