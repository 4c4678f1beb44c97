// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client-side transport wired straight into a [`MockIgfsServer`]

use std::collections::VecDeque;
use std::io;

use igfs_proto::{
    ByteOrderCodec, FramedStream, IgfsRequest, MemoryTransport, ProtoError, ProtoResult, Transport,
};
use tracing::trace;

use crate::server::MockIgfsServer;

/// One emulated connection.
///
/// Written bytes accumulate until they hold a complete request frame, which
/// is then handled by the server; the response frame becomes readable.
#[derive(Debug)]
pub struct MockTransport {
    server: MockIgfsServer,
    codec: ByteOrderCodec,
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
    connected: bool,
}

impl MockTransport {
    pub(crate) fn new(server: MockIgfsServer) -> Self {
        Self {
            server,
            codec: ByteOrderCodec::default(),
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            connected: false,
        }
    }

    /// Decode requests with a non-default byte order.
    pub fn with_codec(mut self, codec: ByteOrderCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Response bytes not yet read by the client.
    pub fn pending_response(&self) -> usize {
        self.outbound.len()
    }

    fn check_link(&self) -> ProtoResult<()> {
        if self.server.is_severed() {
            return Err(ProtoError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "mock server severed the connection",
            )));
        }
        if !self.connected {
            return Err(ProtoError::NotConnected);
        }
        Ok(())
    }

    /// Hand every complete request frame in `inbound` to the server.
    fn dispatch(&mut self) -> ProtoResult<()> {
        while !self.inbound.is_empty() {
            let mut stream = FramedStream::new(MemoryTransport::from_bytes(&self.inbound), self.codec);
            let request = match IgfsRequest::decode(&mut stream) {
                Ok(request) => request,
                Err(err) if err.is_incomplete() => return Ok(()),
                Err(err) => return Err(err),
            };
            let consumed = stream.position();
            self.inbound.drain(..consumed);
            trace!(op = %request.command(), len = consumed, "mock transport decoded request");

            if let Some(reply) = self.server.handle(request, self.codec)? {
                self.outbound.extend(reply);
            }
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> ProtoResult<()> {
        if self.connected {
            return Ok(());
        }
        let mut state = self.server.lock();
        if state.severed {
            return Err(ProtoError::Io(io::ErrorKind::ConnectionRefused.into()));
        }
        state.connections += 1;
        drop(state);
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> ProtoResult<()> {
        self.connected = false;
        self.inbound.clear();
        self.outbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_data(&mut self, buf: &mut [u8]) -> ProtoResult<()> {
        self.check_link()?;
        if self.outbound.len() < buf.len() {
            return Err(ProtoError::ShortRead {
                expected: buf.len(),
                available: self.outbound.len(),
            });
        }
        let n = buf.len();
        let drained: Vec<u8> = self.outbound.drain(..n).collect();
        buf.copy_from_slice(&drained);
        Ok(())
    }

    fn write_data(&mut self, buf: &[u8]) -> ProtoResult<()> {
        self.check_link()?;
        self.inbound.extend_from_slice(buf);
        self.dispatch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use igfs_proto::{
        CloseRequest, Command, Envelope, ExistsRequest, ExistsResponse, RequestFrame, WireDecode,
        WriteBlockRequest,
    };

    fn connected(server: &MockIgfsServer) -> FramedStream<MockTransport> {
        let mut transport = server.transport();
        transport.connect().unwrap();
        FramedStream::new(transport, ByteOrderCodec::default())
    }

    #[igfs_test_utils::logged_test]
    fn split_writes_are_reassembled_into_one_request() {
        let server = MockIgfsServer::default();
        server.put_file("/a", b"x").unwrap();

        let mut scratch = FramedStream::new(MemoryTransport::new(), ByteOrderCodec::default());
        ExistsRequest::new("", "/a").encode(&mut scratch).unwrap();
        let frame = scratch.into_transport().take_bytes();
        logger.log_frame("exists request", &frame).unwrap();

        let mut transport = server.transport();
        transport.connect().unwrap();
        transport.write_data(&frame[..10]).unwrap();
        assert_eq!(transport.pending_response(), 0);
        transport.write_data(&frame[10..]).unwrap();
        assert!(transport.pending_response() > 0);

        let mut stream = FramedStream::new(transport, ByteOrderCodec::default());
        let response = Envelope::<ExistsResponse>::decode(&mut stream).unwrap();
        assert!(response.payload().unwrap().exists);
    }

    #[igfs_test_utils::logged_test]
    fn write_block_queues_no_response() {
        let server = MockIgfsServer::default();
        let mut stream = connected(&server);

        WriteBlockRequest::new(1, b"data").encode(&mut stream).unwrap();
        assert_eq!(stream.transport().pending_response(), 0);
        assert_eq!(server.commands(), vec![Command::WriteBlock]);
    }

    #[igfs_test_utils::logged_test]
    fn severed_server_fails_io_and_connects() {
        let server = MockIgfsServer::default();
        let mut stream = connected(&server);
        server.sever();

        let err = CloseRequest::new(1).encode(&mut stream).unwrap_err();
        assert!(matches!(err, ProtoError::Io(_)));
        assert!(server.transport().connect().is_err());
    }

    #[igfs_test_utils::logged_test]
    fn io_requires_connect() {
        let server = MockIgfsServer::default();
        let mut transport = server.transport();
        assert!(matches!(transport.write_data(&[0]), Err(ProtoError::NotConnected)));
        transport.connect().unwrap();
        assert_eq!(server.connections(), 1);
    }
}
