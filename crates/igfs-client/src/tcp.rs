// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! TCP transport.
//!
//! Writes are buffered and pushed to the socket once per request frame.
//! Socket timeouts are the only timeout mechanism: a server that stops
//! answering stalls the caller until the read timeout fires, or forever
//! when none is configured.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use igfs_proto::{ProtoError, ProtoResult, Transport};
use tracing::{debug, trace};

use crate::config::ClientConfig;

struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
}

pub struct TcpTransport {
    addr: String,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    conn: Option<Connection>,
}

impl TcpTransport {
    /// Unconnected transport for the endpoint in `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            addr: config.addr(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            conn: None,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.conn.as_ref().map(|c| c.peer)
    }

    fn open(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let mut last_err = None;
        for candidate in self.addr.to_socket_addrs()? {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => return Ok((stream, candidate)),
                Err(err) => {
                    trace!(addr = %candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} resolved to no addresses", self.addr))
        }))
    }

    fn conn(&mut self) -> ProtoResult<&mut Connection> {
        self.conn.as_mut().ok_or(ProtoError::NotConnected)
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> ProtoResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let (stream, peer) = self.open()?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        let reader = BufReader::new(stream.try_clone()?);

        debug!(addr = %self.addr, %peer, "connected");
        self.conn = Some(Connection {
            reader,
            writer: BufWriter::new(stream),
            peer,
        });
        Ok(())
    }

    fn disconnect(&mut self) -> ProtoResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let flushed = conn.writer.flush();
        // Fails when the peer already closed its side.
        let _ = conn.writer.get_ref().shutdown(Shutdown::Both);
        debug!(peer = %conn.peer, "disconnected");
        flushed.map_err(ProtoError::from)
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> ProtoResult<()> {
        self.conn()?.reader.read_exact(buf)?;
        Ok(())
    }

    fn write_data(&mut self, buf: &[u8]) -> ProtoResult<()> {
        self.conn()?.writer.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> ProtoResult<()> {
        self.conn()?.writer.flush()?;
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Err(err) = self.disconnect() {
            debug!(addr = %self.addr, error = %err, "disconnect on drop failed");
        }
    }
}
