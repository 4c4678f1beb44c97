// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Open file handles
//!
//! Each handle owns the client connection its stream was opened on. Streams
//! are closed on drop; errors at that point can only be logged, so callers
//! that care should call `close()` themselves.

use std::io;

use igfs_client::IgfsClient;
use igfs_proto::Transport;
use tracing::{debug, warn};

use crate::error::{expect_ok, FsError, FsResult};

fn close_stream<T: Transport>(client: &mut IgfsClient<T>, stream_id: i64) -> FsResult<()> {
    let response = client.close(stream_id)?;
    expect_ok(response)?;
    Ok(())
}

/// File opened for positional reads.
pub struct RandomAccessFile<T: Transport> {
    client: IgfsClient<T>,
    path: String,
    stream_id: i64,
    length: i64,
    cursor: u64,
    closed: bool,
}

impl<T: Transport> RandomAccessFile<T> {
    pub(crate) fn new(client: IgfsClient<T>, path: String, stream_id: i64, length: i64) -> Self {
        debug!(%path, stream_id, length, "opened file for reading");
        Self {
            client,
            path,
            stream_id,
            length,
            cursor: 0,
            closed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stream_id(&self) -> i64 {
        self.stream_id
    }

    /// File length when it was opened.
    pub fn len(&self) -> u64 {
        u64::try_from(self.length).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `buf.len()` bytes starting at `offset`. Returns the number
    /// of bytes placed at the front of `buf`; zero means end of file.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        if self.closed {
            return Err(FsError::FailedPrecondition(format!("{} is closed", self.path)));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let pos = i64::try_from(offset)
            .map_err(|_| FsError::Internal(format!("offset {} is out of range", offset)))?;

        let response = self.client.read_block(self.stream_id, pos, buf)?;
        if !response.is_ok() {
            return Err(FsError::Remote {
                code: response.header.error_code,
                message: response.header.error_message,
            });
        }
        Ok(response.bytes_read)
    }

    /// Close the stream. Later calls are no-ops.
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        close_stream(&mut self.client, self.stream_id)
    }
}

impl<T: Transport> io::Read for RandomAccessFile<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.cursor, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }
}

impl<T: Transport> Drop for RandomAccessFile<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path, stream_id = self.stream_id, error = %err, "closing read stream failed");
        }
    }
}

/// File opened for sequential appends.
pub struct WritableFile<T: Transport> {
    client: IgfsClient<T>,
    path: String,
    stream_id: i64,
    closed: bool,
}

impl<T: Transport> WritableFile<T> {
    pub(crate) fn new(client: IgfsClient<T>, path: String, stream_id: i64) -> Self {
        debug!(%path, stream_id, "opened file for writing");
        Self {
            client,
            path,
            stream_id,
            closed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stream_id(&self) -> i64 {
        self.stream_id
    }

    /// Append `data` to the file. The server does not acknowledge appends;
    /// a rejected write is reported by [`WritableFile::close`].
    pub fn append(&mut self, data: &[u8]) -> FsResult<()> {
        if self.closed {
            return Err(FsError::FailedPrecondition(format!("{} is closed", self.path)));
        }
        self.client.write_block(self.stream_id, data)?;
        Ok(())
    }

    /// Close the stream, reporting any write the server rejected. Later
    /// calls are no-ops.
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(path = %self.path, stream_id = self.stream_id, "closing writable file");
        close_stream(&mut self.client, self.stream_id)
    }

    /// Appends go out immediately.
    pub fn flush(&mut self) -> FsResult<()> {
        Ok(())
    }

    pub fn sync(&mut self) -> FsResult<()> {
        Ok(())
    }
}

impl<T: Transport> io::Write for WritableFile<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        WritableFile::flush(self)?;
        Ok(())
    }
}

impl<T: Transport> Drop for WritableFile<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path, stream_id = self.stream_id, error = %err, "closing write stream failed");
        }
    }
}
