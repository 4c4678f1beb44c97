// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the IGFS wire protocol

use std::io;

use crate::command::Command;

/// Local (transport-side) protocol failure.
///
/// Any of these leaves the connection in an unknown position within a frame,
/// so callers must treat the connection as unusable afterwards. Errors reported
/// by the server travel inside a successfully decoded response instead.
#[derive(thiserror::Error, Debug)]
pub enum ProtoError {
    #[error("transport i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("transport is not connected")]
    NotConnected,
    #[error("short read: wanted {expected} bytes, only {available} available")]
    ShortRead { expected: usize, available: usize },
    #[error("string of {len} bytes exceeds the 65535 byte wire limit")]
    StringTooLong { len: usize },
    #[error("invalid {field} length on the wire: {len}")]
    InvalidLength { field: &'static str, len: i64 },
    #[error("block of {needed} bytes does not fit the {capacity} byte destination buffer")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("block of {len} bytes does not fit the 32-bit length field")]
    BlockTooLarge { len: usize },
    #[error("unknown command id {0}")]
    UnknownCommand(i32),
    #[error("expected a {expected} frame, found command {actual}")]
    UnexpectedCommand { expected: Command, actual: Command },
}

impl ProtoError {
    /// True when the failure means the peer simply has not sent enough bytes yet.
    pub fn is_incomplete(&self) -> bool {
        match self {
            ProtoError::ShortRead { .. } => true,
            ProtoError::Io(err) => err.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

pub type ProtoResult<T> = Result<T, ProtoError>;
