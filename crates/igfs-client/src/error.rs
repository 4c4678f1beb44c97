// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client error types

use std::io;

use igfs_proto::ProtoError;

/// Failure of a client call.
///
/// Server-reported errors are not represented here: they arrive inside a
/// successfully decoded [`igfs_proto::Envelope`] whose `is_ok()` is false.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connection is unusable after an earlier transport failure")]
    ConnectionBroken,
    #[error("invalid client configuration: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
