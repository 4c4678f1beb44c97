// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-process IGFS server for tests
//!
//! [`MockIgfsServer`] keeps a file tree and open streams in memory and
//! answers requests through [`MockTransport`], a [`igfs_proto::Transport`]
//! that decodes request frames with the same codec the client uses.
//! Errors can be scripted per command with [`MockIgfsServer::fail_command`]
//! and all connections cut with [`MockIgfsServer::sever`].

pub mod connector;
pub mod namespace;
pub mod server;
pub mod transport;

pub use connector::MockConnector;
pub use namespace::{
    ServerError, ERR_ALREADY_EXISTS, ERR_DIRECTORY_NOT_EMPTY, ERR_GENERIC, ERR_INVALID_STREAM,
    ERR_IS_DIRECTORY, ERR_NOT_FOUND, ERR_PARENT_NOT_DIRECTORY, ERR_UNKNOWN_FILE_SYSTEM,
};
pub use server::{MockIgfsServer, ScriptedFailure, DEFAULT_BLOCK_SIZE, DEFAULT_FS_NAME};
pub use transport::MockTransport;
