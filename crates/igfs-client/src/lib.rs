// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Blocking IGFS client
//!
//! [`IgfsClient`] drives one connection through request/response round trips
//! encoded by `igfs-proto`. [`TcpTransport`] is the production transport;
//! any [`igfs_proto::Transport`] works.

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod tcp;

pub use client::{ConnectionState, IgfsClient};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_FS_NAME, DEFAULT_HOST, DEFAULT_PORT};
pub use connector::{Connector, TcpConnector};
pub use error::{ClientError, ClientResult};
pub use tcp::TcpTransport;
