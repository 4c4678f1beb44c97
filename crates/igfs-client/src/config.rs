// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client configuration

use std::env;
use std::time::Duration;

use igfs_proto::WireOrder;

use crate::error::{ClientError, ClientResult};

pub const ENV_HOST: &str = "IGFS_HOST";
pub const ENV_PORT: &str = "IGFS_PORT";
pub const ENV_FS_NAME: &str = "IGFS_FS_NAME";
pub const ENV_USER: &str = "IGFS_USER";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 10500;
pub const DEFAULT_FS_NAME: &str = "myFileSystem";

/// Where to connect and how to identify to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    host: String,
    port: u16,
    fs_name: String,
    user_name: String,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    byte_order: WireOrder,
}

impl ClientConfig {
    /// Start building configuration for the endpoint `host:port`.
    pub fn builder(host: impl Into<String>, port: u16) -> ClientConfigBuilder {
        ClientConfigBuilder {
            host: host.into(),
            port,
            fs_name: DEFAULT_FS_NAME.to_string(),
            user_name: String::new(),
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            byte_order: WireOrder::default(),
        }
    }

    /// Configuration from `IGFS_HOST`, `IGFS_PORT`, `IGFS_FS_NAME` and `IGFS_USER`.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(ENV_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|err| {
                ClientError::Config(format!("{} must be a TCP port, got {:?}: {}", ENV_PORT, raw, err))
            })?,
            None => DEFAULT_PORT,
        };

        let mut builder = Self::builder(host, port);
        if let Some(fs_name) = lookup(ENV_FS_NAME) {
            builder = builder.fs_name(fs_name);
        }
        if let Some(user_name) = lookup(ENV_USER) {
            builder = builder.user_name(user_name);
        }
        builder.build()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, as handed to the resolver.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fs_name(&self) -> &str {
        &self.fs_name
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    pub fn byte_order(&self) -> WireOrder {
        self.byte_order
    }
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
    host: String,
    port: u16,
    fs_name: String,
    user_name: String,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    byte_order: WireOrder,
}

impl ClientConfigBuilder {
    /// File system name sent in the handshake (defaults to `myFileSystem`).
    pub fn fs_name(mut self, fs_name: impl Into<String>) -> Self {
        self.fs_name = fs_name.into();
        self
    }

    /// User name sent with every path request (defaults to empty).
    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout applied to the underlying socket.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the write timeout applied to the underlying socket.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Wire byte order (defaults to big-endian).
    pub fn byte_order(mut self, byte_order: WireOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn build(self) -> ClientResult<ClientConfig> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ClientError::Config("port must not be 0".to_string()));
        }
        for (name, timeout) in [
            ("connect", self.connect_timeout),
            ("read", self.read_timeout),
            ("write", self.write_timeout),
        ] {
            if timeout == Some(Duration::ZERO) {
                return Err(ClientError::Config(format!("{} timeout must be non-zero", name)));
            }
        }

        Ok(ClientConfig {
            host: self.host,
            port: self.port,
            fs_name: self.fs_name,
            user_name: self.user_name,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            byte_order: self.byte_order,
        })
    }
}
