// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Connection factories
//!
//! Higher layers open a fresh client per logical operation. They do so
//! through a [`Connector`] so the same code runs over TCP in production and
//! over an in-process server in tests.

use crate::client::IgfsClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::tcp::TcpTransport;
use igfs_proto::Transport;

pub trait Connector {
    type Transport: Transport;

    /// Open a connected client. The handshake is left to the caller.
    fn connect(&self) -> ClientResult<IgfsClient<Self::Transport>>;

    fn config(&self) -> &ClientConfig;
}

/// Connector dialing the TCP endpoint from a [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct TcpConnector {
    config: ClientConfig,
}

impl TcpConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&self) -> ClientResult<IgfsClient<TcpTransport>> {
        IgfsClient::connect(&self.config)
    }

    fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::net::TcpListener;

    #[igfs_test_utils::logged_test]
    fn tcp_connector_connects_eagerly() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connector = TcpConnector::new(ClientConfig::builder("127.0.0.1", port).build().unwrap());

        let client = connector.connect().unwrap();
        assert!(client.is_connected());
        assert_eq!(connector.config().port(), port);
    }

    #[igfs_test_utils::logged_test]
    fn refused_connection_names_the_address() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new(ClientConfig::builder("127.0.0.1", port).build().unwrap());

        match connector.connect() {
            Err(ClientError::Connect { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{}", port)),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
