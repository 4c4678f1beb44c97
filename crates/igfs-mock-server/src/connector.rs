// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use igfs_client::{ClientConfig, ClientResult, Connector, IgfsClient};
use igfs_proto::Transport;

use crate::server::MockIgfsServer;
use crate::transport::MockTransport;

/// Connector opening a new [`MockTransport`] per client.
#[derive(Clone, Debug)]
pub struct MockConnector {
    server: MockIgfsServer,
    config: ClientConfig,
}

impl MockConnector {
    pub fn new(server: MockIgfsServer, config: ClientConfig) -> Self {
        Self { server, config }
    }

    pub fn server(&self) -> &MockIgfsServer {
        &self.server
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&self) -> ClientResult<IgfsClient<MockTransport>> {
        let mut transport = self.server.transport();
        transport.connect()?;
        Ok(IgfsClient::with_transport(transport, &self.config))
    }

    fn config(&self) -> &ClientConfig {
        &self.config
    }
}
