// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use igfs_cli::Cli;
use igfs_client::TcpConnector;
use igfs_fs::IgniteFileSystem;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.logging.init("igfs-cli")?;

    let config = cli.connection.config()?;
    tracing::debug!(addr = %config.addr(), fs_name = config.fs_name(), "starting");
    let fs = IgniteFileSystem::new(TcpConnector::new(config));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli.command.run(&fs, &mut out)?;
    out.flush()?;
    Ok(())
}
