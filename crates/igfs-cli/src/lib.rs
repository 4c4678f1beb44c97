// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `igfs` command-line tool
//!
//! Output is one record per line with tab-separated fields, so it pipes
//! cleanly into `cut` and `awk`.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use igfs_client::{ClientConfig, Connector, DEFAULT_FS_NAME, DEFAULT_HOST, DEFAULT_PORT};
use igfs_fs::{FsError, IgniteFileSystem};
use igfs_logging::CliLoggingArgs;

#[derive(Parser, Debug)]
#[command(name = "igfs", version, about = "Command-line client for IGFS servers")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub logging: CliLoggingArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to connect. Each flag falls back to its environment variable.
#[derive(Args, Clone, Debug)]
pub struct ConnectionArgs {
    /// Server host name or address
    #[arg(long, env = "IGFS_HOST", default_value = DEFAULT_HOST, global = true)]
    pub host: String,

    /// Server port
    #[arg(long, env = "IGFS_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// File system name sent in the handshake
    #[arg(long, env = "IGFS_FS_NAME", default_value = DEFAULT_FS_NAME, global = true)]
    pub fs_name: String,

    /// User name sent with every request
    #[arg(long, env = "IGFS_USER", default_value = "", global = true)]
    pub user: String,

    /// Connect, read and write timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,
}

impl ConnectionArgs {
    pub fn config(&self) -> Result<ClientConfig> {
        let mut builder = ClientConfig::builder(self.host.clone(), self.port)
            .fs_name(self.fs_name.clone())
            .user_name(self.user.clone());
        if let Some(secs) = self.timeout {
            let timeout = Duration::from_secs(secs);
            builder = builder
                .connect_timeout(timeout)
                .read_timeout(timeout)
                .write_timeout(timeout);
        }
        builder.build().context("invalid connection settings")
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Handshake and print the server's file system name and block size
    Handshake,
    /// List a directory
    Ls {
        /// Print type, length and modification time for each entry
        #[arg(short = 'l', long = "long")]
        long: bool,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print length, modification time and type of a path
    Stat { path: String },
    /// Print whether a path exists
    Exists { path: String },
    /// Copy a file to standard output
    Cat { path: String },
    /// Upload a local file, replacing the remote one
    Put { local: PathBuf, remote: String },
    /// Append a local file to a remote one
    Append { local: PathBuf, remote: String },
    /// Create a directory and its parents
    Mkdir { path: String },
    /// Delete a file or an empty directory
    Rm {
        /// Delete directories with their content
        #[arg(short, long)]
        recursive: bool,
        path: String,
    },
    /// Rename a path, replacing an existing target
    Mv { src: String, dst: String },
}

fn kind(is_directory: bool) -> &'static str {
    if is_directory {
        "dir"
    } else {
        "file"
    }
}

impl Commands {
    pub fn run<C: Connector, W: Write>(&self, fs: &IgniteFileSystem<C>, out: &mut W) -> Result<()> {
        match self {
            Commands::Handshake => {
                let mut client = fs.connector().connect().context("connecting")?;
                let response = client.handshake()?;
                if !response.is_ok() {
                    return Err(FsError::remote(&response).into());
                }
                match response.into_payload().flatten() {
                    Some(handshake) => {
                        let sampling = handshake
                            .sampling
                            .map_or_else(|| "-".to_string(), |s| s.to_string());
                        writeln!(
                            out,
                            "{}\t{}\t{}",
                            handshake.fs_name, handshake.block_size, sampling
                        )?;
                    }
                    None => writeln!(out, "-")?,
                }
            }
            Commands::Ls { long: false, path } => {
                for name in fs.get_children(path).with_context(|| format!("listing {}", path))? {
                    writeln!(out, "{}", name)?;
                }
            }
            Commands::Ls { long: true, path } => {
                for info in fs.list_files(path).with_context(|| format!("listing {}", path))? {
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}",
                        kind(info.is_directory()),
                        info.length,
                        info.modification_time,
                        info.path_str()
                    )?;
                }
            }
            Commands::Stat { path } => {
                let stats = fs.stat(path).with_context(|| format!("stat {}", path))?;
                writeln!(out, "{}\t{}\t{}", stats.length, stats.mtime, kind(stats.is_directory))?;
            }
            Commands::Exists { path } => match fs.file_exists(path) {
                Ok(()) => writeln!(out, "true")?,
                Err(FsError::NotFound(_)) => writeln!(out, "false")?,
                Err(err) => return Err(err).with_context(|| format!("checking {}", path)),
            },
            Commands::Cat { path } => {
                let mut file = fs
                    .new_random_access_file(path)
                    .with_context(|| format!("opening {}", path))?;
                io::copy(&mut file, out).with_context(|| format!("reading {}", path))?;
                file.close()?;
            }
            Commands::Put { local, remote } => {
                let mut source = open_local(local)?;
                let mut file = fs
                    .new_writable_file(remote)
                    .with_context(|| format!("creating {}", remote))?;
                let copied = io::copy(&mut source, &mut file)?;
                file.close().with_context(|| format!("closing {}", remote))?;
                tracing::info!(%remote, bytes = copied, "uploaded");
            }
            Commands::Append { local, remote } => {
                let mut source = open_local(local)?;
                let mut file = fs
                    .new_appendable_file(remote)
                    .with_context(|| format!("opening {} for append", remote))?;
                let copied = io::copy(&mut source, &mut file)?;
                file.close().with_context(|| format!("closing {}", remote))?;
                tracing::info!(%remote, bytes = copied, "appended");
            }
            Commands::Mkdir { path } => {
                fs.create_dir(path).with_context(|| format!("creating directory {}", path))?;
            }
            Commands::Rm { recursive: true, path } => {
                fs.delete_recursively(path).with_context(|| format!("removing {}", path))?;
            }
            Commands::Rm { recursive: false, path } => {
                let is_directory = fs.stat(path).map(|s| s.is_directory).unwrap_or(false);
                let result = if is_directory {
                    fs.delete_dir(path)
                } else {
                    fs.delete_file(path)
                };
                result.with_context(|| format!("removing {}", path))?;
            }
            Commands::Mv { src, dst } => {
                fs.rename_file(src, dst)
                    .with_context(|| format!("renaming {} to {}", src, dst))?;
            }
        }
        Ok(())
    }
}

fn open_local(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[igfs_test_utils::logged_test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "igfs", "ls", "-l", "/data", "--host", "ignite-0", "--port", "10501", "--user", "bob",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Ls {
                long: true,
                path: "/data".to_string()
            }
        );
        let config = cli.connection.config().unwrap();
        assert_eq!(config.addr(), "ignite-0:10501");
        assert_eq!(config.user_name(), "bob");
    }

    #[igfs_test_utils::logged_test]
    fn rm_takes_recursive_flag() {
        let cli = Cli::try_parse_from(["igfs", "rm", "-r", "/tmp"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Rm {
                recursive: true,
                path: "/tmp".to_string()
            }
        );
    }

    #[igfs_test_utils::logged_test]
    fn zero_timeout_is_rejected() {
        let cli = Cli::try_parse_from(["igfs", "--timeout", "0", "handshake"]).unwrap();
        assert!(cli.connection.config().is_err());
    }

    #[igfs_test_utils::logged_test]
    fn ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["igfs", "ls"]).unwrap();
        assert!(matches!(cli.command, Commands::Ls { long: false, ref path } if path == "/"));
    }
}
