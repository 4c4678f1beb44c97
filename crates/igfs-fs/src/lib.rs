// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File-system facade over IGFS
//!
//! [`IgniteFileSystem`] maps file-system operations (open, list, stat,
//! rename, delete) onto protocol calls. Server-reported errors become
//! [`FsError::Remote`]; connection failures become [`FsError::Client`].

pub mod error;
pub mod file;
pub mod filesystem;

pub use error::{FsError, FsResult};
pub use file::{RandomAccessFile, WritableFile};
pub use filesystem::{translate_name, FileStatistics, IgniteFileSystem};
