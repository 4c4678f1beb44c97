// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! IGFS operation codes.

use std::fmt;

use crate::error::ProtoError;

/// Operation code carried at offset 8 of every request frame.
///
/// Gaps in the numbering belong to operations this client never issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Command {
    Handshake = 0,
    Exists = 2,
    Info = 3,
    Rename = 6,
    Delete = 7,
    MkDir = 8,
    ListPaths = 9,
    ListFiles = 10,
    OpenRead = 13,
    OpenAppend = 14,
    OpenCreate = 15,
    Close = 16,
    ReadBlock = 17,
    WriteBlock = 18,
}

impl Command {
    pub const ALL: [Command; 14] = [
        Command::Handshake,
        Command::Exists,
        Command::Info,
        Command::Rename,
        Command::Delete,
        Command::MkDir,
        Command::ListPaths,
        Command::ListFiles,
        Command::OpenRead,
        Command::OpenAppend,
        Command::OpenCreate,
        Command::Close,
        Command::ReadBlock,
        Command::WriteBlock,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    /// Stream-control commands address an open stream id instead of a path.
    pub fn is_stream_control(self) -> bool {
        matches!(self, Command::Close | Command::ReadBlock | Command::WriteBlock)
    }

    /// The server sends no response frame for this command.
    pub fn expects_response(self) -> bool {
        !matches!(self, Command::WriteBlock)
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Handshake => "handshake",
            Command::Exists => "exists",
            Command::Info => "info",
            Command::Rename => "rename",
            Command::Delete => "delete",
            Command::MkDir => "mkdir",
            Command::ListPaths => "list_paths",
            Command::ListFiles => "list_files",
            Command::OpenRead => "open_read",
            Command::OpenAppend => "open_append",
            Command::OpenCreate => "open_create",
            Command::Close => "close",
            Command::ReadBlock => "read_block",
            Command::WriteBlock => "write_block",
        }
    }
}

impl TryFrom<i32> for Command {
    type Error = ProtoError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Command::ALL
            .into_iter()
            .find(|cmd| cmd.id() == id)
            .ok_or(ProtoError::UnknownCommand(id))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}
