// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File-system operations over IGFS
//!
//! Every operation opens its own connection through the [`Connector`],
//! performs the handshake, then issues its protocol calls. Connections are
//! not pooled; open files keep theirs until closed.

use igfs_client::{ClientConfig, Connector, IgfsClient, TcpConnector};
use igfs_proto::FileInfo;
use tracing::{debug, info, warn};

use crate::error::{expect_ok, FsError, FsResult};
use crate::file::{RandomAccessFile, WritableFile};

/// Subset of file metadata exposed by [`IgniteFileSystem::stat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStatistics {
    pub length: u64,
    /// Modification time in milliseconds since the epoch, as reported by the server.
    pub mtime: i64,
    pub is_directory: bool,
}

impl From<&FileInfo> for FileStatistics {
    fn from(info: &FileInfo) -> Self {
        Self {
            length: u64::try_from(info.length).unwrap_or(0),
            mtime: info.modification_time,
            is_directory: info.is_directory(),
        }
    }
}

/// Path component of a `scheme://host/path` URI, byte for byte.
///
/// A scheme is a letter followed by letters, digits or dots. Names without a
/// `scheme://` prefix are paths already and pass through unchanged. A URI with
/// no slash after the host has an empty path.
pub fn translate_name(name: &str) -> String {
    let rest = match name.split_once("://") {
        Some((scheme, rest)) if is_scheme(scheme) => rest,
        _ => return name.to_string(),
    };
    match rest.find('/') {
        Some(start) => rest[start..].to_string(),
        None => String::new(),
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '.')
}

/// `entry` relative to `dir`, without the separating slash.
fn make_relative(entry: &str, dir: &str) -> String {
    let dir = dir.trim_end_matches('/');
    match entry.strip_prefix(dir) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            rest.trim_start_matches('/').to_string()
        }
        _ => entry.to_string(),
    }
}

pub struct IgniteFileSystem<C: Connector> {
    connector: C,
}

impl IgniteFileSystem<TcpConnector> {
    /// File system at the endpoint named by `IGFS_HOST`, `IGFS_PORT` and `IGFS_FS_NAME`.
    pub fn from_env() -> FsResult<Self> {
        let config = ClientConfig::from_env()?;
        Ok(Self::new(TcpConnector::new(config)))
    }
}

impl<C: Connector> IgniteFileSystem<C> {
    pub fn new(connector: C) -> Self {
        let config = connector.config();
        info!(
            host = config.host(),
            port = config.port(),
            fs_name = config.fs_name(),
            "IGFS file system created"
        );
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Fresh connection that completed the handshake.
    fn session(&self) -> FsResult<IgfsClient<C::Transport>> {
        let mut client = self.connector.connect()?;
        expect_ok(client.handshake()?)?;
        Ok(client)
    }

    pub fn new_random_access_file(&self, name: &str) -> FsResult<RandomAccessFile<C::Transport>> {
        let path = translate_name(name);
        let mut client = self.session()?;
        let opened = expect_ok(client.open_read(&path)?)?
            .ok_or_else(|| FsError::NotFound(path.clone()))?;
        Ok(RandomAccessFile::new(client, path, opened.stream_id, opened.length))
    }

    /// Create `name`, replacing any existing file.
    pub fn new_writable_file(&self, name: &str) -> FsResult<WritableFile<C::Transport>> {
        let path = translate_name(name);
        let mut client = self.session()?;

        if expect_ok(client.exists(&path)?)?.exists {
            debug!(%path, "replacing existing file");
            expect_ok(client.delete(&path, false)?)?;
        }
        let created = expect_ok(client.open_create(&path)?)?;
        Ok(WritableFile::new(client, path, created.stream_id))
    }

    /// Open `name` for appending, keeping its content. Missing files are created.
    pub fn new_appendable_file(&self, name: &str) -> FsResult<WritableFile<C::Transport>> {
        let path = translate_name(name);
        let mut client = self.session()?;
        let opened = expect_ok(client.open_append(&path)?)?;
        Ok(WritableFile::new(client, path, opened.stream_id))
    }

    /// Memory-mapped view of a file.
    pub fn new_read_only_memory_region(&self, _name: &str) -> FsResult<Vec<u8>> {
        Err(FsError::Unimplemented("read-only memory region"))
    }

    pub fn file_exists(&self, name: &str) -> FsResult<()> {
        let path = translate_name(name);
        let mut client = self.session()?;
        if expect_ok(client.exists(&path)?)?.exists {
            Ok(())
        } else {
            Err(FsError::NotFound(path))
        }
    }

    /// Names of the entries directly below `dir`, relative to it.
    pub fn get_children(&self, dir: &str) -> FsResult<Vec<String>> {
        let dir = translate_name(dir);
        let mut client = self.session()?;
        let listing = expect_ok(client.list_paths(&dir)?)?;
        Ok(listing
            .entries
            .iter()
            .map(|entry| make_relative(&entry.path, &dir))
            .collect())
    }

    pub fn list_files(&self, dir: &str) -> FsResult<Vec<FileInfo>> {
        let dir = translate_name(dir);
        let mut client = self.session()?;
        Ok(expect_ok(client.list_files(&dir)?)?.entries)
    }

    pub fn delete_file(&self, name: &str) -> FsResult<()> {
        let path = translate_name(name);
        let mut client = self.session()?;
        if expect_ok(client.delete(&path, false)?)?.exists {
            Ok(())
        } else {
            Err(FsError::NotFound(path))
        }
    }

    pub fn create_dir(&self, name: &str) -> FsResult<()> {
        let path = translate_name(name);
        let mut client = self.session()?;
        if expect_ok(client.mkdir(&path)?)?.successful {
            Ok(())
        } else {
            Err(FsError::Internal(format!("could not create directory {}", path)))
        }
    }

    /// Delete an empty directory.
    pub fn delete_dir(&self, name: &str) -> FsResult<()> {
        let path = translate_name(name);
        let mut client = self.session()?;

        let listing = expect_ok(client.list_files(&path)?)?;
        if !listing.entries.is_empty() {
            return Err(FsError::FailedPrecondition(format!(
                "cannot delete non-empty directory {}",
                path
            )));
        }
        if expect_ok(client.delete(&path, true)?)?.exists {
            Ok(())
        } else {
            Err(FsError::NotFound(path))
        }
    }

    /// Delete a file or a directory with everything below it.
    pub fn delete_recursively(&self, name: &str) -> FsResult<()> {
        let path = translate_name(name);
        let mut client = self.session()?;
        if expect_ok(client.delete(&path, true)?)?.exists {
            Ok(())
        } else {
            Err(FsError::NotFound(path))
        }
    }

    pub fn get_file_size(&self, name: &str) -> FsResult<u64> {
        let path = translate_name(name);
        let mut client = self.session()?;
        let info = expect_ok(client.info(&path)?)?.file_info;
        u64::try_from(info.length)
            .map_err(|_| FsError::Internal(format!("{} reports length {}", path, info.length)))
    }

    /// Rename `src` to `target`, replacing an existing target.
    pub fn rename_file(&self, src: &str, target: &str) -> FsResult<()> {
        if self.file_exists(target).is_ok() {
            if let Err(err) = self.delete_file(target) {
                warn!(rename_target = target, error = %err, "could not remove rename target");
            }
        }

        let src_path = translate_name(src);
        let target_path = translate_name(target);
        let mut client = self.session()?;
        if expect_ok(client.rename(&src_path, &target_path)?)?.successful {
            Ok(())
        } else {
            Err(FsError::NotFound(src_path))
        }
    }

    pub fn stat(&self, name: &str) -> FsResult<FileStatistics> {
        let path = translate_name(name);
        let mut client = self.session()?;
        let info = expect_ok(client.info(&path)?)?.file_info;
        debug!(%path, length = info.length, "stat");
        Ok(FileStatistics::from(&info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[igfs_test_utils::logged_test]
    fn uri_is_reduced_to_its_path() {
        assert_eq!(translate_name("igfs://localhost:10500/dir/file"), "/dir/file");
        assert_eq!(translate_name("igfs://host"), "");
        assert_eq!(translate_name("/plain/path"), "/plain/path");
        assert_eq!(translate_name("relative"), "relative");
    }

    #[igfs_test_utils::logged_test]
    fn uri_paths_are_forwarded_unescaped() {
        assert_eq!(
            translate_name("igfs://localhost:10500/my dir/file.txt"),
            "/my dir/file.txt"
        );
        assert_eq!(translate_name("igfs://host/данные/f"), "/данные/f");
        assert_eq!(translate_name("igfs://host/a%20b"), "/a%20b");
        assert_eq!(translate_name("igfs://host/a/../b"), "/a/../b");
    }

    #[igfs_test_utils::logged_test]
    fn names_without_scheme_separator_pass_through() {
        assert_eq!(translate_name("data:blob"), "data:blob");
        assert_eq!(translate_name("1fs://host/x"), "1fs://host/x");
        assert_eq!(translate_name("/dir/igfs://x"), "/dir/igfs://x");
        assert_eq!(translate_name("my-fs://host/x"), "my-fs://host/x");
        assert_eq!(translate_name("v1.fs://host/x"), "/x");
    }

    #[igfs_test_utils::logged_test]
    fn children_are_made_relative() {
        assert_eq!(make_relative("/dir/a", "/dir"), "a");
        assert_eq!(make_relative("/dir/a", "/dir/"), "a");
        assert_eq!(make_relative("/a", "/"), "a");
        assert_eq!(make_relative("/other/a", "/dir"), "/other/a");
        assert_eq!(make_relative("/dirx/a", "/dir"), "/dirx/a");
    }

    #[igfs_test_utils::logged_test]
    fn statistics_follow_directory_flag() {
        let info = FileInfo {
            length: 12,
            modification_time: 1_700_000_000_000,
            flags: FileInfo::FLAG_DIRECTORY,
            ..FileInfo::default()
        };
        let stats = FileStatistics::from(&info);
        assert_eq!(stats.length, 12);
        assert_eq!(stats.mtime, 1_700_000_000_000);
        assert!(stats.is_directory);
    }
}
