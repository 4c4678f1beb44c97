// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory file tree served by the mock server

use std::collections::BTreeMap;

use igfs_proto::{FileInfo, IgfsPath, RES_TYPE_ERR_STREAM_ID};

pub const ERR_GENERIC: i32 = 0;
pub const ERR_NOT_FOUND: i32 = 1;
pub const ERR_ALREADY_EXISTS: i32 = 2;
pub const ERR_DIRECTORY_NOT_EMPTY: i32 = 3;
pub const ERR_PARENT_NOT_DIRECTORY: i32 = 4;
pub const ERR_IS_DIRECTORY: i32 = 5;
pub const ERR_INVALID_STREAM: i32 = 6;
pub const ERR_UNKNOWN_FILE_SYSTEM: i32 = 7;

/// Error the mock server reports inside a response frame.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{message} [code={code}]")]
pub struct ServerError {
    pub code: i32,
    pub message: String,
    pub result_type: i32,
}

impl ServerError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            result_type: 0,
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(ERR_NOT_FOUND, format!("{} not found", path))
    }

    pub fn invalid_stream(stream_id: i64) -> Self {
        Self {
            result_type: RES_TYPE_ERR_STREAM_ID,
            ..Self::new(ERR_INVALID_STREAM, format!("stream {} is not open", stream_id))
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub data: Vec<u8>,
    pub properties: BTreeMap<String, String>,
    pub access_time: i64,
    pub modification_time: i64,
}

impl Entry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Absolute path without a trailing slash; the empty path is the root.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn parent(path: &str) -> Option<&str> {
    match path.rfind('/') {
        _ if path == "/" => None,
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn is_within(candidate: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return candidate != "/";
    }
    candidate
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Directory tree keyed by normalized absolute path. Timestamps come from a
/// logical clock so tests can compare them.
#[derive(Clone, Debug)]
pub struct Namespace {
    entries: BTreeMap<String, Entry>,
    block_size: i32,
    clock: i64,
}

impl Namespace {
    pub fn new(block_size: i32) -> Self {
        let mut namespace = Self {
            entries: BTreeMap::new(),
            block_size,
            clock: 0,
        };
        namespace.insert("/".to_string(), EntryKind::Directory, Vec::new());
        namespace
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, path: String, kind: EntryKind, data: Vec<u8>) {
        let now = self.tick();
        self.entries.insert(
            path,
            Entry {
                kind,
                data,
                properties: BTreeMap::new(),
                access_time: now,
                modification_time: now,
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(&normalize(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn info(&self, path: &str) -> ServerResult<FileInfo> {
        let path = normalize(path);
        let entry = self.entries.get(&path).ok_or_else(|| ServerError::not_found(&path))?;
        Ok(self.file_info(&path, entry))
    }

    fn file_info(&self, path: &str, entry: &Entry) -> FileInfo {
        let (block_size, flags) = match entry.kind {
            EntryKind::File => (self.block_size, 0),
            EntryKind::Directory => (0, FileInfo::FLAG_DIRECTORY),
        };
        FileInfo {
            path: Some(IgfsPath::new(path)),
            block_size,
            group_block_size: i64::from(block_size),
            length: entry.data.len() as i64,
            properties: entry.properties.clone(),
            access_time: entry.access_time,
            modification_time: entry.modification_time,
            flags,
        }
    }

    /// Create `path` and any missing ancestors. Returns false when a file
    /// is in the way.
    pub fn mkdirs(&mut self, path: &str) -> bool {
        let path = normalize(path);
        let mut missing = Vec::new();
        let mut cursor = Some(path.as_str());
        while let Some(current) = cursor {
            match self.entries.get(current) {
                Some(entry) if entry.is_directory() => break,
                Some(_) => return false,
                None => missing.push(current.to_string()),
            }
            cursor = parent(current);
        }
        for dir in missing.into_iter().rev() {
            self.insert(dir, EntryKind::Directory, Vec::new());
        }
        true
    }

    fn ensure_parent(&mut self, path: &str) -> ServerResult<()> {
        match parent(path) {
            Some(dir) if !self.mkdirs(dir) => Err(ServerError::new(
                ERR_PARENT_NOT_DIRECTORY,
                format!("parent of {} is not a directory", path),
            )),
            _ => Ok(()),
        }
    }

    /// Create an empty file, replacing existing content.
    pub fn create_file(&mut self, path: &str) -> ServerResult<()> {
        let path = normalize(path);
        if self.entries.get(&path).is_some_and(Entry::is_directory) {
            return Err(ServerError::new(ERR_IS_DIRECTORY, format!("{} is a directory", path)));
        }
        self.ensure_parent(&path)?;
        self.insert(path, EntryKind::File, Vec::new());
        Ok(())
    }

    /// Make `path` ready for appending, creating it when missing.
    pub fn prepare_append(&mut self, path: &str) -> ServerResult<()> {
        match self.get(path) {
            Some(entry) if entry.is_directory() => Err(ServerError::new(
                ERR_IS_DIRECTORY,
                format!("{} is a directory", normalize(path)),
            )),
            Some(_) => Ok(()),
            None => self.create_file(path),
        }
    }

    /// Remove `path`. Returns false when there was nothing to delete.
    pub fn delete(&mut self, path: &str, recursive: bool) -> ServerResult<bool> {
        let path = normalize(path);
        if path == "/" {
            return Err(ServerError::new(ERR_GENERIC, "the root directory cannot be deleted"));
        }
        if !self.entries.contains_key(&path) {
            return Ok(false);
        }

        let descendants: Vec<String> = self
            .entries
            .keys()
            .filter(|key| is_within(key, &path))
            .cloned()
            .collect();
        if !descendants.is_empty() && !recursive {
            return Err(ServerError::new(
                ERR_DIRECTORY_NOT_EMPTY,
                format!("{} is not empty", path),
            ));
        }
        for key in descendants {
            self.entries.remove(&key);
        }
        self.entries.remove(&path);
        Ok(true)
    }

    /// Move `source` and everything below it to `destination`. Returns false
    /// when `source` does not exist.
    pub fn rename(&mut self, source: &str, destination: &str) -> ServerResult<bool> {
        let source = normalize(source);
        let destination = normalize(destination);
        if !self.entries.contains_key(&source) {
            return Ok(false);
        }
        if source == "/" || is_within(&destination, &source) {
            return Err(ServerError::new(
                ERR_GENERIC,
                format!("cannot move {} into {}", source, destination),
            ));
        }
        if self.entries.contains_key(&destination) {
            return Err(ServerError::new(
                ERR_ALREADY_EXISTS,
                format!("{} already exists", destination),
            ));
        }
        self.ensure_parent(&destination)?;

        let moved: Vec<String> = self
            .entries
            .keys()
            .filter(|key| **key == source || is_within(key, &source))
            .cloned()
            .collect();
        for key in moved {
            if let Some(entry) = self.entries.remove(&key) {
                let new_key = format!("{}{}", destination, &key[source.len()..]);
                self.entries.insert(new_key, entry);
            }
        }
        Ok(true)
    }

    /// Direct children of a directory, or the file itself.
    pub fn list(&self, path: &str) -> ServerResult<Vec<FileInfo>> {
        let path = normalize(path);
        let entry = self.entries.get(&path).ok_or_else(|| ServerError::not_found(&path))?;
        if !entry.is_directory() {
            return Ok(vec![self.file_info(&path, entry)]);
        }
        Ok(self
            .entries
            .iter()
            .filter(|(key, _)| parent(key) == Some(path.as_str()))
            .map(|(key, entry)| self.file_info(key, entry))
            .collect())
    }

    pub fn file_len(&self, path: &str) -> ServerResult<i64> {
        let entry = self.get(path).ok_or_else(|| ServerError::not_found(path))?;
        Ok(entry.data.len() as i64)
    }

    /// Up to `len` bytes starting at `pos`; empty past the end of the file.
    pub fn read(&mut self, path: &str, pos: i64, len: i32) -> ServerResult<Vec<u8>> {
        let (Ok(pos), Ok(len)) = (usize::try_from(pos), usize::try_from(len)) else {
            return Err(ServerError::new(
                ERR_GENERIC,
                format!("invalid read of {} bytes at {}", len, pos),
            ));
        };
        let now = self.tick();
        let path = normalize(path);
        let entry = self.entries.get_mut(&path).ok_or_else(|| ServerError::not_found(&path))?;
        entry.access_time = now;

        let start = pos.min(entry.data.len());
        let end = start.saturating_add(len).min(entry.data.len());
        Ok(entry.data[start..end].to_vec())
    }

    pub fn append(&mut self, path: &str, data: &[u8]) -> ServerResult<()> {
        let now = self.tick();
        let path = normalize(path);
        let entry = self.entries.get_mut(&path).ok_or_else(|| ServerError::not_found(&path))?;
        entry.data.extend_from_slice(data);
        entry.modification_time = now;
        Ok(())
    }

    /// Insert a file with `data`, creating parent directories.
    pub fn put_file(&mut self, path: &str, data: &[u8]) -> ServerResult<()> {
        self.create_file(path)?;
        self.append(path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Namespace {
        let mut ns = Namespace::new(4096);
        ns.put_file("/data/a.txt", b"alpha").unwrap();
        ns.put_file("/data/nested/b.txt", b"beta").unwrap();
        ns
    }

    #[igfs_test_utils::logged_test]
    fn normalize_adds_root_and_strips_trailing_slash() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("data/"), "/data");
        assert_eq!(normalize("/data/a.txt"), "/data/a.txt");
    }

    #[igfs_test_utils::logged_test]
    fn files_create_their_parent_directories() {
        let ns = tree();
        assert!(ns.get("/data").unwrap().is_directory());
        assert!(ns.get("/data/nested").unwrap().is_directory());
        assert_eq!(ns.file_len("/data/a.txt").unwrap(), 5);
    }

    #[igfs_test_utils::logged_test]
    fn listing_returns_direct_children_only() {
        let ns = tree();
        let names: Vec<_> = ns
            .list("/data")
            .unwrap()
            .iter()
            .map(|info| info.path_str().to_string())
            .collect();
        assert_eq!(names, vec!["/data/a.txt", "/data/nested"]);

        let root: Vec<_> = ns.list("/").unwrap().iter().map(|i| i.path_str().to_string()).collect();
        assert_eq!(root, vec!["/data"]);
    }

    #[igfs_test_utils::logged_test]
    fn non_recursive_delete_of_full_directory_fails() {
        let mut ns = tree();
        let err = ns.delete("/data", false).unwrap_err();
        assert_eq!(err.code, ERR_DIRECTORY_NOT_EMPTY);
        assert!(ns.delete("/data", true).unwrap());
        assert!(!ns.exists("/data/nested/b.txt"));
        assert!(!ns.delete("/data", true).unwrap());
    }

    #[igfs_test_utils::logged_test]
    fn rename_moves_subtree() {
        let mut ns = tree();
        assert!(ns.rename("/data", "/archive/2024").unwrap());
        assert!(ns.exists("/archive/2024/nested/b.txt"));
        assert!(!ns.exists("/data"));
        assert!(!ns.rename("/data", "/other").unwrap());
        assert_eq!(ns.rename("/archive", "/archive/x").unwrap_err().code, ERR_GENERIC);
    }

    #[igfs_test_utils::logged_test]
    fn reads_clamp_to_file_end() {
        let mut ns = tree();
        assert_eq!(ns.read("/data/a.txt", 2, 100).unwrap(), b"pha");
        assert!(ns.read("/data/a.txt", 10, 4).unwrap().is_empty());
        assert!(ns.read("/data/a.txt", -1, 4).is_err());
    }

    #[igfs_test_utils::logged_test]
    fn mkdirs_refuses_to_pass_through_a_file() {
        let mut ns = tree();
        assert!(ns.mkdirs("/data/new/deeper"));
        assert!(!ns.mkdirs("/data/a.txt/sub"));
        assert_eq!(ns.create_file("/data/a.txt/x").unwrap_err().code, ERR_PARENT_NOT_DIRECTORY);
    }

    #[igfs_test_utils::logged_test]
    fn info_reports_directory_flag_and_logical_times() {
        let mut ns = tree();
        let dir = ns.info("/data").unwrap();
        assert!(dir.is_directory());

        let before = ns.info("/data/a.txt").unwrap();
        ns.append("/data/a.txt", b"!").unwrap();
        let after = ns.info("/data/a.txt").unwrap();
        assert!(!after.is_directory());
        assert_eq!(after.length, 6);
        assert!(after.modification_time > before.modification_time);
        assert_eq!(after.block_size, 4096);
    }
}
