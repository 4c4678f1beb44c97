// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-test log files
//!
//! Every test writes its diagnostics to its own file under
//! `target/test-logs/<date>/`. A passing test prints one line; a failing
//! test prints the log path and size so the full output can be opened.
//! Wire frames are dumped as offset-annotated hex so header padding and
//! field offsets can be read straight off the log.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Bytes shown per line of a frame dump.
const FRAME_DUMP_WIDTH: usize = 16;

const MAX_TEST_NAME_LEN: usize = 200;

#[derive(Error, Debug)]
pub enum TestLogError {
    #[error("failed to create test log: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write to test log file: {path}")]
    WriteError { path: PathBuf },

    #[error("invalid test name: {name}")]
    InvalidTestName { name: String },
}

/// Log file owned by a single test.
pub struct TestLogger {
    log_path: PathBuf,
    writer: BufWriter<File>,
    test_name: String,
    start_time: DateTime<Utc>,
}

impl TestLogger {
    /// Open a fresh log file for `test_name`.
    ///
    /// ```rust,ignore
    /// let mut logger = igfs_test_utils::TestLogger::new("read_block").unwrap();
    /// logger.log("opening stream").unwrap();
    /// logger.finish_success().unwrap();
    /// ```
    pub fn new(test_name: &str) -> Result<Self, TestLogError> {
        validate_test_name(test_name)?;

        let log_path = create_unique_test_log(test_name)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)?;

        let mut logger = Self {
            log_path,
            writer: BufWriter::new(file),
            test_name: test_name.to_string(),
            start_time: Utc::now(),
        };
        logger.write_header()?;
        Ok(logger)
    }

    pub fn log(&mut self, message: &str) -> Result<(), TestLogError> {
        let timestamp = Utc::now().format("%H:%M:%S%.3f");
        writeln!(self.writer, "[{}] {}", timestamp, message).map_err(|_| self.write_error())?;
        self.writer.flush().map_err(|_| self.write_error())
    }

    /// Dump a wire frame as hex, one line per 16 bytes, prefixed by offset.
    pub fn log_frame(&mut self, label: &str, frame: &[u8]) -> Result<(), TestLogError> {
        self.log(&format!("{} ({} bytes):\n{}", label, frame.len(), format_frame(frame)))
    }

    /// Log serializable data as pretty JSON.
    pub fn log_json<T: serde::Serialize>(
        &mut self,
        label: &str,
        data: &T,
    ) -> Result<(), TestLogError> {
        let json = serde_json::to_string_pretty(data).map_err(|_| self.write_error())?;
        self.log(&format!("{}: {}", label, json))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn finish_success(mut self) -> Result<PathBuf, TestLogError> {
        let elapsed = self.elapsed_secs();
        self.log(&format!("Test completed successfully in {:.3}s", elapsed))?;
        self.writer.flush().map_err(|_| self.write_error())?;

        println!("✅ {} passed", self.test_name);
        Ok(self.log_path)
    }

    pub fn finish_failure(mut self, error_message: &str) -> Result<PathBuf, TestLogError> {
        let elapsed = self.elapsed_secs();
        self.log(&format!("Test failed after {:.3}s: {}", elapsed, error_message))?;
        self.writer.flush().map_err(|_| self.write_error())?;

        match fs::metadata(&self.log_path) {
            Ok(metadata) => println!(
                "❌ {} failed - Log: {} ({} bytes)",
                self.test_name,
                self.log_path.display(),
                metadata.len()
            ),
            Err(_) => println!("❌ {} failed - Log: {}", self.test_name, self.log_path.display()),
        }
        Ok(self.log_path)
    }

    fn elapsed_secs(&self) -> f64 {
        Utc::now().signed_duration_since(self.start_time).num_milliseconds() as f64 / 1000.0
    }

    fn write_error(&self) -> TestLogError {
        TestLogError::WriteError {
            path: self.log_path.clone(),
        }
    }

    fn write_header(&mut self) -> Result<(), TestLogError> {
        writeln!(self.writer, "=== IGFS Test Log ===")?;
        writeln!(self.writer, "Test: {}", self.test_name)?;
        writeln!(
            self.writer,
            "Started: {}",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(self.writer, "Process: {}", std::process::id())?;
        writeln!(
            self.writer,
            "Thread: {}",
            std::thread::current().name().unwrap_or("unknown")
        )?;
        writeln!(self.writer, "=== Log Output ===")?;
        writeln!(self.writer)?;
        self.writer.flush().map_err(|_| self.write_error())
    }
}

/// Offset-prefixed hex rendering of a frame.
pub fn format_frame(frame: &[u8]) -> String {
    frame
        .chunks(FRAME_DUMP_WIDTH)
        .enumerate()
        .map(|(line, chunk)| format!("  {:04x}: {}", line * FRAME_DUMP_WIDTH, hex::encode(chunk)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reserve a unique log path for `test_name`:
/// `target/test-logs/YYYY-MM-DD/<name>-HH-MM-SS-<uuid>.log`.
pub fn create_unique_test_log(test_name: &str) -> Result<PathBuf, TestLogError> {
    let now = Utc::now();
    let log_dir = find_workspace_root()
        .join("target")
        .join("test-logs")
        .join(now.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&log_dir)?;

    let filename = format!(
        "{}-{}-{}.log",
        sanitize_filename(test_name),
        now.format("%H-%M-%S"),
        Uuid::new_v4()
    );
    Ok(log_dir.join(filename))
}

/// Nearest ancestor whose Cargo.toml declares a `[workspace]`.
fn find_workspace_root() -> PathBuf {
    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let is_workspace = |dir: &Path| {
        fs::read_to_string(dir.join("Cargo.toml"))
            .map(|content| content.contains("[workspace]"))
            .unwrap_or(false)
    };

    current_dir
        .ancestors()
        .find(|dir| is_workspace(dir))
        .map(Path::to_path_buf)
        .unwrap_or(current_dir)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

fn validate_test_name(name: &str) -> Result<(), TestLogError> {
    if name.is_empty() {
        return Err(TestLogError::InvalidTestName {
            name: name.to_string(),
        });
    }
    if name.len() > MAX_TEST_NAME_LEN {
        return Err(TestLogError::InvalidTestName {
            name: format!("name too long: {} chars", name.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[crate::logged_test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("read_block"), "read_block");
        assert_eq!(sanitize_filename("open-read"), "open-read");
        assert_eq!(sanitize_filename("igfs://host/path"), "igfs___host_path");
    }

    #[crate::logged_test]
    fn test_validate_test_name() {
        assert!(validate_test_name("valid_test").is_ok());
        assert!(validate_test_name("").is_err());
        assert!(validate_test_name(&"x".repeat(MAX_TEST_NAME_LEN + 1)).is_err());
    }

    #[crate::logged_test]
    fn test_unique_paths_per_call() {
        let first = create_unique_test_log("same_name").unwrap();
        let second = create_unique_test_log("same_name").unwrap();
        assert_ne!(first, second);
        assert!(first.parent().unwrap().exists());
    }

    #[crate::logged_test]
    fn test_frame_dump_has_offsets() {
        let mut frame = vec![0u8; 8];
        frame.extend_from_slice(&7i32.to_be_bytes());
        frame.resize(24, 0);

        let dump = format_frame(&frame);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "  0000: 00000000000000000000000700000000");
        assert_eq!(lines[1], "  0010: 0000000000000000");

        logger.log_frame("delete header", &frame).unwrap();
        let written = fs::read_to_string(logger.log_path()).unwrap();
        assert!(written.contains("delete header (24 bytes)"));
    }
}
