// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RAII guard driving the [`TestLogger`] lifecycle for `#[logged_test]`.

use std::path::PathBuf;

use crate::{TestLogError, TestLogger};

/// Finalizes a test log exactly once.
///
/// A guard dropped without an explicit finish, including during a panic
/// unwind, records the test as failed.
pub struct TestLoggerGuard {
    logger: Option<TestLogger>,
    log_path: PathBuf,
}

impl TestLoggerGuard {
    pub fn new(test_name: &str) -> Result<Self, TestLogError> {
        let logger = TestLogger::new(test_name)?;
        let log_path = logger.log_path().to_path_buf();
        Ok(Self {
            logger: Some(logger),
            log_path,
        })
    }

    /// Borrow the logger for test diagnostics.
    pub fn logger(&mut self) -> &mut TestLogger {
        self.logger.as_mut().expect("TestLoggerGuard logger already finalized")
    }

    pub fn finish_success(mut self) -> Result<PathBuf, TestLogError> {
        match self.logger.take() {
            Some(logger) => logger.finish_success(),
            None => Ok(self.log_path.clone()),
        }
    }

    pub fn finish_failure<S: AsRef<str>>(mut self, message: S) -> Result<PathBuf, TestLogError> {
        match self.logger.take() {
            Some(logger) => logger.finish_failure(message.as_ref()),
            None => Ok(self.log_path.clone()),
        }
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }
}

impl Drop for TestLoggerGuard {
    fn drop(&mut self) {
        let Some(logger) = self.logger.take() else {
            return;
        };

        let reason = if std::thread::panicking() {
            "test panicked"
        } else {
            "test exited without finishing its log"
        };
        if let Err(err) = logger.finish_failure(reason) {
            eprintln!(
                "failed to finalize TestLogger in Drop for {}: {}",
                self.log_path.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn dropped_guard_records_failure() {
        let guard = TestLoggerGuard::new("dropped_guard_records_failure_inner").unwrap();
        let path = guard.log_path().clone();
        drop(guard);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Test failed"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn finished_guard_records_success() {
        let mut guard = TestLoggerGuard::new("finished_guard_records_success_inner").unwrap();
        guard.logger().log("step").unwrap();
        let path = guard.finish_success().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("step"));
        assert!(content.contains("completed successfully"));
        fs::remove_file(path).unwrap();
    }
}
