// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! IGFS Test Utilities
//!
//! Shared testing infrastructure for the IGFS crates:
//!
//! - each test writes a unique log file under `target/test-logs/`
//! - passing tests print a single line, failing tests print the log path
//! - wire frames can be dumped to the log as offset-annotated hex

// Lets `#[logged_test]` expand to `::igfs_test_utils::..` inside this crate.
extern crate self as igfs_test_utils;

pub mod guard;
pub mod logging;
pub mod macros;

pub use guard::TestLoggerGuard;
pub use igfs_test_utils_macros::logged_test;
pub use logging::{create_unique_test_log, format_frame, TestLogError, TestLogger};
