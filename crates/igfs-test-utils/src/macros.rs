// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Assertion macros that record their outcome in the test log.

/// Assert a condition, logging it before panicking on failure.
///
/// ```rust,ignore
/// logged_assert!(logger, response.is_ok(), "handshake accepted");
/// ```
#[macro_export]
macro_rules! logged_assert {
    ($logger:expr, $condition:expr) => {
        $crate::logged_assert!($logger, $condition, stringify!($condition))
    };
    ($logger:expr, $condition:expr, $message:expr) => {
        if let Err(e) = $logger.log(&format!("Asserting: {}", $message)) {
            eprintln!("Warning: Failed to write to test log: {}", e);
        }
        if !($condition) {
            if let Err(e) = $logger.log("✗ Assertion failed") {
                eprintln!("Warning: Failed to write to test log: {}", e);
            }
            panic!("Assertion failed: {}", $message);
        }
    };
}

/// Compare two wire frames byte for byte. On mismatch both frames are
/// dumped to the log as hex together with the first differing offset.
///
/// ```rust,ignore
/// assert_frame_eq!(logger, transport.bytes(), expected);
/// ```
#[macro_export]
macro_rules! assert_frame_eq {
    ($logger:expr, $actual:expr, $expected:expr) => {{
        let actual_ref = &$actual;
        let expected_ref = &$expected;
        let actual: &[u8] = ::core::convert::AsRef::<[u8]>::as_ref(actual_ref);
        let expected: &[u8] = ::core::convert::AsRef::<[u8]>::as_ref(expected_ref);
        if actual != expected {
            let offset = actual
                .iter()
                .zip(expected.iter())
                .position(|(a, e)| a != e)
                .unwrap_or_else(|| actual.len().min(expected.len()));
            let _ = $logger.log_frame("actual frame", actual);
            let _ = $logger.log_frame("expected frame", expected);
            panic!(
                "frames differ at offset {} (actual {} bytes, expected {} bytes)",
                offset,
                actual.len(),
                expected.len()
            );
        }
    }};
}
