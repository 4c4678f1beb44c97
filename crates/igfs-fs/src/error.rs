// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the file-system facade

use std::io;

use igfs_client::ClientError;
use igfs_proto::Envelope;

#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("Error [code={code}, message=\"{message}\"]")]
    Remote { code: i32, message: String },
    #[error("{0} is not supported by IGFS")]
    Unimplemented(&'static str),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl FsError {
    /// Error carried by an unsuccessful response.
    pub fn remote<R>(response: &Envelope<R>) -> Self {
        FsError::Remote {
            code: response.error_code(),
            message: response.error_message().to_string(),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// Payload of a successful response, or the server error it carries.
pub(crate) fn expect_ok<R>(response: Envelope<R>) -> FsResult<R> {
    if !response.is_ok() {
        return Err(FsError::remote(&response));
    }
    response
        .into_payload()
        .ok_or_else(|| FsError::Internal("successful response without a payload".to_string()))
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match &err {
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::FailedPrecondition(_) => io::ErrorKind::InvalidInput,
            FsError::Unimplemented(_) => io::ErrorKind::Unsupported,
            FsError::Client(ClientError::Proto(igfs_proto::ProtoError::Io(inner))) => inner.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use igfs_proto::ExistsResponse;

    #[igfs_test_utils::logged_test]
    fn server_errors_keep_code_and_message() {
        let err = expect_ok(Envelope::<ExistsResponse>::error(3, "boom")).unwrap_err();
        assert!(matches!(&err, FsError::Remote { code: 3, message } if message == "boom"));
        assert_eq!(err.to_string(), "Error [code=3, message=\"boom\"]");
    }

    #[igfs_test_utils::logged_test]
    fn io_conversion_preserves_not_found() {
        let err: io::Error = FsError::NotFound("/x".to_string()).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(err.to_string(), "/x not found");
    }
}
