//! Error types for frame decoding and relaying.
//!
//! All errors implement the `std::error::Error` trait and carry enough context to
//! log a dropped frame meaningfully.
//!
//! ## Error Categories
//!
//! - **Header Errors**: missing or inconsistent container header declarations
//! - **Layout Errors**: field type/size pairs outside the supported scalar table
//! - **Body Errors**: truncated binary bodies and malformed ASCII rows
//! - **Pipeline Errors**: compression, serialization, dispatch and configuration
//!
//! ## Recovery and Retry
//!
//! Frame-level errors are never retryable: the same bytes fail the same way. The
//! ingestion bridge logs them and moves on to the next frame.
//!
//! ```rust
//! use pcd_relay::RelayError;
//!
//! let error = RelayError::truncated_payload(24, 23);
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Main error type for relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Malformed container header: {details}")]
    MalformedHeader { details: String },

    #[error("Unsupported field type '{kind}' with size {size} for field '{field}'")]
    UnsupportedFieldType { field: String, kind: String, size: usize },

    #[error("Unsupported data encoding '{encoding}'")]
    UnsupportedEncoding { encoding: String },

    #[error("{feature} is not implemented")]
    NotImplemented { feature: String },

    #[error("Truncated payload: expected {expected} bytes, {available} available")]
    TruncatedPayload { expected: usize, available: usize },

    #[error("Row {row} could not be decoded: {details}")]
    RowDecode { row: usize, details: String },

    #[error("Column '{column}' not found in decoded table")]
    MissingColumn { column: String },

    #[error("Compression failed")]
    Compression {
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Frame processing panicked: {details}")]
    ProcessingPanicked { details: String },

    #[error("Dispatch failed on event '{event}': {reason}")]
    Dispatch { event: String, reason: String },

    #[error("Frame source failed: {reason}")]
    Source {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RelayError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::MalformedHeader { .. } => false,
            RelayError::UnsupportedFieldType { .. } => false,
            RelayError::UnsupportedEncoding { .. } => false,
            RelayError::NotImplemented { .. } => false,
            RelayError::TruncatedPayload { .. } => false,
            RelayError::RowDecode { .. } => false,
            RelayError::MissingColumn { .. } => false,
            RelayError::Compression { .. } => true,
            RelayError::Serialization { .. } => false,
            RelayError::File { .. } => false,
            RelayError::Config { .. } => false,
            RelayError::ProcessingPanicked { .. } => false,
            RelayError::Dispatch { .. } => true,
            RelayError::Source { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RelayError::MalformedHeader { .. } => vec![
                "Check the publisher emits FIELDS, TYPE and SIZE lines",
                "Verify FIELDS, COUNT, TYPE and SIZE have the same number of entries",
                "Ensure the header ends with a DATA line or Time sentinel",
            ],
            RelayError::UnsupportedFieldType { .. } => vec![
                "Use F with size 4 or 8, U with size 1, 2, 4 or 8, or I with size 2, 4 or 8",
                "Check the SIZE line lines up with the TYPE line",
            ],
            RelayError::UnsupportedEncoding { .. } => vec![
                "Publish frames with DATA ascii or DATA binary",
                "Check the DATA line for typos",
            ],
            RelayError::NotImplemented { .. } => vec![
                "Configure the publisher to emit DATA binary instead of binary_compressed",
                "Decompress frames upstream before publishing",
            ],
            RelayError::TruncatedPayload { .. } => vec![
                "Check POINTS matches the number of rows in the body",
                "Verify the messaging layer does not truncate large payloads",
            ],
            RelayError::RowDecode { .. } => vec![
                "Check each ASCII row has one token per flattened column",
                "Verify numeric tokens match the declared TYPE",
            ],
            RelayError::MissingColumn { .. } => vec![
                "Publish x, y and z fields for the vertex view",
                "Switch table_view to full",
            ],
            RelayError::Compression { .. } => vec![
                "Lower the compression level",
                "Check available memory",
            ],
            RelayError::Serialization { .. } => vec![
                "Check decoded values are finite numbers",
                "Switch table_view to full",
            ],
            RelayError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            RelayError::Config { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Ensure capacities and intervals are greater than zero",
            ],
            RelayError::ProcessingPanicked { .. } => vec![
                "Capture the payload that triggered the panic and report it",
                "Check custom Compressor implementations for panics",
            ],
            RelayError::Dispatch { .. } => vec![
                "Check the outbound transport is still connected",
                "Check the outbound channel has not been closed",
            ],
            RelayError::Source { .. } => vec![
                "Check the messaging broker is reachable",
                "Verify topic subscriptions are still active",
            ],
        }
    }

    /// Helper constructor for malformed header errors.
    pub fn malformed_header(details: impl Into<String>) -> Self {
        RelayError::MalformedHeader { details: details.into() }
    }

    /// Helper constructor for unsupported `(type, size)` pairs.
    pub fn unsupported_field_type(
        field: impl Into<String>,
        kind: impl Into<String>,
        size: usize,
    ) -> Self {
        RelayError::UnsupportedFieldType { field: field.into(), kind: kind.into(), size }
    }

    /// Helper constructor for short binary bodies.
    pub fn truncated_payload(expected: usize, available: usize) -> Self {
        RelayError::TruncatedPayload { expected, available }
    }

    /// Helper constructor for ASCII row failures.
    pub fn row_decode(row: usize, details: impl Into<String>) -> Self {
        RelayError::RowDecode { row, details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        RelayError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        RelayError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for frame source errors.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        RelayError::Source { reason: reason.into(), source: None }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization { source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                details in ".*",
                field in "\\w+",
                kind in "[A-Z]",
                size in 0usize..16,
                expected in 1usize..100_000,
                available in 0usize..100_000,
                row in 0usize..10_000,
            ) {
                let header = RelayError::malformed_header(details.clone());
                prop_assert!(header.to_string().contains(&details));

                let field_type = RelayError::unsupported_field_type(field.clone(), kind.clone(), size);
                let msg = field_type.to_string();
                prop_assert!(msg.contains(&field));
                prop_assert!(msg.contains(&kind));
                prop_assert!(msg.contains(&size.to_string()));

                let truncated = RelayError::truncated_payload(expected, available);
                let msg = truncated.to_string();
                prop_assert!(msg.contains(&expected.to_string()));
                prop_assert!(msg.contains(&available.to_string()));

                let row_error = RelayError::row_decode(row, details.clone());
                prop_assert!(row_error.to_string().contains(&row.to_string()));
            }

            #[test]
            fn frame_errors_are_never_retryable(
                expected in 1usize..100_000,
                available in 0usize..100_000,
                details in ".*",
            ) {
                prop_assert!(!RelayError::truncated_payload(expected, available).is_retryable());
                prop_assert!(!RelayError::malformed_header(details.clone()).is_retryable());
                prop_assert!(!RelayError::row_decode(0, details).is_retryable());
            }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<RelayError>();

        let error = RelayError::config("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_suggestions_are_descriptive() {
        let errors = [
            RelayError::malformed_header("missing FIELDS"),
            RelayError::NotImplemented { feature: "binary_compressed".into() },
            RelayError::truncated_payload(24, 23),
            RelayError::Dispatch { event: "mqtt_message".into(), reason: "closed".into() },
            RelayError::ProcessingPanicked { details: "index out of bounds".into() },
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn dispatch_errors_are_retryable() {
        let error = RelayError::Dispatch { event: "mqtt_message".into(), reason: "lagged".into() };
        assert!(error.is_retryable());
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let error: RelayError = json_err.into();
        assert!(matches!(error, RelayError::Serialization { .. }));
        assert!(std::error::Error::source(&error).is_some());
    }
}
