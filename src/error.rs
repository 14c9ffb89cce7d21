//! Error type for the transform-stage library.
//!
//! Errors fall into two groups by when they occur:
//!
//! * [`StageError::Configuration`] — **construction time**: the arguments
//!   handed to [`crate::create_transform_stage`] are malformed. Returned
//!   before a single file has been seen, so a build fails while the pipeline
//!   is being wired up.
//!
//! * [`StageError::ContractViolation`] and [`StageError::UnknownEncoding`]
//!   — **call time**: the user transform returned something that is neither
//!   text nor bytes, or the configured encoding cannot decode the contents.
//!   Raised once per offending file, from the buffered path directly or from
//!   the contents stream of a streamed file.
//!
//! Every message is prefixed with [`PLUGIN_NAME`] so the failure can be traced
//! back to this stage in a noisy build log.

use std::path::PathBuf;
use thiserror::Error;

/// Name used to tag every error message produced by this crate.
pub const PLUGIN_NAME: &str = "transform-stage";

/// All errors returned by the transform-stage library.
#[derive(Debug, Error)]
pub enum StageError {
    // ── Construction ──────────────────────────────────────────────────────
    /// The factory arguments were missing or of the wrong shape.
    #[error("{}: {message}", PLUGIN_NAME)]
    Configuration { message: String },

    // ── Invocation ────────────────────────────────────────────────────────
    /// The transform function returned neither text nor bytes.
    #[error("{}: {message}", PLUGIN_NAME)]
    ContractViolation { message: String, path: PathBuf },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// A file could not be read from disk.
    #[error("{}: failed to read '{}': {source}", PLUGIN_NAME, .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The chunk source feeding a streamed file failed.
    #[error("{}: content stream failed: {}", PLUGIN_NAME, .0)]
    Stream(#[source] std::io::Error),

    /// The configured encoding name is not supported; raised per file, when
    /// its contents are about to be decoded.
    #[error("{}: Unknown encoding: {name}", PLUGIN_NAME)]
    UnknownEncoding { name: String, path: PathBuf },

    // ── Driver ────────────────────────────────────────────────────────────
    /// The temporary runtime behind [`crate::run_sync`] could not be started.
    #[error("{}: failed to start tokio runtime: {source}", PLUGIN_NAME)]
    Runtime {
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        StageError::Configuration {
            message: message.into(),
        }
    }

    /// The bare message, without the plugin prefix.
    ///
    /// Only configuration and contract errors carry a fixed message; every
    /// other kind returns `None`.
    pub fn message(&self) -> Option<&str> {
        match self {
            StageError::Configuration { message } => Some(message),
            StageError::ContractViolation { message, .. } => Some(message),
            StageError::Io { .. }
            | StageError::Stream(_)
            | StageError::UnknownEncoding { .. }
            | StageError::Runtime { .. } => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, StageError::Configuration { .. })
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, StageError::ContractViolation { .. })
    }
}

impl From<std::io::Error> for StageError {
    fn from(e: std::io::Error) -> Self {
        StageError::Stream(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_display_is_prefixed() {
        let e = StageError::configuration("transformFn must be defined.");
        assert_eq!(e.to_string(), "transform-stage: transformFn must be defined.");
        assert_eq!(e.message(), Some("transformFn must be defined."));
        assert!(e.is_configuration());
        assert!(!e.is_contract_violation());
    }

    #[test]
    fn contract_violation_display() {
        let e = StageError::ContractViolation {
            message: "transformFn must return a string or a buffer.".into(),
            path: PathBuf::from("src/a.txt"),
        };
        assert!(e.to_string().starts_with("transform-stage: "));
        assert!(e.is_contract_violation());
    }

    #[test]
    fn io_display_mentions_path() {
        let e = StageError::Io {
            path: PathBuf::from("/nope/missing.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = e.to_string();
        assert!(msg.contains("/nope/missing.txt"), "got: {msg}");
        assert!(e.message().is_none());
    }

    #[test]
    fn io_error_converts_to_stream_error() {
        let e: StageError = std::io::Error::other("socket closed").into();
        assert!(matches!(e, StageError::Stream(_)));
        assert_eq!(
            e.to_string(),
            "transform-stage: content stream failed: socket closed"
        );
    }

    #[test]
    fn unknown_encoding_display() {
        let e = StageError::UnknownEncoding {
            name: "klingon".into(),
            path: PathBuf::from("a.txt"),
        };
        assert_eq!(e.to_string(), "transform-stage: Unknown encoding: klingon");
        assert!(!e.is_configuration());
        assert!(e.message().is_none());
    }

    #[test]
    fn runtime_error_is_not_a_stream_error() {
        let e = StageError::Runtime {
            source: std::io::Error::other("too many open files"),
        };
        assert_eq!(
            e.to_string(),
            "transform-stage: failed to start tokio runtime: too many open files"
        );
        assert!(std::error::Error::source(&e).is_some());
    }
}
