//! Error types for the ground-station link.
//!
//! Every fallible operation in the crate returns [`LinkError`]. The variants follow
//! the failure taxonomy of the link itself:
//!
//! - **Decode Errors**: garbled radio buffers or sensor records; the buffer is dropped
//! - **Transport Errors**: socket failures on the radio or Matlab peers
//! - **Command Errors**: unknown or malformed operator commands; logged, never fatal
//! - **Configuration Errors**: unreadable or invalid YAML configuration
//! - **File Errors**: the raw flight record could not be opened or written
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use groundlink::LinkError;
//!
//! let error = LinkError::decode_error("radio buffer", "missing trailing timestamp");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Flight record file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error on {endpoint}")]
    Transport {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operator command {} rejected: {details}", .id.as_deref().unwrap_or("<missing ID>"))]
    Command { id: Option<String>, details: String },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("Channel '{channel}' closed")]
    ChannelClosed { channel: &'static str },

    #[error("Channel '{channel}' full")]
    ChannelFull { channel: &'static str },
}

impl LinkError {
    /// Returns whether the link can keep going after this error.
    ///
    /// Radio loss and garbled frames recover on the next frame, a bad command only
    /// affects itself. Configuration and flight record failures do not heal.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Decode { .. } => true,
            LinkError::Transport { .. } => true,
            LinkError::Command { .. } => true,
            LinkError::File { .. } => false,
            LinkError::Config { .. } => false,
            LinkError::ChannelClosed { .. } => false,
            LinkError::ChannelFull { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::Decode { .. } => vec![
                "Check radio link quality and antenna placement",
                "Verify board firmware and ground station record layouts match",
                "Wait for the next frame; decode errors are not persistent",
            ],
            LinkError::File { .. } => vec![
                "Check the recording directory exists and is writable",
                "Ensure sufficient disk space",
                "Check file permissions",
            ],
            LinkError::Transport { .. } => vec![
                "Verify the configured bind address is free",
                "Check radio module and network interface are up",
                "Verify peer endpoint addresses in the configuration",
            ],
            LinkError::Command { .. } => vec![
                "Check the operation name in the ID field",
                "Verify all required fields are present and numeric",
            ],
            LinkError::Config { .. } => vec![
                "Check YAML syntax of the configuration file",
                "Compare field names against the documented configuration",
            ],
            LinkError::ChannelClosed { .. } => vec![
                "Restart the link; a processing task has terminated",
                "Check earlier log messages for the task's exit reason",
            ],
            LinkError::ChannelFull { .. } => vec![
                "Retry after the link has drained its queue",
                "Raise dispatch.command_queue if bursts are expected",
            ],
        }
    }

    /// Helper constructor for decode errors.
    pub fn decode_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        LinkError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        LinkError::File { path, source }
    }

    /// Helper constructor for transport errors.
    pub fn transport_error(endpoint: impl Into<String>, source: std::io::Error) -> Self {
        LinkError::Transport { endpoint: endpoint.into(), source }
    }

    /// Helper constructor for rejected operator commands.
    pub fn command_error(id: Option<String>, details: impl Into<String>) -> Self {
        LinkError::Command { id, details: details.into() }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for LinkError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        LinkError::Config { details: err.to_string() }
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::Command { id: None, details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            context in "[a-z ]{1,20}",
            details in ".*",
            id in "[A-Za-z]{1,16}",
        ) {
            let decode = LinkError::decode_error(context.clone(), details.clone());
            let msg = decode.to_string();
            prop_assert!(msg.contains(&context));
            prop_assert!(msg.contains(&details));

            let command = LinkError::command_error(Some(id.clone()), details.clone());
            prop_assert!(command.to_string().contains(&id));
        }
    }

    #[test]
    fn command_error_without_id_is_labelled() {
        let err = LinkError::command_error(None, "not an object");
        assert!(err.to_string().contains("<missing ID>"));
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LinkError>();

        let error = LinkError::decode_error("test", "test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification_follows_taxonomy() {
        assert!(LinkError::decode_error("radio", "short").is_retryable());
        assert!(LinkError::command_error(None, "bad").is_retryable());
        assert!(
            LinkError::transport_error("radio", std::io::Error::other("reset")).is_retryable()
        );
        assert!(
            !LinkError::file_error(PathBuf::from("/nope"), std::io::Error::other("denied"))
                .is_retryable()
        );
        assert!(!LinkError::Config { details: "bad".into() }.is_retryable());
        assert!(!LinkError::ChannelClosed { channel: "commands" }.is_retryable());
        assert!(LinkError::ChannelFull { channel: "commands" }.is_retryable());

        for suggestion in LinkError::decode_error("a", "b").recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
    }

    #[test]
    fn from_conversions_work() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "log.bin");
        match LinkError::from(io_err) {
            LinkError::File { source, .. } => assert_eq!(source.to_string(), "log.bin"),
            other => panic!("Expected File error variant, got {other:?}"),
        }

        let yaml_err = serde_yaml_ng::from_str::<u32>("not: [a number").unwrap_err();
        assert!(matches!(LinkError::from(yaml_err), LinkError::Config { .. }));

        let json_err = serde_json::from_str::<u32>("{").unwrap_err();
        assert!(matches!(LinkError::from(json_err), LinkError::Command { id: None, .. }));
    }
}
