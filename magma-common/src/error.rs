//! Common error types for Magma

use thiserror::Error;

/// Common result type for Magma operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Magma services
///
/// Validation and credential errors are resolved locally and never reach
/// the network layer. `Transport` means no response was received;
/// `Submission` means the provider rejected the call. `PollTimeout` is
/// distinct from a provider-reported failure: the task handle stays valid
/// and may be re-polled.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required credential is absent, empty, or whitespace-only
    #[error("Missing credential `{field}`: {hint}")]
    MissingCredential { field: &'static str, hint: String },

    /// Malformed or missing request field, caught before any network call
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No response received from the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider rejected a submit call (body surfaced verbatim)
    #[error("Submission rejected (HTTP {status}): {body}")]
    Submission { status: u16, body: String },

    /// Terminal failure reported by the provider, including soft errors
    /// embedded in an otherwise successful response
    #[error("Provider failure {code}: {message}")]
    ProviderFailure { code: String, message: String },

    /// Polling deadline exceeded without reaching a terminal state
    #[error("Task {task_id} still pending after {waited_secs}s")]
    PollTimeout { task_id: String, waited_secs: u64 },

    /// Polling cancelled by the caller between poll attempts
    #[error("Polling cancelled for task {task_id}")]
    Cancelled { task_id: String },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that terminate a polling loop (provider verdicts),
    /// false for conditions the caller may retry against the same handle.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Error::ProviderFailure { .. } | Error::Submission { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_names_field() {
        let err = Error::MissingCredential {
            field: "secret_access_key",
            hint: "configure tos.tos_secret_key".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("secret_access_key"));
        assert!(msg.contains("tos_secret_key"));
    }

    #[test]
    fn poll_timeout_is_not_terminal() {
        let err = Error::PollTimeout {
            task_id: "t-1".to_string(),
            waited_secs: 60,
        };
        assert!(!err.is_terminal_failure());
    }

    #[test]
    fn provider_failure_is_terminal() {
        let err = Error::ProviderFailure {
            code: "50411".to_string(),
            message: "input image rejected".to_string(),
        };
        assert!(err.is_terminal_failure());
    }
}
