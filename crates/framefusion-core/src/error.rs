//! Unified error type for the framefusion service.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the HTTP layer to derive a status code via
//! [`Error::http_status`].

/// Unified error type covering all failure modes in framefusion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declared input slot is missing or could not be materialized
    /// (no file or URL supplied, unreachable URL, non-2xx download).
    #[error("input '{slot}' unavailable: {reason}")]
    InputUnavailable {
        /// The logical slot name (e.g. "image", "video1").
        slot: String,
        /// Human-readable description of what went wrong.
        reason: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The external transcoding engine returned an error. `message` carries
    /// the engine diagnostic verbatim.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Diagnostic text reported by the tool.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::InputUnavailable`].
    pub fn input_unavailable(slot: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputUnavailable {
            slot: slot.into(),
            reason: reason.into(),
        }
    }

    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InputUnavailable { .. } | Error::Validation(_) => 400,
            Error::Io { .. } | Error::Tool { .. } | Error::Internal(_) => 500,
        }
    }
}

/// Result alias using the unified [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_unavailable_is_client_error() {
        let err = Error::input_unavailable("image", "no file or URL supplied");
        assert_eq!(err.http_status(), 400);
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn validation_is_client_error() {
        assert_eq!(Error::Validation("bad mode".into()).http_status(), 400);
    }

    #[test]
    fn tool_is_server_error() {
        let err = Error::Tool {
            tool: "ffmpeg".into(),
            message: "exited with status 1".into(),
        };
        assert_eq!(err.http_status(), 500);
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[test]
    fn io_is_server_error() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.http_status(), 500);
    }
}
