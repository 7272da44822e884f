use thiserror::Error;

/// Ways a submission can fail.
///
/// None of these are fatal: the controller records them as
/// [`RenderResult::Error`](super::RenderResult::Error) and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SubmitError {
    /// The endpoint could not be reached or the response could not be read.
    #[error("could not reach rendering service: {0}")]
    Transport(String),

    /// The service answered with a well-formed JSON error payload.
    #[error("rendering service error ({status}): {message}")]
    Backend {
        /// HTTP status of the response.
        status: u16,
        /// The payload's `error` field.
        message: String,
    },

    /// A non-SVG response whose body was not the expected JSON payload.
    #[error("unexpected response from rendering service: {0}")]
    MalformedResponse(String),
}

impl SubmitError {
    /// Message shown in the diagram pane.
    ///
    /// Backend errors show the service's own wording verbatim.
    pub fn display_message(&self) -> String {
        match self {
            Self::Backend { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Short machine-friendly name used in log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Backend { .. } => "backend",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<reqwest::Error> for SubmitError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_displays_service_message_verbatim() {
        let err = SubmitError::Backend {
            status: 400,
            message: "empty template".to_string(),
        };
        assert_eq!(err.display_message(), "empty template");
        assert_eq!(err.kind(), "backend");
    }

    #[test]
    fn test_transport_error_display_includes_cause() {
        let err = SubmitError::Transport("connection refused".to_string());
        assert_eq!(
            err.display_message(),
            "could not reach rendering service: connection refused"
        );
    }
}
