use serde::Serialize;

use super::SubmitError;

/// Snapshot of the document taken at the moment of submission.
///
/// Serializes to the wire body `{"yaml": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRequest {
    yaml: String,
}

impl SubmissionRequest {
    pub fn new(yaml: impl Into<String>) -> Self {
        Self { yaml: yaml.into() }
    }

    pub fn yaml(&self) -> &str {
        &self.yaml
    }
}

/// The outcome currently authoritative for display.
///
/// Starts as `None` and never returns to it once a submission resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RenderResult {
    #[default]
    None,
    /// Raw markup exactly as the service returned it.
    Markup(String),
    /// Message describing why the last submission failed.
    Error(String),
}

impl RenderResult {
    pub fn from_outcome(outcome: Result<String, SubmitError>) -> Self {
        match outcome {
            Ok(markup) => Self::Markup(markup),
            Err(err) => Self::Error(err.display_message()),
        }
    }

    pub fn markup(&self) -> Option<&str> {
        match self {
            Self::Markup(markup) => Some(markup),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_to_wire_body() {
        let request = SubmissionRequest::new("Resources: {}");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, serde_json::json!({ "yaml": "Resources: {}" }));
    }

    #[test]
    fn test_empty_document_is_serialized_as_is() {
        let request = SubmissionRequest::new("");
        let body = serde_json::to_string(&request).unwrap();
        assert_eq!(body, r#"{"yaml":""}"#);
    }

    #[test]
    fn test_from_outcome_maps_both_branches() {
        assert_eq!(
            RenderResult::from_outcome(Ok("<svg/>".to_string())),
            RenderResult::Markup("<svg/>".to_string())
        );
        let err = SubmitError::Backend {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(
            RenderResult::from_outcome(Err(err)),
            RenderResult::Error("boom".to_string())
        );
    }

    #[test]
    fn test_default_is_none() {
        let result = RenderResult::default();
        assert!(result.is_none());
        assert_eq!(result.markup(), None);
        assert_eq!(result.error(), None);
    }
}
