use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::{SubmissionRequest, SubmitError};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5001/generate-diagram";

const SVG_CONTENT_TYPE: &str = "image/svg+xml";
/// Icon downloads give up after this long even when requests have no timeout.
const ASSET_TIMEOUT: Duration = Duration::from_secs(10);

/// A response as it came off the wire, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl BackendResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_owned),
            body: body.into(),
        }
    }
}

/// Anything that can turn a template into diagram markup.
pub trait RenderBackend: Send + Sync {
    /// Send one submission and return the raw response.
    ///
    /// Only transport-level failures are errors here; HTTP error statuses
    /// come back as a [`BackendResponse`] for [`interpret_response`].
    fn render(&self, request: &SubmissionRequest) -> Result<BackendResponse, SubmitError>;

    /// Fetch a secondary asset (an icon) referenced by returned markup.
    fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, SubmitError> {
        Err(SubmitError::Transport(format!(
            "this backend cannot fetch assets ({url})"
        )))
    }

    /// Scheme, host and port that asset references must share.
    fn origin(&self) -> Option<String> {
        None
    }
}

/// Returns true when the content type denotes SVG markup.
///
/// Matching is case-insensitive and ignores parameters such as `charset`.
pub fn is_svg_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.to_ascii_lowercase().contains(SVG_CONTENT_TYPE))
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

/// Decide what a response means.
///
/// SVG responses are markup whatever the status code. Everything else is
/// read as a `{"error": "..."}` payload.
pub fn interpret_response(response: BackendResponse) -> Result<String, SubmitError> {
    let BackendResponse {
        status,
        content_type,
        body,
    } = response;

    if is_svg_content_type(content_type.as_deref()) {
        return Ok(String::from_utf8(body)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()));
    }

    match serde_json::from_slice::<ErrorPayload>(&body) {
        Ok(ErrorPayload {
            error: Some(message),
        }) => Err(SubmitError::Backend { status, message }),
        Ok(ErrorPayload { error: None }) => Err(SubmitError::Backend {
            status,
            message: format!("request failed with status {status}"),
        }),
        Err(err) => Err(SubmitError::MalformedResponse(format!(
            "status {status}, content type {}: {err}",
            content_type.as_deref().unwrap_or("<none>")
        ))),
    }
}

/// Backend speaking JSON over HTTP to the diagram service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
}

impl HttpBackend {
    /// Build a client for `endpoint`.
    ///
    /// `timeout` of `None` waits indefinitely.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, SubmitError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| SubmitError::Transport(format!("invalid endpoint {endpoint}: {err}")))?;
        let client = Client::builder()
            .user_agent(concat!("stackview/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl RenderBackend for HttpBackend {
    fn render(&self, request: &SubmissionRequest) -> Result<BackendResponse, SubmitError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes()?.to_vec();

        Ok(BackendResponse {
            status,
            content_type,
            body,
        })
    }

    fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, SubmitError> {
        let response = self.client.get(url).timeout(ASSET_TIMEOUT).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Backend {
                status: status.as_u16(),
                message: format!("could not fetch {url}"),
            });
        }
        Ok(response.bytes()?.to_vec())
    }

    fn origin(&self) -> Option<String> {
        let origin = self.endpoint.origin();
        origin.is_tuple().then(|| origin.ascii_serialization())
    }
}

/// Placeholder backend that fails every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

impl RenderBackend for Unconfigured {
    fn render(&self, _request: &SubmissionRequest) -> Result<BackendResponse, SubmitError> {
        Err(SubmitError::Transport(
            "no rendering endpoint configured".to_string(),
        ))
    }
}
