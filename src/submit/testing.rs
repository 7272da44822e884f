//! Backends used by unit tests across the crate.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::mpsc::Receiver;

use super::{BackendResponse, RenderBackend, SubmissionRequest, SubmitError};

pub const SIMPLE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10"/></svg>"#;

/// Answers requests from a queue, then repeats `fallback`.
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<Result<BackendResponse, SubmitError>>>,
    fallback: Result<BackendResponse, SubmitError>,
    assets: HashMap<String, Vec<u8>>,
    origin: Option<String>,
    pub seen: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn always(response: Result<BackendResponse, SubmitError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: response,
            assets: HashMap::new(),
            origin: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn svg(markup: &str) -> Self {
        Self::always(Ok(BackendResponse::new(200, Some("image/svg+xml"), markup)))
    }

    pub fn json_error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::always(Ok(BackendResponse::new(status, Some("application/json"), body)))
    }

    pub fn then(self, response: Result<BackendResponse, SubmitError>) -> Self {
        self.queue.lock().unwrap().push_back(response);
        self
    }

    pub fn with_asset(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.assets.insert(url.to_string(), bytes);
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }
}

impl RenderBackend for ScriptedBackend {
    fn render(&self, request: &SubmissionRequest) -> Result<BackendResponse, SubmitError> {
        self.seen.lock().unwrap().push(request.yaml().to_string());
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, SubmitError> {
        self.assets.get(url).cloned().ok_or_else(|| SubmitError::Backend {
            status: 404,
            message: format!("missing {url}"),
        })
    }

    fn origin(&self) -> Option<String> {
        self.origin.clone()
    }
}

/// Echoes the document back inside an SVG `<title>`, optionally holding a
/// request until its gate is released.
pub struct GatedBackend {
    gates: Mutex<HashMap<String, Receiver<()>>>,
}

impl GatedBackend {
    pub fn new() -> Self {
        Self {
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn hold(&self, yaml: &str, gate: Receiver<()>) {
        self.gates.lock().unwrap().insert(yaml.to_string(), gate);
    }

    pub fn markup_for(yaml: &str) -> String {
        format!(r#"<svg xmlns="http://www.w3.org/2000/svg"><title>{yaml}</title></svg>"#)
    }
}

impl RenderBackend for GatedBackend {
    fn render(&self, request: &SubmissionRequest) -> Result<BackendResponse, SubmitError> {
        let gate = self.gates.lock().unwrap().remove(request.yaml());
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        Ok(BackendResponse::new(
            200,
            Some("image/svg+xml"),
            Self::markup_for(request.yaml()),
        ))
    }
}

/// Panics on every request.
pub struct PanickingBackend;

impl RenderBackend for PanickingBackend {
    fn render(&self, _request: &SubmissionRequest) -> Result<BackendResponse, SubmitError> {
        panic!("backend exploded");
    }
}
