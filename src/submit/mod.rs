//! Submission pipeline: document text in, diagram markup (or an error) out.
//!
//! - [`SubmissionRequest`] / [`RenderResult`]: the data model
//! - [`RenderBackend`]: the wire seam, with an HTTP implementation
//! - [`SubmissionController`]: owns the document, issues submissions and
//!   decides which outcome is authoritative

mod backend;
mod controller;
mod error;
mod request;

pub use backend::{
    BackendResponse, DEFAULT_ENDPOINT, HttpBackend, RenderBackend, Unconfigured,
    interpret_response, is_svg_content_type,
};
pub use controller::{
    Completion, MarkupHook, PendingSubmission, Resolution, SubmissionController, perform,
};
pub use error::SubmitError;
pub use request::{RenderResult, SubmissionRequest};

#[cfg(test)]
pub(crate) mod testing;
