use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::{RenderBackend, RenderResult, SubmissionRequest, SubmitError, interpret_response};

/// Called on the worker thread with freshly received markup, after the
/// outcome has been handed back to the controller.
pub type MarkupHook = Arc<dyn Fn(&str) + Send + Sync>;

/// A submission that has been issued but not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub generation: u64,
    pub request: SubmissionRequest,
}

/// Outcome of one submission, tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub generation: u64,
    pub outcome: Result<String, SubmitError>,
}

/// What the controller did with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The outcome replaced the current result.
    Applied,
    /// A newer submission had already resolved; the outcome was dropped.
    Discarded,
}

/// Send one request and interpret the response.
pub fn perform(
    backend: &dyn RenderBackend,
    request: &SubmissionRequest,
) -> Result<String, SubmitError> {
    backend.render(request).and_then(interpret_response)
}

/// Owns the document text and the authoritative [`RenderResult`].
///
/// Each [`submit`](Self::submit) is numbered. An outcome is applied only
/// if its number is above the highest one applied so far, so a slow early
/// request cannot overwrite a later one. With `apply_stale` set, every
/// outcome is applied in arrival order instead.
pub struct SubmissionController {
    document: String,
    result: RenderResult,
    backend: Arc<dyn RenderBackend>,
    on_markup: Option<MarkupHook>,
    apply_stale: bool,
    issued: u64,
    watermark: u64,
    revision: u64,
    in_flight: usize,
    /// Generation of the outcome currently held in `result`.
    current: u64,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    hook_tx: Sender<u64>,
    hook_rx: Receiver<u64>,
}

impl SubmissionController {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        let (tx, rx) = mpsc::channel();
        let (hook_tx, hook_rx) = mpsc::channel();
        Self {
            document: String::new(),
            result: RenderResult::None,
            backend,
            on_markup: None,
            apply_stale: false,
            issued: 0,
            watermark: 0,
            revision: 0,
            in_flight: 0,
            current: 0,
            tx,
            rx,
            hook_tx,
            hook_rx,
        }
    }

    #[must_use]
    pub const fn with_apply_stale(mut self, apply_stale: bool) -> Self {
        self.apply_stale = apply_stale;
        self
    }

    #[must_use]
    pub fn with_markup_hook(mut self, hook: MarkupHook) -> Self {
        self.on_markup = Some(hook);
        self
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub const fn result(&self) -> &RenderResult {
        &self.result
    }

    /// Number of outcomes applied so far. Changes exactly when
    /// [`result`](Self::result) does.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub const fn backend(&self) -> &Arc<dyn RenderBackend> {
        &self.backend
    }

    /// Replace the stored document. Never triggers a submission.
    pub fn update_document(&mut self, text: &str) {
        if self.document != text {
            text.clone_into(&mut self.document);
        }
    }

    /// Snapshot the document under a fresh generation number.
    pub fn begin(&mut self) -> PendingSubmission {
        self.issued += 1;
        self.in_flight += 1;
        PendingSubmission {
            generation: self.issued,
            request: SubmissionRequest::new(self.document.clone()),
        }
    }

    /// Issue a submission on a worker thread and return its generation.
    ///
    /// Returns immediately; the outcome arrives through [`poll`](Self::poll)
    /// or [`wait`](Self::wait).
    pub fn submit(&mut self) -> u64 {
        let PendingSubmission {
            generation,
            request,
        } = self.begin();
        debug!(generation, bytes = request.yaml().len(), "submitting document");

        let backend = Arc::clone(&self.backend);
        let hook = self.on_markup.clone();
        let tx = self.tx.clone();
        let hook_tx = self.hook_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("submit-{generation}"))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    perform(backend.as_ref(), &request)
                }))
                .unwrap_or_else(|_| {
                    Err(SubmitError::Transport("request worker panicked".to_string()))
                });
                let hook_input = hook.and_then(|hook| Some((hook, outcome.as_ref().ok()?.clone())));
                let _ = tx.send(Completion {
                    generation,
                    outcome,
                });
                if let Some((hook, markup)) = hook_input {
                    if panic::catch_unwind(AssertUnwindSafe(|| hook(&markup))).is_err() {
                        warn!(generation, "markup hook panicked");
                    }
                    let _ = hook_tx.send(generation);
                }
            });

        if let Err(err) = spawned {
            self.complete(Completion {
                generation,
                outcome: Err(SubmitError::Transport(format!(
                    "could not start request: {err}"
                ))),
            });
        }
        generation
    }

    /// Apply or discard one completion.
    pub fn complete(&mut self, completion: Completion) -> Resolution {
        let Completion {
            generation,
            outcome,
        } = completion;
        self.in_flight = self.in_flight.saturating_sub(1);

        if generation <= self.watermark && !self.apply_stale {
            debug!(
                generation,
                watermark = self.watermark,
                "discarding superseded response"
            );
            return Resolution::Discarded;
        }

        match &outcome {
            Ok(markup) => debug!(generation, bytes = markup.len(), "diagram markup received"),
            Err(err) => warn!(generation, kind = err.kind(), error = %err, "submission failed"),
        }
        self.watermark = self.watermark.max(generation);
        self.current = generation;
        self.revision += 1;
        self.result = RenderResult::from_outcome(outcome);
        Resolution::Applied
    }

    /// Apply every completion that has arrived. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.complete(completion) == Resolution::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Drain finished markup hooks. True when the hook for the outcome
    /// currently held in [`result`](Self::result) is among them.
    pub fn take_hook_finished(&mut self) -> bool {
        let mut current = false;
        while let Ok(generation) = self.hook_rx.try_recv() {
            current |= generation == self.current;
        }
        current
    }

    /// Block for up to `timeout` for the next finished markup hook and
    /// return its generation.
    pub fn wait_hook_finished(&mut self, timeout: Duration) -> Option<u64> {
        self.hook_rx.recv_timeout(timeout).ok()
    }

    /// Block for up to `timeout` for the next completion.
    pub fn wait(&mut self, timeout: Duration) -> Option<Resolution> {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => Some(self.complete(completion)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl fmt::Debug for SubmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionController")
            .field("document_len", &self.document.len())
            .field("result", &self.result)
            .field("issued", &self.issued)
            .field("watermark", &self.watermark)
            .field("in_flight", &self.in_flight)
            .field("apply_stale", &self.apply_stale)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::testing::{GatedBackend, PanickingBackend, SIMPLE_SVG, ScriptedBackend};
    use std::sync::Mutex;
    use std::time::Instant;

    fn controller(backend: impl RenderBackend + 'static) -> SubmissionController {
        SubmissionController::new(Arc::new(backend))
    }

    fn wait_applied(ctl: &mut SubmissionController, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while ctl.revision() < count {
            assert!(Instant::now() < deadline, "timed out waiting for completion");
            ctl.wait(Duration::from_millis(50));
        }
    }

    fn ok(generation: u64, markup: &str) -> Completion {
        Completion {
            generation,
            outcome: Ok(markup.to_string()),
        }
    }

    #[test]
    fn test_starts_with_no_result_and_empty_document() {
        let ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
        assert_eq!(ctl.result(), &RenderResult::None);
        assert_eq!(ctl.document(), "");
        assert_eq!(ctl.in_flight(), 0);
    }

    #[test]
    fn test_update_document_never_submits() {
        let backend = Arc::new(ScriptedBackend::svg(SIMPLE_SVG));
        let mut ctl = SubmissionController::new(backend.clone());
        ctl.update_document("a: 1");
        ctl.update_document("a: 2");
        assert_eq!(ctl.document(), "a: 2");
        assert_eq!(ctl.in_flight(), 0);
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_update_document_is_idempotent() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
        ctl.update_document("x");
        ctl.update_document("x");
        assert_eq!(ctl.document(), "x");
    }

    #[test]
    fn test_submit_success_records_markup() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
        ctl.update_document("Resources: {}");
        ctl.submit();
        wait_applied(&mut ctl, 1);
        assert_eq!(ctl.result(), &RenderResult::Markup(SIMPLE_SVG.to_string()));
        assert_eq!(ctl.in_flight(), 0);
    }

    #[test]
    fn test_submit_sends_document_snapshot() {
        let backend = Arc::new(ScriptedBackend::svg(SIMPLE_SVG));
        let mut ctl = SubmissionController::new(backend.clone());
        ctl.update_document("first");
        ctl.submit();
        ctl.update_document("second");
        wait_applied(&mut ctl, 1);
        assert_eq!(backend.seen.lock().unwrap().as_slice(), ["first"]);
    }

    #[test]
    fn test_backend_error_message_is_recorded() {
        let mut ctl = controller(ScriptedBackend::json_error(400, "empty template"));
        ctl.submit();
        wait_applied(&mut ctl, 1);
        assert_eq!(ctl.result(), &RenderResult::Error("empty template".to_string()));
    }

    #[test]
    fn test_transport_failure_is_recorded_not_raised() {
        let mut ctl = controller(ScriptedBackend::always(Err(SubmitError::Transport(
            "connection refused".to_string(),
        ))));
        ctl.submit();
        wait_applied(&mut ctl, 1);
        let message = ctl.result().error().unwrap();
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_worker_panic_resolves_as_error() {
        let mut ctl = controller(PanickingBackend);
        ctl.submit();
        wait_applied(&mut ctl, 1);
        assert!(ctl.result().error().unwrap().contains("panicked"));
        assert_eq!(ctl.in_flight(), 0);
    }

    #[test]
    fn test_error_after_markup_replaces_result() {
        let mut ctl = controller(ScriptedBackend::json_error(400, "bad").then(Ok(
            crate::submit::BackendResponse::new(200, Some("image/svg+xml"), SIMPLE_SVG),
        )));
        ctl.submit();
        wait_applied(&mut ctl, 1);
        assert!(ctl.result().markup().is_some());
        ctl.submit();
        wait_applied(&mut ctl, 2);
        assert_eq!(ctl.result(), &RenderResult::Error("bad".to_string()));
    }

    #[test]
    fn test_generations_increase_per_submission() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
        let first = ctl.begin();
        let second = ctl.begin();
        assert!(second.generation > first.generation);
        assert_eq!(ctl.in_flight(), 2);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
        let a = ctl.begin();
        let b = ctl.begin();
        assert_eq!(ctl.complete(ok(b.generation, "B")), Resolution::Applied);
        assert_eq!(ctl.complete(ok(a.generation, "A")), Resolution::Discarded);
        assert_eq!(ctl.result(), &RenderResult::Markup("B".to_string()));
        assert_eq!(ctl.revision(), 1);
        assert_eq!(ctl.in_flight(), 0);
    }

    #[test]
    fn test_in_order_completions_are_all_applied() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
        let a = ctl.begin();
        let b = ctl.begin();
        assert_eq!(ctl.complete(ok(a.generation, "A")), Resolution::Applied);
        assert_eq!(ctl.complete(ok(b.generation, "B")), Resolution::Applied);
        assert_eq!(ctl.result(), &RenderResult::Markup("B".to_string()));
    }

    #[test]
    fn test_apply_stale_uses_last_resolved() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG)).with_apply_stale(true);
        let a = ctl.begin();
        let b = ctl.begin();
        ctl.complete(ok(b.generation, "B"));
        assert_eq!(ctl.complete(ok(a.generation, "A")), Resolution::Applied);
        assert_eq!(ctl.result(), &RenderResult::Markup("A".to_string()));
    }

    #[test]
    fn test_slow_first_request_cannot_overwrite_second() {
        let backend = Arc::new(GatedBackend::new());
        let (release_a, gate_a) = mpsc::channel();
        backend.hold("A", gate_a);
        let mut ctl = SubmissionController::new(backend);

        ctl.update_document("A");
        ctl.submit();
        ctl.update_document("B");
        ctl.submit();

        wait_applied(&mut ctl, 1);
        assert_eq!(ctl.result().markup(), Some(GatedBackend::markup_for("B").as_str()));

        release_a.send(()).unwrap();
        assert_eq!(
            ctl.wait(Duration::from_secs(5)),
            Some(Resolution::Discarded)
        );
        assert_eq!(ctl.result().markup(), Some(GatedBackend::markup_for("B").as_str()));
        assert_eq!(ctl.in_flight(), 0);
    }

    #[test]
    fn test_markup_hook_sees_received_markup() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG)).with_markup_hook(Arc::new(
            move |markup: &str| sink.lock().unwrap().push(markup.len()),
        ));
        let generation = ctl.submit();
        wait_applied(&mut ctl, 1);
        assert_eq!(ctl.wait_hook_finished(Duration::from_secs(5)), Some(generation));
        assert_eq!(seen.lock().unwrap().as_slice(), [SIMPLE_SVG.len()]);
        assert!(!ctl.take_hook_finished());
    }

    #[test]
    fn test_slow_markup_hook_does_not_hold_back_result() {
        let (release, gate) = mpsc::channel::<()>();
        let gate = Mutex::new(gate);
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG)).with_markup_hook(Arc::new(
            move |_: &str| {
                let _ = gate.lock().unwrap().recv();
            },
        ));
        ctl.submit();

        assert_eq!(ctl.wait(Duration::from_secs(5)), Some(Resolution::Applied));
        assert_eq!(ctl.result().markup(), Some(SIMPLE_SVG));
        assert_eq!(ctl.in_flight(), 0);
        assert!(!ctl.take_hook_finished());

        release.send(()).unwrap();
        let finished = ctl.wait_hook_finished(Duration::from_secs(5));
        assert_eq!(finished, Some(1));
    }

    #[test]
    fn test_panicking_markup_hook_still_resolves() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG))
            .with_markup_hook(Arc::new(|_: &str| panic!("prefetch exploded")));
        let generation = ctl.submit();

        assert_eq!(ctl.wait(Duration::from_secs(5)), Some(Resolution::Applied));
        assert_eq!(ctl.result().markup(), Some(SIMPLE_SVG));
        assert_eq!(ctl.in_flight(), 0);
        assert_eq!(ctl.wait_hook_finished(Duration::from_secs(5)), Some(generation));
    }

    #[test]
    fn test_hook_for_latest_result_is_current() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG))
            .with_markup_hook(Arc::new(|_: &str| {}));
        ctl.submit();
        wait_applied(&mut ctl, 1);
        ctl.wait_hook_finished(Duration::from_secs(5));
        ctl.submit();
        wait_applied(&mut ctl, 2);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !ctl.take_hook_finished() {
            assert!(Instant::now() < deadline, "timed out waiting for hook");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_poll_without_completions_applies_nothing() {
        let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
        assert_eq!(ctl.poll(), 0);
        assert_eq!(ctl.wait(Duration::from_millis(1)), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_document_resolves_to_a_result(doc in any::<String>()) {
                let mut ctl = controller(ScriptedBackend::json_error(400, "nope"));
                ctl.update_document(&doc);
                let pending = ctl.begin();
                prop_assert_eq!(pending.request.yaml(), doc.as_str());

                let outcome = perform(ctl.backend().as_ref(), &pending.request);
                ctl.complete(Completion { generation: pending.generation, outcome });
                prop_assert_eq!(ctl.result(), &RenderResult::Error("nope".to_string()));
            }

            #[test]
            fn highest_generation_always_wins(
                order in Just((1u64..=6).collect::<Vec<_>>()).prop_shuffle()
            ) {
                let mut ctl = controller(ScriptedBackend::svg(SIMPLE_SVG));
                for _ in 0..6 {
                    ctl.begin();
                }
                for generation in order {
                    ctl.complete(ok(generation, &generation.to_string()));
                }
                prop_assert_eq!(ctl.result(), &RenderResult::Markup("6".to_string()));
                prop_assert_eq!(ctl.in_flight(), 0);
            }
        }
    }
}
