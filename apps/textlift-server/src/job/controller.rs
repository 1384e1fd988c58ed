//! Recognition Job Controller
//!
//! Owns the state of one session: the image source, the selected language and
//! the current recognition job. It is the only writer of that state.
//!
//! Every job is tagged with a generation number. Engine callbacks carry the
//! generation they were started with and are dropped unless it is still the
//! current one and the job is still running. This is what keeps a late result
//! from landing after `reset()` or after a new image superseded the job.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::{
    JobError, JobSnapshot, RecognitionJob, SessionView, INVALID_IMAGE_URL_MESSAGE,
    NO_IMAGE_MESSAGE,
};
use crate::clipboard::ClipboardSink;
use crate::ocr::{LanguageCode, OcrError, Recognition, RecognitionEngine, RecognitionPhase};
use crate::source::{ImageReference, ImageSourceResolver, UploadedImage};

/// Handle to a started job
pub struct JobTicket {
    pub generation: u64,
    pub handle: JoinHandle<()>,
}

/// Mutable session state, guarded by the controller's lock
#[derive(Debug, Default)]
struct SessionState {
    source: ImageSourceResolver,
    language: LanguageCode,
    job: RecognitionJob,
    generation: u64,
}

impl SessionState {
    fn view(&self) -> SessionView {
        let image = self.source.authoritative();
        SessionView {
            job: self.job.snapshot(),
            image: image.as_ref().map(ImageReference::kind),
            image_url: self.source.url().map(str::to_string),
            language: self.language,
            convert_label: SessionView::label_for(&self.job),
            can_convert: !self.job.is_running(),
            started_at: self.job.started_at,
            finished_at: self.job.finished_at,
        }
    }

    /// Drop the current job; a running one is superseded
    fn discard_job(&mut self) {
        if self.job.is_running() {
            self.generation += 1;
        }
        self.job = RecognitionJob::default();
    }
}

/// Drives recognition jobs for a single session
#[derive(Clone)]
pub struct JobController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    engine: Arc<dyn RecognitionEngine>,
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionView>,
}

impl JobController {
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self::with_language(engine, LanguageCode::default())
    }

    pub fn with_language(engine: Arc<dyn RecognitionEngine>, language: LanguageCode) -> Self {
        let state = SessionState {
            language,
            ..SessionState::default()
        };
        let (updates, _) = watch::channel(state.view());

        Self {
            inner: Arc::new(ControllerInner {
                engine,
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    // ========================================================================
    // Image Source
    // ========================================================================

    /// Select an uploaded image. Clears the URL, the result, the progress and
    /// the error. A running job is superseded.
    pub fn set_from_upload(&self, image: UploadedImage) {
        let bytes = image.bytes.len();
        self.inner.update(|state| {
            state.source.set_upload(image);
            state.discard_job();
        });
        tracing::debug!(bytes, "Image uploaded");
    }

    /// Store the URL field contents and clear the error
    pub fn set_from_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.inner.update(|state| {
            state.source.set_url(url);
            state.job.error_message = None;
        });
    }

    pub fn has_image(&self) -> bool {
        self.inner.state.lock().source.has_image()
    }

    /// The reference a conversion would use right now
    pub fn image(&self) -> Option<ImageReference> {
        self.inner.state.lock().source.authoritative()
    }

    /// A URL image failed to load. Surfaces a non-fatal error and leaves any
    /// running job alone.
    pub fn report_image_load_error(&self) {
        self.inner.update(|state| {
            state.job.error_message = Some(INVALID_IMAGE_URL_MESSAGE.to_string());
        });
    }

    pub fn set_language(&self, language: LanguageCode) {
        self.inner.update(|state| state.language = language);
    }

    pub fn language(&self) -> LanguageCode {
        self.inner.state.lock().language
    }

    // ========================================================================
    // Job Lifecycle
    // ========================================================================

    /// Start recognizing the authoritative image in the selected language.
    ///
    /// Returns at once; the engine runs on a spawned task. Fails with
    /// [`JobError::Busy`] while a job is running and with
    /// [`JobError::NoImage`] when there is nothing to recognize.
    pub fn start(&self) -> Result<JobTicket, JobError> {
        let (generation, image, language) = self.inner.update(|state| {
            if state.job.is_running() {
                return Err(JobError::Busy);
            }

            let Some(image) = state.source.authoritative() else {
                state.job.error_message = Some(NO_IMAGE_MESSAGE.to_string());
                return Err(JobError::NoImage);
            };

            state.generation += 1;
            state.job.begin();
            Ok((state.generation, image, state.language))
        })?;

        tracing::info!(
            generation,
            source = ?image.kind(),
            language = %language,
            "Starting recognition job"
        );

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner.run(generation, image, language).await;
        });

        Ok(JobTicket { generation, handle })
    }

    /// Clear the image and return the job to idle. Does not cancel the engine
    /// call; its late callbacks are discarded.
    pub fn reset(&self) {
        self.inner.update(|state| {
            state.source.clear();
            state.discard_job();
        });
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.inner.state.lock().job.snapshot()
    }

    pub fn view(&self) -> SessionView {
        self.inner.state.lock().view()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().job.is_running()
    }

    /// Generation of the most recent job
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Receive a fresh view after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.updates.subscribe()
    }

    // ========================================================================
    // Clipboard
    // ========================================================================

    /// Copy the extracted text. Failures are logged and reported as `false`.
    pub async fn copy_result(&self, clipboard: &dyn ClipboardSink) -> bool {
        let text = self.snapshot().result_text.unwrap_or_default();

        match clipboard.write_text(&text).await {
            Ok(()) => {
                tracing::debug!(chars = text.chars().count(), "Text copied to clipboard");
                true
            }
            Err(e) => {
                tracing::warn!("Failed to copy text: {}", e);
                false
            }
        }
    }
}

impl ControllerInner {
    /// Mutate state under the lock, then publish the new view
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (result, view) = {
            let mut state = self.state.lock();
            let result = f(&mut state);
            (result, state.view())
        };
        self.updates.send_replace(view);
        result
    }

    async fn run(self: Arc<Self>, generation: u64, image: ImageReference, language: LanguageCode) {
        let progress = |phase: RecognitionPhase, fraction: f32| {
            self.on_progress(generation, phase, fraction);
        };

        let outcome = self.engine.recognize(&image, language, &progress).await;
        self.finish(generation, outcome);
    }

    fn on_progress(&self, generation: u64, phase: RecognitionPhase, fraction: f32) {
        if phase != RecognitionPhase::RecognizingText {
            tracing::trace!(generation, %phase, fraction, "Engine progress");
            return;
        }

        let view = {
            let mut state = self.state.lock();
            if state.generation != generation || !state.job.is_running() {
                tracing::debug!(generation, "Discarding stale progress");
                return;
            }
            if !state.job.advance(fraction) {
                return;
            }
            state.view()
        };
        self.updates.send_replace(view);
    }

    fn finish(&self, generation: u64, outcome: Result<Recognition, OcrError>) {
        let view = {
            let mut state = self.state.lock();
            if state.generation != generation || !state.job.is_running() {
                tracing::debug!(generation, "Discarding stale recognition result");
                return;
            }

            match outcome {
                Ok(recognition) => {
                    tracing::info!(
                        generation,
                        backend = ?recognition.backend,
                        chars = recognition.text.chars().count(),
                        "Recognition succeeded"
                    );
                    state.job.succeed(recognition.text);
                }
                Err(e) => {
                    tracing::warn!(generation, error = %e, "Recognition failed");
                    state.job.fail();
                }
            }
            state.view()
        };
        self.updates.send_replace(view);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{oneshot, Mutex as AsyncMutex};

    use super::*;
    use crate::clipboard::{ClipboardError, MemoryClipboard};
    use crate::job::types::{JobStatus, NO_TEXT_FOUND, RECOGNITION_FAILED_MESSAGE};
    use crate::ocr::{OcrBackendKind, ProgressSink};

    /// Replays a fixed progress script, then resolves
    struct ScriptedEngine {
        progress: Vec<(RecognitionPhase, f32)>,
        outcome: Result<String, String>,
        calls: AtomicUsize,
        seen: parking_lot::Mutex<Vec<(ImageReference, LanguageCode)>>,
    }

    impl ScriptedEngine {
        fn new(progress: Vec<(RecognitionPhase, f32)>, outcome: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                progress,
                outcome: outcome.map(str::to_string).map_err(str::to_string),
                calls: AtomicUsize::new(0),
                seen: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecognitionEngine for ScriptedEngine {
        async fn recognize(
            &self,
            image: &ImageReference,
            language: LanguageCode,
            progress: &dyn ProgressSink,
        ) -> Result<Recognition, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push((image.clone(), language));
            for (phase, fraction) in &self.progress {
                progress.report(*phase, *fraction);
            }
            match &self.outcome {
                Ok(text) => Ok(Recognition {
                    text: text.clone(),
                    backend: OcrBackendKind::Tesseract,
                }),
                Err(message) => Err(OcrError::ProcessingError(message.clone())),
            }
        }
    }

    /// Blocks each call until the test releases it
    struct GatedEngine {
        calls: AtomicUsize,
        gates: AsyncMutex<Vec<oneshot::Receiver<Result<String, String>>>>,
    }

    impl GatedEngine {
        fn new(gates: Vec<oneshot::Receiver<Result<String, String>>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gates: AsyncMutex::new(gates),
            })
        }
    }

    #[async_trait]
    impl RecognitionEngine for GatedEngine {
        async fn recognize(
            &self,
            _image: &ImageReference,
            _language: LanguageCode,
            progress: &dyn ProgressSink,
        ) -> Result<Recognition, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().await.remove(0);
            progress.report(RecognitionPhase::RecognizingText, 0.3);
            let outcome = gate.await.unwrap_or_else(|_| Err("gate dropped".to_string()));
            progress.report(RecognitionPhase::RecognizingText, 0.9);
            outcome
                .map(|text| Recognition {
                    text,
                    backend: OcrBackendKind::Ollama,
                })
                .map_err(OcrError::ProcessingError)
        }
    }

    fn recognizing(fraction: f32) -> (RecognitionPhase, f32) {
        (RecognitionPhase::RecognizingText, fraction)
    }

    fn image_x() -> UploadedImage {
        UploadedImage::new("image/png", vec![0x89, b'P', b'N', b'G'])
    }

    fn idle() -> JobSnapshot {
        JobSnapshot {
            status: JobStatus::Idle,
            progress_percent: 0,
            result_text: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_upload_success_scenario() {
        let engine = ScriptedEngine::new(
            vec![recognizing(0.10), recognizing(0.55), recognizing(1.0)],
            Ok("Hello"),
        );
        let controller = JobController::new(engine.clone());
        controller.set_from_upload(image_x());
        controller.set_language(LanguageCode::Eng);

        let ticket = controller.start().unwrap();
        ticket.handle.await.unwrap();

        assert_eq!(
            controller.snapshot(),
            JobSnapshot {
                status: JobStatus::Succeeded,
                progress_percent: 100,
                result_text: Some("Hello".to_string()),
                error_message: None,
            }
        );
        assert_eq!(engine.calls(), 1);
        assert_eq!(
            engine.seen.lock()[0],
            (ImageReference::Upload(image_x()), LanguageCode::Eng)
        );
    }

    #[tokio::test]
    async fn test_url_failure_scenario() {
        let engine = ScriptedEngine::new(vec![recognizing(0.2)], Err("connection refused"));
        let controller = JobController::new(engine.clone());
        controller.set_from_url("http://bad");

        controller.start().unwrap().handle.await.unwrap();

        assert_eq!(
            controller.snapshot(),
            JobSnapshot {
                status: JobStatus::Failed,
                progress_percent: 20,
                result_text: None,
                error_message: Some(RECOGNITION_FAILED_MESSAGE.to_string()),
            }
        );
        assert_eq!(
            engine.seen.lock()[0].0,
            ImageReference::Url("http://bad".to_string())
        );
    }

    #[tokio::test]
    async fn test_start_without_image_never_calls_engine() {
        let engine = ScriptedEngine::new(vec![], Ok("unused"));
        let controller = JobController::new(engine.clone());
        let generation = controller.generation();

        let result = controller.start();

        assert!(matches!(result, Err(JobError::NoImage)));
        assert_eq!(
            controller.snapshot(),
            JobSnapshot {
                error_message: Some(NO_IMAGE_MESSAGE.to_string()),
                ..idle()
            }
        );
        assert_eq!(controller.generation(), generation);
        tokio::task::yield_now().await;
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_result_fallback() {
        let engine = ScriptedEngine::new(vec![recognizing(1.0)], Ok(""));
        let controller = JobController::new(engine);
        controller.set_from_upload(image_x());

        controller.start().unwrap().handle.await.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.result_text.as_deref(), Some(NO_TEXT_FOUND));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_filtered_by_phase() {
        let engine = ScriptedEngine::new(
            vec![
                (RecognitionPhase::LoadingImage, 1.0),
                recognizing(0.3),
                recognizing(0.1),
                (RecognitionPhase::InitializingApi, 0.9),
                recognizing(0.6),
                recognizing(0.5),
            ],
            Err("stop"),
        );
        let controller = JobController::new(engine);
        controller.set_from_upload(image_x());
        let mut updates = controller.subscribe();

        let ticket = controller.start().unwrap();
        let mut observed = Vec::new();
        loop {
            if updates.changed().await.is_err() {
                break;
            }
            let view = updates.borrow_and_update().clone();
            observed.push(view.job.progress_percent);
            if view.can_convert {
                break;
            }
        }
        ticket.handle.await.unwrap();

        assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", observed);
        assert_eq!(controller.snapshot().progress_percent, 60);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let engine = ScriptedEngine::new(vec![], Ok("unused"));
        let controller = JobController::new(engine);

        controller.reset();
        assert_eq!(controller.snapshot(), idle());
        controller.reset();
        controller.reset();
        assert_eq!(controller.snapshot(), idle());
        assert_eq!(controller.generation(), 0);
        assert!(!controller.has_image());
    }

    #[tokio::test]
    async fn test_reset_after_success_clears_everything() {
        let engine = ScriptedEngine::new(vec![recognizing(1.0)], Ok("text"));
        let controller = JobController::new(engine);
        controller.set_from_upload(image_x());
        controller.start().unwrap().handle.await.unwrap();

        controller.reset();

        assert_eq!(controller.snapshot(), idle());
        assert_eq!(controller.image(), None);
    }

    #[tokio::test]
    async fn test_terminal_state_accepts_new_start() {
        let engine = ScriptedEngine::new(vec![recognizing(1.0)], Err("nope"));
        let controller = JobController::new(engine.clone());
        controller.set_from_url("http://bad");

        controller.start().unwrap().handle.await.unwrap();
        assert_eq!(controller.snapshot().status, JobStatus::Failed);

        let ticket = controller.start().unwrap();
        assert_eq!(ticket.generation, 2);
        ticket.handle.await.unwrap();
        assert_eq!(controller.snapshot().status, JobStatus::Failed);
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test]
    async fn test_start_while_running_is_busy() {
        let (release, gate) = oneshot::channel();
        let engine = GatedEngine::new(vec![gate]);
        let controller = JobController::new(engine.clone());
        controller.set_from_upload(image_x());

        let ticket = controller.start().unwrap();
        let busy = controller.start();
        assert!(matches!(busy, Err(JobError::Busy)));
        assert!(!controller.view().can_convert);

        release.send(Ok("done".to_string())).unwrap();
        ticket.handle.await.unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.snapshot().result_text.as_deref(), Some("done"));
        assert_eq!(controller.snapshot().status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_result_after_reset_is_discarded() {
        let (release, gate) = oneshot::channel();
        let engine = GatedEngine::new(vec![gate]);
        let controller = JobController::new(engine);
        controller.set_from_upload(image_x());

        let ticket = controller.start().unwrap();
        controller.reset();
        release.send(Ok("late".to_string())).unwrap();
        ticket.handle.await.unwrap();

        assert_eq!(controller.snapshot(), idle());
    }

    #[tokio::test]
    async fn test_superseded_job_cannot_overwrite_newer_one() {
        let (release_first, first) = oneshot::channel();
        let (release_second, second) = oneshot::channel();
        let engine = GatedEngine::new(vec![first, second]);
        let controller = JobController::new(engine);

        controller.set_from_upload(image_x());
        let old = controller.start().unwrap();

        // A new upload supersedes the running job
        controller.set_from_upload(image_x());
        assert_eq!(controller.snapshot(), idle());
        let new = controller.start().unwrap();
        assert!(new.generation > old.generation);

        release_first.send(Ok("stale".to_string())).unwrap();
        old.handle.await.unwrap();
        assert_eq!(controller.snapshot().status, JobStatus::Running);

        release_second.send(Ok("fresh".to_string())).unwrap();
        new.handle.await.unwrap();
        assert_eq!(controller.snapshot().result_text.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_terminal_view_is_published() {
        let engine = ScriptedEngine::new(vec![recognizing(0.5)], Ok("once"));
        let controller = JobController::new(engine);
        controller.set_from_upload(image_x());
        let mut updates = controller.subscribe();

        controller.start().unwrap().handle.await.unwrap();

        let view = updates.borrow_and_update().clone();
        assert_eq!(view.job.status, JobStatus::Succeeded);
        assert_eq!(view.job.result_text.as_deref(), Some("once"));
        assert!(view.finished_at.is_some());
        assert!(view.job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_url_field_does_not_clear_upload() {
        let engine = ScriptedEngine::new(vec![], Ok("x"));
        let controller = JobController::new(engine.clone());
        controller.set_from_upload(image_x());
        controller.set_from_url("http://example.com/y.png");

        assert_eq!(
            controller.image(),
            Some(ImageReference::Url("http://example.com/y.png".to_string()))
        );

        controller.set_from_url("");
        assert_eq!(controller.image(), Some(ImageReference::Upload(image_x())));
    }

    #[tokio::test]
    async fn test_image_load_error_does_not_touch_running_job() {
        let (release, gate) = oneshot::channel();
        let engine = GatedEngine::new(vec![gate]);
        let controller = JobController::new(engine);
        controller.set_from_url("http://example.com/broken");

        let ticket = controller.start().unwrap();
        controller.report_image_load_error();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.error_message.as_deref(), Some(INVALID_IMAGE_URL_MESSAGE));

        // Typing in the URL field clears the error again
        controller.set_from_url("http://example.com/broken2");
        assert_eq!(controller.snapshot().error_message, None);

        release.send(Ok("ok".to_string())).unwrap();
        ticket.handle.await.unwrap();
        assert_eq!(controller.snapshot().status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_view_label_and_language() {
        let engine = ScriptedEngine::new(vec![], Ok("x"));
        let controller = JobController::with_language(engine, LanguageCode::Fra);

        let view = controller.view();
        assert_eq!(view.language, LanguageCode::Fra);
        assert_eq!(view.convert_label, "Convert Image to Text");
        assert!(view.can_convert);
        assert_eq!(view.image, None);
    }

    struct BrokenClipboard;

    #[async_trait]
    impl ClipboardSink for BrokenClipboard {
        async fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Unavailable("no display".to_string()))
        }
    }

    #[tokio::test]
    async fn test_copy_result() {
        let engine = ScriptedEngine::new(vec![], Ok("copy me"));
        let controller = JobController::new(engine);
        controller.set_from_upload(image_x());
        controller.start().unwrap().handle.await.unwrap();

        let clipboard = MemoryClipboard::new();
        assert!(controller.copy_result(&clipboard).await);
        assert_eq!(clipboard.contents().as_deref(), Some("copy me"));

        assert!(!controller.copy_result(&BrokenClipboard).await);
        // Clipboard failures never change the job
        assert_eq!(controller.snapshot().status, JobStatus::Succeeded);
    }
}
