// Job runner module
//
// Runs a ConversionRequest on a worker task, streams events back to the
// interface thread and supports cooperative cancellation.

use crate::metrics::JobMetrics;
use crate::models::request::ensure_writable_dir;
use crate::models::{
    BatchPolicy, ConversionRequest, ItemOutcome, ItemStatus, JobEvent, JobFailure, JobId,
    JobResult, JobState, JobStatus, ValidationError,
};
use crate::services::{ConversionAdapter, ConversionError, LogSink};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, watch};
use tracing::Instrument;

/// Maximum number of jobs running at once.
///
/// The front-end has a single "Convert" action, and the converter loads large
/// models per process, so jobs are never run side by side. A submission while a
/// job is active is rejected with [`JobError::Busy`] rather than queued.
pub const MAX_CONCURRENT_JOBS: usize = 1;

/// Reasons a submission is refused. Nothing reaches the worker in either case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("A conversion job is already running")]
    Busy,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Cloneable control side of a job: identity, state and the cancel flag.
///
/// The interface keeps one of these to cancel or query a job while another
/// part of the program consumes its events.
#[derive(Clone, Debug)]
pub struct JobControl {
    id: JobId,
    cancel_tx: Arc<watch::Sender<bool>>,
    state: Arc<RwLock<JobState>>,
}

impl JobControl {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_cancel_requested(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Ask the worker to stop at its next checkpoint.
    ///
    /// Returns `true` if this call raised the flag, `false` if the job had
    /// already finished or cancellation was already requested.
    fn request_cancel(&self) -> bool {
        let state = self.state();
        if state.is_terminal() {
            tracing::debug!("Cancel ignored for {}: already {:?}", self.id, state);
            return false;
        }

        let already_requested = self.cancel_tx.send_replace(true);
        if !already_requested {
            tracing::info!("Cancellation requested for {}", self.id);
        }
        !already_requested
    }
}

/// Handle returned by [`JobRunner::submit`]
///
/// Owns the receiving end of the job's event stream. Events for the job arrive
/// in emission order and the last one is always [`JobEvent::Finished`].
#[derive(Debug)]
pub struct JobHandle {
    control: JobControl,
    request: Arc<ConversionRequest>,
    events: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.control.id
    }

    pub fn state(&self) -> JobState {
        self.control.state()
    }

    pub fn control(&self) -> JobControl {
        self.control.clone()
    }

    /// The request this job is running
    pub fn request(&self) -> &Arc<ConversionRequest> {
        &self.request
    }

    pub fn cancel(&self) -> bool {
        self.control.request_cancel()
    }

    /// Next event, or `None` once the stream is exhausted
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Non-blocking poll for interface threads that drain events on a timer
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        self.events.try_recv().ok()
    }

    /// Blocking receive for plain threads outside the runtime.
    ///
    /// # Panics
    /// Panics if called from within an async context, like
    /// [`mpsc::UnboundedReceiver::blocking_recv`].
    pub fn blocking_recv(&mut self) -> Option<JobEvent> {
        self.events.blocking_recv()
    }

    /// Drain the stream and return the terminal result.
    pub async fn wait(mut self) -> Option<JobResult> {
        while let Some(event) = self.events.recv().await {
            if let JobEvent::Finished(result) = event {
                return Some(result);
            }
        }
        None
    }
}

/// Runs conversion jobs on the tokio runtime.
///
/// The runner is owned by the host and passed by reference to whatever needs
/// to submit or cancel jobs; it holds no global state.
pub struct JobRunner {
    adapter: Arc<dyn ConversionAdapter>,
    runtime: tokio::runtime::Handle,
    slots: Arc<Semaphore>,
    next_id: AtomicU64,
    metrics: Arc<JobMetrics>,
}

impl JobRunner {
    pub fn new(adapter: Arc<dyn ConversionAdapter>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            adapter,
            runtime,
            slots: Arc::new(Semaphore::new(MAX_CONCURRENT_JOBS)),
            next_id: AtomicU64::new(0),
            metrics: Arc::new(JobMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<JobMetrics> {
        &self.metrics
    }

    /// Whether a job currently holds the run slot
    pub fn is_busy(&self) -> bool {
        self.slots.available_permits() == 0
    }

    /// Start a job for `request`.
    ///
    /// The output directory is checked again here because it may have changed
    /// since the request was built.
    ///
    /// # Errors
    /// - [`JobError::Validation`] if the output directory is no longer writable
    /// - [`JobError::Busy`] if another job is running
    pub fn submit(&self, request: ConversionRequest) -> Result<JobHandle, JobError> {
        ensure_writable_dir(request.output_dir())?;

        let permit = Arc::clone(&self.slots).try_acquire_owned().map_err(|_| {
            tracing::warn!("Rejected submission: a job is already running");
            self.metrics.record_rejected_busy();
            JobError::Busy
        })?;

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let request = Arc::new(request);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let state = Arc::new(RwLock::new(JobState::Idle));

        let worker = Worker {
            id,
            request: Arc::clone(&request),
            adapter: Arc::clone(&self.adapter),
            events: events_tx,
            cancel: cancel_rx,
            state: Arc::clone(&state),
            metrics: Arc::clone(&self.metrics),
        };

        tracing::info!(
            "Submitting {} with {} input(s)",
            id,
            request.input_paths().len()
        );
        self.metrics.record_submitted();

        let span = tracing::info_span!("job", id = %id);
        self.runtime
            .spawn(async move { worker.run(permit).await }.instrument(span));

        Ok(JobHandle {
            control: JobControl {
                id,
                cancel_tx: Arc::new(cancel_tx),
                state,
            },
            request,
            events: events_rx,
        })
    }

    /// Request cooperative cancellation of a job.
    ///
    /// No-op returning `false` if the job already reached a terminal state.
    pub fn cancel(&self, control: &JobControl) -> bool {
        control.request_cancel()
    }
}

/// State owned by one job's worker task
struct Worker {
    id: JobId,
    request: Arc<ConversionRequest>,
    adapter: Arc<dyn ConversionAdapter>,
    events: mpsc::UnboundedSender<JobEvent>,
    cancel: watch::Receiver<bool>,
    state: Arc<RwLock<JobState>>,
    metrics: Arc<JobMetrics>,
}

impl Worker {
    async fn run(self, permit: OwnedSemaphorePermit) {
        let start = Instant::now();
        let inputs = self.request.input_paths();
        let total = inputs.len();

        self.set_state(JobState::Running);
        self.send(JobEvent::Started {
            job_id: self.id,
            total,
        });

        let log = LogSink::new(self.events.clone());
        log.line(format!(
            "Converting {} file(s) to {} with {}",
            total,
            self.request.output_format(),
            self.adapter.name()
        ));

        let mut items: Vec<ItemOutcome> = Vec::with_capacity(total);
        let mut first_failure: Option<JobFailure> = None;
        let mut cancelled = false;

        for (index, input) in inputs.iter().enumerate() {
            // Checkpoint: the only place cancellation is observed
            if *self.cancel.borrow() {
                tracing::warn!("Cancelled before item {}: {}", index + 1, input);
                log.line(format!("Cancelled before {}", display_name(input)));
                cancelled = true;
                break;
            }

            self.send(JobEvent::ItemStarted {
                index,
                total,
                input: input.clone(),
            });
            log.line(format!(
                "Processing: {} ({}/{})",
                display_name(input),
                index + 1,
                total
            ));

            let item_start = Instant::now();
            let outcome = self.convert_one(input, &log).await;
            self.metrics.record_item(outcome.is_ok(), item_start.elapsed());

            let item = match outcome {
                Ok(artifact) => ItemOutcome::converted(index, input.clone(), artifact),
                Err(e) => {
                    tracing::error!("Conversion of {} failed: {}", input, e);
                    first_failure.get_or_insert_with(|| JobFailure {
                        message: e.to_string(),
                        origin: e.origin(),
                        input: Some(input.clone()),
                    });
                    ItemOutcome::failed(index, input.clone(), e.to_string())
                }
            };
            log.line(item.summary_line());

            let failed = item.status == ItemStatus::Failed;
            self.send(JobEvent::ItemFinished(item.clone()));
            items.push(item);
            self.send(JobEvent::Progress {
                completed: index + 1,
                total,
            });

            if failed && self.request.batch_policy() == BatchPolicy::AbortOnFirstFailure {
                if index + 1 < total {
                    log.line(format!(
                        "Stopping batch after failure; {} file(s) not converted",
                        total - index - 1
                    ));
                }
                break;
            }
        }

        for (index, input) in inputs.iter().enumerate().skip(items.len()) {
            items.push(ItemOutcome::not_started(index, input.clone()));
        }

        let failed = items
            .iter()
            .filter(|i| i.status == ItemStatus::Failed)
            .count();
        let status = if cancelled {
            JobStatus::Cancelled
        } else if failed > 0 {
            JobStatus::Failure
        } else {
            JobStatus::Success
        };

        let error = first_failure.map(|mut failure| {
            if total > 1 {
                failure.message = format!(
                    "{} of {} items failed; first error: {}",
                    failed, total, failure.message
                );
            }
            failure
        });

        if total > 1 {
            log.line("Batch conversion results:");
            for item in &items {
                log.line(format!("  {}", item.summary_line()));
            }
        }

        let mut result = JobResult {
            job_id: self.id,
            status,
            artifact_paths: items.iter().filter_map(|i| i.artifact.clone()).collect(),
            log_lines: Vec::new(),
            error,
            items,
            elapsed: start.elapsed(),
        };
        log.line(result.summary());
        result.log_lines = log.take_lines();

        tracing::info!(
            "{} finished: {} in {:.2}s",
            self.id,
            status,
            result.elapsed.as_secs_f32()
        );

        // Terminal state and a free slot are both visible before Finished arrives
        self.set_state(status.into());
        self.metrics.record_finished(status);
        drop(permit);
        self.send(JobEvent::Finished(result));
    }

    /// Run one adapter call in its own task so a panic becomes an item failure.
    async fn convert_one(
        &self,
        input: &Utf8Path,
        log: &LogSink,
    ) -> Result<Utf8PathBuf, ConversionError> {
        let adapter = Arc::clone(&self.adapter);
        let request = Arc::clone(&self.request);
        let input = input.to_path_buf();
        let log = log.clone();

        let task = tokio::spawn(async move { adapter.convert(&request, &input, &log).await });

        match task.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ConversionError::Panicked(message))
            }
            Err(join_error) => Err(ConversionError::Aborted(join_error.to_string())),
        }
    }

    fn set_state(&self, state: JobState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn send(&self, event: JobEvent) {
        // The interface may have dropped its handle; the job still runs to completion
        if self.events.send(event).is_err() {
            tracing::trace!("Event receiver for {} is gone", self.id);
        }
    }
}

fn display_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct EchoAdapter;

    #[async_trait::async_trait]
    impl ConversionAdapter for EchoAdapter {
        async fn convert(
            &self,
            request: &ConversionRequest,
            input: &Utf8Path,
            log: &LogSink,
        ) -> Result<Utf8PathBuf, ConversionError> {
            log.line(format!("echo {}", input));
            let artifact = request.artifact_path_for(input);
            fs::write(&artifact, "converted")?;
            Ok(artifact)
        }
    }

    fn request_with(dir: &Utf8Path, names: &[&str]) -> ConversionRequest {
        let inputs: Vec<Utf8PathBuf> = names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, b"x").unwrap();
                path
            })
            .collect();
        ConversionRequest::builder()
            .input_paths(inputs)
            .ocr_enabled(false)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_job_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let runner = JobRunner::new(Arc::new(EchoAdapter), tokio::runtime::Handle::current());

        let handle = runner.submit(request_with(&dir, &["a.pdf"])).unwrap();
        let control = handle.control();
        let result = handle.wait().await.unwrap();

        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.artifact_paths, vec![dir.join("a.md")]);
        assert!(result.log_lines.iter().any(|l| l.contains("echo")));
        assert_eq!(control.state(), JobState::Succeeded);
        assert!(!runner.is_busy());
    }

    #[tokio::test]
    async fn test_second_submit_is_busy() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let runner = JobRunner::new(Arc::new(EchoAdapter), tokio::runtime::Handle::current());

        let first = runner.submit(request_with(&dir, &["a.pdf"])).unwrap();
        let second = runner.submit(request_with(&dir, &["b.pdf"]));
        assert_eq!(second.unwrap_err(), JobError::Busy);

        first.wait().await.unwrap();
        assert!(runner.submit(request_with(&dir, &["c.pdf"])).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_after_finish_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let runner = JobRunner::new(Arc::new(EchoAdapter), tokio::runtime::Handle::current());

        let handle = runner.submit(request_with(&dir, &["a.pdf"])).unwrap();
        let control = handle.control();
        let result = handle.wait().await.unwrap();

        assert!(!runner.cancel(&control));
        assert!(!control.is_cancel_requested());
        assert_eq!(control.state(), JobState::Succeeded);
        assert_eq!(result.status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_submit_rechecks_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let out = dir.join("out");
        fs::create_dir(&out).unwrap();
        fs::write(dir.join("a.pdf"), b"x").unwrap();

        let request = ConversionRequest::builder()
            .input_path(dir.join("a.pdf"))
            .output_dir(&out)
            .ocr_enabled(false)
            .build()
            .unwrap();
        fs::remove_dir(&out).unwrap();

        let runner = JobRunner::new(Arc::new(EchoAdapter), tokio::runtime::Handle::current());
        let result = runner.submit(request);
        assert!(matches!(
            result,
            Err(JobError::Validation(ValidationError::OutputDirMissing(_)))
        ));
        assert_eq!(
            runner.metrics().jobs_submitted.load(Ordering::Relaxed),
            0
        );
    }
}
