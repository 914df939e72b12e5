use crate::models::{ConversionRequest, FailureOrigin, JobEvent};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors a conversion adapter can report for a single input
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to start converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter exited with code {code}: {detail}")]
    ProcessFailed { code: i32, detail: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Converter finished but {0} was not written")]
    ArtifactMissing(Utf8PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Converter panicked: {0}")]
    Panicked(String),

    /// The job runner lost the task running the conversion, e.g. during runtime shutdown.
    #[error("Conversion task aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Other(String),
}

impl ConversionError {
    /// Which side of the job runner boundary produced the error
    pub fn origin(&self) -> FailureOrigin {
        match self {
            ConversionError::Aborted(_) => FailureOrigin::Worker,
            _ => FailureOrigin::Adapter,
        }
    }
}

/// The seam to the external document converter.
///
/// Implementations turn one input of a [`ConversionRequest`] into one artifact on
/// disk. Calls may block for a long time and are never interrupted by the job
/// runner; cancellation only takes effect between calls.
#[async_trait::async_trait]
pub trait ConversionAdapter: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &'static str {
        "converter"
    }

    /// Convert `input` according to `request`, returning the written artifact path.
    ///
    /// Progress output should go to `log`; it is streamed to the interface and
    /// recorded in the job result.
    async fn convert(
        &self,
        request: &ConversionRequest,
        input: &Utf8Path,
        log: &LogSink,
    ) -> Result<Utf8PathBuf, ConversionError>;
}

/// Per-job log writer.
///
/// Every line is both recorded (for [`crate::models::JobResult::log_lines`]) and
/// streamed as a [`JobEvent::Log`]. Recording and sending happen under one lock,
/// so the recorded order always matches the delivered order.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<LogSinkInner>,
}

struct LogSinkInner {
    lines: Mutex<Vec<String>>,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl LogSink {
    pub fn new(events: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self {
            inner: Arc::new(LogSinkInner {
                lines: Mutex::new(Vec::new()),
                events: Some(events),
            }),
        }
    }

    /// A sink that only records lines; useful when driving an adapter directly.
    pub fn detached() -> Self {
        Self {
            inner: Arc::new(LogSinkInner {
                lines: Mutex::new(Vec::new()),
                events: None,
            }),
        }
    }

    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(target: "docforge::job_log", "{}", line);

        let mut lines = self.inner.lines.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(events) = &self.inner.events {
            // The receiver may already be gone if the interface stopped listening
            let _ = events.send(JobEvent::Log { line: line.clone() });
        }
        lines.push(line);
    }

    /// Snapshot of the lines recorded so far
    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.lines.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("lines", &self.lines().len())
            .field("streaming", &self.inner.events.is_some())
            .finish()
    }
}
