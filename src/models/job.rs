use camino::Utf8PathBuf;
use std::fmt;
use std::time::Duration;

/// Identifier assigned by the job runner at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle of a single job.
///
/// `Idle → Running → {Succeeded, Failed, Cancelled}`. Terminal states are final;
/// running the same request again needs a new submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Final status reported in a [`JobResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failure,
    Cancelled,
}

impl From<JobStatus> for JobState {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Success => JobState::Succeeded,
            JobStatus::Failure => JobState::Failed,
            JobStatus::Cancelled => JobState::Cancelled,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Status of one input within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Converted,
    Failed,
    /// Never handed to the adapter (cancelled or aborted before its turn).
    NotStarted,
}

/// Outcome for one input file
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    /// Zero-based position in the request's input list
    pub index: usize,
    pub input: Utf8PathBuf,
    pub status: ItemStatus,
    pub artifact: Option<Utf8PathBuf>,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn converted(index: usize, input: Utf8PathBuf, artifact: Utf8PathBuf) -> Self {
        Self {
            index,
            input,
            status: ItemStatus::Converted,
            artifact: Some(artifact),
            error: None,
        }
    }

    pub fn failed(index: usize, input: Utf8PathBuf, error: String) -> Self {
        Self {
            index,
            input,
            status: ItemStatus::Failed,
            artifact: None,
            error: Some(error),
        }
    }

    pub fn not_started(index: usize, input: Utf8PathBuf) -> Self {
        Self {
            index,
            input,
            status: ItemStatus::NotStarted,
            artifact: None,
            error: None,
        }
    }

    /// One-line summary as shown in the results log
    pub fn summary_line(&self) -> String {
        let name = self.input.file_name().unwrap_or(self.input.as_str());
        match self.status {
            ItemStatus::Converted => {
                let artifact = self
                    .artifact
                    .as_ref()
                    .and_then(|a| a.file_name())
                    .unwrap_or("?");
                format!("✔ {} → {}", name, artifact)
            }
            ItemStatus::Failed => format!(
                "✘ {} failed: {}",
                name,
                self.error.as_deref().unwrap_or("unknown error")
            ),
            ItemStatus::NotStarted => format!("– {} not converted", name),
        }
    }
}

/// Where a job failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The conversion adapter returned an error or panicked
    Adapter,
    /// The job runner itself could not proceed
    Worker,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOrigin::Adapter => f.write_str("adapter"),
            FailureOrigin::Worker => f.write_str("worker"),
        }
    }
}

/// Structured description of why a job failed
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub message: String,
    pub origin: FailureOrigin,
    /// Input that triggered the first failure, if any
    pub input: Option<Utf8PathBuf>,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{} ({}: {})", self.message, self.origin, input),
            None => write!(f, "{} ({})", self.message, self.origin),
        }
    }
}

/// Terminal result of a job, delivered exactly once as the last event
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Written artifacts in input order
    pub artifact_paths: Vec<Utf8PathBuf>,
    /// Every log line the job emitted, in emission order
    pub log_lines: Vec<String>,
    pub error: Option<JobFailure>,
    pub items: Vec<ItemOutcome>,
    pub elapsed: Duration,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    pub fn converted_count(&self) -> usize {
        self.count(ItemStatus::Converted)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn not_started_count(&self) -> usize {
        self.count(ItemStatus::NotStarted)
    }

    /// Some inputs converted while others failed
    pub fn is_partial_failure(&self) -> bool {
        self.status == JobStatus::Failure && self.converted_count() > 0
    }

    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Status line for the interface
    pub fn summary(&self) -> String {
        let total = self.items.len();
        match self.status {
            JobStatus::Success if total == 1 => match self.artifact_paths.first() {
                Some(path) => format!("Conversion complete: {}", path),
                None => "Conversion complete".to_string(),
            },
            JobStatus::Success => {
                format!("Batch conversion complete: {} files processed", total)
            }
            JobStatus::Failure => format!(
                "{} of {} items failed ({} converted)",
                self.failed_count(),
                total,
                self.converted_count()
            ),
            JobStatus::Cancelled => format!(
                "Cancelled: {} of {} items converted",
                self.converted_count(),
                total
            ),
        }
    }
}

/// Events streamed from the worker to the interface thread.
///
/// For one job the events arrive in emission order and [`JobEvent::Finished`]
/// is always the last one.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Started {
        job_id: JobId,
        total: usize,
    },
    ItemStarted {
        index: usize,
        total: usize,
        input: Utf8PathBuf,
    },
    Log {
        line: String,
    },
    ItemFinished(ItemOutcome),
    Progress {
        completed: usize,
        total: usize,
    },
    Finished(JobResult),
}

impl JobEvent {
    /// Percent complete for `Progress` events
    pub fn percent(&self) -> Option<u8> {
        match self {
            JobEvent::Progress { completed, total } if *total > 0 => {
                Some(((completed * 100) / total).min(100) as u8)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Finished(_))
    }
}
