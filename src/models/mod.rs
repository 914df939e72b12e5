//! Data models for DocForge.
//!
//! - [`ConversionRequest`]: one job's validated parameters, built with [`ConversionRequestBuilder`]
//! - [`Config`]: user preferences persisted between sessions
//! - [`JobResult`] and [`JobEvent`]: what the job runner reports back to the interface
//!
//! # Architecture Note
//!
//! Requests are immutable once built; the runner shares them with its worker behind an `Arc`.
//! Config is a plain value that the host loads at startup and passes by reference.

pub mod config;
pub mod job;
pub mod request;

pub use config::Config;
pub use job::{
    FailureOrigin, ItemOutcome, ItemStatus, JobEvent, JobFailure, JobId, JobResult, JobState,
    JobStatus,
};
pub use request::{
    BatchPolicy, ConversionRequest, ConversionRequestBuilder, InputFormat, OutputFormat,
    TableMode, ValidationError,
};
