// DocForge - document conversion jobs around the Docling converter
//
// This is the library crate containing the job orchestration core and data structures.
// The binary crate (main.rs) provides the console entry point.

pub mod config;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigStore;
pub use jobs::{JobControl, JobError, JobHandle, JobRunner};
pub use models::{
    Config, ConversionRequest, InputFormat, JobEvent, JobResult, JobStatus, OutputFormat,
    TableMode,
};
pub use services::{ConversionAdapter, ConversionError, DoclingCliAdapter, LogSink};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
