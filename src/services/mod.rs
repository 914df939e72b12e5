//! Services module - the boundary to the external document converter.
//!
//! # Components
//!
//! - [`ConversionAdapter`]: trait the job runner calls once per input file. It is the only
//!   place where the converter is touched; everything else treats it as an opaque, possibly
//!   slow, possibly failing function.
//! - [`LogSink`]: per-job writer handed to the adapter so converter output reaches the
//!   interface while the call is still running.
//! - [`DoclingCliAdapter`]: the shipped adapter. Runs the `docling` command-line tool as a
//!   subprocess with an optional timeout and checks that the expected artifact was written.
//!
//! # Usage Example
//!
//! ```ignore
//! use docforge::services::{ConversionAdapter, DoclingCliAdapter, LogSink};
//!
//! let adapter = DoclingCliAdapter::new("docling").with_timeout(Some(Duration::from_secs(600)));
//! let artifact = adapter.convert(&request, &request.input_paths()[0], &LogSink::detached()).await?;
//! ```

pub mod adapter;
pub mod docling;

pub use adapter::{ConversionAdapter, ConversionError, LogSink};
pub use docling::DoclingCliAdapter;
