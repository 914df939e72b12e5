//! DocForge - convert documents with Docling from the command line
//!
//! Main entry point for the console front-end.
//!
//! # Overview
//!
//! This binary maps command-line flags onto a [`ConversionRequest`], hands it to
//! the [`JobRunner`] and renders the job's event stream. It initializes:
//! - Logging infrastructure (daily file rotation, console output in debug mode)
//! - Tokio runtime (the job worker and converter subprocesses run here)
//! - Configuration ([`ConfigStore`]): persisted defaults for every flag
//!
//! # Execution Flow
//!
//! 1. Parse flags and initialize logging → logs/docforge.YYYY-MM-DD
//! 2. Load `DocForge Data/DocForge Config.yaml` (defaults if missing or broken)
//! 3. Build and validate the request; validation errors exit with code 2
//! 4. Submit the job, draw progress until the terminal event arrives.
//!    Ctrl-C requests cancellation; the file in progress is finished first.
//! 5. On success, remember the choices as next session's defaults
//! 6. Exit 0 on success, 1 on failure or cancellation

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use docforge::models::{BatchPolicy, ValidationError};
use docforge::ui::{ConsoleReporter, help_text};
use docforge::{
    APP_NAME, Config, ConfigStore, ConversionRequest, DoclingCliAdapter, InputFormat, JobError,
    JobEvent, JobHandle, JobResult, JobRunner, OutputFormat, TableMode, VERSION,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Convert documents to Markdown, HTML or JSON with Docling.
#[derive(Parser, Debug)]
#[command(
    name = "docforge",
    version,
    about = "Convert documents to Markdown, HTML or JSON with Docling",
    color = clap::ColorChoice::Auto,
    after_long_help = help_text()
)]
struct Cli {
    /// Files to convert.
    #[arg(value_name = "INPUT", conflicts_with = "batch_dir")]
    inputs: Vec<Utf8PathBuf>,

    /// Convert every file of the input format in this directory.
    #[arg(short = 'b', long, value_name = "DIR")]
    batch_dir: Option<Utf8PathBuf>,

    /// Input format: pdf, docx, pptx, html, md, json, image.
    #[arg(long = "from", value_name = "FORMAT")]
    input_format: Option<InputFormat>,

    /// Output format: md, html, json.
    #[arg(long = "to", value_name = "FORMAT")]
    output_format: Option<OutputFormat>,

    /// Output directory. Defaults to the directory of the first input.
    #[arg(short, long, value_name = "DIR")]
    output: Option<Utf8PathBuf>,

    /// OCR languages, comma separated (e.g. en,fr,de).
    #[arg(long, value_name = "CSV", conflicts_with = "no_ocr")]
    ocr_lang: Option<String>,

    /// Disable OCR.
    #[arg(long)]
    no_ocr: bool,

    /// Table extraction mode: fast or accurate.
    #[arg(long, value_name = "MODE")]
    table_mode: Option<TableMode>,

    /// Stop a batch at the first failed file.
    #[arg(long)]
    abort_on_failure: bool,

    /// Directory holding the persisted configuration.
    #[arg(long, value_name = "DIR", default_value = "DocForge Data")]
    config_dir: Utf8PathBuf,

    /// Directory for log files.
    #[arg(long, value_name = "DIR", default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Path to the docling executable.
    #[arg(long, value_name = "PATH", env = "DOCFORGE_DOCLING")]
    docling: Option<Utf8PathBuf>,

    /// Per-file timeout in seconds (0 disables it).
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Echo converter output above the progress bar.
    #[arg(short, long)]
    verbose: bool,

    /// Debug logging, also mirrored to the console.
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let _log_guard = docforge::logging::setup_logging(&cli.log_dir, cli.debug, cli.debug)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let store = ConfigStore::new(&cli.config_dir)?;
    let mut config = store.load();

    let request = match build_request(&cli, &config) {
        Ok(request) => request,
        Err(e) => return Ok(validation_failed(&e)),
    };

    let adapter = build_adapter(&cli, &config);
    tracing::info!("Using converter: {}", adapter.program());

    // Two workers: one for the job, one for the converter's output pumps
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("docforge-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let runner = JobRunner::new(Arc::new(adapter), runtime.handle().clone());

    let handle = match runner.submit(request) {
        Ok(handle) => handle,
        Err(JobError::Validation(e)) => return Ok(validation_failed(&e)),
        Err(e @ JobError::Busy) => return Err(e.into()),
    };
    let request = Arc::clone(handle.request());

    let reporter = ConsoleReporter::new(cli.verbose || config.debug_mode);
    let result = runtime.block_on(drive(&runner, handle, &reporter));

    let exit_code = match &result {
        Some(result) if result.is_success() => {
            config.remember_request(&request);
            if let Err(e) = store.save(&config) {
                tracing::warn!("Failed to save settings: {}", e);
            }
            ExitCode::SUCCESS
        }
        Some(_) => ExitCode::FAILURE,
        None => {
            tracing::error!("Job ended without a result");
            ExitCode::FAILURE
        }
    };

    runner.metrics().log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Application shutdown complete");

    Ok(exit_code)
}

/// Flags override the persisted defaults for this run only.
fn build_request(cli: &Cli, config: &Config) -> Result<ConversionRequest, ValidationError> {
    let mut builder = config.request_builder();

    if let Some(format) = cli.input_format {
        builder = builder.input_format(format);
    }
    if let Some(format) = cli.output_format {
        builder = builder.output_format(format);
    }
    if let Some(mode) = cli.table_mode {
        builder = builder.table_mode(mode);
    }
    if let Some(csv) = &cli.ocr_lang {
        builder = builder.ocr_enabled(true).ocr_languages_csv(csv);
    }
    if cli.no_ocr {
        builder = builder.ocr_enabled(false);
    }
    if let Some(dir) = &cli.output {
        builder = builder.output_dir(dir);
    }
    if cli.abort_on_failure {
        builder = builder.batch_policy(BatchPolicy::AbortOnFirstFailure);
    }

    if !cli.inputs.is_empty() {
        builder = builder.input_paths(cli.inputs.iter().cloned());
    } else {
        match batch_source(cli, config) {
            Some(BatchSource::Explicit(dir)) => {
                tracing::info!("Batch source: {}", dir);
                builder = builder.input_dir(dir);
            }
            Some(BatchSource::Remembered(dir)) => {
                let format = cli.input_format.unwrap_or(config.default_input_format);
                tracing::warn!("No input given, falling back to last input dir {}", dir);
                eprintln!(
                    "No INPUT or --batch-dir given: converting every {} file in the last used directory {}",
                    format, dir
                );
                builder = builder.input_dir(dir);
            }
            None => {}
        }
    }

    builder.build()
}

/// Where a batch comes from when no files are named
#[derive(Debug, PartialEq)]
enum BatchSource<'a> {
    Explicit(&'a Utf8Path),
    /// Previous session's input directory
    Remembered(&'a Utf8Path),
}

fn batch_source<'a>(cli: &'a Cli, config: &'a Config) -> Option<BatchSource<'a>> {
    if let Some(dir) = &cli.batch_dir {
        return Some(BatchSource::Explicit(dir));
    }
    config
        .last_input_dir
        .as_deref()
        .map(BatchSource::Remembered)
}

fn build_adapter(cli: &Cli, config: &Config) -> DoclingCliAdapter {
    let adapter = match &cli.docling {
        // Configured leading args belong to the configured program
        Some(program) => DoclingCliAdapter::new(program).with_timeout(config.conversion_timeout()),
        None => DoclingCliAdapter::from_config(config),
    };

    match cli.timeout {
        Some(secs) => adapter.with_timeout((secs > 0).then(|| Duration::from_secs(secs))),
        None => adapter,
    }
}

fn validation_failed(error: &ValidationError) -> ExitCode {
    tracing::error!("Invalid request: {}", error);
    eprintln!("Error: {}", error);
    ExitCode::from(2)
}

/// Render events until the terminal result arrives; Ctrl-C requests cancellation.
async fn drive(
    runner: &JobRunner,
    mut handle: JobHandle,
    reporter: &ConsoleReporter,
) -> Option<JobResult> {
    let control = handle.control();
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    let mut result = None;
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.recv() => match event {
                Some(event) => {
                    reporter.handle(&event);
                    if let JobEvent::Finished(finished) = event {
                        result = Some(finished);
                    }
                }
                None => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    tracing::warn!("Unable to listen for Ctrl-C: {}", e);
                }
                if runner.cancel(&control) {
                    eprintln!("Cancelling after the current file...");
                }
            }
        }
    }

    result
}
