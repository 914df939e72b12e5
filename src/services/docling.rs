use crate::models::{Config, ConversionRequest};
use crate::services::adapter::{ConversionAdapter, ConversionError, LogSink};
use camino::{Utf8Path, Utf8PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

/// Adapter that converts documents by running the `docling` command-line tool.
///
/// One subprocess is started per input:
///
/// ```text
/// docling <input> --from <fmt> --to <md|html|json> --output <dir>
///         --table-mode <fast|accurate> (--ocr --ocr-lang en,fr | --no-ocr)
/// ```
///
/// stdout and stderr are streamed line by line into the job's [`LogSink`].
/// The artifact is expected at [`ConversionRequest::artifact_path_for`].
#[derive(Debug, Clone)]
pub struct DoclingCliAdapter {
    /// Program to run (`docling`, or an interpreter such as `python`)
    program: Utf8PathBuf,

    /// Arguments placed before the input, e.g. `["-m", "docling.cli.main"]`
    leading_args: Vec<String>,

    /// Per-input time limit; `None` waits for as long as the tool runs
    timeout: Option<Duration>,
}

impl DoclingCliAdapter {
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.docling_exe)
            .with_leading_args(config.docling_args.iter().cloned())
            .with_timeout(config.conversion_timeout())
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// Build the argument list for converting `input`
    pub fn build_args(&self, request: &ConversionRequest, input: &Utf8Path) -> Vec<String> {
        let mut args = self.leading_args.clone();

        args.push(input.to_string());
        args.extend([
            "--from".to_string(),
            request.input_format().cli_name().to_string(),
            "--to".to_string(),
            request.output_format().extension().to_string(),
            "--output".to_string(),
            request.output_dir().to_string(),
            "--table-mode".to_string(),
            request.table_mode().cli_name().to_string(),
        ]);

        if request.ocr_enabled() {
            args.push("--ocr".to_string());
            if !request.ocr_languages().is_empty() {
                args.push("--ocr-lang".to_string());
                args.push(
                    request
                        .ocr_languages()
                        .iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
        } else {
            args.push("--no-ocr".to_string());
        }

        args
    }

    /// Render a command line for logs; arguments with spaces are quoted.
    pub fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .map(|arg| {
                if arg.contains(' ') {
                    format!("\"{}\"", arg)
                } else {
                    arg.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the tool, streaming its output into `log`, and return the exit code.
    async fn execute(&self, args: &[String], log: &LogSink) -> Result<i32, ConversionError> {
        tracing::info!("Executing: {}", self.command_line(args));

        let start = Instant::now();

        let mut child = Command::new(self.program.as_std_path())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: self.program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let pump_stdout = async {
                if let Some(stdout) = stdout {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        log.line(line);
                    }
                }
            };

            // Keep the last stderr line to explain a non-zero exit
            let pump_stderr = async {
                let mut last = None;
                if let Some(stderr) = stderr {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if !line.trim().is_empty() {
                            last = Some(line.trim().to_string());
                        }
                        log.line(line);
                    }
                }
                last
            };

            let ((), last_stderr) = tokio::join!(pump_stdout, pump_stderr);
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, last_stderr))
        };

        let finished = match self.timeout {
            Some(limit) => timeout(limit, run).await.ok(),
            None => Some(run.await),
        };

        let Some(finished) = finished else {
            let limit = self.timeout.unwrap_or_default();
            tracing::warn!("docling timed out after {:?}", limit);
            let _ = child.start_kill();
            return Err(ConversionError::Timeout(limit));
        };
        let (status, last_stderr) = finished?;

        let exit_code = status.code().unwrap_or(-1);
        tracing::info!(
            "docling completed in {:.2}s with exit code {}",
            start.elapsed().as_secs_f32(),
            exit_code
        );

        if exit_code != 0 {
            return Err(ConversionError::ProcessFailed {
                code: exit_code,
                detail: last_stderr.unwrap_or_else(|| "no error output".to_string()),
            });
        }

        Ok(exit_code)
    }
}

impl Default for DoclingCliAdapter {
    fn default() -> Self {
        Self::new("docling")
    }
}

#[async_trait::async_trait]
impl ConversionAdapter for DoclingCliAdapter {
    fn name(&self) -> &'static str {
        "docling"
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        input: &Utf8Path,
        log: &LogSink,
    ) -> Result<Utf8PathBuf, ConversionError> {
        let args = self.build_args(request, input);
        self.execute(&args, log).await?;

        let artifact = request.artifact_path_for(input);
        if !artifact.exists() {
            return Err(ConversionError::ArtifactMissing(artifact));
        }

        Ok(artifact)
    }
}
