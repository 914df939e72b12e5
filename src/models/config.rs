use crate::models::request::{
    ConversionRequest, ConversionRequestBuilder, InputFormat, OutputFormat, TableMode,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User preferences persisted in `DocForge Config.yaml`
///
/// Missing keys fall back to [`Config::default`] and unknown keys are ignored,
/// so files written by newer or older versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub last_input_dir: Option<Utf8PathBuf>,
    pub last_output_dir: Option<Utf8PathBuf>,
    pub default_ocr_languages: IndexSet<String>,
    pub default_table_mode: TableMode,
    pub default_input_format: InputFormat,
    pub default_output_format: OutputFormat,
    pub ocr_enabled: bool,

    /// Path or command name of the docling executable
    pub docling_exe: Utf8PathBuf,

    /// Arguments placed before the input, e.g. `["-m", "docling.cli.main"]`
    pub docling_args: Vec<String>,

    /// Per-file conversion timeout in seconds; 0 disables it
    pub conversion_timeout_secs: u64,

    pub debug_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_input_dir: None,
            last_output_dir: None,
            default_ocr_languages: IndexSet::from(["en".to_string()]),
            default_table_mode: TableMode::Fast,
            default_input_format: InputFormat::Pdf,
            default_output_format: OutputFormat::Md,
            ocr_enabled: true,
            docling_exe: Utf8PathBuf::from("docling"),
            docling_args: Vec::new(),
            conversion_timeout_secs: 0,
            debug_mode: false,
        }
    }
}

impl Config {
    /// Start a request builder seeded with the persisted defaults.
    pub fn request_builder(&self) -> ConversionRequestBuilder {
        let builder = ConversionRequest::builder()
            .input_format(self.default_input_format)
            .output_format(self.default_output_format)
            .ocr_enabled(self.ocr_enabled)
            .ocr_languages(&self.default_ocr_languages)
            .table_mode(self.default_table_mode);

        match &self.last_output_dir {
            Some(dir) if dir.is_dir() => builder.output_dir(dir),
            _ => builder,
        }
    }

    /// Remember the choices of a successful job for the next session.
    pub fn remember_request(&mut self, request: &ConversionRequest) {
        let input_dir = request
            .batch_dir()
            .map(Utf8Path::to_path_buf)
            .or_else(|| {
                request
                    .input_paths()
                    .first()
                    .and_then(|p| p.parent())
                    .filter(|p| !p.as_str().is_empty())
                    .map(Utf8Path::to_path_buf)
            });

        if input_dir.is_some() {
            self.last_input_dir = input_dir;
        }
        self.last_output_dir = Some(request.output_dir().to_path_buf());
        if !request.ocr_languages().is_empty() {
            self.default_ocr_languages = request.ocr_languages().clone();
        }
        self.default_table_mode = request.table_mode();
        self.default_input_format = request.input_format();
        self.default_output_format = request.output_format();
        self.ocr_enabled = request.ocr_enabled();
    }

    pub fn conversion_timeout(&self) -> Option<Duration> {
        (self.conversion_timeout_secs > 0).then(|| Duration::from_secs(self.conversion_timeout_secs))
    }
}
