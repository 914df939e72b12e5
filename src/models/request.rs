use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// OCR language codes look like `en`, `deu`, `zh-CN` or `pt_BR`.
static LANGUAGE_CODE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z]{2,3}([_-][A-Za-z0-9]{2,4})?$").expect("Invalid language regex")
});

/// Document formats accepted as conversion input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Pdf,
    Docx,
    Pptx,
    Html,
    Md,
    Json,
    Image,
}

impl InputFormat {
    pub const ALL: [InputFormat; 7] = [
        InputFormat::Pdf,
        InputFormat::Docx,
        InputFormat::Pptx,
        InputFormat::Html,
        InputFormat::Md,
        InputFormat::Json,
        InputFormat::Image,
    ];

    /// File extensions (lowercase, without dot) that belong to this format.
    ///
    /// Used to expand a batch directory into its input files.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            InputFormat::Pdf => &["pdf"],
            InputFormat::Docx => &["docx"],
            InputFormat::Pptx => &["pptx"],
            InputFormat::Html => &["html", "htm"],
            InputFormat::Md => &["md", "markdown"],
            InputFormat::Json => &["json"],
            InputFormat::Image => &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif"],
        }
    }

    /// Check whether a path carries one of this format's extensions.
    pub fn matches(self, path: &Utf8Path) -> bool {
        path.extension()
            .map(|ext| self.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Value passed to `docling --from`.
    pub fn cli_name(self) -> &'static str {
        match self {
            InputFormat::Pdf => "pdf",
            InputFormat::Docx => "docx",
            InputFormat::Pptx => "pptx",
            InputFormat::Html => "html",
            InputFormat::Md => "md",
            InputFormat::Json => "json_docling",
            InputFormat::Image => "image",
        }
    }

    /// Human-readable name for file pickers and status lines.
    pub fn label(self) -> &'static str {
        match self {
            InputFormat::Pdf => "PDF Files",
            InputFormat::Docx => "Word Documents",
            InputFormat::Pptx => "PowerPoint Presentations",
            InputFormat::Html => "HTML Files",
            InputFormat::Md => "Markdown Files",
            InputFormat::Json => "Docling JSON Files",
            InputFormat::Image => "Image Files",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputFormat::Pdf => "pdf",
            InputFormat::Docx => "docx",
            InputFormat::Pptx => "pptx",
            InputFormat::Html => "html",
            InputFormat::Md => "md",
            InputFormat::Json => "json",
            InputFormat::Image => "image",
        };
        f.write_str(name)
    }
}

impl FromStr for InputFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(InputFormat::Pdf),
            "docx" => Ok(InputFormat::Docx),
            "pptx" => Ok(InputFormat::Pptx),
            "html" | "htm" => Ok(InputFormat::Html),
            "md" | "markdown" => Ok(InputFormat::Md),
            "json" => Ok(InputFormat::Json),
            "image" => Ok(InputFormat::Image),
            other => Err(ValidationError::UnknownFormat(other.to_string())),
        }
    }
}

/// Formats the converter can export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Md,
    Html,
    Json,
}

impl OutputFormat {
    /// Extension of the artifact written for this format; also the `docling --to` value.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(OutputFormat::Md),
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(ValidationError::UnknownFormat(other.to_string())),
        }
    }
}

/// Table structure recognition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    #[default]
    Fast,
    Accurate,
}

impl TableMode {
    pub fn cli_name(self) -> &'static str {
        match self {
            TableMode::Fast => "fast",
            TableMode::Accurate => "accurate",
        }
    }
}

impl fmt::Display for TableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for TableMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(TableMode::Fast),
            "accurate" => Ok(TableMode::Accurate),
            other => Err(ValidationError::UnknownTableMode(other.to_string())),
        }
    }
}

/// What the worker does after an item fails in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Log the failure and move on to the next input.
    #[default]
    ContinueOnFailure,
    /// Stop at the first failed input; the rest are never handed to the adapter.
    AbortOnFirstFailure,
}

/// Errors that reject a request before any job starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No input files selected")]
    NoInputs,

    #[error("Input not found: {0}")]
    InputNotFound(Utf8PathBuf),

    #[error("Input is not a file: {0}")]
    InputNotAFile(Utf8PathBuf),

    #[error("Batch source is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    #[error("Cannot read batch directory {path}: {reason}")]
    BatchDirUnreadable { path: Utf8PathBuf, reason: String },

    #[error("No {format} files found in {dir}")]
    NoMatchingInputs { dir: Utf8PathBuf, format: InputFormat },

    #[error("No output directory given and none could be derived from the inputs")]
    NoOutputDir,

    #[error("Output directory does not exist: {0}")]
    OutputDirMissing(Utf8PathBuf),

    #[error("Converting {0} would overwrite it; choose another output format or directory")]
    OverwritesInput(Utf8PathBuf),

    #[error("Output directory is not writable: {path} ({reason})")]
    OutputDirNotWritable { path: Utf8PathBuf, reason: String },

    #[error("Invalid OCR language code: '{0}'")]
    InvalidLanguage(String),

    #[error("OCR is enabled but no languages were given")]
    NoOcrLanguages,

    #[error("Unknown format: '{0}'")]
    UnknownFormat(String),

    #[error("Unknown table mode: '{0}'")]
    UnknownTableMode(String),
}

/// Split a comma separated language list such as `"en, fr,,de"`.
///
/// Entries are trimmed, empty entries dropped and duplicates removed while
/// keeping first-seen order. Codes are not validated here.
pub fn parse_language_list(csv: &str) -> IndexSet<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check that `dir` exists, is a directory and accepts new files.
///
/// Writability is checked by creating (and immediately removing) a temporary file,
/// which also catches read-only mounts and ACLs that metadata checks miss.
pub fn ensure_writable_dir(dir: &Utf8Path) -> Result<(), ValidationError> {
    if !dir.is_dir() {
        return Err(ValidationError::OutputDirMissing(dir.to_path_buf()));
    }

    tempfile::Builder::new()
        .prefix(".docforge-write-check")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|e| ValidationError::OutputDirNotWritable {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
}

/// One conversion job's parameters.
///
/// Built and validated by [`ConversionRequestBuilder`]; immutable afterwards.
/// The job runner shares it with its worker as `Arc<ConversionRequest>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    input_paths: Vec<Utf8PathBuf>,
    batch_dir: Option<Utf8PathBuf>,
    input_format: InputFormat,
    output_format: OutputFormat,
    ocr_enabled: bool,
    ocr_languages: IndexSet<String>,
    table_mode: TableMode,
    output_dir: Utf8PathBuf,
    batch_policy: BatchPolicy,
}

impl ConversionRequest {
    pub fn builder() -> ConversionRequestBuilder {
        ConversionRequestBuilder::default()
    }

    pub fn input_paths(&self) -> &[Utf8PathBuf] {
        &self.input_paths
    }

    /// Directory the inputs were collected from, when built in batch mode.
    pub fn batch_dir(&self) -> Option<&Utf8Path> {
        self.batch_dir.as_deref()
    }

    pub fn is_batch(&self) -> bool {
        self.batch_dir.is_some() || self.input_paths.len() > 1
    }

    pub fn input_format(&self) -> InputFormat {
        self.input_format
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn ocr_enabled(&self) -> bool {
        self.ocr_enabled
    }

    pub fn ocr_languages(&self) -> &IndexSet<String> {
        &self.ocr_languages
    }

    pub fn table_mode(&self) -> TableMode {
        self.table_mode
    }

    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        self.batch_policy
    }

    /// Where the artifact for `input` is expected: `<output_dir>/<stem>.<ext>`.
    pub fn artifact_path_for(&self, input: &Utf8Path) -> Utf8PathBuf {
        let stem = input.file_stem().unwrap_or("output");
        self.output_dir
            .join(format!("{}.{}", stem, self.output_format.extension()))
    }

    /// Artifact paths that more than one input maps to, e.g. `scan.jpg` and `scan.png`.
    pub fn conflicting_artifacts(&self) -> Vec<Utf8PathBuf> {
        let mut seen = IndexSet::new();
        let mut conflicts = IndexSet::new();
        for input in &self.input_paths {
            let artifact = self.artifact_path_for(input);
            if !seen.insert(artifact.clone()) {
                conflicts.insert(artifact);
            }
        }
        conflicts.into_iter().collect()
    }
}

/// Builder for [`ConversionRequest`]
///
/// Every check happens in [`build`](Self::build) so invalid requests never
/// reach the job runner.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequestBuilder {
    input_paths: Vec<Utf8PathBuf>,
    input_dir: Option<Utf8PathBuf>,
    input_format: InputFormat,
    output_format: OutputFormat,
    ocr_enabled: Option<bool>,
    ocr_languages: IndexSet<String>,
    table_mode: TableMode,
    output_dir: Option<Utf8PathBuf>,
    batch_policy: BatchPolicy,
}

impl ConversionRequestBuilder {
    pub fn input_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.input_paths.push(path.into());
        self
    }

    pub fn input_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.input_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Batch mode: convert every file in `dir` matching the input format.
    pub fn input_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.input_dir = Some(dir.into());
        self
    }

    pub fn input_format(mut self, format: InputFormat) -> Self {
        self.input_format = format;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn ocr_enabled(mut self, enabled: bool) -> Self {
        self.ocr_enabled = Some(enabled);
        self
    }

    pub fn ocr_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ocr_languages = languages
            .into_iter()
            .map(|lang| lang.as_ref().trim().to_string())
            .filter(|lang| !lang.is_empty())
            .collect();
        self
    }

    /// Set languages from a comma separated list, as typed into the OCR field.
    pub fn ocr_languages_csv(mut self, csv: &str) -> Self {
        self.ocr_languages = parse_language_list(csv);
        self
    }

    pub fn table_mode(mut self, mode: TableMode) -> Self {
        self.table_mode = mode;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// Validate and produce the request.
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] found: missing or non-file inputs,
    /// an empty batch directory, bad language codes, or an output directory
    /// that is missing or not writable.
    pub fn build(self) -> Result<ConversionRequest, ValidationError> {
        let mut input_paths = self.input_paths;

        if let Some(dir) = &self.input_dir {
            input_paths.extend(collect_batch_inputs(dir, self.input_format)?);
        }

        if input_paths.is_empty() {
            return Err(ValidationError::NoInputs);
        }

        for path in &input_paths {
            if !path.exists() {
                return Err(ValidationError::InputNotFound(path.clone()));
            }
            if !path.is_file() {
                return Err(ValidationError::InputNotAFile(path.clone()));
            }
        }

        let ocr_enabled = self.ocr_enabled.unwrap_or(true);
        if ocr_enabled && self.ocr_languages.is_empty() {
            return Err(ValidationError::NoOcrLanguages);
        }
        if let Some(bad) = self
            .ocr_languages
            .iter()
            .find(|lang| !LANGUAGE_CODE.is_match(lang))
        {
            return Err(ValidationError::InvalidLanguage(bad.clone()));
        }

        // Without an explicit target, artifacts land next to the sources
        let output_dir = match self.output_dir {
            Some(dir) => dir,
            None => self
                .input_dir
                .clone()
                .or_else(|| input_paths[0].parent().map(Utf8Path::to_path_buf))
                .map(|dir| {
                    if dir.as_str().is_empty() {
                        Utf8PathBuf::from(".")
                    } else {
                        dir
                    }
                })
                .ok_or(ValidationError::NoOutputDir)?,
        };
        ensure_writable_dir(&output_dir)?;

        let request = ConversionRequest {
            input_paths,
            batch_dir: self.input_dir,
            input_format: self.input_format,
            output_format: self.output_format,
            ocr_enabled,
            ocr_languages: self.ocr_languages,
            table_mode: self.table_mode,
            output_dir,
            batch_policy: self.batch_policy,
        };

        if let Some(input) = request
            .input_paths
            .iter()
            .find(|input| same_location(&request.artifact_path_for(input), input))
        {
            return Err(ValidationError::OverwritesInput(input.clone()));
        }

        for artifact in request.conflicting_artifacts() {
            tracing::warn!(
                "Several inputs convert to {}; later files overwrite earlier ones",
                artifact
            );
        }

        Ok(request)
    }
}

/// Whether two paths name the same location, resolving `.` and symlinks where possible.
fn same_location(a: &Utf8Path, b: &Utf8Path) -> bool {
    if a == b {
        return true;
    }
    let resolve = |path: &Utf8Path| -> Option<Utf8PathBuf> {
        let parent = match path.parent() {
            Some(p) if !p.as_str().is_empty() => p,
            _ => Utf8Path::new("."),
        };
        let dir = parent.canonicalize_utf8().ok()?;
        Some(dir.join(path.file_name()?))
    };
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// List the files directly inside `dir` that match `format`, sorted by path.
pub fn collect_batch_inputs(
    dir: &Utf8Path,
    format: InputFormat,
) -> Result<Vec<Utf8PathBuf>, ValidationError> {
    if !dir.is_dir() {
        return Err(ValidationError::NotADirectory(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|e| ValidationError::BatchDirUnreadable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = match Utf8PathBuf::try_from(entry.path()) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    "Skipping entry with non UTF-8 name: {}",
                    e.into_path_buf().display()
                );
                continue;
            }
        };
        if path.is_file() && format.matches(&path) {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        tracing::warn!("No {} files found in {}", format, dir);
        return Err(ValidationError::NoMatchingInputs {
            dir: dir.to_path_buf(),
            format,
        });
    }

    tracing::debug!("Collected {} {} files from {}", files.len(), format, dir);
    Ok(files)
}
