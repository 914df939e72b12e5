//! Integration tests for DoclingCliAdapter
//!
//! A small shell script stands in for the `docling` executable. It understands
//! `--output` and `--to`, prints to both streams and writes `<stem>.<to>`.

#![cfg(unix)]

use camino::{Utf8Path, Utf8PathBuf};
use docforge::models::BatchPolicy;
use docforge::{
    ConversionAdapter, ConversionError, ConversionRequest, DoclingCliAdapter, JobRunner,
    JobStatus, LogSink, OutputFormat,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FAKE_DOCLING: &str = r#"
input="$1"; shift
out=""; to=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    --to) to="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "Converting $input"
echo "Loading models" >&2
base=$(basename "$input")
printf '# converted\n' > "$out/${base%.*}.$to"
"#;

const FAILING_DOCLING: &str = r#"
echo "Loading models" >&2
echo "boom: unsupported file" >&2
exit 3
"#;

const SILENT_DOCLING: &str = "exit 0\n";

const SLOW_DOCLING: &str = "exec sleep 5\n";

struct Fixture {
    _temp_dir: TempDir,
    dir: Utf8PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        Self {
            _temp_dir: temp_dir,
            dir,
        }
    }

    fn script(&self, body: &str) -> Utf8PathBuf {
        let path = self.dir.join("fake-docling.sh");
        fs::write(&path, body).unwrap();
        path
    }

    fn input(&self, name: &str) -> Utf8PathBuf {
        let path = self.dir.join(name);
        fs::write(&path, b"%PDF-1.7").unwrap();
        path
    }

    fn request(&self, inputs: &[Utf8PathBuf], to: OutputFormat) -> ConversionRequest {
        ConversionRequest::builder()
            .input_paths(inputs.iter().cloned())
            .output_format(to)
            .ocr_languages_csv("en,fr")
            .build()
            .unwrap()
    }
}

fn adapter_for(script: &Utf8Path) -> DoclingCliAdapter {
    DoclingCliAdapter::new("sh").with_leading_args([script.as_str()])
}

#[tokio::test]
async fn test_successful_conversion_writes_artifact() {
    let fixture = Fixture::new();
    let script = fixture.script(FAKE_DOCLING);
    let input = fixture.input("My Report.pdf");
    let request = fixture.request(&[input.clone()], OutputFormat::Html);

    let log = LogSink::detached();
    let artifact = adapter_for(&script)
        .convert(&request, &input, &log)
        .await
        .unwrap();

    assert_eq!(artifact, fixture.dir.join("My Report.html"));
    assert_eq!(fs::read_to_string(&artifact).unwrap(), "# converted\n");

    let lines = log.lines();
    assert!(lines.iter().any(|l| l.starts_with("Converting ")));
    assert!(lines.iter().any(|l| l == "Loading models"));
}

#[tokio::test]
async fn test_non_zero_exit_reports_last_stderr_line() {
    let fixture = Fixture::new();
    let script = fixture.script(FAILING_DOCLING);
    let input = fixture.input("a.pdf");
    let request = fixture.request(&[input.clone()], OutputFormat::Md);

    let result = adapter_for(&script)
        .convert(&request, &input, &LogSink::detached())
        .await;

    match result {
        Err(ConversionError::ProcessFailed { code, detail }) => {
            assert_eq!(code, 3);
            assert_eq!(detail, "boom: unsupported file");
        }
        other => panic!("expected ProcessFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_artifact_is_an_error() {
    let fixture = Fixture::new();
    let script = fixture.script(SILENT_DOCLING);
    let input = fixture.input("a.pdf");
    let request = fixture.request(&[input.clone()], OutputFormat::Json);

    let result = adapter_for(&script)
        .convert(&request, &input, &LogSink::detached())
        .await;

    assert!(matches!(
        result,
        Err(ConversionError::ArtifactMissing(path)) if path == fixture.dir.join("a.json")
    ));
}

#[tokio::test]
async fn test_timeout_stops_slow_converter() {
    let fixture = Fixture::new();
    let script = fixture.script(SLOW_DOCLING);
    let input = fixture.input("a.pdf");
    let request = fixture.request(&[input.clone()], OutputFormat::Md);

    let adapter = adapter_for(&script).with_timeout(Some(Duration::from_millis(200)));
    let result = adapter
        .convert(&request, &input, &LogSink::detached())
        .await;

    assert!(matches!(result, Err(ConversionError::Timeout(_))));
}

#[tokio::test]
async fn test_batch_job_through_runner() {
    let fixture = Fixture::new();
    let script = fixture.script(FAKE_DOCLING);
    let inputs = vec![fixture.input("one.pdf"), fixture.input("two.pdf")];

    let request = ConversionRequest::builder()
        .input_paths(inputs.iter().cloned())
        .ocr_enabled(false)
        .batch_policy(BatchPolicy::AbortOnFirstFailure)
        .build()
        .unwrap();

    let runner = JobRunner::new(
        Arc::new(adapter_for(&script)),
        tokio::runtime::Handle::current(),
    );
    let result = runner.submit(request).unwrap().wait().await.unwrap();

    assert_eq!(result.status, JobStatus::Success);
    assert_eq!(
        result.artifact_paths,
        vec![fixture.dir.join("one.md"), fixture.dir.join("two.md")]
    );
    assert!(result.artifact_paths.iter().all(|p| p.exists()));
    assert!(
        result
            .log_lines
            .iter()
            .any(|l| l.contains("Batch conversion results:"))
    );
}
