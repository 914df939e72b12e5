//! Integration tests for building ConversionRequests
//!
//! These tests verify:
//! - Batch directory expansion and output directory defaults
//! - Artifact naming per output format, overwrite and collision checks
//! - Unreadable directories and non UTF-8 entries in batch mode
//! - OCR language list parsing (property-based)

use camino::Utf8PathBuf;
use docforge::models::request::{collect_batch_inputs, parse_language_list};
use docforge::models::{BatchPolicy, ValidationError};
use docforge::{ConversionRequest, InputFormat, OutputFormat};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn create_test_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, path)
}

#[test]
fn test_batch_dir_expands_matching_files_sorted() {
    let (_temp_dir, dir) = create_test_dir();
    for name in ["b.pdf", "A.PDF", "c.docx", "notes.txt"] {
        fs::write(dir.join(name), b"x").unwrap();
    }
    fs::create_dir(dir.join("nested.pdf")).unwrap();

    let request = ConversionRequest::builder()
        .input_dir(&dir)
        .ocr_languages_csv("en")
        .build()
        .unwrap();

    assert!(request.is_batch());
    assert_eq!(request.batch_dir(), Some(dir.as_path()));
    assert_eq!(
        request.input_paths(),
        &[dir.join("A.PDF"), dir.join("b.pdf")]
    );
    assert_eq!(request.output_dir(), dir.as_path());
}

#[test]
fn test_batch_dir_without_matches() {
    let (_temp_dir, dir) = create_test_dir();
    fs::write(dir.join("slides.pptx"), b"x").unwrap();

    let result = ConversionRequest::builder()
        .input_dir(&dir)
        .input_format(InputFormat::Docx)
        .ocr_enabled(false)
        .build();

    assert_eq!(
        result.unwrap_err(),
        ValidationError::NoMatchingInputs {
            dir: dir.clone(),
            format: InputFormat::Docx,
        }
    );
}

#[test]
fn test_batch_source_must_be_directory() {
    let (_temp_dir, dir) = create_test_dir();
    let file = dir.join("a.pdf");
    fs::write(&file, b"x").unwrap();

    assert!(matches!(
        collect_batch_inputs(&file, InputFormat::Pdf),
        Err(ValidationError::NotADirectory(_))
    ));
}

#[test]
fn test_image_batch_collects_all_image_types() {
    let (_temp_dir, dir) = create_test_dir();
    for name in ["scan1.png", "scan2.JPG", "scan3.tif", "doc.pdf"] {
        fs::write(dir.join(name), b"x").unwrap();
    }

    let files = collect_batch_inputs(&dir, InputFormat::Image).unwrap();
    let names: Vec<_> = files.iter().filter_map(|f| f.file_name()).collect();
    assert_eq!(names, vec!["scan1.png", "scan2.JPG", "scan3.tif"]);
}

#[test]
fn test_explicit_output_dir_and_artifact_names() {
    let (_temp_dir, dir) = create_test_dir();
    let out = dir.join("converted");
    fs::create_dir(&out).unwrap();
    let input = dir.join("Annual Report.v2.pdf");
    fs::write(&input, b"x").unwrap();

    for (format, expected) in [
        (OutputFormat::Md, "Annual Report.v2.md"),
        (OutputFormat::Html, "Annual Report.v2.html"),
        (OutputFormat::Json, "Annual Report.v2.json"),
    ] {
        let request = ConversionRequest::builder()
            .input_path(&input)
            .output_format(format)
            .output_dir(&out)
            .ocr_enabled(false)
            .build()
            .unwrap();
        assert_eq!(request.artifact_path_for(&input), out.join(expected));
    }
}

#[test]
fn test_output_dir_must_exist() {
    let (_temp_dir, dir) = create_test_dir();
    let input = dir.join("a.pdf");
    fs::write(&input, b"x").unwrap();

    let result = ConversionRequest::builder()
        .input_path(&input)
        .output_dir(dir.join("missing"))
        .ocr_enabled(false)
        .build();

    assert_eq!(
        result.unwrap_err(),
        ValidationError::OutputDirMissing(dir.join("missing"))
    );
}

#[test]
fn test_directory_is_not_a_file_input() {
    let (_temp_dir, dir) = create_test_dir();

    let result = ConversionRequest::builder()
        .input_path(&dir)
        .ocr_enabled(false)
        .build();

    assert_eq!(result.unwrap_err(), ValidationError::InputNotAFile(dir));
}

#[test]
fn test_batch_policy_defaults_to_continue() {
    let (_temp_dir, dir) = create_test_dir();
    let input = dir.join("a.pdf");
    fs::write(&input, b"x").unwrap();

    let request = ConversionRequest::builder()
        .input_path(&input)
        .ocr_languages_csv("en,de")
        .build()
        .unwrap();

    assert_eq!(request.batch_policy(), BatchPolicy::ContinueOnFailure);
    let langs: Vec<_> = request.ocr_languages().iter().cloned().collect();
    assert_eq!(langs, vec!["en", "de"]);
}

#[test]
fn test_same_format_output_would_overwrite_input() {
    let (_temp_dir, dir) = create_test_dir();
    let input = dir.join("notes.md");
    fs::write(&input, b"# notes").unwrap();

    let result = ConversionRequest::builder()
        .input_path(&input)
        .input_format(InputFormat::Md)
        .output_format(OutputFormat::Md)
        .ocr_enabled(false)
        .build();
    assert_eq!(
        result.unwrap_err(),
        ValidationError::OverwritesInput(input.clone())
    );

    let html = ConversionRequest::builder()
        .input_path(&input)
        .input_format(InputFormat::Md)
        .output_format(OutputFormat::Html)
        .ocr_enabled(false)
        .build()
        .unwrap();
    assert_eq!(html.artifact_path_for(&input), dir.join("notes.html"));

    let out = dir.join("converted");
    fs::create_dir(&out).unwrap();
    let elsewhere = ConversionRequest::builder()
        .input_path(&input)
        .input_format(InputFormat::Md)
        .output_format(OutputFormat::Md)
        .output_dir(&out)
        .ocr_enabled(false)
        .build()
        .unwrap();
    assert_eq!(elsewhere.artifact_path_for(&input), out.join("notes.md"));
}

#[test]
fn test_inputs_sharing_a_stem_are_reported() {
    let (_temp_dir, dir) = create_test_dir();
    for name in ["scan.jpg", "scan.png", "page.tif"] {
        fs::write(dir.join(name), b"x").unwrap();
    }

    let request = ConversionRequest::builder()
        .input_dir(&dir)
        .input_format(InputFormat::Image)
        .ocr_languages_csv("en")
        .build()
        .unwrap();

    assert_eq!(request.input_paths().len(), 3);
    assert_eq!(request.conflicting_artifacts(), vec![dir.join("scan.md")]);
}

#[cfg(unix)]
#[test]
fn test_batch_skips_non_utf8_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (temp_dir, dir) = create_test_dir();
    fs::write(dir.join("a.pdf"), b"x").unwrap();
    let junk = temp_dir.path().join(OsStr::from_bytes(b"junk\xff.txt"));
    if fs::write(&junk, b"x").is_err() {
        // Filesystem refuses non UTF-8 names; nothing to skip.
        return;
    }

    let request = ConversionRequest::builder()
        .input_dir(&dir)
        .ocr_enabled(false)
        .build()
        .unwrap();

    assert_eq!(request.input_paths(), &[dir.join("a.pdf")]);
}

#[cfg(unix)]
#[test]
fn test_unreadable_batch_dir_reports_io_reason() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp_dir, dir) = create_test_dir();
    let locked = dir.join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("a.pdf"), b"x").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let readable = fs::read_dir(&locked).is_ok();
    let result = collect_batch_inputs(&locked, InputFormat::Pdf);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    // Root ignores the mode bits.
    if readable {
        return;
    }
    match result {
        Err(ValidationError::BatchDirUnreadable { path, reason }) => {
            assert_eq!(path, locked);
            assert!(!reason.is_empty());
        }
        other => panic!("expected BatchDirUnreadable, got {:?}", other),
    }
}

proptest! {
    #[test]
    fn prop_language_list_is_trimmed_and_unique(csv in "[a-z ,]{0,40}") {
        let langs = parse_language_list(&csv);

        for lang in &langs {
            prop_assert!(!lang.is_empty());
            prop_assert_eq!(lang.trim(), lang.as_str());
            prop_assert!(!lang.contains(','));
        }
    }

    #[test]
    fn prop_language_list_keeps_first_seen_order(
        codes in prop::collection::vec("[a-z]{2,3}", 0..8),
        padding in " {0,2}",
    ) {
        let csv = codes
            .iter()
            .map(|c| format!("{padding}{c}{padding}"))
            .collect::<Vec<_>>()
            .join(",");

        let mut expected: Vec<String> = Vec::new();
        for code in &codes {
            if !expected.contains(code) {
                expected.push(code.clone());
            }
        }

        let parsed: Vec<String> = parse_language_list(&csv).into_iter().collect();
        prop_assert_eq!(parsed, expected);
    }
}
