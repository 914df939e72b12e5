// UI module - console front-end for conversion jobs
//
// The job runner knows nothing about presentation; this module consumes its
// event stream and draws progress on the terminal.

pub mod console;

use crate::models::InputFormat;

pub use console::{ConsoleReporter, outcome_line};

/// Usage notes shown under `--help`
pub const HELP_TEXT: &str = "\
Usage notes:
  1. Pick the input format, then pass files or a directory (--batch-dir).
     In batch mode every file with a matching extension is converted.
  2. Choose the output format with --to (md, html or json).
  3. OCR languages are comma separated, e.g. --ocr-lang en,fr,de.
     For best OCR results list every language present in the documents.
  4. --table-mode accurate is slower but better for complex PDF tables.
  5. Without --output, files are written next to the first input
     (or into the batch directory) as <name>.<md|html|json>.

Press Ctrl-C to cancel; the file being converted is finished first.
Choices from a successful run become the defaults for the next one.";

/// Full `--help` epilogue: supported input formats followed by [`HELP_TEXT`].
pub fn help_text() -> String {
    let mut text = String::from("Input formats:\n");
    for format in InputFormat::ALL {
        text.push_str(&format!(
            "  {:<7} {} (.{})\n",
            format.to_string(),
            format.label(),
            format.extensions().join(", .")
        ));
    }
    text.push('\n');
    text.push_str(HELP_TEXT);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text_lists_every_input_format() {
        let text = help_text();
        for format in InputFormat::ALL {
            assert!(text.contains(format.label()), "missing {}", format);
        }
        assert!(text.contains("image   Image Files (.jpg, .jpeg"));
        assert!(text.ends_with(HELP_TEXT));
    }
}
