// Console reporter
//
// Renders a job's event stream on the terminal: one progress bar anchored at
// the bottom, per-file result lines above it.

use crate::models::{ItemOutcome, ItemStatus, JobEvent, JobResult, JobStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

/// Terminal rendering of [`JobEvent`]s.
///
/// Converter output (`JobEvent::Log`) is only echoed when `show_log` is set;
/// it always ends up in the log file and in [`JobResult::log_lines`].
pub struct ConsoleReporter {
    bar: ProgressBar,
    show_log: bool,
}

impl ConsoleReporter {
    pub fn new(show_log: bool) -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar, show_log }
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
    }

    pub fn handle(&self, event: &JobEvent) {
        match event {
            JobEvent::Started { job_id, total } => {
                self.activate_bar(*total);
                self.bar.println(format!(
                    "{} {}",
                    bold("◆"),
                    bold(&format!("Starting {job_id}: {total} file(s)"))
                ));
            }
            JobEvent::ItemStarted { input, .. } => {
                self.bar
                    .set_message(input.file_name().unwrap_or(input.as_str()).to_string());
            }
            JobEvent::Log { line } => {
                if self.show_log {
                    self.bar.println(format!("    {}", dim(line)));
                }
            }
            JobEvent::ItemFinished(outcome) => {
                self.bar.println(format!("  {}", outcome_line(outcome)));
            }
            JobEvent::Progress { completed, .. } => {
                self.bar.set_position(*completed as u64);
            }
            JobEvent::Finished(result) => self.finish(result),
        }
    }

    fn finish(&self, result: &JobResult) {
        self.bar.finish_and_clear();

        let headline = match result.status {
            JobStatus::Success => green(&format!("✓ {}", result.summary())),
            JobStatus::Failure => red(&format!("✘ {}", result.summary())),
            JobStatus::Cancelled => yellow(&format!("■ {}", result.summary())),
        };
        eprintln!("{headline}");

        if let Some(error) = &result.error {
            eprintln!("  {}", dim(&error.to_string()));
        }
        for artifact in &result.artifact_paths {
            eprintln!("  {}", dim(artifact.as_str()));
        }
        eprintln!(
            "  {}",
            dim(&format!("finished in {:.1}s", result.elapsed.as_secs_f64()))
        );
    }
}

/// One coloured result line for a finished item
pub fn outcome_line(outcome: &ItemOutcome) -> String {
    let line = outcome.summary_line();
    match outcome.status {
        ItemStatus::Converted => green(&line),
        ItemStatus::Failed => red(&line),
        ItemStatus::NotStarted => dim(&line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_line_keeps_summary_text() {
        let ok = ItemOutcome::converted(0, "in/a.pdf".into(), "out/a.md".into());
        let line = outcome_line(&ok);
        assert!(line.contains("✔ a.pdf → a.md"));
        assert!(line.starts_with("\x1b[32m"));

        let skipped = ItemOutcome::not_started(1, "in/b.pdf".into());
        assert!(outcome_line(&skipped).contains("b.pdf not converted"));
    }
}
