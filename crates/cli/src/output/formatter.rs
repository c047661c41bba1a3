//! Output formatter for human-readable and JSON output
//!
//! Ensures consistent output formatting across all commands. Every line,
//! including per-item errors, goes to one shared sink so that concurrent
//! workers never interleave partial lines.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use s3k_core::{Error, Summary};

use super::progress::{ProgressBar, ProgressSlot};
use super::OutputConfig;

/// In-memory sink, used to capture output in tests
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        let data = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&data).into_owned()
    }
}

#[derive(Debug, Clone)]
enum Sink {
    Stdout,
    Buffer(SharedBuffer),
}

/// JSON shape of a per-item action line
#[derive(Serialize)]
struct ActionLine<'a> {
    action: char,
    path: &'a str,
}

/// JSON shape of an error line
#[derive(Serialize)]
struct ErrorLine<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<&'a str>,
}

/// JSON shape of the operation summary
#[derive(Serialize)]
struct SummaryLine {
    #[serde(flatten)]
    counts: Summary,
    dry_run: bool,
    took_ms: u128,
    ops_per_sec: f64,
}

/// Formatter for CLI output
///
/// Handles both human-readable and JSON output formats based on configuration.
/// When JSON mode is enabled, every line is one compact JSON document.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    sink: Sink,
    lock: Arc<Mutex<()>>,
    progress: ProgressSlot,
}

impl Formatter {
    /// Create a formatter writing to stdout
    pub fn new(config: OutputConfig) -> Self {
        Self::with_sink(config, Sink::Stdout)
    }

    /// Create a formatter writing into a buffer
    pub fn buffered(config: OutputConfig) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::with_sink(config, Sink::Buffer(buffer.clone())), buffer)
    }

    fn with_sink(config: OutputConfig, sink: Sink) -> Self {
        Self {
            config,
            sink,
            lock: Arc::new(Mutex::new(())),
            progress: ProgressSlot::default(),
        }
    }

    /// Check if JSON output mode is enabled
    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Check if colors are enabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    fn write(&self, bytes: &[u8]) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let emit = || match &self.sink {
            // Write failures on a closed stdout are dropped
            Sink::Stdout => {
                let _ = std::io::stdout().lock().write_all(bytes);
            }
            Sink::Buffer(buffer) => buffer
                .0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(bytes),
        };
        match self.progress.current() {
            Some(bar) => bar.suspend(emit),
            None => emit(),
        }
    }

    fn write_line(&self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.write(&bytes);
    }

    fn write_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.write_line(&json),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Output a value
    ///
    /// In JSON mode, serializes the value to JSON.
    /// In human mode, uses the Display implementation.
    pub fn output<T: Serialize + std::fmt::Display>(&self, value: &T) {
        if self.config.json {
            self.write_json(value);
        } else {
            self.write_line(&value.to_string());
        }
    }

    /// Output JSON directly
    pub fn json<T: Serialize>(&self, value: &T) {
        self.write_json(value);
    }

    /// Print a data line (never suppressed)
    pub fn line(&self, message: &str) {
        self.write_line(message);
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        self.write_line(message);
    }

    /// Copy raw bytes to the output
    pub fn raw(&self, bytes: &[u8]) {
        self.write(bytes);
    }

    /// Per-item progress line such as `A path` (respects quiet mode)
    pub fn action(&self, marker: char, path: &str) {
        if self.config.quiet {
            return;
        }
        if self.config.json {
            self.write_json(&ActionLine {
                action: marker,
                path,
            });
        } else if self.colors_enabled() {
            let style = match marker {
                'A' => console::Style::new().green(),
                'U' => console::Style::new().yellow(),
                'D' => console::Style::new().red(),
                _ => console::Style::new(),
            };
            self.write_line(&format!("{} {path}", style.apply_to(marker)));
        } else {
            self.write_line(&format!("{marker} {path}"));
        }
    }

    /// Error scoped to one item or root: `E <item>: <message>`
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn item_error(&self, item: &str, error: &Error) {
        if self.config.json {
            self.write_json(&ErrorLine {
                error: error.to_string(),
                item: Some(item),
            });
        } else {
            self.write_line(&format!("{} {item}: {error}", self.error_marker()));
        }
    }

    /// Error not tied to an item
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            self.write_json(&ErrorLine {
                error: message.to_string(),
                item: None,
            });
        } else {
            self.write_line(&format!("{} {message}", self.error_marker()));
        }
    }

    fn error_marker(&self) -> String {
        if self.colors_enabled() {
            console::Style::new().red().bold().apply_to('E').to_string()
        } else {
            "E".to_string()
        }
    }

    /// Summary of a mutating operation
    pub fn summary(&self, summary: &Summary, dry_run: bool, took: Duration) {
        let seconds = took.as_secs_f64();
        let rate = if seconds > 0.0 {
            summary.operations() as f64 / seconds
        } else {
            0.0
        };

        if self.config.json {
            self.write_json(&SummaryLine {
                counts: *summary,
                dry_run,
                took_ms: took.as_millis(),
                ops_per_sec: rate,
            });
            return;
        }

        let title = if dry_run {
            "-- summary (dry-run) --"
        } else {
            "-- summary --"
        };
        self.write_line(title);
        self.write_line(&summary.to_string());
        self.write_line(&format!("took: {took:.2?} ({rate:.1} ops/s)"));
    }

    /// Start a spinner; hidden unless stdout is an interactive terminal
    pub fn spinner(&self, message: &str) -> ProgressBar {
        let interactive = matches!(self.sink, Sink::Stdout) && console::Term::stdout().is_term();
        ProgressBar::spinner(&self.config, message, interactive, self.progress.clone())
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> OutputConfig {
        OutputConfig {
            no_color: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_formatter_default() {
        let formatter = Formatter::default();
        assert!(!formatter.is_json());
        assert!(!formatter.is_quiet());
        assert!(formatter.colors_enabled());
    }

    #[test]
    fn test_formatter_json_mode() {
        let config = OutputConfig {
            json: true,
            ..Default::default()
        };
        let formatter = Formatter::new(config);
        assert!(formatter.is_json());
        assert!(!formatter.colors_enabled()); // Colors disabled in JSON mode
    }

    #[test]
    fn test_action_and_error_lines() {
        let (formatter, buffer) = Formatter::buffered(plain());
        formatter.action('A', "a/b.txt");
        formatter.item_error("s3://bucket/key", &Error::NotFound("s3://bucket/key".into()));
        assert_eq!(
            buffer.contents(),
            "A a/b.txt\nE s3://bucket/key: Not found: s3://bucket/key\n"
        );
    }

    #[test]
    fn test_quiet_keeps_errors_and_data() {
        let (formatter, buffer) = Formatter::buffered(OutputConfig {
            quiet: true,
            ..plain()
        });
        formatter.action('D', "x");
        formatter.println("progress");
        formatter.line("data");
        formatter.error("boom");
        assert_eq!(buffer.contents(), "data\nE boom\n");
    }

    #[test]
    fn test_summary_human() {
        let (formatter, buffer) = Formatter::buffered(plain());
        let summary = Summary {
            added: 2,
            ..Default::default()
        };
        formatter.summary(&summary, true, Duration::from_millis(500));

        let out = buffer.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "-- summary (dry-run) --");
        assert_eq!(lines[1], "2 added 0 deleted 0 updated 0 unchanged");
        assert!(lines[2].starts_with("took: "));
        assert!(lines[2].ends_with("(4.0 ops/s)"));
    }

    #[test]
    fn test_summary_json() {
        let (formatter, buffer) = Formatter::buffered(OutputConfig {
            json: true,
            ..Default::default()
        });
        let summary = Summary {
            deleted: 3,
            unchanged: 1,
            ..Default::default()
        };
        formatter.summary(&summary, false, Duration::from_secs(1));

        let value: serde_json::Value = serde_json::from_str(buffer.contents().trim()).unwrap();
        assert_eq!(value["deleted"], 3);
        assert_eq!(value["unchanged"], 1);
        assert_eq!(value["dry_run"], false);
    }

    #[test]
    fn test_buffered_spinner_is_hidden() {
        let (formatter, _buffer) = Formatter::buffered(OutputConfig::default());
        assert!(!formatter.spinner("listing").is_visible());
    }
}
