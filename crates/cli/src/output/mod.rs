//! Output formatting utilities
//!
//! This module provides formatters for CLI output in both human-readable
//! and JSON formats. It also handles progress spinners and colored output.

mod formatter;
mod progress;

pub use formatter::{Formatter, SharedBuffer};
pub use progress::ProgressBar;

use s3k_core::config::Defaults;

/// Output configuration derived from CLI flags and configured defaults
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress spinner
    pub no_progress: bool,
    /// Suppress per-item progress lines
    pub quiet: bool,
}

impl OutputConfig {
    /// Apply configured defaults under the flags
    pub fn with_defaults(mut self, defaults: &Defaults) -> Self {
        self.json |= defaults.output == "json";
        self.no_color |= defaults.color == "never";
        self.no_progress |= !defaults.progress;
        self
    }
}
