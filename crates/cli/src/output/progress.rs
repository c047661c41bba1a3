//! Progress spinner for bulk operations
//!
//! Shows a running count while workers process items. Hidden in quiet or
//! JSON mode and whenever stdout is not a terminal.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::OutputConfig;

/// Shared handle to the active spinner, so the formatter can suspend it
/// while printing lines
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgressSlot(Arc<Mutex<Option<indicatif::ProgressBar>>>);

impl ProgressSlot {
    pub(crate) fn current(&self) -> Option<indicatif::ProgressBar> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, bar: Option<indicatif::ProgressBar>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = bar;
    }
}

/// Progress spinner wrapper
#[derive(Debug)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
    slot: ProgressSlot,
}

impl ProgressBar {
    /// Create a spinner counting processed items
    pub(crate) fn spinner(
        config: &OutputConfig,
        message: &str,
        interactive: bool,
        slot: ProgressSlot,
    ) -> Self {
        let bar = if config.quiet || config.json || config.no_progress || !interactive {
            None
        } else {
            let bar = indicatif::ProgressBar::new_spinner();
            let style = indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{pos} done, {elapsed}]")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
            slot.set(Some(bar.clone()));
            Some(bar)
        };

        Self { bar, slot }
    }

    /// Count one processed item
    pub fn inc(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// Set message
    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// Finish and clear the spinner
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
            self.slot.set(None);
        }
    }

    /// Check if the spinner is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        self.finish_and_clear();
    }
}
