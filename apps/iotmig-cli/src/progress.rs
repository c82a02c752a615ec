//! Terminal progress for fetches and migration.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use iotmig_engine::ProgressReporter;

const BAR_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} ({pos} pages)";

/// Progress bar over the devices being migrated.
pub struct MigrationProgress {
    bar: ProgressBar,
}

impl MigrationProgress {
    /// Create a bar; the total is set by the engine once work is enqueued.
    pub fn new(operation: &str) -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.set_message(operation.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl ProgressReporter for MigrationProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Spinner counting fetched pages or id batches.
pub struct FetchSpinner {
    spinner: ProgressBar,
}

impl FetchSpinner {
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self { spinner }
    }
}

impl ProgressReporter for FetchSpinner {
    fn inc(&self, delta: u64) {
        self.spinner.inc(delta);
    }

    fn finish(&self, _message: &str) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse() {
        assert!(ProgressStyle::default_bar().template(BAR_TEMPLATE).is_ok());
        assert!(ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .is_ok());
    }

    #[test]
    fn test_migration_progress_counts() {
        let progress = MigrationProgress::new("Migrating devices");
        progress.set_total(3);
        progress.inc(1);
        progress.inc(1);
        assert_eq!(progress.bar.position(), 2);
        assert_eq!(progress.bar.length(), Some(3));
        progress.finish("done");
        assert!(progress.bar.is_finished());
    }
}
