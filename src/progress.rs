//! Progress indicators for gwsync runs.

use crate::ui;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{EntityReport, Kind, KindReport, ProgressCallback};

/// Progress bar over kinds; entity errors are printed above the bar
pub struct KindProgress {
    bar: ProgressBar,
}

impl KindProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for KindProgress {
    fn on_run_start(&mut self, kinds: &[Kind]) {
        self.bar.set_length(kinds.len() as u64);
    }

    fn on_kind_start(&mut self, kind: Kind, count: usize) {
        self.bar.set_message(format!("{kind} ({count})"));
    }

    fn on_entity_complete(&mut self, _kind: Kind, entity: &EntityReport) {
        if entity.status.status.is_error() {
            self.bar.suspend(|| {
                println!(
                    "  {} {} ({})",
                    "✗".red(),
                    entity.entity,
                    ui::truncate(&entity.status.description, 60)
                );
            });
        }
    }

    fn on_kind_complete(&mut self, report: &KindReport) {
        if let reconcile::KindOutcome::TransportFailed { error } = &report.outcome {
            self.bar.suspend(|| {
                println!("  {} {}: {}", "⚠".yellow(), report.kind, error);
            });
        }
        self.bar.inc(1);
    }
}
