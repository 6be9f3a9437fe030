//! Terminal progress for bootstrap runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::{Phase, ProgressCallback};
use crate::ui;

/// Longest label shown next to the bar
const LABEL_WIDTH: usize = 40;

/// Prints each phase and draws a bar while the queue runs
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallback for BarProgress {
    fn on_phase(&mut self, phase: Phase) {
        ui::phase(&phase.to_string());
    }

    fn on_queue_start(&mut self, count: usize) {
        let pb = ProgressBar::new(count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        self.bar = Some(pb);
    }

    fn on_entry_start(&mut self, label: &str) {
        if let Some(pb) = &self.bar {
            pb.set_message(ui::truncate(label, LABEL_WIDTH));
        }
    }

    fn on_entry_complete(&mut self, label: &str) {
        if let Some(pb) = &self.bar {
            pb.suspend(|| println!("  {} {}", "✓".green(), label));
            pb.inc(1);
        }
    }

    fn on_queue_complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}
