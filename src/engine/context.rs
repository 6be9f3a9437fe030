//! Sinks and callbacks the orchestrator reports through
//!
//! These keep the orchestrator free of terminal concerns: the binary plugs
//! in stdout and a progress bar, tests plug in vectors.

use super::orchestrator::Phase;

/// Destination for dry-run listing lines
pub trait LineSink {
    fn line(&mut self, line: &str);
}

impl LineSink for Vec<String> {
    fn line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Writes each line to standard output
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Progress callback for a bootstrap run
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when a phase begins
    fn on_phase(&mut self, phase: Phase);

    /// Called before the queue is drained
    fn on_queue_start(&mut self, count: usize);

    /// Called when starting a single queued entry
    fn on_entry_start(&mut self, label: &str);

    /// Called when an entry and its check have both succeeded
    fn on_entry_complete(&mut self, label: &str);

    /// Called once every entry has run
    fn on_queue_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase(&mut self, _phase: Phase) {}
    fn on_queue_start(&mut self, _count: usize) {}
    fn on_entry_start(&mut self, _label: &str) {}
    fn on_entry_complete(&mut self, _label: &str) {}
    fn on_queue_complete(&mut self) {}
}
