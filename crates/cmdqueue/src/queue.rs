//! The command queue - ordered, append-only, drained once

use crate::error::Result;
use crate::types::{CommandEntry, Payload};
use std::vec;

/// Ordered sequence of entries built during one configuration pass.
///
/// Entries are never reordered, merged or deduplicated. [`drain`](Self::drain)
/// hands them out in insertion order and leaves the queue empty.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: Vec<CommandEntry>,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validated entry
    ///
    /// Fails with a structural error if the label or payload is empty;
    /// nothing is appended in that case.
    pub fn append(
        &mut self,
        label: impl Into<String>,
        payload: impl Into<Payload>,
        check: Option<String>,
    ) -> Result<()> {
        let entry = CommandEntry::new(label, payload, check);
        entry.validate()?;
        self.entries.push(entry);
        Ok(())
    }

    /// Consume every entry in insertion order
    pub fn drain(&mut self) -> vec::Drain<'_, CommandEntry> {
        self.entries.drain(..)
    }

    /// Borrow the entries without consuming them
    pub fn iter(&self) -> std::slice::Iter<'_, CommandEntry> {
        self.entries.iter()
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Raw entries are accepted as-is; the orchestrator validates again on drain.
impl Extend<CommandEntry> for CommandQueue {
    fn extend<I: IntoIterator<Item = CommandEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl FromIterator<CommandEntry> for CommandQueue {
    fn from_iter<I: IntoIterator<Item = CommandEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CommandQueue {
    type Item = &'a CommandEntry;
    type IntoIter = std::slice::Iter<'a, CommandEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
