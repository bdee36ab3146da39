use crate::entry::SettingsEntry;

/// Receiver of the entries produced while parsing one compiler invocation.
pub trait ProcessingContext {
    fn add_entry(&mut self, entry: SettingsEntry);
}

/// Ordered, append-only accumulator of entries.
///
/// Insertion order is kept as is, later entries may shadow earlier ones
/// for whoever consumes the result.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    entries: Vec<SettingsEntry>,
}

impl ProcessingResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SettingsEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<SettingsEntry> {
        self.entries
    }
}

impl ProcessingContext for ProcessingResult {
    fn add_entry(&mut self, entry: SettingsEntry) {
        self.entries.push(entry);
    }
}
