//! In-memory [`SuffixReference`] implementation.
//!
//! Rows are kept per stage table in insertion order, with a suffix index
//! pointing at the first row seen for each suffix.

use std::collections::HashMap;

use super::{StageTable, SuffixEntry, SuffixReference};

#[derive(Debug, Default, Clone)]
pub struct MemoryReference {
    rows: HashMap<StageTable, Vec<SuffixEntry>>,
    by_suffix: HashMap<(StageTable, String), usize>,
}

impl MemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to `table`. A later row for an already-present suffix
    /// is kept but never returned by [`SuffixReference::lookup`].
    pub fn insert(&mut self, table: StageTable, entry: SuffixEntry) {
        let rows = self.rows.entry(table).or_default();
        self.by_suffix
            .entry((table, entry.suffix.clone()))
            .or_insert(rows.len());
        rows.push(entry);
    }

    /// Builder-style convenience for tests and fixtures.
    pub fn with_row(
        mut self,
        table: StageTable,
        suffix: &str,
        description: &str,
        units: &str,
        level: &str,
    ) -> Self {
        self.insert(
            table,
            SuffixEntry {
                suffix: suffix.to_string(),
                description: Some(description.to_string()),
                units: Some(units.to_string()),
                level: Some(level.to_string()),
            },
        );
        self
    }

    pub fn row_count(&self, table: StageTable) -> usize {
        self.rows.get(&table).map(Vec::len).unwrap_or(0)
    }

    pub fn total_rows(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }
}

impl SuffixReference for MemoryReference {
    fn lookup(&self, table: StageTable, suffix: &str) -> Option<&SuffixEntry> {
        let idx = *self.by_suffix.get(&(table, suffix.to_string()))?;
        self.rows.get(&table).and_then(|rows| rows.get(idx))
    }
}
