use std::collections::HashMap;

/// Per-document revision numbers.
///
/// Revisions start at 0 and only ever move up by one. Entries outlive the
/// document's presence session so a document that empties and is later
/// re-opened never hands out a revision twice.
#[derive(Debug, Default)]
pub struct RevisionCounter {
    revisions: HashMap<String, u64>,
}

impl RevisionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one accepted edit and return the document's new revision.
    pub fn next_revision(&mut self, document_id: &str) -> u64 {
        let revision = self.revisions.entry(document_id.to_string()).or_insert(0);
        *revision += 1;
        *revision
    }

    pub fn current(&self, document_id: &str) -> u64 {
        self.revisions.get(document_id).copied().unwrap_or(0)
    }

    pub fn document_count(&self) -> usize {
        self.revisions.len()
    }
}
