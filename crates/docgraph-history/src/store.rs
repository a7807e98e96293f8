/// Committed entries and the cursor separating done from undone.
use crate::entry::Entry;
use crate::error::HistoryError;
use crate::slot::ActionMetadata;

/// Linear undo/redo history.
///
/// Entries below the cursor are done; entries at or above it are only
/// reachable through redo. Committing after an undo discards the undone
/// entries: history never branches.
#[derive(Default)]
pub struct HistoryStore {
    /// Committed entries, oldest first.
    entries: Vec<Entry>,
    /// Number of done entries. Always `<= entries.len()`.
    cursor: usize,
    /// Max committed entries kept (0 = unlimited).
    max_depth: usize,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl HistoryStore {
    /// Creates an empty store with no depth limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that keeps at most `max_depth` entries.
    ///
    /// A depth of 0 disables the limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Metadata of the entry `undo` would revert, without applying it.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NothingToUndo` if `can_undo()` is false.
    pub fn undo_preview(&self) -> Result<Option<&ActionMetadata>, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::NothingToUndo);
        }
        Ok(self.entries[self.cursor - 1].data())
    }

    /// Metadata of the entry `redo` would re-apply, without applying it.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NothingToRedo` if `can_redo()` is false.
    pub fn redo_preview(&self) -> Result<Option<&ActionMetadata>, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::NothingToRedo);
        }
        Ok(self.entries[self.cursor].data())
    }

    /// Reverts the most recent done entry and moves the cursor back.
    ///
    /// If an action fails part way, the error propagates and the cursor is
    /// left where it was.
    pub fn undo(&mut self) -> Result<Vec<Option<u64>>, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::NothingToUndo);
        }
        let ids = self.entries[self.cursor - 1].undo()?;
        self.cursor -= 1;
        Ok(ids)
    }

    /// Re-applies the next undone entry and moves the cursor forward.
    pub fn redo(&mut self) -> Result<Vec<Option<u64>>, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::NothingToRedo);
        }
        let ids = self.entries[self.cursor].redo()?;
        self.cursor += 1;
        Ok(ids)
    }

    /// Appends an entry, discarding every entry at or above the cursor.
    ///
    /// Empty entries are never stored.
    pub fn commit(&mut self, entry: Entry) {
        if entry.is_empty() {
            tracing::debug!("Skipping commit of empty history entry");
            return;
        }

        let discarded = self.entries.len() - self.cursor;
        if discarded > 0 {
            tracing::debug!("Discarding {discarded} redoable history entries");
            self.entries.truncate(self.cursor);
        }
        self.entries.push(entry);
        self.cursor += 1;

        if self.max_depth > 0 && self.entries.len() > self.max_depth {
            let excess = self.entries.len() - self.max_depth;
            self.entries.drain(..excess);
            self.cursor -= excess;
            tracing::debug!("Evicted {excess} oldest history entries");
        }
    }

    /// Drops every committed entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
