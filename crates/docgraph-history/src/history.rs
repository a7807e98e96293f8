/// Editing session: transaction coordination and mutation entry points.
///
/// A `History` owns the committed entries of one document plus the
/// optional open transaction. Every mutation applies immediately; it is
/// either appended to the open transaction or committed as its own entry.
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::action::{Action, ActionHandle, Direction};
use crate::config::HistoryConfig;
use crate::entry::Entry;
use crate::error::HistoryError;
use crate::map::KeyedMap;
use crate::path::{get_slot, write_slot, Lens, ValuePath};
use crate::slot::{ActionMetadata, ValueSlot};
use crate::store::HistoryStore;

/// A single-threaded shared mutation target.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wraps a value so it can be captured by recorded actions.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Optional arguments of a mutation call.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Label logged when the entry is applied, undone or redone.
    pub description: Option<String>,
    pub metadata: Option<ActionMetadata>,
    /// Delete the location instead of writing the new value.
    pub removal: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: ActionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn removal(mut self) -> Self {
        self.removal = true;
        self
    }

    fn new_slot<V>(&self, value: V) -> ValueSlot<V> {
        if self.removal {
            ValueSlot::absent()
        } else {
            ValueSlot::present(value)
        }
    }
}

/// Undo/redo history for one editing session.
///
/// Mutation calls made from inside an emit callback are not supported.
pub struct History {
    store: HistoryStore,
    /// Entry being assembled by an open transaction.
    transaction: Option<Entry>,
    /// Whether mutations are recorded (false while paused).
    recording: bool,
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("store", &self.store)
            .field(
                "transaction_len",
                &self.transaction.as_ref().map(Entry::len),
            )
            .field("recording", &self.recording)
            .finish()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl History {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            store: HistoryStore::with_max_depth(config.max_depth),
            transaction: None,
            recording: true,
        }
    }

    /// Opens a transaction. Returns false, changing nothing, if one is already open.
    pub fn start_transaction(&mut self, description: Option<&str>) -> bool {
        if self.transaction.is_some() {
            tracing::debug!("Transaction already open, ignoring start");
            return false;
        }
        self.transaction = Some(Entry::new(description.map(str::to_string)));
        true
    }

    /// Logs and commits the open transaction. No-op if none is open.
    pub fn commit_transaction(&mut self) {
        let Some(entry) = self.transaction.take() else {
            return;
        };
        tracing::debug!("Committing transaction with {} action(s)", entry.len());
        entry.log();
        self.store.commit(entry);
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Sets or deletes the value at `path` inside a JSON record.
    ///
    /// # Errors
    ///
    /// Fails if the path does not resolve, the target is already borrowed,
    /// or the action fails to apply.
    pub fn update_value(
        &mut self,
        target: &Shared<Value>,
        path: &ValuePath,
        new_value: Value,
        options: UpdateOptions,
    ) -> Result<ActionHandle, HistoryError> {
        let old = {
            let root = target
                .try_borrow()
                .map_err(|_| HistoryError::TargetBorrowed)?;
            get_slot(&root, path)?
        };
        let new = options.new_slot(new_value);
        let target = Rc::clone(target);
        let path = path.clone();
        let action = Action::new(old, new, options.metadata, move |slot| {
            let mut root = target
                .try_borrow_mut()
                .map_err(|_| HistoryError::TargetBorrowed)?;
            write_slot(&mut root, &path, slot)
        });
        self.record(action, options.description)
    }

    /// Deletes the value at `path`.
    pub fn remove_value(
        &mut self,
        target: &Shared<Value>,
        path: &ValuePath,
        options: UpdateOptions,
    ) -> Result<ActionHandle, HistoryError> {
        self.update_value(target, path, Value::Null, options.removal())
    }

    /// Sets or removes `key` inside a keyed mapping.
    pub fn update_map<M>(
        &mut self,
        target: &Shared<M>,
        key: M::Key,
        new_value: M::Value,
        options: UpdateOptions,
    ) -> Result<ActionHandle, HistoryError>
    where
        M: KeyedMap + 'static,
    {
        let old = target
            .try_borrow()
            .map_err(|_| HistoryError::TargetBorrowed)?
            .slot(&key);
        let new = options.new_slot(new_value);
        self.record_map(target, key, old, new, options)
    }

    /// Removes `key` from a keyed mapping. Absent keys record a no-op action.
    pub fn remove_key<M>(
        &mut self,
        target: &Shared<M>,
        key: M::Key,
        options: UpdateOptions,
    ) -> Result<ActionHandle, HistoryError>
    where
        M: KeyedMap + 'static,
    {
        let old = target
            .try_borrow()
            .map_err(|_| HistoryError::TargetBorrowed)?
            .slot(&key);
        self.record_map(target, key, old, ValueSlot::absent(), options)
    }

    /// Sets or deletes a typed location described by `lens`.
    pub fn update_lens<T, V>(
        &mut self,
        target: &Shared<T>,
        lens: &Lens<T, V>,
        new_value: V,
        options: UpdateOptions,
    ) -> Result<ActionHandle, HistoryError>
    where
        T: 'static,
        V: Clone + 'static,
    {
        let old = {
            let root = target
                .try_borrow()
                .map_err(|_| HistoryError::TargetBorrowed)?;
            lens.slot(&root)
        };
        let new = options.new_slot(new_value);
        let target = Rc::clone(target);
        let lens = lens.clone();
        let action = Action::new(old, new, options.metadata, move |slot| {
            let mut root = target
                .try_borrow_mut()
                .map_err(|_| HistoryError::TargetBorrowed)?;
            lens.write(&mut root, slot);
            Ok(())
        });
        self.record(action, options.description)
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    pub fn undo_preview(&self) -> Result<Option<&ActionMetadata>, HistoryError> {
        self.store.undo_preview()
    }

    pub fn redo_preview(&self) -> Result<Option<&ActionMetadata>, HistoryError> {
        self.store.redo_preview()
    }

    /// Reverts the most recent committed entry.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::NothingToUndo` if there is nothing to undo, or
    /// the first apply/emit failure of the entry.
    pub fn undo(&mut self) -> Result<Vec<Option<u64>>, HistoryError> {
        self.store.undo()
    }

    /// Re-applies the most recently undone entry.
    pub fn redo(&mut self) -> Result<Vec<Option<u64>>, HistoryError> {
        self.store.redo()
    }

    /// Temporarily disables recording. Mutations still apply to their targets.
    pub fn pause_recording(&mut self) {
        self.recording = false;
    }

    /// Re-enables recording after a pause.
    pub fn resume_recording(&mut self) {
        self.recording = true;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Drops all committed history. An open transaction is kept.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    fn record_map<M>(
        &mut self,
        target: &Shared<M>,
        key: M::Key,
        old: ValueSlot<M::Value>,
        new: ValueSlot<M::Value>,
        options: UpdateOptions,
    ) -> Result<ActionHandle, HistoryError>
    where
        M: KeyedMap + 'static,
    {
        let target = Rc::clone(target);
        let action = Action::new(old, new, options.metadata, move |slot| {
            target
                .try_borrow_mut()
                .map_err(|_| HistoryError::TargetBorrowed)?
                .write_slot(&key, slot);
            Ok(())
        });
        self.record(action, options.description)
    }

    /// Applies an action and routes it to the open transaction or a new entry.
    fn record(
        &mut self,
        mut action: Action,
        description: Option<String>,
    ) -> Result<ActionHandle, HistoryError> {
        let handle = action.handle();

        if !self.recording {
            action.apply(Direction::New)?;
            return Ok(handle);
        }

        match self.transaction.as_mut() {
            Some(entry) => {
                entry.push(action);
                entry.apply_last()?;
            }
            None => {
                let mut entry = Entry::new(description);
                entry.push(action);
                entry.apply()?;
                self.store.commit(entry);
            }
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::slot::ActionKind;

    fn path(s: &str) -> ValuePath {
        s.parse().unwrap()
    }

    fn meta(id: u64) -> UpdateOptions {
        UpdateOptions::new().with_metadata(ActionMetadata::new(ActionKind::Upd, id))
    }

    #[test]
    fn test_start_transaction_twice_returns_false() {
        let mut history = History::default();
        assert!(history.start_transaction(Some("outer")));
        assert!(!history.start_transaction(Some("inner")));
        assert!(history.in_transaction());
        history.commit_transaction();
        assert!(!history.in_transaction());
    }

    #[test]
    fn test_commit_without_transaction_is_noop() {
        let mut history = History::default();
        history.commit_transaction();
        assert!(!history.can_undo());
        assert!(!history.in_transaction());
    }

    #[test]
    fn test_transaction_applies_eagerly_but_commits_late() {
        let doc = shared(json!({}));
        let mut history = History::default();
        history.start_transaction(Some("batch"));
        history
            .update_value(&doc, &path("a"), json!(1), UpdateOptions::new())
            .unwrap();
        assert_eq!(*doc.borrow(), json!({"a": 1}));
        assert!(!history.can_undo());

        history.commit_transaction();
        assert!(history.can_undo());
        assert_eq!(history.store().len(), 1);
    }

    #[test]
    fn test_empty_transaction_is_not_stored() {
        let mut history = History::default();
        history.start_transaction(Some("nothing"));
        history.commit_transaction();
        assert!(!history.can_undo());
    }

    #[test]
    fn test_paused_recording_applies_without_history() {
        let doc = shared(json!({"a": 1}));
        let mut history = History::default();
        history.pause_recording();
        assert!(!history.is_recording());
        history
            .update_value(&doc, &path("a"), json!(2), UpdateOptions::new())
            .unwrap();
        assert_eq!(*doc.borrow(), json!({"a": 2}));
        assert!(!history.can_undo());

        history.resume_recording();
        history
            .update_value(&doc, &path("a"), json!(3), UpdateOptions::new())
            .unwrap();
        history.undo().unwrap();
        assert_eq!(*doc.borrow(), json!({"a": 2}));
    }

    #[test]
    fn test_borrowed_target_is_reported() {
        let doc = shared(json!({"a": 1}));
        let mut history = History::default();
        let _guard = doc.borrow_mut();
        let err = history
            .update_value(&doc, &path("a"), json!(2), UpdateOptions::new())
            .unwrap_err();
        assert!(matches!(err, HistoryError::TargetBorrowed));
    }

    #[test]
    fn test_failed_write_in_transaction_is_not_recorded() {
        let doc = shared(json!({"a": 0}));
        let mut history = History::default();
        history.start_transaction(Some("batch"));
        {
            let _reader = doc.borrow();
            let err = history
                .update_value(&doc, &path("a"), json!(99), UpdateOptions::new())
                .unwrap_err();
            assert!(matches!(err, HistoryError::TargetBorrowed));
        }
        history.commit_transaction();
        assert_eq!(*doc.borrow(), json!({"a": 0}));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_failed_write_keeps_earlier_transaction_actions() {
        let doc = shared(json!({"a": 0}));
        let mut history = History::default();
        history.start_transaction(Some("batch"));
        history
            .update_value(&doc, &path("a"), json!(1), UpdateOptions::new())
            .unwrap();
        assert!(history
            .update_value(&doc, &path("x.y"), json!(2), UpdateOptions::new())
            .is_err());
        history.commit_transaction();

        history.undo().unwrap();
        assert_eq!(*doc.borrow(), json!({"a": 0}));
        history.redo().unwrap();
        assert_eq!(*doc.borrow(), json!({"a": 1}));
    }

    #[test]
    fn test_failed_path_records_nothing() {
        let doc = shared(json!({"a": 1}));
        let mut history = History::default();
        let err = history
            .update_value(&doc, &path("missing.leaf"), json!(2), UpdateOptions::new())
            .unwrap_err();
        assert!(matches!(err, HistoryError::NotARecord { .. }));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_remove_key_on_absent_key_round_trips() {
        let map = shared(BTreeMap::<u64, String>::new());
        let mut history = History::default();
        history.remove_key(&map, 3, meta(3)).unwrap();
        assert!(map.borrow().is_empty());
        history.undo().unwrap();
        assert!(map.borrow().is_empty());
    }

    #[test]
    fn test_clear_keeps_open_transaction() {
        let doc = shared(json!({}));
        let mut history = History::default();
        history
            .update_value(&doc, &path("a"), json!(1), UpdateOptions::new())
            .unwrap();
        history.start_transaction(None);
        history.clear();
        assert!(!history.can_undo());
        assert!(history.in_transaction());
    }

    #[test]
    fn test_config_depth_applies() {
        let doc = shared(json!({"n": 0}));
        let mut history = History::new(&HistoryConfig::bounded(2));
        for i in 1..=4 {
            history
                .update_value(&doc, &path("n"), json!(i), UpdateOptions::new())
                .unwrap();
        }
        assert_eq!(history.store().len(), 2);
        history.undo().unwrap();
        history.undo().unwrap();
        assert!(!history.can_undo());
        assert_eq!(*doc.borrow(), json!({"n": 2}));
    }

    #[test]
    #[traced_test]
    fn test_auto_commit_logs_description() {
        let doc = shared(json!({"name": "A"}));
        let mut history = History::default();
        history
            .update_value(
                &doc,
                &path("name"),
                json!("B"),
                UpdateOptions::described("rename").with_metadata(ActionMetadata::new(
                    ActionKind::Upd,
                    12,
                )),
            )
            .unwrap();
        assert!(logs_contain("[12]: rename"));
        history.undo().unwrap();
        assert!(logs_contain("UNDO [12]: rename"));
    }

    #[test]
    #[traced_test]
    fn test_transaction_logs_once_at_commit() {
        let doc = shared(json!({}));
        let mut history = History::default();
        history.start_transaction(Some("move nodes"));
        history.update_value(&doc, &path("a"), json!(1), meta(1)).unwrap();
        history.update_value(&doc, &path("b"), json!(2), meta(2)).unwrap();
        assert!(!logs_contain("move nodes"));
        history.commit_transaction();
        assert!(logs_contain("[1,2]: move nodes"));
    }
}
