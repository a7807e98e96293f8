/// Executes edit scripts against a document with full undo/redo history.
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use docgraph_history::path::get_slot;
use docgraph_history::{
    shared, ActionHandle, ActionKind, ActionMetadata, History, HistoryConfig, HistoryError,
    Shared, UpdateOptions, ValuePath, ValueSlot,
};
use serde_json::{Map, Value};

use crate::script::{Command, Script};

/// Top-level document key holding the entity registry.
const ENTITIES_KEY: &str = "entities";

/// A document split into its record part and its entity registry,
/// together with the history recording edits to both.
pub struct Workspace {
    doc: Shared<Value>,
    entities: Shared<BTreeMap<u64, Value>>,
    history: History,
    /// Number of entity change notifications delivered so far.
    redraws: Rc<Cell<usize>>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("entities", &self.entities.borrow().len())
            .field("history", &self.history)
            .field("redraws", &self.redraws.get())
            .finish()
    }
}

impl Workspace {
    /// Builds a workspace from a JSON object document.
    ///
    /// A top-level `"entities"` object, keyed by integer ids, becomes the
    /// entity registry; everything else is the record part.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an object or an entity key
    /// is not an integer.
    pub fn from_document(document: Value, config: &HistoryConfig) -> Result<Self> {
        let Value::Object(mut record) = document else {
            bail!("document root must be a JSON object");
        };

        let mut entities = BTreeMap::new();
        match record.remove(ENTITIES_KEY) {
            Some(Value::Object(raw)) => {
                for (key, value) in raw {
                    let id: u64 = key
                        .parse()
                        .with_context(|| format!("invalid entity id `{key}`"))?;
                    entities.insert(id, value);
                }
            }
            Some(_) => bail!("`{ENTITIES_KEY}` must be a JSON object"),
            None => {}
        }
        tracing::debug!("Loaded document with {} entities", entities.len());

        Ok(Self {
            doc: shared(Value::Object(record)),
            entities: shared(entities),
            history: History::new(config),
            redraws: Rc::new(Cell::new(0)),
        })
    }

    /// Runs every command of `script` in order, stopping at the first failure.
    pub fn run_script(&mut self, script: &Script) -> Result<()> {
        for (line, command) in &script.commands {
            self.execute(command)
                .with_context(|| format!("script line {line}"))?;
        }
        if self.history.in_transaction() {
            tracing::warn!("Script ended with an open transaction; committing it");
            self.history.commit_transaction();
        }
        Ok(())
    }

    /// Executes one command.
    pub fn execute(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Set {
                path,
                value,
                description,
            } => {
                ensure_record_path(path)?;
                let options = options(description.as_deref());
                self.history
                    .update_value(&self.doc, path, value.clone(), options)?;
            }
            Command::Del { path, description } => {
                ensure_record_path(path)?;
                let options = options(description.as_deref());
                self.history.remove_value(&self.doc, path, options)?;
            }
            Command::Put {
                id,
                value,
                description,
            } => {
                let kind = if self.entities.borrow().contains_key(id) {
                    ActionKind::Upd
                } else {
                    ActionKind::Add
                };
                let handle = self.history.update_map(
                    &self.entities,
                    *id,
                    value.clone(),
                    options(description.as_deref())
                        .with_metadata(ActionMetadata::new(kind, *id)),
                )?;
                self.notify_on_replay(&handle)?;
            }
            Command::Drop { id, description } => {
                let handle = self.history.remove_key(
                    &self.entities,
                    *id,
                    options(description.as_deref())
                        .with_metadata(ActionMetadata::new(ActionKind::Del, *id)),
                )?;
                self.notify_on_replay(&handle)?;
            }
            Command::Begin { description } => {
                if !self.history.start_transaction(description.as_deref()) {
                    bail!("a transaction is already open");
                }
            }
            Command::Commit => self.history.commit_transaction(),
            Command::Undo => {
                if let Ok(Some(preview)) = self.history.undo_preview() {
                    tracing::debug!("Undoing {preview}");
                }
                self.history.undo()?;
            }
            Command::Redo => {
                if let Ok(Some(preview)) = self.history.redo_preview() {
                    tracing::debug!("Redoing {preview}");
                }
                self.history.redo()?;
            }
            Command::Expect { path, value } => self.check(path, value.as_ref())?,
        }
        Ok(())
    }

    /// Reassembles the document, entity registry included.
    pub fn to_document(&self) -> Value {
        let mut document = self.doc.borrow().clone();
        let entities = self.entities.borrow();
        if let Value::Object(record) = &mut document {
            if !entities.is_empty() {
                let registry: Map<String, Value> = entities
                    .iter()
                    .map(|(id, value)| (id.to_string(), value.clone()))
                    .collect();
                record.insert(ENTITIES_KEY.to_string(), Value::Object(registry));
            }
        }
        document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn redraw_count(&self) -> usize {
        self.redraws.get()
    }

    /// Entity edits notify the view on every undo and redo.
    fn notify_on_replay(&self, handle: &ActionHandle) -> Result<()> {
        let redraws = Rc::clone(&self.redraws);
        let metadata = handle.data().copied();
        handle.emit(move |direction| {
            redraws.set(redraws.get() + 1);
            if let Some(metadata) = metadata {
                tracing::debug!("Redraw {metadata} ({direction:?})");
            }
            Ok(())
        })?;
        Ok(())
    }

    fn check(&self, path: &ValuePath, expected: Option<&Value>) -> Result<()> {
        let document = self.to_document();
        // A missing parent record counts as absent here.
        let actual = match get_slot(&document, path) {
            Ok(slot) => slot,
            Err(HistoryError::NotARecord { .. }) => ValueSlot::absent(),
            Err(e) => return Err(e.into()),
        };
        match (expected, actual.as_present()) {
            (None, None) => Ok(()),
            (Some(expected), Some(actual)) if expected == actual => Ok(()),
            (None, Some(actual)) => bail!("expected `{path}` to be absent, found {actual}"),
            (Some(expected), None) => bail!("expected `{path}` to be {expected}, found nothing"),
            (Some(expected), Some(actual)) => {
                bail!("expected `{path}` to be {expected}, found {actual}")
            }
        }
    }
}

/// Rejects record writes under the key reserved for the entity registry.
fn ensure_record_path(path: &ValuePath) -> Result<()> {
    if path.segments()[0] == ENTITIES_KEY {
        bail!("`{path}` is inside the entity registry; use `put`/`drop` instead");
    }
    Ok(())
}

fn options(description: Option<&str>) -> UpdateOptions {
    match description {
        Some(description) => UpdateOptions::described(description),
        None => UpdateOptions::new(),
    }
}
