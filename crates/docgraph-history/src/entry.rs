/// Ordered groups of actions that undo and redo as one step.
use crate::action::{Action, Direction};
use crate::error::HistoryError;
use crate::slot::ActionMetadata;

/// A group of actions forming a single undo step.
///
/// Actions apply in push order in both directions. Undo does not reverse
/// the order, so an action whose old slot was captured after an earlier
/// action of the same entry ran may not restore the exact prior state.
#[derive(Debug, Default)]
pub struct Entry {
    /// Actions in this entry, in push order.
    actions: Vec<Action>,
    /// Human-readable label written to the log.
    description: Option<String>,
}

impl Entry {
    pub fn new(description: Option<String>) -> Self {
        Self {
            actions: Vec::new(),
            description,
        }
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Applies every action forward and logs the entry.
    pub fn apply(&mut self) -> Result<Vec<Option<u64>>, HistoryError> {
        self.run(Direction::New, None)
    }

    pub fn undo(&mut self) -> Result<Vec<Option<u64>>, HistoryError> {
        self.run(Direction::Old, Some("UNDO"))
    }

    pub fn redo(&mut self) -> Result<Vec<Option<u64>>, HistoryError> {
        self.run(Direction::New, Some("REDO"))
    }

    /// Logs the entry without applying it.
    ///
    /// Used at commit time for transactions whose actions were already
    /// applied one by one.
    pub fn log(&self) -> Vec<Option<u64>> {
        let ids: Vec<Option<u64>> = self.actions.iter().map(Action::entity_id).collect();
        self.write_log(None, &ids);
        ids
    }

    /// Metadata of the most recently pushed action.
    pub fn data(&self) -> Option<&ActionMetadata> {
        self.actions.last().and_then(Action::data)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Applies only the most recently pushed action.
    ///
    /// A failing action is removed again so the entry never replays it.
    pub(crate) fn apply_last(&mut self) -> Result<Option<u64>, HistoryError> {
        let Some(action) = self.actions.last_mut() else {
            return Ok(None);
        };
        match action.apply(Direction::New) {
            Ok(id) => Ok(id),
            Err(e) => {
                self.actions.pop();
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        direction: Direction,
        prefix: Option<&str>,
    ) -> Result<Vec<Option<u64>>, HistoryError> {
        let mut ids = Vec::with_capacity(self.actions.len());
        for action in &mut self.actions {
            ids.push(action.apply(direction)?);
        }
        self.write_log(prefix, &ids);
        Ok(ids)
    }

    fn write_log(&self, prefix: Option<&str>, ids: &[Option<u64>]) {
        let Some(description) = &self.description else {
            return;
        };
        let ids = format_ids(ids);
        match prefix {
            Some(prefix) => tracing::info!("{prefix} [{ids}]: {description}"),
            None => tracing::info!("[{ids}]: {description}"),
        }
    }
}

/// Renders ids as `1,2,_` where `_` marks an action without metadata.
pub(crate) fn format_ids(ids: &[Option<u64>]) -> String {
    ids.iter()
        .map(|id| id.map_or_else(|| "_".to_string(), |id| id.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}
