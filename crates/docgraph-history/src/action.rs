/// Reversible mutation units and their emit callbacks.
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::HistoryError;
use crate::slot::{ActionMetadata, ValueSlot};

/// Which slot an action writes when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Write the new slot: initial application and redo.
    New,
    /// Write the old slot: undo.
    Old,
}

/// Callback run after every application of an action, in either direction.
pub type EmitFn = Box<dyn FnMut(Direction) -> anyhow::Result<()>>;

type ApplyFn = Box<dyn FnMut(Direction) -> Result<(), HistoryError>>;
type EmitList = Rc<RefCell<Vec<EmitFn>>>;

/// The smallest reversible unit of change.
///
/// Holds the old and new slots inside its apply closure, so undo and redo
/// share one code path: undo writes the old slot, redo writes the new one.
pub struct Action {
    metadata: Option<ActionMetadata>,
    apply_fn: ApplyFn,
    emits: EmitList,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("metadata", &self.metadata)
            .field("emits", &self.emits.try_borrow().map(|e| e.len()).ok())
            .finish_non_exhaustive()
    }
}

impl Action {
    /// Creates an action. `apply` receives whichever slot is being applied.
    pub fn new<V: 'static>(
        old: ValueSlot<V>,
        new: ValueSlot<V>,
        metadata: Option<ActionMetadata>,
        mut apply: impl FnMut(&ValueSlot<V>) -> Result<(), HistoryError> + 'static,
    ) -> Self {
        let apply_fn: ApplyFn = Box::new(move |direction| match direction {
            Direction::New => apply(&new),
            Direction::Old => apply(&old),
        });
        Self {
            metadata,
            apply_fn,
            emits: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Applies one slot, then runs every emit callback in registration order.
    ///
    /// Returns the metadata's entity id, if any. The first failure stops the
    /// chain: remaining callbacks are skipped.
    ///
    /// # Errors
    ///
    /// Propagates apply failures as-is and callback failures as
    /// `HistoryError::Emit`.
    pub fn apply(&mut self, direction: Direction) -> Result<Option<u64>, HistoryError> {
        (self.apply_fn)(direction)?;
        let mut emits = self
            .emits
            .try_borrow_mut()
            .map_err(|_| HistoryError::Reentrant)?;
        for emit in emits.iter_mut() {
            emit(direction).map_err(HistoryError::Emit)?;
        }
        Ok(self.entity_id())
    }

    pub fn data(&self) -> Option<&ActionMetadata> {
        self.metadata.as_ref()
    }

    pub(crate) fn entity_id(&self) -> Option<u64> {
        self.metadata.map(|m| m.entity_id)
    }

    /// Returns a handle for registering callbacks on this action.
    pub fn handle(&self) -> ActionHandle {
        ActionHandle {
            metadata: self.metadata,
            emits: Rc::clone(&self.emits),
        }
    }
}

/// Handle returned by every mutation call.
///
/// Callbacks registered through it persist for the life of the action and
/// fire on every later undo and redo. Registering from inside a running
/// callback is not supported.
#[derive(Clone)]
pub struct ActionHandle {
    metadata: Option<ActionMetadata>,
    emits: EmitList,
}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandle")
            .field("metadata", &self.metadata)
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

impl ActionHandle {
    /// Registers a callback; returns the handle so calls can be chained.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Reentrant` when called while this action's
    /// callbacks are running.
    pub fn emit(
        &self,
        callback: impl FnMut(Direction) -> anyhow::Result<()> + 'static,
    ) -> Result<&Self, HistoryError> {
        self.emits
            .try_borrow_mut()
            .map_err(|_| HistoryError::Reentrant)?
            .push(Box::new(callback));
        Ok(self)
    }

    pub fn data(&self) -> Option<&ActionMetadata> {
        self.metadata.as_ref()
    }

    /// Number of registered callbacks, or `None` while they are running.
    pub fn callback_count(&self) -> Option<usize> {
        self.emits.try_borrow().map(|e| e.len()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::ActionKind;

    /// An action over a shared integer cell; absent means zero.
    fn counter_action(cell: &Rc<RefCell<i32>>, old: i32, new: i32) -> Action {
        let cell = Rc::clone(cell);
        Action::new(
            ValueSlot::present(old),
            ValueSlot::present(new),
            Some(ActionMetadata::new(ActionKind::Upd, 5)),
            move |slot: &ValueSlot<i32>| {
                *cell.borrow_mut() = slot.as_present().copied().unwrap_or(0);
                Ok(())
            },
        )
    }

    #[test]
    fn test_apply_directions() {
        let cell = Rc::new(RefCell::new(1));
        let mut action = counter_action(&cell, 1, 2);

        assert_eq!(action.apply(Direction::New).unwrap(), Some(5));
        assert_eq!(*cell.borrow(), 2);
        action.apply(Direction::Old).unwrap();
        assert_eq!(*cell.borrow(), 1);
        action.apply(Direction::New).unwrap();
        assert_eq!(*cell.borrow(), 2);
    }

    #[test]
    fn test_emits_fire_in_order_after_mutation() {
        let cell = Rc::new(RefCell::new(1));
        let mut action = counter_action(&cell, 1, 2);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let handle = action.handle();
        let (s1, c1) = (Rc::clone(&seen), Rc::clone(&cell));
        let s2 = Rc::clone(&seen);
        handle
            .emit(move |d| {
                s1.borrow_mut().push(format!("first {d:?} {}", c1.borrow()));
                Ok(())
            })
            .unwrap()
            .emit(move |d| {
                s2.borrow_mut().push(format!("second {d:?}"));
                Ok(())
            })
            .unwrap();
        assert_eq!(handle.callback_count(), Some(2));

        action.apply(Direction::New).unwrap();
        action.apply(Direction::Old).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec!["first New 2", "second New", "first Old 1", "second Old"]
        );
    }

    #[test]
    fn test_failing_emit_stops_chain() {
        let cell = Rc::new(RefCell::new(0));
        let mut action = counter_action(&cell, 0, 9);
        let ran = Rc::new(RefCell::new(false));
        let ran_clone = Rc::clone(&ran);
        action
            .handle()
            .emit(|_| anyhow::bail!("boom"))
            .unwrap()
            .emit(move |_| {
                *ran_clone.borrow_mut() = true;
                Ok(())
            })
            .unwrap();

        let err = action.apply(Direction::New).unwrap_err();
        assert!(matches!(err, HistoryError::Emit(_)));
        assert_eq!(*cell.borrow(), 9);
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_registering_inside_callback_is_rejected() {
        let cell = Rc::new(RefCell::new(0));
        let mut action = counter_action(&cell, 0, 1);
        let handle = action.handle();
        let inner = handle.clone();
        let outcome = Rc::new(RefCell::new(None));
        let outcome_clone = Rc::clone(&outcome);
        handle
            .emit(move |_| {
                let res = inner.emit(|_| Ok(())).map(|_| ());
                *outcome_clone.borrow_mut() = Some(res.is_err());
                Ok(())
            })
            .unwrap();

        action.apply(Direction::New).unwrap();
        assert_eq!(*outcome.borrow(), Some(true));
        assert_eq!(handle.callback_count(), Some(1));
    }

    #[test]
    fn test_callback_count_unknown_while_running() {
        let cell = Rc::new(RefCell::new(0));
        let mut action = counter_action(&cell, 0, 1);
        let handle = action.handle();
        let inner = handle.clone();
        let seen = Rc::new(RefCell::new(Some(99)));
        let seen_clone = Rc::clone(&seen);
        handle
            .emit(move |_| {
                *seen_clone.borrow_mut() = inner.callback_count();
                Ok(())
            })
            .unwrap();

        action.apply(Direction::New).unwrap();
        assert_eq!(*seen.borrow(), None);
        assert_eq!(handle.callback_count(), Some(1));
    }

    #[test]
    fn test_action_without_metadata_has_no_id() {
        let cell = Rc::new(RefCell::new(0));
        let c = Rc::clone(&cell);
        let mut action = Action::new(ValueSlot::absent(), ValueSlot::present(3), None, move |s| {
            *c.borrow_mut() = s.as_present().copied().unwrap_or(0);
            Ok(())
        });
        assert_eq!(action.apply(Direction::New).unwrap(), None);
        assert!(action.data().is_none());
        assert!(action.handle().data().is_none());
    }
}
