/// Value slots and the caller-supplied action metadata.
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value paired with its presence flag.
///
/// Distinguishes "absent" from "present with a null-like value". Applying a
/// slot with `exists == false` deletes the location instead of writing to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSlot<V> {
    /// The stored value. Always `None` when `exists` is false.
    pub value: Option<V>,
    /// Whether the location holds a value.
    pub exists: bool,
}

impl<V> ValueSlot<V> {
    /// A slot holding `value`.
    pub fn present(value: V) -> Self {
        Self {
            value: Some(value),
            exists: true,
        }
    }

    /// A slot describing an absent location.
    pub fn absent() -> Self {
        Self {
            value: None,
            exists: false,
        }
    }

    /// Builds a slot from an optional value: `None` means absent.
    pub fn from_option(value: Option<V>) -> Self {
        match value {
            Some(v) => Self::present(v),
            None => Self::absent(),
        }
    }

    /// Returns the value if the slot is present.
    pub fn as_present(&self) -> Option<&V> {
        if self.exists {
            self.value.as_ref()
        } else {
            None
        }
    }
}

/// The kind of edit an action represents. Opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Init,
    Add,
    Del,
    Mov,
    Upd,
}

impl ActionKind {
    /// Short lowercase tag, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Init => "init",
            ActionKind::Add => "add",
            ActionKind::Del => "del",
            ActionKind::Mov => "mov",
            ActionKind::Upd => "upd",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag attached to an action by the caller.
///
/// Used for log lines and undo/redo previews only; the engine never
/// interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMetadata {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(rename = "entityId")]
    pub entity_id: u64,
    #[serde(
        rename = "relatedEntityId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub related_entity_id: Option<u64>,
}

impl ActionMetadata {
    pub fn new(kind: ActionKind, entity_id: u64) -> Self {
        Self {
            kind,
            entity_id,
            related_entity_id: None,
        }
    }

    /// Sets the related entity (e.g. the target of a move).
    pub fn related_to(mut self, entity_id: u64) -> Self {
        self.related_entity_id = Some(entity_id);
        self
    }
}

impl fmt::Display for ActionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.related_entity_id {
            Some(related) => write!(f, "{}#{}->{}", self.kind, self.entity_id, related),
            None => write!(f, "{}#{}", self.kind, self.entity_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_and_absent() {
        let slot = ValueSlot::present(3);
        assert!(slot.exists);
        assert_eq!(slot.as_present(), Some(&3));

        let slot: ValueSlot<i32> = ValueSlot::absent();
        assert!(!slot.exists);
        assert_eq!(slot.as_present(), None);
    }

    #[test]
    fn test_present_null_is_not_absent() {
        let slot = ValueSlot::present(serde_json::Value::Null);
        assert!(slot.exists);
        assert_ne!(slot, ValueSlot::absent());
    }

    #[test]
    fn test_from_option() {
        assert_eq!(ValueSlot::from_option(Some("x")), ValueSlot::present("x"));
        assert_eq!(ValueSlot::<&str>::from_option(None), ValueSlot::absent());
    }

    #[test]
    fn test_metadata_display() {
        assert_eq!(ActionMetadata::new(ActionKind::Upd, 7).to_string(), "upd#7");
        assert_eq!(
            ActionMetadata::new(ActionKind::Mov, 7).related_to(9).to_string(),
            "mov#7->9"
        );
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = ActionMetadata::new(ActionKind::Del, 4);
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(json, serde_json::json!({"type": "del", "entityId": 4}));

        let parsed: ActionMetadata =
            serde_json::from_str(r#"{"type":"mov","entityId":1,"relatedEntityId":2}"#).unwrap();
        assert_eq!(parsed, ActionMetadata::new(ActionKind::Mov, 1).related_to(2));
    }
}
