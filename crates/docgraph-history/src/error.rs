/// All errors that can be returned while recording, applying, undoing
/// or redoing mutations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A value path was built with no segments.
    #[error("value path must contain at least one segment")]
    EmptyPath,

    /// An intermediate path segment is missing or does not resolve to a record.
    #[error("segment `{segment}` of path `{path}` does not resolve to a record")]
    NotARecord { path: String, segment: String },

    /// `undo` or an undo preview was requested with no done entries.
    #[error("nothing to undo")]
    NothingToUndo,

    /// `redo` or a redo preview was requested with no undone entries.
    #[error("nothing to redo")]
    NothingToRedo,

    /// The mutation target was already borrowed when an action applied.
    #[error("mutation target is already borrowed")]
    TargetBorrowed,

    /// A callback was registered on an action while its callbacks were running.
    #[error("callbacks cannot be registered while the action is applying")]
    Reentrant,

    /// An emit callback failed; later callbacks of the same action did not run.
    #[error("emit callback failed: {0}")]
    Emit(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_record_message_names_segment() {
        let err = HistoryError::NotARecord {
            path: "a.b.c".to_string(),
            segment: "b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "segment `b` of path `a.b.c` does not resolve to a record"
        );
    }

    #[test]
    fn test_emit_error_keeps_source() {
        let err = HistoryError::Emit(anyhow::anyhow!("sprite cache gone"));
        assert!(err.to_string().contains("sprite cache gone"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
