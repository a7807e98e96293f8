/// Transactional undo/redo engine for in-memory document graphs.
///
/// Mutations of nested JSON records, keyed mappings or typed lenses are
/// recorded as reversible `Action`s, grouped into `Entry`s and committed
/// to a linear `HistoryStore`. A `History` coordinates transactions and
/// exposes the mutation entry points. Everything is single-threaded and
/// synchronous.
pub mod action;
pub mod config;
pub mod entry;
pub mod error;
pub mod history;
pub mod map;
pub mod path;
pub mod slot;
pub mod store;

pub use action::{Action, ActionHandle, Direction, EmitFn};
pub use config::HistoryConfig;
pub use entry::Entry;
pub use error::HistoryError;
pub use history::{shared, History, Shared, UpdateOptions};
pub use map::KeyedMap;
pub use path::{Lens, ValuePath};
pub use slot::{ActionKind, ActionMetadata, ValueSlot};
pub use store::HistoryStore;
