/// Path-addressed access into nested JSON records, plus typed lenses.
///
/// A `ValuePath` names a location by descending one record level per
/// segment. Only the final segment may be missing; every intermediate
/// segment must resolve to an object.
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::HistoryError;
use crate::slot::ValueSlot;

/// A non-empty sequence of record keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValuePath {
    segments: Vec<String>,
}

impl ValuePath {
    /// Builds a path from segments.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::EmptyPath` if no segments are given.
    pub fn new<I, S>(segments: I) -> Result<Self, HistoryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(HistoryError::EmptyPath);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// All segments except the last one.
    pub fn parents(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// The final segment, naming the property being read or written.
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn not_a_record(&self, segment: &str) -> HistoryError {
        HistoryError::NotARecord {
            path: self.to_string(),
            segment: segment.to_string(),
        }
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for ValuePath {
    type Err = HistoryError;

    /// Parses dotted text such as `nodes.n1.label`. Empty segments are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.split('.').any(str::is_empty) {
            return Err(HistoryError::EmptyPath);
        }
        Self::new(s.split('.'))
    }
}

/// Name used in errors when the root itself is not a record.
const ROOT_SEGMENT: &str = "$";

fn parent<'a>(root: &'a Value, path: &ValuePath) -> Result<&'a Map<String, Value>, HistoryError> {
    let mut current = root;
    let mut reached = ROOT_SEGMENT;
    for segment in path.parents() {
        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(|| path.not_a_record(segment))?,
            _ => return Err(path.not_a_record(reached)),
        };
        reached = segment.as_str();
    }
    match current {
        Value::Object(map) => Ok(map),
        _ => Err(path.not_a_record(reached)),
    }
}

fn parent_mut<'a>(
    root: &'a mut Value,
    path: &ValuePath,
) -> Result<&'a mut Map<String, Value>, HistoryError> {
    let mut current = root;
    let mut reached = ROOT_SEGMENT;
    for segment in path.parents() {
        current = match current {
            Value::Object(map) => map
                .get_mut(segment)
                .ok_or_else(|| path.not_a_record(segment))?,
            _ => return Err(path.not_a_record(reached)),
        };
        reached = segment.as_str();
    }
    match current {
        Value::Object(map) => Ok(map),
        _ => Err(path.not_a_record(reached)),
    }
}

/// Reads the slot at `path`.
///
/// # Errors
///
/// Returns `HistoryError::NotARecord` if an intermediate segment does not
/// resolve to an object.
pub fn get_slot(root: &Value, path: &ValuePath) -> Result<ValueSlot<Value>, HistoryError> {
    let map = parent(root, path)?;
    Ok(ValueSlot::from_option(map.get(path.leaf()).cloned()))
}

/// Writes `value` at `path`, creating the final key if needed.
pub fn set_value(root: &mut Value, path: &ValuePath, value: Value) -> Result<(), HistoryError> {
    let map = parent_mut(root, path)?;
    map.insert(path.leaf().to_string(), value);
    Ok(())
}

/// Removes the final key at `path`. Absent keys are left alone.
pub fn delete_value(root: &mut Value, path: &ValuePath) -> Result<(), HistoryError> {
    let map = parent_mut(root, path)?;
    map.remove(path.leaf());
    Ok(())
}

/// Writes or deletes depending on the slot's presence flag.
pub fn write_slot(
    root: &mut Value,
    path: &ValuePath,
    slot: &ValueSlot<Value>,
) -> Result<(), HistoryError> {
    match slot.as_present() {
        Some(value) => set_value(root, path, value.clone()),
        None => delete_value(root, path),
    }
}

type Getter<T, V> = Rc<dyn Fn(&T) -> Option<V>>;
type Setter<T, V> = Rc<dyn Fn(&mut T, V)>;
type Deleter<T> = Rc<dyn Fn(&mut T)>;

/// A typed location inside a root of type `T`.
///
/// Bundles the getter, setter and deleter for one concrete place so that
/// statically typed documents can be edited without going through JSON.
pub struct Lens<T, V> {
    get: Getter<T, V>,
    set: Setter<T, V>,
    delete: Deleter<T>,
}

impl<T, V> Clone for Lens<T, V> {
    fn clone(&self) -> Self {
        Self {
            get: Rc::clone(&self.get),
            set: Rc::clone(&self.set),
            delete: Rc::clone(&self.delete),
        }
    }
}

impl<T, V> fmt::Debug for Lens<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens").finish_non_exhaustive()
    }
}

impl<T, V: Clone> Lens<T, V> {
    pub fn new(
        get: impl Fn(&T) -> Option<V> + 'static,
        set: impl Fn(&mut T, V) + 'static,
        delete: impl Fn(&mut T) + 'static,
    ) -> Self {
        Self {
            get: Rc::new(get),
            set: Rc::new(set),
            delete: Rc::new(delete),
        }
    }

    pub fn slot(&self, target: &T) -> ValueSlot<V> {
        ValueSlot::from_option((self.get)(target))
    }

    pub fn write(&self, target: &mut T, slot: &ValueSlot<V>) {
        match slot.as_present() {
            Some(value) => (self.set)(target, value.clone()),
            None => (self.delete)(target),
        }
    }
}
