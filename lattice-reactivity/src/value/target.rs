//! Raw objects.
//!
//! A [`Target`] owns the storage that proxies observe. Its methods are the
//! untracked primitives the proxy handlers are built on: reading through a
//! `Target` never registers a dependency and writing never notifies.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use super::{Key, ObjId, Value, WeakValue};
use crate::reactive::Runtime;

/// The shape of a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Object,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl TargetKind {
    /// Keyed collections use the collection handlers.
    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::Object | Self::Array)
    }

    pub fn is_weak(&self) -> bool {
        matches!(self, Self::WeakMap | Self::WeakSet)
    }

    pub fn is_map_like(&self) -> bool {
        matches!(self, Self::Map | Self::WeakMap)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Object => "Object",
            Self::Array => "Array",
            Self::Map => "Map",
            Self::Set => "Set",
            Self::WeakMap => "WeakMap",
            Self::WeakSet => "WeakSet",
        }
    }
}

enum Storage {
    Object(IndexMap<Key, Value>),
    /// Holes read as `undefined`.
    Array(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
    WeakMap(HashMap<ObjId, (WeakValue, Value)>),
    WeakSet(HashMap<ObjId, WeakValue>),
}

pub(crate) struct TargetInner {
    id: ObjId,
    storage: RefCell<Storage>,
    skip: Cell<bool>,
    extensible: Cell<bool>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::forget_target(self.id);
    }
}

/// A raw object, array or keyed collection.
#[derive(Clone)]
pub struct Target(Rc<TargetInner>);

impl Target {
    fn with_storage(storage: Storage) -> Self {
        Self(Rc::new(TargetInner {
            id: ObjId::new(),
            storage: RefCell::new(storage),
            skip: Cell::new(false),
            extensible: Cell::new(true),
        }))
    }

    pub(crate) fn from_inner(inner: Rc<TargetInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<TargetInner> {
        Rc::downgrade(&self.0)
    }

    /// An empty plain object.
    pub fn object() -> Self {
        Self::with_storage(Storage::Object(IndexMap::new()))
    }

    pub fn object_from<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        Self::with_storage(Storage::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::with_storage(Storage::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn map() -> Self {
        Self::with_storage(Storage::Map(IndexMap::new()))
    }

    pub fn map_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Self::with_storage(Storage::Map(
            entries
                .into_iter()
                .map(|(key, value)| (normalize_key(key.into()), value.into()))
                .collect(),
        ))
    }

    pub fn new_set() -> Self {
        Self::with_storage(Storage::Set(IndexSet::new()))
    }

    pub fn set_from<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::with_storage(Storage::Set(
            values.into_iter().map(|value| normalize_key(value.into())).collect(),
        ))
    }

    pub fn weak_map() -> Self {
        Self::with_storage(Storage::WeakMap(HashMap::new()))
    }

    pub fn weak_set() -> Self {
        Self::with_storage(Storage::WeakSet(HashMap::new()))
    }

    pub fn id(&self) -> ObjId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        match &*self.0.storage.borrow() {
            Storage::Object(_) => TargetKind::Object,
            Storage::Array(_) => TargetKind::Array,
            Storage::Map(_) => TargetKind::Map,
            Storage::Set(_) => TargetKind::Set,
            Storage::WeakMap(_) => TargetKind::WeakMap,
            Storage::WeakSet(_) => TargetKind::WeakSet,
        }
    }

    pub fn is_array(&self) -> bool {
        self.kind() == TargetKind::Array
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the object was marked to never be wrapped.
    pub fn is_skipped(&self) -> bool {
        self.0.skip.get()
    }

    pub(crate) fn mark_skip(&self) {
        self.0.skip.set(true);
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    /// Forbid adding new properties. Existing properties stay writable.
    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    // ---- Property access (objects and arrays) ----

    pub fn get(&self, key: &Key) -> Value {
        match &*self.0.storage.borrow() {
            Storage::Object(fields) => fields.get(key).cloned().unwrap_or_default(),
            Storage::Array(items) => match key {
                Key::Index(index) => items.get(*index).cloned().unwrap_or_default(),
                key if key.is_length() => Value::from(items.len()),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    pub fn has_own(&self, key: &Key) -> bool {
        match &*self.0.storage.borrow() {
            Storage::Object(fields) => fields.contains_key(key),
            Storage::Array(items) => match key {
                Key::Index(index) => *index < items.len(),
                key => key.is_length(),
            },
            _ => false,
        }
    }

    /// Write a property. Returns `false` when the write is rejected: a new
    /// key on a non-extensible object, an invalid array length, an array
    /// write that would open more than [`MAX_ARRAY_GAP`] holes, or a
    /// property write on a collection.
    pub fn set(&self, key: Key, value: Value) -> bool {
        let extensible = self.is_extensible();
        match &mut *self.0.storage.borrow_mut() {
            Storage::Object(fields) => {
                if !extensible && !fields.contains_key(&key) {
                    return false;
                }
                fields.insert(key, value);
                true
            }
            Storage::Array(items) => match key {
                Key::Index(index) => {
                    if index >= items.len() {
                        let Some(len) = index.checked_add(1) else {
                            return false;
                        };
                        if !extensible || !within_growth_limit(items.len(), len) {
                            return false;
                        }
                        items.resize(len, Value::Undefined);
                    }
                    items[index] = value;
                    true
                }
                key if key.is_length() => match array_length(&value) {
                    Some(len) if len <= items.len() => {
                        items.truncate(len);
                        true
                    }
                    Some(len) if extensible && within_growth_limit(items.len(), len) => {
                        items.resize(len, Value::Undefined);
                        true
                    }
                    _ => false,
                },
                _ => false,
            },
            _ => false,
        }
    }

    /// Delete a property. Deleting a missing key succeeds; deleting an
    /// array's `length` does not.
    pub fn delete(&self, key: &Key) -> bool {
        match &mut *self.0.storage.borrow_mut() {
            Storage::Object(fields) => {
                fields.shift_remove(key);
                true
            }
            Storage::Array(items) => match key {
                Key::Index(index) => {
                    if let Some(slot) = items.get_mut(*index) {
                        *slot = Value::Undefined;
                    }
                    true
                }
                key => !key.is_length(),
            },
            _ => true,
        }
    }

    /// Own keys: integer keys ascending, then names in insertion order, then
    /// symbols. Arrays list their indices followed by `length`.
    pub fn own_keys(&self) -> Vec<Key> {
        match &*self.0.storage.borrow() {
            Storage::Object(fields) => {
                let mut indices: Vec<usize> = fields.keys().filter_map(Key::as_index).collect();
                indices.sort_unstable();
                let mut keys: Vec<Key> = indices.into_iter().map(Key::Index).collect();
                keys.extend(fields.keys().filter(|key| matches!(key, Key::Name(_))).cloned());
                keys.extend(fields.keys().filter(|key| key.is_symbol()).cloned());
                keys
            }
            Storage::Array(items) => (0..items.len())
                .map(Key::Index)
                .chain(std::iter::once(Key::length()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Array length, number of own keys, or collection size.
    pub fn len(&self) -> usize {
        match &*self.0.storage.borrow() {
            Storage::Object(fields) => fields.len(),
            Storage::Array(items) => items.len(),
            _ => self.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array elements, set members or map values, in order.
    pub fn values(&self) -> Vec<Value> {
        match &*self.0.storage.borrow() {
            Storage::Object(fields) => fields.values().cloned().collect(),
            Storage::Array(items) => items.clone(),
            Storage::Map(entries) => entries.values().cloned().collect(),
            Storage::Set(members) => members.iter().cloned().collect(),
            Storage::WeakMap(_) | Storage::WeakSet(_) => Vec::new(),
        }
    }

    // ---- Entry access (keyed collections) ----

    pub fn size(&self) -> usize {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries.len(),
            Storage::Set(members) => members.len(),
            Storage::WeakMap(entries) => entries.values().filter(|(key, _)| key.is_alive()).count(),
            Storage::WeakSet(members) => members.values().filter(|key| key.is_alive()).count(),
            _ => 0,
        }
    }

    pub fn has_entry(&self, key: &Value) -> bool {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries.contains_key(key),
            Storage::Set(members) => members.contains(key),
            Storage::WeakMap(entries) => key
                .object_id()
                .and_then(|id| entries.get(&id))
                .is_some_and(|(weak, _)| weak.is_alive()),
            Storage::WeakSet(members) => key
                .object_id()
                .and_then(|id| members.get(&id))
                .is_some_and(WeakValue::is_alive),
            _ => false,
        }
    }

    pub fn get_entry(&self, key: &Value) -> Value {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries.get(key).cloned().unwrap_or_default(),
            Storage::WeakMap(entries) => key
                .object_id()
                .and_then(|id| entries.get(&id))
                .filter(|(weak, _)| weak.is_alive())
                .map(|(_, value)| value.clone())
                .unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Insert or replace a map entry. Returns `false` when the key is not
    /// valid for this collection (a primitive key on a weak map) or the
    /// target is not a map.
    pub fn set_entry(&self, key: Value, value: Value) -> bool {
        let key = normalize_key(key);
        match &mut *self.0.storage.borrow_mut() {
            Storage::Map(entries) => {
                entries.insert(key, value);
                true
            }
            Storage::WeakMap(entries) => match (key.object_id(), key.downgrade()) {
                (Some(id), Some(weak)) => {
                    entries.retain(|_, (weak, _)| weak.is_alive());
                    entries.insert(id, (weak, value));
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Add a set member. Returns `false` on an invalid key or non-set.
    pub fn add(&self, value: Value) -> bool {
        let value = normalize_key(value);
        match &mut *self.0.storage.borrow_mut() {
            Storage::Set(members) => {
                members.insert(value);
                true
            }
            Storage::WeakSet(members) => match (value.object_id(), value.downgrade()) {
                (Some(id), Some(weak)) => {
                    members.retain(|_, weak| weak.is_alive());
                    members.insert(id, weak);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Remove an entry. Returns whether it was present.
    pub fn delete_entry(&self, key: &Value) -> bool {
        // Removed values are dropped after the borrow ends.
        let removed: Option<Vec<Value>> = match &mut *self.0.storage.borrow_mut() {
            Storage::Map(entries) => entries.shift_remove_entry(key).map(|(k, v)| vec![k, v]),
            Storage::Set(members) => members.shift_take(key).map(|member| vec![member]),
            Storage::WeakMap(entries) => key
                .object_id()
                .and_then(|id| entries.remove(&id))
                .filter(|(weak, _)| weak.is_alive())
                .map(|(_, value)| vec![value]),
            Storage::WeakSet(members) => key
                .object_id()
                .and_then(|id| members.remove(&id))
                .filter(WeakValue::is_alive)
                .map(|_| Vec::new()),
            _ => None,
        };
        let found = removed.is_some();
        drop(removed);
        found
    }

    /// Remove every entry of a `Map` or `Set`.
    pub fn clear(&self) {
        let drained = match &mut *self.0.storage.borrow_mut() {
            Storage::Map(entries) => Some(Storage::Map(std::mem::take(entries))),
            Storage::Set(members) => Some(Storage::Set(std::mem::take(members))),
            _ => None,
        };
        drop(drained);
    }

    /// Snapshot of `(key, value)` pairs. Set members appear as `(v, v)`.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Storage::Set(members) => members
                .iter()
                .map(|member| (member.clone(), member.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Snapshot of map keys or set members.
    pub fn keys(&self) -> Vec<Value> {
        match &*self.0.storage.borrow() {
            Storage::Map(entries) => entries.keys().cloned().collect(),
            Storage::Set(members) => members.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Collections store `-0` as `+0`.
fn normalize_key(key: Value) -> Value {
    match key {
        Value::Number(n) if n == 0.0 => Value::Number(0.0),
        key => key,
    }
}

/// Most holes a single array write may open.
pub const MAX_ARRAY_GAP: usize = 1 << 20;

fn within_growth_limit(current: usize, len: usize) -> bool {
    len - current <= MAX_ARRAY_GAP
}

fn array_length(value: &Value) -> Option<usize> {
    let n = value.as_f64()?;
    (n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64).then_some(n as usize)
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
