//! Operation and key types shared by `track` and `trigger`.

use std::fmt;
use std::rc::Rc;

use crate::value::{canonical_bits, Key, ObjId, Symbol, Value};

/// The kind of read being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// The kind of write being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

impl fmt::Display for TrackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "get",
            Self::Has => "has",
            Self::Iterate => "iterate",
        })
    }
}

impl fmt::Display for TriggerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Set => "Set",
            Self::Add => "Add",
            Self::Delete => "Delete",
            Self::Clear => "Clear",
        })
    }
}

/// Either side of the registry, as reported to debugger hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Identity of a collection entry key.
///
/// Object keys are held by [`ObjId`] so the registry never keeps a key
/// object alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(Rc<str>),
    Symbol(Symbol),
    Object(ObjId),
}

impl From<&Value> for EntryKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Undefined => Self::Undefined,
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(canonical_bits(*n)),
            Value::String(s) => Self::String(s.clone()),
            Value::Symbol(symbol) => Self::Symbol(symbol.clone()),
            Value::Object(target) => Self::Object(target.id()),
            Value::Proxy(proxy) => Self::Object(proxy.id()),
            Value::Ref(r) => Self::Object(r.id()),
        }
    }
}

/// A key in the per-target dependency map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A property of an object or array.
    Prop(Key),
    /// An entry of a keyed collection.
    Entry(EntryKey),
    /// Structural changes: keys added or removed, iteration order.
    Iterate,
    /// Key set changes of a `Map`, which `keys()` depends on.
    MapKeyIterate,
}

impl DepKey {
    pub fn length() -> Self {
        Self::Prop(Key::length())
    }

    pub fn entry(key: &Value) -> Self {
        Self::Entry(EntryKey::from(key))
    }
}

impl From<Key> for DepKey {
    fn from(key: Key) -> Self {
        Self::Prop(key)
    }
}

impl From<&str> for DepKey {
    fn from(key: &str) -> Self {
        Self::Prop(Key::from(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_keys_merge_signed_zero() {
        assert_eq!(
            DepKey::entry(&Value::from(0.0)),
            DepKey::entry(&Value::from(-0.0))
        );
        assert_ne!(DepKey::entry(&Value::from(1)), DepKey::entry(&Value::from("1")));
    }

    #[test]
    fn trigger_op_display() {
        assert_eq!(TriggerOp::Delete.to_string(), "Delete");
        assert_eq!(TrackOp::Iterate.to_string(), "iterate");
    }
}
