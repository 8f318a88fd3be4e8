//! Value Model
//!
//! The reactive core operates on a dynamically typed object model: plain
//! objects, arrays, keyed collections and the primitives they hold. Every
//! reactive operation takes and returns [`Value`]s.
//!
//! # Identity
//!
//! Objects ([`Target`]s), proxies and refs are reference types. Each carries
//! an [`ObjId`] assigned at creation; equality and hashing of object values
//! use that identity, never the contents. Primitives compare by value using
//! SameValueZero, which is also the key equality of `Map` and `Set`.
//!
//! # Untracked access
//!
//! `Target` methods read and write storage directly and never notify the
//! reactive system. Tracked access goes through [`crate::proxy::Proxy`].

mod key;
mod target;

pub use key::{Key, Symbol, WellKnownSymbol, MAX_ARRAY_INDEX};
pub use target::{Target, TargetKind};

pub(crate) use target::TargetInner;

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::proxy::{Proxy, ProxyInner};
use crate::reactive::{pause_tracking, Ref, RefSource};

/// Identity of a reference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(u64);

impl ObjId {
    /// Allocate a fresh identity.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ObjId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Symbol),
    /// A raw object, array or collection.
    Object(Target),
    /// A reactive or readonly view over an object.
    Proxy(Proxy),
    /// A ref cell.
    Ref(Ref),
}

impl Value {
    /// `Object.is`: like strict equality, except `NaN` equals itself and
    /// `+0` differs from `-0`.
    pub fn same_value(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                if x.is_nan() && y.is_nan() {
                    true
                } else {
                    x.to_bits() == y.to_bits() || (x == y && *x != 0.0)
                }
            }
            _ => Self::same_value_zero(a, b),
        }
    }

    /// SameValueZero: `NaN` equals itself and `+0` equals `-0`.
    pub fn same_value_zero(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => (x.is_nan() && y.is_nan()) || x == y,
            _ => Self::strict_equals(a, b),
        }
    }

    /// `===`.
    pub fn strict_equals(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Symbol(x), Value::Symbol(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => x.id() == y.id(),
            (Value::Proxy(x), Value::Proxy(y)) => x.id() == y.id(),
            (Value::Ref(x), Value::Ref(y)) => x.id() == y.id(),
            _ => false,
        }
    }

    /// Identity of a reference value; `None` for primitives.
    pub fn object_id(&self) -> Option<ObjId> {
        match self {
            Value::Object(target) => Some(target.id()),
            Value::Proxy(proxy) => Some(proxy.id()),
            Value::Ref(r) => Some(r.id()),
            _ => None,
        }
    }

    /// Whether this is a reference value.
    pub fn is_object(&self) -> bool {
        self.object_id().is_some()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(target) => target.kind().name(),
            Value::Proxy(proxy) => proxy.kind().name(),
            Value::Ref(_) => "Ref",
        }
    }

    pub(crate) fn downgrade(&self) -> Option<WeakValue> {
        match self {
            Value::Object(target) => Some(WeakValue::Object(target.downgrade())),
            Value::Proxy(proxy) => Some(WeakValue::Proxy(proxy.downgrade())),
            Value::Ref(r) => Some(WeakValue::Ref(r.downgrade())),
            _ => None,
        }
    }

    /// Snapshot this value as JSON without tracking any reads.
    ///
    /// Refs are unwrapped, proxies are read through to their raw storage,
    /// maps become objects keyed by the display form of their keys and sets
    /// become arrays. Cycles and non-JSON primitives become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let _paused = pause_tracking();
        let mut visiting = HashSet::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut HashSet<ObjId>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null | Value::Symbol(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 => {
                Json::from(*n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.to_string()),
            Value::Proxy(proxy) => Value::Object(proxy.raw().clone()).to_json_inner(visiting),
            Value::Ref(r) => r.value().to_json_inner(visiting),
            Value::Object(target) => {
                if !visiting.insert(target.id()) {
                    return Json::Null;
                }
                let json = match target.kind() {
                    TargetKind::Array => Json::Array(
                        target
                            .values()
                            .iter()
                            .map(|item| item.to_json_inner(visiting))
                            .collect(),
                    ),
                    TargetKind::Set => Json::Array(
                        target
                            .values()
                            .iter()
                            .map(|item| item.to_json_inner(visiting))
                            .collect(),
                    ),
                    TargetKind::Map => Json::Object(
                        target
                            .entries()
                            .into_iter()
                            .map(|(key, value)| (key.to_string(), value.to_json_inner(visiting)))
                            .collect(),
                    ),
                    TargetKind::Object => Json::Object(
                        target
                            .own_keys()
                            .into_iter()
                            .filter(|key| !key.is_symbol())
                            .map(|key| {
                                let value = target.get(&key).to_json_inner(visiting);
                                (key.to_string(), value)
                            })
                            .collect(),
                    ),
                    TargetKind::WeakMap | TargetKind::WeakSet => Json::Object(Default::default()),
                };
                visiting.remove(&target.id());
                json
            }
        }
    }
}

/// A non-owning handle to a reference value, used by weak collections.
#[derive(Clone)]
pub(crate) enum WeakValue {
    Object(Weak<TargetInner>),
    Proxy(Weak<ProxyInner>),
    Ref(Weak<dyn RefSource>),
}

impl WeakValue {
    pub(crate) fn upgrade(&self) -> Option<Value> {
        match self {
            WeakValue::Object(weak) => weak.upgrade().map(|inner| Value::Object(Target::from_inner(inner))),
            WeakValue::Proxy(weak) => weak.upgrade().map(|inner| Value::Proxy(Proxy::from_inner(inner))),
            WeakValue::Ref(weak) => weak.upgrade().map(|inner| Value::Ref(Ref::from_source(inner))),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        match self {
            WeakValue::Object(weak) => weak.strong_count() > 0,
            WeakValue::Proxy(weak) => weak.strong_count() > 0,
            WeakValue::Ref(weak) => weak.strong_count() > 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Equality and hashing (SameValueZero)
// ----------------------------------------------------------------------------

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Value::same_value_zero(self, other)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => canonical_bits(*n).hash(state),
            Value::String(s) => s.hash(state),
            Value::Symbol(symbol) => symbol.hash(state),
            Value::Object(target) => target.id().hash(state),
            Value::Proxy(proxy) => proxy.id().hash(state),
            Value::Ref(r) => r.id().hash(state),
        }
    }
}

/// Bit pattern under which SameValueZero-equal numbers hash alike.
pub(crate) fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}

// ----------------------------------------------------------------------------
// Formatting
// ----------------------------------------------------------------------------

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(symbol) => write!(f, "{symbol}"),
            Value::Object(target) => write!(f, "{target:?}"),
            Value::Proxy(proxy) => write!(f, "{proxy:?}"),
            Value::Ref(r) => write!(f, "{r:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::Symbol(symbol) => write!(f, "{symbol}"),
            Value::Object(target) => write!(f, "[object {}]", target.kind().name()),
            Value::Proxy(proxy) => write!(f, "[object {}]", proxy.kind().name()),
            Value::Ref(_) => f.write_str("[object Ref]"),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(symbol: Symbol) -> Self {
        Value::Symbol(symbol)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<&Proxy> for Value {
    fn from(proxy: &Proxy) -> Self {
        Value::Proxy(proxy.clone())
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<&Ref> for Value {
    fn from(r: &Ref) -> Self {
        Value::Ref(r.clone())
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build fresh raw objects from JSON. Objects become plain objects, arrays
/// become arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => {
                Value::Object(Target::array(items.into_iter().map(Value::from)))
            }
            Json::Object(fields) => Value::Object(Target::object_from(
                fields
                    .into_iter()
                    .map(|(key, value)| (Key::from(key), Value::from(value))),
            )),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_distinguishes_signed_zero() {
        assert!(Value::same_value(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(!Value::same_value(&Value::from(0.0), &Value::from(-0.0)));
        assert!(Value::same_value(&Value::from(1.5), &Value::from(1.5)));
    }

    #[test]
    fn same_value_zero_merges_signed_zero() {
        assert!(Value::same_value_zero(&Value::from(0.0), &Value::from(-0.0)));
        assert!(Value::same_value_zero(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert_eq!(Value::from(0.0), Value::from(-0.0));
    }

    #[test]
    fn strict_equals_rejects_nan() {
        assert!(!Value::strict_equals(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(Value::strict_equals(&Value::from("a"), &Value::from("a")));
        assert!(!Value::strict_equals(&Value::from(1), &Value::from("1")));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Target::object();
        let b = Target::object();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn hash_agrees_with_equality() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |value: &Value| {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&Value::from(0.0)), hash(&Value::from(-0.0)));
        assert_eq!(hash(&Value::from(f64::NAN)), hash(&Value::from(-f64::NAN)));
    }

    #[test]
    fn display_numbers() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }

    #[test]
    fn json_round_trip_of_nested_object() {
        let fixture = json!({ "a": 1, "list": [1, 2, { "b": true }], "name": "x" });
        let value = Value::from(fixture.clone());

        let target = value.as_target().unwrap();
        assert_eq!(target.kind(), TargetKind::Object);
        assert_eq!(target.get(&Key::from("a")), Value::from(1));
        assert_eq!(value.to_json(), fixture);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::from(Target::object()).is_truthy());
    }
}
