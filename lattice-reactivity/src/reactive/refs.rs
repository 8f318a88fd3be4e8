//! Refs
//!
//! A [`Ref`] is a reactive cell exposing a single `value`. Reading the value
//! inside an effect subscribes the effect to the ref's own dep; writing a
//! changed value notifies it. Refs do not go through the target registry:
//! each owns its dep directly, created on first tracked read.
//!
//! Several sources share the `Ref` handle:
//!
//! - plain refs from [`ref_`] and [`shallow_ref`]
//! - custom refs from [`custom_ref`], whose getter and setter decide when to
//!   track and trigger
//! - object refs from [`to_ref`], which forward to a property of an object
//! - computed values (see [`super::computed`])
//!
//! Objects stored in a deep ref are made reactive on write.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context;
use super::dep::Dep;
use super::effect::EventInfo;
use super::operations::{DebugOp, DepKey, TrackOp, TriggerOp};
use super::runtime::{track_effects, trigger_effects};
use crate::diagnostics::warn;
use crate::error::ReactiveError;
use crate::proxy::{self, is_proxy, is_reactive, to_raw, to_reactive};
use crate::shared::has_changed;
use crate::value::{Key, ObjId, Target, Value};

/// A dep created on first use.
#[derive(Default)]
pub(crate) struct LazyDep(RefCell<Option<Dep>>);

impl LazyDep {
    pub(crate) fn get_or_create(&self) -> Dep {
        self.0.borrow_mut().get_or_insert_with(Dep::new).clone()
    }

    pub(crate) fn get(&self) -> Option<Dep> {
        self.0.borrow().clone()
    }
}

/// The behavior behind a [`Ref`].
pub(crate) trait RefSource {
    fn id(&self) -> ObjId;
    fn get(&self) -> Value;
    fn set(&self, value: Value);
    fn dep(&self) -> &LazyDep;

    fn is_shallow(&self) -> bool {
        false
    }

    fn is_readonly(&self) -> bool {
        false
    }
}

fn value_key() -> DepKey {
    DepKey::from("value")
}

/// Subscribe the active effect to a ref's dep.
pub(crate) fn track_ref_value(source: &dyn RefSource) {
    if !context::is_tracking() {
        return;
    }
    let dep = source.dep().get_or_create();
    track_effects(
        &dep,
        EventInfo {
            target: source.id(),
            op: DebugOp::Track(TrackOp::Get),
            key: Some(value_key()),
            new_value: None,
            old_value: None,
        },
    );
}

/// Notify the subscribers of a ref's dep, if it has one.
pub(crate) fn trigger_ref_value(source: &dyn RefSource, new_value: Option<Value>) {
    if let Some(dep) = source.dep().get() {
        trigger_effects(
            &dep,
            &EventInfo {
                target: source.id(),
                op: DebugOp::Trigger(TriggerOp::Set),
                key: Some(value_key()),
                new_value,
                old_value: None,
            },
        );
    }
}

/// A reactive cell.
#[derive(Clone)]
pub struct Ref(Rc<dyn RefSource>);

impl Ref {
    /// A deep ref. An existing ref is returned as-is.
    pub fn new(value: impl Into<Value>) -> Self {
        create_ref(value.into(), false)
    }

    pub fn shallow(value: impl Into<Value>) -> Self {
        create_ref(value.into(), true)
    }

    pub(crate) fn from_source(source: Rc<dyn RefSource>) -> Self {
        Self(source)
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn RefSource> {
        Rc::downgrade(&self.0)
    }

    pub fn id(&self) -> ObjId {
        self.0.id()
    }

    /// Read the value, tracking it.
    pub fn value(&self) -> Value {
        self.0.get()
    }

    pub fn set_value(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }

    pub fn is_shallow(&self) -> bool {
        self.0.is_shallow()
    }

    pub fn is_readonly(&self) -> bool {
        self.0.is_readonly()
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        self.id() == other.id()
    }

    /// Number of effects subscribed to this ref.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep().get().map(|dep| dep.len()).unwrap_or(0)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id())
            .field("shallow", &self.is_shallow())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Plain refs
// ----------------------------------------------------------------------------

struct RefImpl {
    id: ObjId,
    value: RefCell<Value>,
    raw: RefCell<Value>,
    dep: LazyDep,
    shallow: bool,
}

impl RefSource for RefImpl {
    fn id(&self) -> ObjId {
        self.id
    }

    fn get(&self) -> Value {
        track_ref_value(self);
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        let value = if self.shallow { value } else { to_raw(&value) };
        if !has_changed(&value, &self.raw.borrow()) {
            return;
        }
        let exposed = if self.shallow {
            value.clone()
        } else {
            to_reactive(value.clone())
        };
        let old_raw = self.raw.replace(value);
        let old_value = self.value.replace(exposed.clone());
        trigger_ref_value(self, Some(exposed));
        drop((old_raw, old_value));
    }

    fn dep(&self) -> &LazyDep {
        &self.dep
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }
}

fn create_ref(value: Value, shallow: bool) -> Ref {
    if let Value::Ref(existing) = value {
        return existing;
    }
    let raw = if shallow { value.clone() } else { to_raw(&value) };
    let exposed = if shallow { value } else { to_reactive(value) };
    Ref(Rc::new(RefImpl {
        id: ObjId::new(),
        value: RefCell::new(exposed),
        raw: RefCell::new(raw),
        dep: LazyDep::default(),
        shallow,
    }))
}

/// A deep ref holding `value`.
pub fn ref_(value: impl Into<Value>) -> Ref {
    Ref::new(value)
}

/// A ref that stores objects as-is instead of wrapping them.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    Ref::shallow(value)
}

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The ref's value, or `value` itself when it is not a ref.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.value(),
        other => other.clone(),
    }
}

/// Notify the subscribers of `r` without changing it. Used after mutating
/// the inside of a shallow ref's object.
pub fn trigger_ref(r: &Ref) {
    let value = r.0.get();
    trigger_ref_value(&*r.0, Some(value));
}

// ----------------------------------------------------------------------------
// Custom refs
// ----------------------------------------------------------------------------

/// Handed to a [`custom_ref`] factory to control tracking.
#[derive(Clone)]
pub struct RefTracker {
    id: ObjId,
    dep: Rc<LazyDep>,
}

impl RefTracker {
    pub fn track(&self) {
        if !context::is_tracking() {
            return;
        }
        let dep = self.dep.get_or_create();
        track_effects(
            &dep,
            EventInfo {
                target: self.id,
                op: DebugOp::Track(TrackOp::Get),
                key: Some(value_key()),
                new_value: None,
                old_value: None,
            },
        );
    }

    pub fn trigger(&self) {
        if let Some(dep) = self.dep.get() {
            trigger_effects(
                &dep,
                &EventInfo {
                    target: self.id,
                    op: DebugOp::Trigger(TriggerOp::Set),
                    key: Some(value_key()),
                    new_value: None,
                    old_value: None,
                },
            );
        }
    }
}

struct CustomRefImpl {
    id: ObjId,
    dep: Rc<LazyDep>,
    getter: Box<dyn Fn() -> Value>,
    setter: Box<dyn Fn(Value)>,
}

impl RefSource for CustomRefImpl {
    fn id(&self) -> ObjId {
        self.id
    }

    fn get(&self) -> Value {
        (self.getter)()
    }

    fn set(&self, value: Value) {
        (self.setter)(value)
    }

    fn dep(&self) -> &LazyDep {
        &self.dep
    }
}

/// A ref whose reads and writes are implemented by the caller.
///
/// `factory` receives a [`RefTracker`] and returns the getter and setter.
/// The getter should call `track()`, the setter `trigger()`, whenever they
/// see fit:
///
/// ```rust,ignore
/// let debounced = custom_ref(|tracker| {
///     let store = Rc::new(RefCell::new(Value::from(0)));
///     let read = store.clone();
///     let read_tracker = tracker.clone();
///     (
///         move || { read_tracker.track(); read.borrow().clone() },
///         move |value| { *store.borrow_mut() = value; tracker.trigger(); },
///     )
/// });
/// ```
pub fn custom_ref<F, G, S>(factory: F) -> Ref
where
    F: FnOnce(RefTracker) -> (G, S),
    G: Fn() -> Value + 'static,
    S: Fn(Value) + 'static,
{
    let id = ObjId::new();
    let dep = Rc::new(LazyDep::default());
    let (getter, setter) = factory(RefTracker {
        id,
        dep: dep.clone(),
    });
    Ref(Rc::new(CustomRefImpl {
        id,
        dep,
        getter: Box::new(getter),
        setter: Box::new(setter),
    }))
}

// ----------------------------------------------------------------------------
// Object refs
// ----------------------------------------------------------------------------

struct ObjectRefImpl {
    id: ObjId,
    object: Value,
    key: Key,
    default: Option<Value>,
    dep: LazyDep,
}

impl RefSource for ObjectRefImpl {
    fn id(&self) -> ObjId {
        self.id
    }

    fn get(&self) -> Value {
        let value = proxy::property_get(&self.object, &self.key);
        match (&value, &self.default) {
            (Value::Undefined, Some(default)) => default.clone(),
            _ => value,
        }
    }

    fn set(&self, value: Value) {
        proxy::property_set(&self.object, self.key.clone(), value);
    }

    fn dep(&self) -> &LazyDep {
        &self.dep
    }
}

/// A ref forwarding to `object[key]`. Reads and writes go through the
/// object, so a reactive object keeps tracking and triggering as usual.
/// When the property already holds a ref, that ref is returned.
pub fn to_ref(object: &Value, key: impl Into<Key>) -> Ref {
    make_object_ref(object, key.into(), None)
}

/// Like [`to_ref`], with `default` returned while the property is
/// `undefined`.
pub fn to_ref_with_default(object: &Value, key: impl Into<Key>, default: impl Into<Value>) -> Ref {
    make_object_ref(object, key.into(), Some(default.into()))
}

fn make_object_ref(object: &Value, key: Key, default: Option<Value>) -> Ref {
    if let Value::Ref(existing) = proxy::property_get(object, &key) {
        return existing;
    }
    Ref(Rc::new(ObjectRefImpl {
        id: ObjId::new(),
        object: object.clone(),
        key,
        default,
        dep: LazyDep::default(),
    }))
}

/// One object ref per enumerable own key of `object`. Warns when `object`
/// is not a proxy, since the refs then do not react.
pub fn to_refs(object: &Value) -> IndexMap<Key, Ref> {
    if !is_proxy(object) {
        warn(ReactiveError::NotReactive);
    }
    let is_array = to_raw(object).as_target().is_some_and(Target::is_array);
    proxy::property_own_keys(object)
        .into_iter()
        .filter(|key| !key.is_symbol() && !(is_array && key.is_length()))
        .map(|key| {
            let r = make_object_ref(object, key.clone(), None);
            (key, r)
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Ref unwrapping
// ----------------------------------------------------------------------------

/// An object view that unwraps refs on read and writes through them.
///
/// Returned by [`proxy_refs`]. Reactive objects already unwrap refs, so for
/// them the view is a plain pass-through.
#[derive(Clone, Debug)]
pub struct ShallowUnwrap {
    object: Value,
}

impl ShallowUnwrap {
    pub fn get(&self, key: impl Into<Key>) -> Value {
        unref(&proxy::property_get(&self.object, &key.into()))
    }

    /// Write `value`. When the slot holds a ref and `value` is not one, the
    /// ref's value is set instead of replacing the ref.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        if !is_reactive(&self.object) {
            if let Value::Ref(old) = proxy::property_get(&self.object, &key) {
                if !is_ref(&value) {
                    old.set_value(value);
                    return true;
                }
            }
        }
        proxy::property_set(&self.object, key, value)
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        proxy::property_has(&self.object, &key.into())
    }

    pub fn keys(&self) -> Vec<Key> {
        proxy::property_own_keys(&self.object)
    }

    /// The wrapped object.
    pub fn inner(&self) -> &Value {
        &self.object
    }
}

/// Wrap `object` so refs stored in it read and write like plain values.
pub fn proxy_refs(object: impl Into<Value>) -> ShallowUnwrap {
    ShallowUnwrap {
        object: object.into(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
