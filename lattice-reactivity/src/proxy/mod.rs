//! Reactive Proxies
//!
//! A [`Proxy`] is an observable view over a raw [`Target`]. Reads through a
//! proxy are tracked and writes trigger, while the target itself stays an
//! ordinary untracked object.
//!
//! # Variants
//!
//! | Variant           | Tracks reads | Accepts writes | Wraps nested objects |
//! |-------------------|--------------|----------------|----------------------|
//! | `Reactive`        | yes          | yes            | reactive             |
//! | `ShallowReactive` | yes          | yes            | no                   |
//! | `Readonly`        | no           | no (warns)     | readonly             |
//! | `ShallowReadonly` | no           | no (warns)     | no                   |
//!
//! A readonly view over a reactive proxy reads through the reactive proxy,
//! so `readonly(reactive(x))` is tracked even though readonly views over raw
//! data are not.
//!
//! # Identity
//!
//! Wrapping is idempotent: each variant keeps a per-thread identity map from
//! the wrapped object's [`ObjId`] to its proxy, so wrapping the same object
//! twice yields the same proxy. The maps hold proxies weakly and a proxy
//! removes its entry when dropped.
//!
//! # Dispatch
//!
//! Plain objects and arrays go through [`base_handlers`]; maps, sets and
//! their weak forms through [`collection_handlers`]. Array instrumentation
//! lives in [`array`].

mod array;
mod base_handlers;
mod collection_handlers;

pub use collection_handlers::{IterItem, ReactiveIter};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::diagnostics::warn;
use crate::error::ReactiveError;
use crate::value::{Key, ObjId, Target, TargetKind, Value};

/// The behavior of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl Variant {
    pub fn is_readonly(&self) -> bool {
        matches!(self, Self::Readonly | Self::ShallowReadonly)
    }

    pub fn is_shallow(&self) -> bool {
        matches!(self, Self::ShallowReactive | Self::ShallowReadonly)
    }

    fn index(&self) -> usize {
        match self {
            Self::Reactive => 0,
            Self::ShallowReactive => 1,
            Self::Readonly => 2,
            Self::ShallowReadonly => 3,
        }
    }
}

/// Protocol flags a proxy answers without touching its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveFlag {
    /// Marked to never be wrapped.
    Skip,
    IsReactive,
    IsReadonly,
    IsShallow,
    /// The wrapped value.
    Raw,
}

pub(crate) struct ProxyInner {
    id: ObjId,
    /// What this proxy wraps: a raw target, or a reactive proxy for
    /// readonly views.
    target: Value,
    /// Identity of `target`, the key in the identity map.
    target_id: ObjId,
    /// The raw target at the bottom of the chain.
    raw: Target,
    variant: Variant,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let (variant, target_id) = (self.variant, self.target_id);
        let _ = PROXY_MAPS.try_with(|maps| {
            if let Ok(mut maps) = maps.try_borrow_mut() {
                let map = &mut maps[variant.index()];
                if map.get(&target_id).is_some_and(|weak| weak.strong_count() == 0) {
                    map.remove(&target_id);
                }
            }
        });
    }
}

type ProxyMap = HashMap<ObjId, Weak<ProxyInner>>;

thread_local! {
    static PROXY_MAPS: RefCell<[ProxyMap; 4]> = RefCell::new(Default::default());
}

/// An observable view over a raw object.
#[derive(Clone)]
pub struct Proxy(Rc<ProxyInner>);

impl Proxy {
    pub(crate) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ProxyInner> {
        Rc::downgrade(&self.0)
    }

    pub fn id(&self) -> ObjId {
        self.0.id
    }

    pub fn variant(&self) -> Variant {
        self.0.variant
    }

    pub fn is_readonly(&self) -> bool {
        self.0.variant.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.0.variant.is_shallow()
    }

    /// The wrapped value: a raw object, or the reactive proxy under a
    /// readonly view.
    pub fn target(&self) -> &Value {
        &self.0.target
    }

    /// The raw object at the bottom of the chain.
    pub fn raw(&self) -> &Target {
        &self.0.raw
    }

    pub fn kind(&self) -> TargetKind {
        self.0.raw.kind()
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Answer a protocol flag.
    pub fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::Skip => Value::Bool(self.0.raw.is_skipped()),
            ReactiveFlag::IsReactive => Value::Bool(!self.is_readonly()),
            ReactiveFlag::IsReadonly => Value::Bool(self.is_readonly()),
            ReactiveFlag::IsShallow => Value::Bool(self.is_shallow()),
            ReactiveFlag::Raw => self.0.target.clone(),
        }
    }

    /// Read a property.
    ///
    /// On collections only `size` is a property; entries are read with
    /// [`Proxy::get_entry`].
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if self.kind().is_collection() {
            collection_handlers::get_property(self, &key)
        } else {
            base_handlers::get(self, &key)
        }
    }

    /// Write a property. Returns whether the write was accepted; readonly
    /// proxies warn and report success.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        if self.kind().is_collection() {
            self.0.raw.set(key, value)
        } else {
            base_handlers::set(self, key, value)
        }
    }

    /// Delete a property.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            self.0.raw.delete(&key)
        } else {
            base_handlers::delete_property(self, &key)
        }
    }

    /// `key in proxy`.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            self.0.raw.has_own(&key)
        } else {
            base_handlers::has(self, &key)
        }
    }

    /// Own property keys.
    pub fn own_keys(&self) -> Vec<Key> {
        if self.kind().is_collection() {
            self.0.raw.own_keys()
        } else {
            base_handlers::own_keys(self)
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id())
            .field("variant", &self.variant())
            .field("raw", &self.raw().id())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Entry points
// ----------------------------------------------------------------------------

/// A deep reactive view of `target`.
///
/// Readonly values are returned unchanged, as are primitives (with a
/// warning), refs, objects marked raw and non-extensible objects.
pub fn reactive(target: impl Into<Value>) -> Value {
    let target = target.into();
    if is_readonly(&target) {
        return target;
    }
    create_reactive_object(target, Variant::Reactive)
}

/// A reactive view that tracks and triggers only at the root level.
pub fn shallow_reactive(target: impl Into<Value>) -> Value {
    create_reactive_object(target.into(), Variant::ShallowReactive)
}

/// A deep readonly view of `target`. Wrapping a reactive proxy keeps
/// reads tracked through it.
pub fn readonly(target: impl Into<Value>) -> Value {
    create_reactive_object(target.into(), Variant::Readonly)
}

/// A readonly view whose nested values are returned as stored.
pub fn shallow_readonly(target: impl Into<Value>) -> Value {
    create_reactive_object(target.into(), Variant::ShallowReadonly)
}

fn create_reactive_object(target: Value, variant: Variant) -> Value {
    let (target_id, raw) = match &target {
        Value::Object(raw) => (raw.id(), raw.clone()),
        Value::Proxy(proxy) => {
            // Only a readonly view may wrap a reactive proxy.
            if !(variant.is_readonly() && !proxy.is_readonly()) {
                return target;
            }
            (proxy.id(), proxy.raw().clone())
        }
        Value::Ref(_) => return target,
        _ => {
            warn(ReactiveError::InvalidTarget(target.to_string()));
            return target;
        }
    };

    if let Some(existing) = lookup_proxy(variant, target_id) {
        return Value::Proxy(existing);
    }

    if raw.is_skipped() || !raw.is_extensible() {
        return target;
    }

    let proxy = Proxy(Rc::new(ProxyInner {
        id: ObjId::new(),
        target: target.clone(),
        target_id,
        raw,
        variant,
    }));
    PROXY_MAPS.with(|maps| {
        maps.borrow_mut()[variant.index()].insert(target_id, proxy.downgrade());
    });
    tracing::trace!(object = %target_id, ?variant, "proxy created");
    Value::Proxy(proxy)
}

fn lookup_proxy(variant: Variant, target_id: ObjId) -> Option<Proxy> {
    PROXY_MAPS.with(|maps| {
        maps.borrow()[variant.index()]
            .get(&target_id)
            .and_then(Weak::upgrade)
            .map(Proxy)
    })
}

/// Whether `value` is a reactive proxy, or a readonly view over one.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) if proxy.is_readonly() => is_reactive(proxy.target()),
        Value::Proxy(_) => true,
        _ => false,
    }
}

/// Whether `value` is a readonly proxy or a readonly ref (a getter-only
/// computed).
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.is_readonly(),
        Value::Ref(r) => r.is_readonly(),
        _ => false,
    }
}

/// Whether `value` is a shallow proxy or a shallow ref.
pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.is_shallow(),
        Value::Ref(r) => r.is_shallow(),
        _ => false,
    }
}

/// `is_reactive(value) || is_readonly(value)`.
pub fn is_proxy(value: &Value) -> bool {
    is_reactive(value) || is_readonly(value)
}

/// The raw value behind any chain of proxies.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => to_raw(&proxy.flag(ReactiveFlag::Raw)),
        other => other.clone(),
    }
}

/// Mark an object so it is never wrapped. Returns `value`.
pub fn mark_raw(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(target) = &value {
        target.mark_skip();
    }
    value
}

/// `reactive(value)` for objects; other values pass through silently.
pub fn to_reactive(value: impl Into<Value>) -> Value {
    let value = value.into();
    match value {
        Value::Object(_) | Value::Proxy(_) => reactive(value),
        other => other,
    }
}

/// `readonly(value)` for objects; other values pass through silently.
pub fn to_readonly(value: impl Into<Value>) -> Value {
    let value = value.into();
    match value {
        Value::Object(_) | Value::Proxy(_) => readonly(value),
        other => other,
    }
}

// ----------------------------------------------------------------------------
// Property access on arbitrary values
// ----------------------------------------------------------------------------

/// Read `object[key]` through a proxy or directly from a raw object.
pub(crate) fn property_get(object: &Value, key: &Key) -> Value {
    match object {
        Value::Proxy(proxy) => proxy.get(key),
        Value::Object(target) => target.get(key),
        _ => Value::Undefined,
    }
}

pub(crate) fn property_set(object: &Value, key: Key, value: Value) -> bool {
    match object {
        Value::Proxy(proxy) => proxy.set(key, value),
        Value::Object(target) => target.set(key, value),
        _ => false,
    }
}

pub(crate) fn property_has(object: &Value, key: &Key) -> bool {
    match object {
        Value::Proxy(proxy) => proxy.has(key),
        Value::Object(target) => target.has_own(key),
        _ => false,
    }
}

pub(crate) fn property_own_keys(object: &Value) -> Vec<Key> {
    match object {
        Value::Proxy(proxy) => proxy.own_keys(),
        Value::Object(target) => target.own_keys(),
        _ => Vec::new(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ref_;
    use serde_json::json;

    #[test]
    fn wrapping_is_idempotent() {
        let raw = Value::from(json!({ "a": 1 }));
        let first = reactive(raw.clone());
        let second = reactive(raw.clone());
        assert_eq!(first, second);
        assert_eq!(reactive(first.clone()), first);
        assert_eq!(to_raw(&first), raw);
    }

    #[test]
    fn variants_have_separate_identity() {
        let raw = Value::from(json!({ "a": 1 }));
        let r = reactive(raw.clone());
        let ro = readonly(raw.clone());
        let sr = shallow_reactive(raw.clone());
        let sro = shallow_readonly(raw.clone());

        assert_ne!(r, ro);
        assert_ne!(r, sr);
        assert_ne!(ro, sro);
        assert_eq!(readonly(raw.clone()), ro);
    }

    #[test]
    fn predicates() {
        let raw = Value::from(json!({}));
        let r = reactive(raw.clone());
        let ro = readonly(raw.clone());
        let ro_over_r = readonly(r.clone());

        assert!(is_reactive(&r));
        assert!(!is_readonly(&r));
        assert!(!is_reactive(&ro));
        assert!(is_readonly(&ro));
        assert!(is_reactive(&ro_over_r));
        assert!(is_readonly(&ro_over_r));
        assert!(is_proxy(&ro));
        assert!(!is_proxy(&raw));
        assert!(is_shallow(&shallow_reactive(raw.clone())));
        assert_eq!(to_raw(&ro_over_r), raw);
    }

    #[test]
    fn reactive_of_readonly_is_unchanged() {
        let ro = readonly(json!({}));
        assert_eq!(reactive(ro.clone()), ro);
    }

    #[test]
    fn primitives_are_returned_with_warning() {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = warnings.clone();
        crate::diagnostics::set_warning_handler(move |err| sink.borrow_mut().push(err.clone()));

        assert_eq!(reactive(1), Value::from(1));
        assert_eq!(
            *warnings.borrow(),
            vec![ReactiveError::InvalidTarget("1".into())]
        );
    }

    #[test]
    fn refs_are_not_wrapped() {
        let r = Value::from(ref_(1));
        assert_eq!(reactive(r.clone()), r);
    }

    #[test]
    fn mark_raw_and_frozen_objects_are_skipped() {
        let skipped = mark_raw(Target::object());
        assert!(!is_proxy(&reactive(skipped.clone())));

        let frozen = Target::object();
        frozen.prevent_extensions();
        assert!(!is_proxy(&reactive(frozen)));
    }

    #[test]
    fn flags() {
        let raw = Value::from(json!({}));
        let ro = readonly(raw.clone());
        let proxy = ro.as_proxy().unwrap();
        assert_eq!(proxy.flag(ReactiveFlag::IsReadonly), Value::Bool(true));
        assert_eq!(proxy.flag(ReactiveFlag::IsReactive), Value::Bool(false));
        assert_eq!(proxy.flag(ReactiveFlag::IsShallow), Value::Bool(false));
        assert_eq!(proxy.flag(ReactiveFlag::Skip), Value::Bool(false));
        assert_eq!(proxy.flag(ReactiveFlag::Raw), raw);
    }

    #[test]
    fn identity_entry_removed_with_proxy() {
        let raw = Target::object();
        let first = reactive(&raw);
        let first_id = first.object_id();
        drop(first);

        let second = reactive(&raw);
        assert_ne!(second.object_id(), first_id);
        assert!(lookup_proxy(Variant::Reactive, raw.id()).is_some());
    }
}
