//! Collection Instrumentation
//!
//! Maps, sets and their weak forms are observed through methods rather than
//! property access: [`Proxy::get_entry`], [`Proxy::has_entry`],
//! [`Proxy::set_entry`], [`Proxy::add`], [`Proxy::delete_entry`],
//! [`Proxy::clear`], [`Proxy::for_each`] and the iterators.
//!
//! # Keys
//!
//! A collection may be keyed by an object while callers hold its reactive
//! proxy, or the other way around. Lookups try the key as given and then its
//! raw form, and reads track both. A collection that ends up holding both
//! forms of one object as separate keys is reported with
//! [`ReactiveError::IdentityKeyConflict`].
//!
//! # Tracking
//!
//! | Operation                        | Dep                          |
//! |----------------------------------|------------------------------|
//! | `get_entry`, `has_entry`         | the entry key                |
//! | `size`, `for_each`, `values`     | iterate                      |
//! | `entries`, `iter`                | iterate                      |
//! | `keys` on a map                  | map key iterate              |
//!
//! Map key iteration has its own dep so that overwriting a value does not
//! re-run effects that only list keys.
//!
//! Weak collections report a size of zero and yield nothing when iterated.

use super::{to_raw, to_reactive, to_readonly, Proxy, Variant};
use crate::diagnostics::warn;
use crate::error::ReactiveError;
use crate::reactive::{track, trigger, DepKey, TrackOp, TriggerOp};
use crate::shared::has_changed;
use crate::value::{Key, Target, TargetKind, Value};

/// Wrap a value read out of a collection for `variant`.
fn wrap(variant: Variant, value: Value) -> Value {
    match variant {
        Variant::ShallowReactive | Variant::ShallowReadonly => value,
        Variant::Readonly => to_readonly(value),
        Variant::Reactive => to_reactive(value),
    }
}

/// Property reads on a collection proxy. Only `size` is a property.
pub(super) fn get_property(proxy: &Proxy, key: &Key) -> Value {
    match key.as_name() {
        Some("size") if !proxy.kind().is_weak() => Value::from(proxy.size()),
        _ => Value::Undefined,
    }
}

/// Warn when `target` holds both `key` and its raw form.
fn check_identity_keys(target: &Target, key: &Value) {
    let raw_key = to_raw(key);
    if raw_key != *key && target.has_entry(&raw_key) {
        warn(ReactiveError::IdentityKeyConflict {
            kind: target.kind().name(),
        });
    }
}

fn readonly_mutation(op: TriggerOp, key: Option<&Value>) {
    warn(ReactiveError::ReadonlyMutation {
        op,
        key: key.map(ToString::to_string),
    });
}

impl Proxy {
    fn inner_proxy(&self) -> Option<&Proxy> {
        self.target().as_proxy()
    }

    fn track_entry(&self, op: TrackOp, key: &Value, raw_key: &Value) {
        if self.is_readonly() {
            return;
        }
        if key != raw_key {
            track(self.raw(), op, DepKey::entry(key));
        }
        track(self.raw(), op, DepKey::entry(raw_key));
    }

    /// `map.get(key)`.
    pub fn get_entry(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        let raw_key = to_raw(&key);
        self.track_entry(TrackOp::Get, &key, &raw_key);

        let raw = self.raw();
        let lookup = |key: &Value| match self.inner_proxy() {
            Some(inner) => inner.get_entry(key.clone()),
            None => raw.get_entry(key),
        };

        if raw.has_entry(&key) {
            wrap(self.variant(), lookup(&key))
        } else if raw.has_entry(&raw_key) {
            wrap(self.variant(), lookup(&raw_key))
        } else {
            // Keep readonly(reactive(map)) subscribed to the missing key.
            if let Some(inner) = self.inner_proxy() {
                inner.get_entry(key);
            }
            Value::Undefined
        }
    }

    /// `map.has(key)` / `set.has(value)`.
    pub fn has_entry(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        let raw_key = to_raw(&key);
        self.track_entry(TrackOp::Has, &key, &raw_key);

        let has = |key: &Value| match self.inner_proxy() {
            Some(inner) => inner.has_entry(key.clone()),
            None => self.raw().has_entry(key),
        };
        if key == raw_key {
            has(&key)
        } else {
            has(&key) || has(&raw_key)
        }
    }

    /// Number of entries. Zero for weak collections.
    pub fn size(&self) -> usize {
        if self.kind().is_weak() {
            return 0;
        }
        if !self.is_readonly() {
            track(self.raw(), TrackOp::Iterate, DepKey::Iterate);
        }
        match self.inner_proxy() {
            Some(inner) => inner.size(),
            None => self.raw().size(),
        }
    }

    /// `set.add(value)`. Returns the proxy for chaining.
    pub fn add(&self, value: impl Into<Value>) -> &Self {
        let value = value.into();
        if self.is_readonly() {
            readonly_mutation(TriggerOp::Add, Some(&value));
            return self;
        }

        let value = to_raw(&value);
        let target = self.raw();
        if target.has_entry(&value) {
            return self;
        }
        if !target.add(value.clone()) {
            if target.kind().is_weak() {
                warn(ReactiveError::InvalidWeakKey(value.to_string()));
            }
            return self;
        }
        trigger(
            target,
            TriggerOp::Add,
            Some(DepKey::entry(&value)),
            Some(value),
            None,
        );
        self
    }

    /// `map.set(key, value)`. Returns the proxy for chaining.
    pub fn set_entry(&self, key: impl Into<Value>, value: impl Into<Value>) -> &Self {
        let key = key.into();
        if self.is_readonly() {
            readonly_mutation(TriggerOp::Set, Some(&key));
            return self;
        }

        let value = to_raw(&value.into());
        let target = self.raw();

        let mut key = key;
        let mut had_key = target.has_entry(&key);
        if !had_key {
            key = to_raw(&key);
            had_key = target.has_entry(&key);
        } else {
            check_identity_keys(target, &key);
        }

        let old_value = target.get_entry(&key);
        if !target.set_entry(key.clone(), value.clone()) {
            if target.kind().is_weak() {
                warn(ReactiveError::InvalidWeakKey(key.to_string()));
            }
            return self;
        }

        if !had_key {
            trigger(
                target,
                TriggerOp::Add,
                Some(DepKey::entry(&key)),
                Some(value),
                None,
            );
        } else if has_changed(&value, &old_value) {
            trigger(
                target,
                TriggerOp::Set,
                Some(DepKey::entry(&key)),
                Some(value),
                Some(old_value),
            );
        }
        self
    }

    /// `map.delete(key)` / `set.delete(value)`. Returns whether an entry was
    /// removed.
    pub fn delete_entry(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.is_readonly() {
            readonly_mutation(TriggerOp::Delete, Some(&key));
            return false;
        }

        let target = self.raw();
        let mut key = key;
        let mut had_key = target.has_entry(&key);
        if !had_key {
            key = to_raw(&key);
            had_key = target.has_entry(&key);
        } else {
            check_identity_keys(target, &key);
        }

        let old_value = target.kind().is_map_like().then(|| target.get_entry(&key));
        let removed = target.delete_entry(&key);
        if had_key {
            trigger(
                target,
                TriggerOp::Delete,
                Some(DepKey::entry(&key)),
                None,
                old_value,
            );
        }
        removed
    }

    /// Remove every entry, notifying every observer of the collection.
    pub fn clear(&self) {
        if self.is_readonly() {
            readonly_mutation(TriggerOp::Clear, None);
            return;
        }

        let target = self.raw();
        if target.kind().is_weak() {
            tracing::debug!(object = %target.id(), "clear on a weak collection ignored");
            return;
        }
        if target.size() == 0 {
            target.clear();
            return;
        }

        let old_target = match target.kind() {
            TargetKind::Map => Target::map_from(target.entries()),
            _ => Target::set_from(target.keys()),
        };
        target.clear();
        trigger(
            target,
            TriggerOp::Clear,
            None,
            None,
            Some(Value::Object(old_target)),
        );
    }

    /// Call `callback(value, key, proxy)` for every entry. Set members are
    /// passed as both value and key.
    pub fn for_each<F>(&self, mut callback: F)
    where
        F: FnMut(Value, Value, &Proxy),
    {
        let variant = self.variant();
        for (key, value) in self.iteration_source(false) {
            callback(wrap(variant, value), wrap(variant, key), self);
        }
    }

    /// Snapshot of `(key, value)` pairs, tracked for iteration. When this is
    /// a readonly view over a reactive proxy the pairs come through that
    /// proxy already wrapped.
    fn iteration_source(&self, key_only: bool) -> Vec<(Value, Value)> {
        let raw = self.raw();
        if raw.kind().is_weak() {
            tracing::debug!(object = %raw.id(), "weak collections are not iterable");
            return Vec::new();
        }

        if !self.is_readonly() {
            let key = if key_only && raw.kind() == TargetKind::Map {
                DepKey::MapKeyIterate
            } else {
                DepKey::Iterate
            };
            track(raw, TrackOp::Iterate, key);
        }

        match self.inner_proxy() {
            Some(inner) => {
                let variant = inner.variant();
                inner
                    .iteration_source(key_only)
                    .into_iter()
                    .map(|(key, value)| (wrap(variant, key), wrap(variant, value)))
                    .collect()
            }
            None => raw.entries(),
        }
    }

    fn reactive_iter<T>(
        &self,
        key_only: bool,
        project: fn(Value, Value, bool) -> T,
    ) -> ReactiveIter<T> {
        ReactiveIter {
            items: self.iteration_source(key_only).into_iter(),
            variant: self.variant(),
            is_map: self.kind() == TargetKind::Map,
            project,
        }
    }

    /// Map keys, or set members.
    pub fn keys(&self) -> ReactiveIter<Value> {
        self.reactive_iter(true, |key, _, _| key)
    }

    /// Map values, or set members.
    pub fn values(&self) -> ReactiveIter<Value> {
        self.reactive_iter(false, |_, value, _| value)
    }

    /// `(key, value)` pairs. Set members appear as `(v, v)`.
    pub fn entries(&self) -> ReactiveIter<(Value, Value)> {
        self.reactive_iter(false, |key, value, _| (key, value))
    }

    /// Default iteration: pairs for maps, members for sets.
    pub fn iter(&self) -> ReactiveIter<IterItem> {
        self.reactive_iter(false, |key, value, is_map| {
            if is_map {
                IterItem::Pair(key, value)
            } else {
                IterItem::Single(value)
            }
        })
    }
}

/// An item of a collection's default iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum IterItem {
    Single(Value),
    Pair(Value, Value),
}

/// Iterator over a snapshot of a collection, wrapping each item as it is
/// yielded.
///
/// The dependency is recorded when the iterator is created; mutations made
/// while iterating are not reflected in the items yielded.
pub struct ReactiveIter<T> {
    items: std::vec::IntoIter<(Value, Value)>,
    variant: Variant,
    is_map: bool,
    project: fn(Value, Value, bool) -> T,
}

impl<T> Iterator for ReactiveIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let (key, value) = self.items.next()?;
        Some((self.project)(
            wrap(self.variant, key),
            wrap(self.variant, value),
            self.is_map,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T> ExactSizeIterator for ReactiveIter<T> {}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
