//! Property interception for plain objects and arrays.

use std::sync::OnceLock;

use super::{is_readonly, is_shallow, reactive, readonly, to_raw, Proxy};
use crate::diagnostics::warn;
use crate::error::ReactiveError;
use crate::reactive::{is_ref, track, trigger, DepKey, TrackOp, TriggerOp};
use crate::shared::{has_changed, make_map, KeyMap};
use crate::value::{Key, Value};

/// Keys whose reads are never tracked.
fn is_non_trackable(key: &Key) -> bool {
    static NON_TRACKABLE: OnceLock<KeyMap> = OnceLock::new();
    match key {
        Key::Symbol(symbol) => symbol.is_well_known(),
        Key::Name(name) => NON_TRACKABLE
            .get_or_init(|| make_map("__proto__,__v_isRef,__isVue"))
            .contains(name),
        Key::Index(_) => false,
    }
}

/// Read through the wrapped value, which may itself be a proxy.
fn target_get(proxy: &Proxy, key: &Key) -> Value {
    match proxy.target() {
        Value::Proxy(inner) => inner.get(key),
        _ => proxy.raw().get(key),
    }
}

pub(super) fn get(proxy: &Proxy, key: &Key) -> Value {
    let variant = proxy.variant();
    let res = target_get(proxy, key);

    if is_non_trackable(key) {
        return res;
    }

    if !variant.is_readonly() {
        track(proxy.raw(), TrackOp::Get, DepKey::Prop(key.clone()));
    }

    if variant.is_shallow() {
        return res;
    }

    match res {
        // Array elements keep their refs.
        Value::Ref(r) if !(proxy.raw().is_array() && key.as_index().is_some()) => r.value(),
        Value::Object(_) | Value::Proxy(_) => {
            if variant.is_readonly() {
                readonly(res)
            } else {
                reactive(res)
            }
        }
        res => res,
    }
}

pub(super) fn set(proxy: &Proxy, key: Key, value: Value) -> bool {
    if proxy.is_readonly() {
        warn(ReactiveError::ReadonlyMutation {
            op: TriggerOp::Set,
            key: Some(key.to_string()),
        });
        return true;
    }

    // Mutable proxies always wrap a raw target.
    let target = proxy.raw();
    let mut old_value = target.get(&key);
    if is_readonly(&old_value) && is_ref(&old_value) && !is_ref(&value) {
        return false;
    }

    let mut value = value;
    if !proxy.is_shallow() && !is_readonly(&value) {
        if !is_shallow(&value) {
            value = to_raw(&value);
            old_value = to_raw(&old_value);
        }
        if !target.is_array() {
            if let Value::Ref(old_ref) = &old_value {
                if !is_ref(&value) {
                    old_ref.set_value(value);
                    return true;
                }
            }
        }
    }

    let had_key = match (target.is_array(), key.as_index()) {
        (true, Some(index)) => index < target.len(),
        _ => target.has_own(&key),
    };

    if !target.set(key.clone(), value.clone()) {
        return false;
    }

    if !had_key {
        trigger(target, TriggerOp::Add, Some(DepKey::Prop(key)), Some(value), None);
    } else if has_changed(&value, &old_value) {
        trigger(
            target,
            TriggerOp::Set,
            Some(DepKey::Prop(key)),
            Some(value),
            Some(old_value),
        );
    }
    true
}

pub(super) fn delete_property(proxy: &Proxy, key: &Key) -> bool {
    if proxy.is_readonly() {
        warn(ReactiveError::ReadonlyMutation {
            op: TriggerOp::Delete,
            key: Some(key.to_string()),
        });
        return true;
    }

    let target = proxy.raw();
    let had_key = target.has_own(key);
    let old_value = target.get(key);
    let result = target.delete(key);
    if result && had_key {
        trigger(
            target,
            TriggerOp::Delete,
            Some(DepKey::Prop(key.clone())),
            None,
            Some(old_value),
        );
    }
    result
}

pub(super) fn has(proxy: &Proxy, key: &Key) -> bool {
    let result = match proxy.target() {
        Value::Proxy(inner) => inner.has(key),
        _ => proxy.raw().has_own(key),
    };
    let well_known = matches!(key, Key::Symbol(symbol) if symbol.is_well_known());
    if !proxy.is_readonly() && !well_known {
        track(proxy.raw(), TrackOp::Has, DepKey::Prop(key.clone()));
    }
    result
}

pub(super) fn own_keys(proxy: &Proxy) -> Vec<Key> {
    if !proxy.is_readonly() {
        let key = if proxy.raw().is_array() {
            DepKey::length()
        } else {
            DepKey::Iterate
        };
        track(proxy.raw(), TrackOp::Iterate, key);
    }
    match proxy.target() {
        Value::Proxy(inner) => inner.own_keys(),
        _ => proxy.raw().own_keys(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::{is_reactive, shallow_reactive, shallow_readonly};
    use crate::reactive::{computed, effect, ref_, Runtime};
    use crate::value::{Symbol, Target, WellKnownSymbol};
    use crate::Value;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    fn proxy_of(value: &Value) -> Proxy {
        value.as_proxy().cloned().unwrap()
    }

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn basic_round_trip() {
        let state = proxy_of(&reactive(json!({ "a": 1, "b": 2 })));
        let runs = counter();

        let p = state.clone();
        let r = runs.clone();
        let _runner = effect(move || {
            r.set(r.get() + 1);
            p.get("a");
        });
        assert_eq!(runs.get(), 1);

        state.set("a", 2);
        assert_eq!(runs.get(), 2);
        state.set("a", 2);
        assert_eq!(runs.get(), 2);
        state.set("b", 5);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nan_write_does_not_retrigger() {
        let state = proxy_of(&reactive(json!({})));
        state.set("n", f64::NAN);
        let runs = counter();

        let p = state.clone();
        let r = runs.clone();
        let _runner = effect(move || {
            r.set(r.get() + 1);
            p.get("n");
        });

        state.set("n", f64::NAN);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn adding_a_key_notifies_iteration() {
        let state = proxy_of(&reactive(json!({ "a": 1 })));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let p = state.clone();
        let sink = seen.clone();
        let _runner = effect(move || sink.borrow_mut().push(p.own_keys().len()));

        state.set("b", 2);
        state.set("b", 3);
        state.delete("a");
        assert_eq!(*seen.borrow(), vec![1, 2, 1]);
    }

    #[test]
    fn has_is_tracked() {
        let state = proxy_of(&reactive(json!({})));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let p = state.clone();
        let sink = seen.clone();
        let _runner = effect(move || sink.borrow_mut().push(p.has("x")));

        state.set("x", 1);
        assert_eq!(*seen.borrow(), vec![false, true]);
    }

    #[test]
    fn well_known_symbols_are_not_tracked() {
        let raw = Target::object();
        let state = proxy_of(&reactive(&raw));
        let key = Key::Symbol(Symbol::WellKnown(WellKnownSymbol::Iterator));

        let p = state.clone();
        let k = key.clone();
        let _runner = effect(move || {
            p.get(&k);
            p.get("__proto__");
        });
        assert!(!Runtime::is_tracked(&raw));
    }

    #[test]
    fn nested_objects_are_wrapped_lazily() {
        let raw = Value::from(json!({ "a": { "b": 1 } }));
        let state = proxy_of(&reactive(raw.clone()));

        let nested = state.get("a");
        assert!(is_reactive(&nested));
        assert_eq!(nested, state.get("a"));

        let stored = raw.as_target().unwrap().get(&Key::from("a"));
        assert!(!is_reactive(&stored));
    }

    #[test]
    fn deep_reactivity() {
        let state = proxy_of(&reactive(json!({ "a": { "b": 1 } })));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let p = state.clone();
        let sink = seen.clone();
        let _runner = effect(move || {
            let a = p.get("a");
            sink.borrow_mut().push(a.as_proxy().map(|a| a.get("b")).unwrap_or_default());
        });

        proxy_of(&state.get("a")).set("b", 2);
        assert_eq!(*seen.borrow(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn refs_are_unwrapped_and_written_through() {
        let count = ref_(0);
        let raw = Target::object_from([("count", Value::from(&count))]);
        let state = proxy_of(&reactive(&raw));

        assert_eq!(state.get("count"), Value::from(0));
        assert!(state.set("count", 5));
        assert_eq!(count.value(), Value::from(5));
        assert!(is_ref(&raw.get(&Key::from("count"))));
    }

    #[test]
    fn array_elements_keep_refs() {
        let item = ref_(1);
        let raw = Target::array([Value::from(&item)]);
        let state = proxy_of(&reactive(&raw));
        assert!(is_ref(&state.get(0usize)));
    }

    #[test]
    fn readonly_ref_slot_rejects_plain_writes() {
        let c = computed(|| 1);
        let state = proxy_of(&reactive(Target::object_from([("c", Value::from(&c))])));
        assert!(!state.set("c", 2));
        assert_eq!(state.get("c"), Value::from(1));
    }

    #[test]
    fn readonly_rejects_writes() {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = warnings.clone();
        crate::diagnostics::set_warning_handler(move |err| sink.borrow_mut().push(err.clone()));

        let raw = Target::object_from([("a", 1)]);
        let view = proxy_of(&readonly(&raw));

        assert!(view.set("a", 2));
        assert!(view.delete("a"));
        assert_eq!(raw.get(&Key::from("a")), Value::from(1));
        assert_eq!(
            *warnings.borrow(),
            vec![
                ReactiveError::ReadonlyMutation {
                    op: TriggerOp::Set,
                    key: Some("a".into())
                },
                ReactiveError::ReadonlyMutation {
                    op: TriggerOp::Delete,
                    key: Some("a".into())
                },
            ]
        );
    }

    #[test]
    fn readonly_over_raw_does_not_track() {
        let raw = Target::object_from([("a", 1)]);
        let view = proxy_of(&readonly(&raw));

        let v = view.clone();
        let _runner = effect(move || {
            v.get("a");
        });
        assert!(!Runtime::is_tracked(&raw));
    }

    #[test]
    fn readonly_over_reactive_tracks_through() {
        let state = proxy_of(&reactive(json!({ "a": 1 })));
        let view = proxy_of(&readonly(Value::from(&state)));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let v = view.clone();
        let sink = seen.clone();
        let _runner = effect(move || sink.borrow_mut().push(v.get("a")));

        state.set("a", 2);
        assert_eq!(*seen.borrow(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn shallow_variants_return_nested_as_is() {
        let raw = Value::from(json!({ "a": { "b": 1 } }));
        assert!(!is_reactive(&proxy_of(&shallow_reactive(raw.clone())).get("a")));
        assert!(!is_readonly(&proxy_of(&shallow_readonly(raw.clone())).get("a")));
        assert!(is_readonly(&proxy_of(&readonly(raw)).get("a")));
    }

    #[test]
    fn writes_store_raw_values() {
        let raw = Target::object();
        let state = proxy_of(&reactive(&raw));
        let nested = reactive(json!({ "x": 1 }));

        state.set("n", nested.clone());
        assert_eq!(raw.get(&Key::from("n")), to_raw(&nested));
        assert_eq!(state.get("n"), nested);
    }

    #[test]
    fn rejected_write_does_not_trigger() {
        let open = Target::object_from([("a", 1)]);
        let state = proxy_of(&reactive(&open));
        open.prevent_extensions();
        let runs = counter();

        let p = state.clone();
        let r = runs.clone();
        let _runner = effect(move || {
            r.set(r.get() + 1);
            p.own_keys();
        });

        assert!(!state.set("b", 1));
        assert_eq!(runs.get(), 1);

        let frozen = Target::object();
        frozen.prevent_extensions();
        assert!(!is_reactive(&reactive(&frozen)));
    }
}
