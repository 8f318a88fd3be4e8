//! Integration tests for refs, collection views and debugger hooks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lattice_reactivity::reactive::{DebugOp, DepKey, TrackOp, TriggerOp};
use lattice_reactivity::{
    custom_ref, effect, effect_with, is_reactive, is_readonly, proxy_refs, reactive, readonly,
    ref_, to_ref, to_ref_with_default, to_refs, trigger_ref, unref, DebuggerEvent, EffectOptions,
    Key, Proxy, Target, Value,
};
use serde_json::json;

fn proxy(value: Value) -> Proxy {
    value.as_proxy().cloned().expect("expected a proxy")
}

#[test]
fn on_track_and_on_trigger_fire() {
    let state = proxy(reactive(json!({ "a": 1 })));
    let tracked = Rc::new(RefCell::new(Vec::<DebuggerEvent>::new()));
    let triggered = Rc::new(RefCell::new(Vec::<DebuggerEvent>::new()));

    let s = state.clone();
    let track_sink = tracked.clone();
    let trigger_sink = triggered.clone();
    let runner = effect_with(
        move || {
            s.get("a");
        },
        EffectOptions::new()
            .on_track(move |event| track_sink.borrow_mut().push(event.clone()))
            .on_trigger(move |event| trigger_sink.borrow_mut().push(event.clone())),
    );

    {
        let tracked = tracked.borrow();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].effect, runner.id());
        assert_eq!(tracked[0].target, state.raw().id());
        assert_eq!(tracked[0].op, DebugOp::Track(TrackOp::Get));
        assert_eq!(tracked[0].key, Some(DepKey::from("a")));
    }

    state.set("a", 2);
    let triggered = triggered.borrow();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].op, DebugOp::Trigger(TriggerOp::Set));
    assert_eq!(triggered[0].new_value, Some(Value::from(2)));
    assert_eq!(triggered[0].old_value, Some(Value::from(1)));
}

#[test]
fn readonly_view_of_reactive_map_tracks_through() {
    let map = reactive(Target::map());
    let view = proxy(readonly(map.clone()));
    let writer = proxy(map);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let v = view.clone();
    let sink = seen.clone();
    let _runner = effect(move || sink.borrow_mut().push(v.has_entry("key")));

    writer.set_entry("key", 1);
    writer.delete_entry("key");
    assert_eq!(*seen.borrow(), vec![false, true, false]);
    assert!(is_readonly(&Value::Proxy(view)));
}

#[test]
fn weak_map_tracks_object_keys() {
    let map = proxy(reactive(Target::weak_map()));
    let key = Target::object();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let m = map.clone();
    let k = key.clone();
    let sink = seen.clone();
    let _runner = effect(move || sink.borrow_mut().push(m.get_entry(&k)));

    map.set_entry(&key, "meta");
    map.delete_entry(&key);
    assert_eq!(
        *seen.borrow(),
        vec![Value::Undefined, Value::from("meta"), Value::Undefined]
    );
}

#[test]
fn weak_set_drops_collected_members() {
    let set = proxy(reactive(Target::weak_set()));
    let member = Target::object();
    set.add(&member);
    assert!(set.has_entry(&member));

    drop(member);
    assert_eq!(set.raw().size(), 0);
}

#[test]
fn custom_ref_controls_tracking() {
    let store = Rc::new(RefCell::new(Value::from(0)));
    let writes = Rc::new(Cell::new(0));

    let read_store = store.clone();
    let write_store = store.clone();
    let w = writes.clone();
    let manual = custom_ref(move |tracker| {
        let read_tracker = tracker.clone();
        (
            move || {
                read_tracker.track();
                read_store.borrow().clone()
            },
            move |value: Value| {
                *write_store.borrow_mut() = value;
                w.set(w.get() + 1);
                // Notify only on every second write.
                if w.get() % 2 == 0 {
                    tracker.trigger();
                }
            },
        )
    });

    let seen = Rc::new(RefCell::new(Vec::new()));
    let r = manual.clone();
    let sink = seen.clone();
    let _runner = effect(move || sink.borrow_mut().push(r.value()));

    manual.set_value(1);
    manual.set_value(2);
    assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(2)]);
    assert_eq!(*store.borrow(), Value::from(2));
}

#[test]
fn to_ref_reads_through_and_defaults() {
    let state = reactive(json!({ "name": "ada" }));
    let name = to_ref(&state, "name");
    let missing = to_ref_with_default(&state, "title", "untitled");

    assert_eq!(name.value(), Value::from("ada"));
    assert_eq!(missing.value(), Value::from("untitled"));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let n = name.clone();
    let sink = seen.clone();
    let _runner = effect(move || sink.borrow_mut().push(n.value()));

    name.set_value("grace");
    assert_eq!(proxy(state.clone()).get("name"), Value::from("grace"));
    assert_eq!(
        *seen.borrow(),
        vec![Value::from("ada"), Value::from("grace")]
    );

    missing.set_value("dr");
    assert_eq!(missing.value(), Value::from("dr"));
}

#[test]
fn to_refs_covers_every_key() {
    let state = reactive(json!({ "a": 1, "b": 2 }));
    let refs = to_refs(&state);

    assert_eq!(
        refs.keys().cloned().collect::<Vec<_>>(),
        vec![Key::from("a"), Key::from("b")]
    );
    refs[&Key::from("b")].set_value(5);
    assert_eq!(proxy(state).get("b"), Value::from(5));
}

#[test]
fn proxy_refs_writes_through_refs() {
    let count = ref_(1);
    let raw = Target::object_from([("count", Value::from(&count)), ("plain", Value::from(0))]);
    let view = proxy_refs(&raw);

    assert_eq!(view.get("count"), Value::from(1));
    assert!(view.set("count", 5));
    assert_eq!(count.value(), Value::from(5));

    let replacement = ref_(9);
    view.set("count", &replacement);
    assert_eq!(unref(&raw.get(&Key::from("count"))), Value::from(9));
    assert_eq!(view.get("plain"), Value::from(0));
}

#[test]
fn trigger_ref_notifies_after_inner_mutation() {
    let list = lattice_reactivity::shallow_ref(Target::array([1]));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let l = list.clone();
    let sink = seen.clone();
    let _runner = effect(move || {
        let len = l.value().as_target().map(Target::len).unwrap_or(0);
        sink.borrow_mut().push(len);
    });

    if let Some(target) = list.value().as_target() {
        target.set(Key::Index(1), Value::from(2));
    }
    assert_eq!(*seen.borrow(), vec![1]);

    trigger_ref(&list);
    assert_eq!(*seen.borrow(), vec![1, 2]);
}

#[test]
fn nested_values_in_readonly_views_are_readonly() {
    let state = proxy(readonly(json!({ "inner": { "a": 1 } })));
    let inner = state.get("inner");
    assert!(is_readonly(&inner));
    assert!(!is_reactive(&inner));
}
