//! Reactive Runtime
//!
//! The runtime owns the registry that connects raw objects to the effects
//! reading them: `target -> key -> Dep`.
//!
//! # How It Works
//!
//! 1. A proxy read calls [`track`]. If an effect is running and tracking is
//!    on, the effect is added to the dep for `(target, key)`.
//!
//! 2. A proxy write calls [`trigger`]. The runtime selects every dep the
//!    write can affect (see [`trigger`] for the fan-out rules), merges them
//!    so each effect appears once, and notifies them.
//!
//! 3. Notification calls the effect's scheduler with a handle, or runs the
//!    effect synchronously when it has none.
//!
//! # Lifetime
//!
//! Registry entries are keyed by [`ObjId`] and removed when the target is
//! dropped. Deps hold effects weakly, so the registry never keeps an effect
//! alive either.
//!
//! # Threading
//!
//! The registry is thread-local, like the reactive context. Reactive values
//! are `!Send`; each thread has an independent reactive world.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context;
use super::dep::Dep;
use super::effect::EventInfo;
use super::operations::{DebugOp, DepKey, TrackOp, TriggerOp};
use super::subscriber::EffectHandle;
use crate::config::config;
use crate::value::{Key, ObjId, Target, TargetKind, Value};

type KeyToDepMap = IndexMap<DepKey, Dep>;

thread_local! {
    static TARGET_MAP: RefCell<HashMap<ObjId, KeyToDepMap>> = RefCell::new(HashMap::new());
}

/// Introspection over the dependency registry.
pub struct Runtime;

impl Runtime {
    /// Number of live subscribers of `(target, key)`.
    pub fn subscriber_count(target: &Target, key: &DepKey) -> usize {
        TARGET_MAP.with(|map| {
            map.borrow()
                .get(&target.id())
                .and_then(|deps| deps.get(key))
                .map(Dep::len)
                .unwrap_or(0)
        })
    }

    /// The dep for `(target, key)`, if one was ever created.
    pub fn dep(target: &Target, key: &DepKey) -> Option<Dep> {
        TARGET_MAP.with(|map| {
            map.borrow()
                .get(&target.id())
                .and_then(|deps| deps.get(key))
                .cloned()
        })
    }

    /// Whether any read of `target` has been tracked.
    pub fn is_tracked(target: &Target) -> bool {
        TARGET_MAP.with(|map| map.borrow().contains_key(&target.id()))
    }

    /// Number of targets with registry entries.
    pub fn tracked_target_count() -> usize {
        TARGET_MAP.with(|map| map.borrow().len())
    }

    /// Drop the registry entry of a target that is going away.
    pub(crate) fn forget_target(id: ObjId) {
        let removed = TARGET_MAP
            .try_with(|map| map.try_borrow_mut().ok().and_then(|mut map| map.remove(&id)))
            .ok()
            .flatten();
        // Deps may hold the last reference to other state; drop it outside
        // the borrow.
        drop(removed);
    }
}

/// Record that the active effect read `key` of `target`.
///
/// Does nothing when no effect is running or tracking is paused.
pub fn track(target: &Target, op: TrackOp, key: DepKey) {
    if !context::is_tracking() {
        return;
    }

    let dep = TARGET_MAP.with(|map| {
        map.borrow_mut()
            .entry(target.id())
            .or_default()
            .entry(key.clone())
            .or_default()
            .clone()
    });

    tracing::trace!(object = %target.id(), %op, ?key, "track");

    track_effects(
        &dep,
        EventInfo {
            target: target.id(),
            op: DebugOp::Track(op),
            key: Some(key),
            new_value: None,
            old_value: None,
        },
    );
}

/// Subscribe the active effect to `dep`.
pub(crate) fn track_effects(dep: &Dep, info: EventInfo) {
    let Some(active) = context::active_subscriber() else {
        return;
    };
    let core = active.core();
    let (depth, bit) = context::depth_and_bit();

    let should_track = if depth <= config().max_marker_bits {
        if dep.is_newly_tracked(bit) {
            false
        } else {
            dep.mark_newly_tracked(bit);
            !dep.was_tracked(bit)
        }
    } else {
        !dep.contains(core.id)
    };

    if should_track {
        dep.insert(core.id, Rc::downgrade(&active));
        core.deps.borrow_mut().push(dep.clone());
        if let Some(hook) = &core.on_track {
            hook(&info.for_effect(core.id));
        }
    }
}

/// Notify every effect that depends on the part of `target` a write changed.
///
/// Dep selection:
///
/// - `Clear`: every dep of the target.
/// - Writing an array's `length`: the `length` dep and every index dep at or
///   beyond the new length.
/// - Otherwise the dep for `key`, plus:
///   - `Add` on a non-array: the iterate dep, and the key-iterate dep for
///     maps; on an array at an integer key: the `length` dep.
///   - `Delete` on a non-array: the iterate dep, and the key-iterate dep for
///     maps.
///   - `Set` on a map: the iterate dep.
pub fn trigger(
    target: &Target,
    op: TriggerOp,
    key: Option<DepKey>,
    new_value: Option<Value>,
    old_value: Option<Value>,
) {
    let kind = target.kind();
    let selected: Option<SmallVec<[Dep; 4]>> = TARGET_MAP.with(|map| {
        let map = map.borrow();
        let deps = map.get(&target.id())?;
        Some(select_deps(deps, kind, op, key.as_ref(), new_value.as_ref()))
    });

    let Some(selected) = selected else {
        return;
    };

    tracing::trace!(object = %target.id(), %op, ?key, deps = selected.len(), "trigger");

    let info = EventInfo {
        target: target.id(),
        op: DebugOp::Trigger(op),
        key,
        new_value,
        old_value,
    };

    match selected.as_slice() {
        [] => {}
        [dep] => trigger_effects(dep, &info),
        deps => trigger_effects(&Dep::merged(deps), &info),
    }
}

fn select_deps(
    deps: &KeyToDepMap,
    kind: TargetKind,
    op: TriggerOp,
    key: Option<&DepKey>,
    new_value: Option<&Value>,
) -> SmallVec<[Dep; 4]> {
    let mut selected = SmallVec::new();
    let is_array = kind == TargetKind::Array;
    let is_map = kind == TargetKind::Map;

    if op == TriggerOp::Clear {
        selected.extend(deps.values().cloned());
        return selected;
    }

    let length = DepKey::length();
    if is_array && key == Some(&length) {
        let new_length = new_value.and_then(Value::as_f64).unwrap_or(0.0);
        for (dep_key, dep) in deps {
            let beyond = matches!(dep_key, DepKey::Prop(Key::Index(index)) if *index as f64 >= new_length);
            if *dep_key == length || beyond {
                selected.push(dep.clone());
            }
        }
        return selected;
    }

    if let Some(dep) = key.and_then(|key| deps.get(key)) {
        selected.push(dep.clone());
    }

    let mut add = |dep_key: &DepKey| {
        if let Some(dep) = deps.get(dep_key) {
            selected.push(dep.clone());
        }
    };

    match op {
        TriggerOp::Add if !is_array => {
            add(&DepKey::Iterate);
            if is_map {
                add(&DepKey::MapKeyIterate);
            }
        }
        TriggerOp::Add => {
            if matches!(key, Some(DepKey::Prop(Key::Index(_)))) {
                add(&length);
            }
        }
        TriggerOp::Delete if !is_array => {
            add(&DepKey::Iterate);
            if is_map {
                add(&DepKey::MapKeyIterate);
            }
        }
        TriggerOp::Set if is_map => add(&DepKey::Iterate),
        _ => {}
    }

    selected
}

/// Notify the subscribers of `dep`, in subscription order.
///
/// The active effect is skipped unless it allows recursion. Effects with a
/// scheduler are handed to it; the rest run synchronously.
pub(crate) fn trigger_effects(dep: &Dep, info: &EventInfo) {
    for effect in dep.snapshot() {
        let core = effect.core();
        let is_active = context::active_subscriber()
            .is_some_and(|active| active.core().id == core.id);
        if is_active && !core.allow_recurse.get() {
            continue;
        }

        if let Some(hook) = &core.on_trigger {
            hook(&info.for_effect(core.id));
        }

        match &core.scheduler {
            Some(scheduler) => scheduler(EffectHandle(effect.clone())),
            None => effect.run_erased(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
