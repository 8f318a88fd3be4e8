//! Reactive Primitives
//!
//! This module implements the core of the reactive system: effects, the
//! dependency registry, refs and computed values. Together with the proxies
//! in [`crate::proxy`] they form the foundation of Lattice's fine-grained
//! reactivity.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An effect is a computation that re-runs whenever the reactive state it
//! read changes. Effects are how reactive state is synchronized with the
//! outside world: rendering, logging, persistence.
//!
//! ## Deps
//!
//! A dep is the set of effects subscribed to one reactive key. The runtime
//! maps every observed `(object, key)` pair to a dep; refs and computed
//! values own one dep each.
//!
//! ## Refs and Computed Values
//!
//! A ref is a single reactive cell. A computed is a lazily evaluated, cached
//! derived value that behaves like a readonly ref.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies automatically. When a reactive value is read, we check if
//! there is a running effect and, if so, subscribe it.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod dep;
mod effect;
mod operations;
mod refs;
mod runtime;
mod subscriber;

pub use computed::{computed, computed_with, computed_writable, Computed, ComputedOptions};
pub use context::{
    active_effect_id, enable_tracking, is_tracking, pause_tracking, reset_tracking, TrackingGuard,
};
pub use dep::Dep;
pub use effect::{
    effect, effect_with, stop, DebuggerEvent, DebuggerHook, EffectOptions, ReactiveEffect,
    Scheduler,
};
pub use operations::{DebugOp, DepKey, EntryKey, TrackOp, TriggerOp};
pub use refs::{
    custom_ref, is_ref, proxy_refs, ref_, shallow_ref, to_ref, to_ref_with_default, to_refs,
    trigger_ref, unref, Ref, RefTracker, ShallowUnwrap,
};
pub use runtime::{track, trigger, Runtime};
pub use subscriber::{EffectHandle, EffectId};

pub(crate) use refs::RefSource;
