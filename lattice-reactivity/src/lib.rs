//! Lattice Reactivity
//!
//! This crate provides the fine-grained reactivity runtime for Lattice.
//! It implements:
//!
//! - Observable proxies over plain objects, arrays and keyed collections
//! - Effects with automatic dependency tracking
//! - Refs, custom refs and lazily cached computed values
//! - Debugger hooks and a pluggable warning channel
//!
//! Everything is single-threaded: reactive handles are `!Send` and the
//! dependency registry is per thread.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamic object model ([`Value`], [`Target`], [`Key`])
//! - `reactive`: effects, deps, the tracking context, refs and computed
//! - `proxy`: reactive and readonly views and their interception rules
//! - `config`, `diagnostics`, `error`: runtime settings and misuse reporting
//!
//! # Example
//!
//! ```rust
//! use lattice_reactivity::{computed, effect, reactive, Value};
//! use serde_json::json;
//!
//! let state = reactive(json!({ "count": 1 }));
//! let state = state.as_proxy().cloned().unwrap();
//!
//! let reader = state.clone();
//! let doubled = computed(move || reader.get("count").as_f64().unwrap_or(0.0) * 2.0);
//!
//! let d = doubled.clone();
//! let _runner = effect(move || println!("doubled: {}", d.value()));
//!
//! // Effect re-runs, prints "doubled: 10"
//! state.set("count", 5);
//! assert_eq!(doubled.value(), Value::from(10));
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod proxy;
pub mod reactive;
pub mod shared;
pub mod value;

pub use config::{configure, ReactiveConfig};
pub use diagnostics::{clear_warning_handler, set_warning_handler};
pub use error::{ConfigError, ReactiveError};
pub use proxy::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, IterItem, Proxy,
    ReactiveFlag, ReactiveIter, Variant,
};
pub use reactive::{
    computed, computed_with, computed_writable, custom_ref, effect, effect_with, enable_tracking,
    is_ref, pause_tracking, proxy_refs, ref_, reset_tracking, shallow_ref, stop, to_ref,
    to_ref_with_default, to_refs, trigger_ref, unref, Computed, ComputedOptions, DebuggerEvent,
    EffectHandle, EffectOptions, ReactiveEffect, Ref, RefTracker, ShallowUnwrap,
};
pub use value::{Key, ObjId, Symbol, Target, TargetKind, Value, WellKnownSymbol};
