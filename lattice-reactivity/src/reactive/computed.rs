//! Computed Values
//!
//! A computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. The getter runs inside a lazy effect whose scheduler, instead of
//!    re-running it, marks the computed dirty and notifies the computed's own
//!    subscribers.
//!
//! 2. Reading `value()` tracks the computed like a ref. If dirty, the getter
//!    re-runs and the result is cached.
//!
//! 3. Reading again without an intervening change returns the cache.
//!
//! This is lazy: a dependency change only flips a flag. Computed values that
//! are never read again never recompute.
//!
//! In server-side rendering mode (`ssr` in [`crate::config`]) nothing is
//! cached and every read runs the getter.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::{DebuggerEvent, EffectOptions, ReactiveEffect};
use super::refs::{track_ref_value, trigger_ref_value, LazyDep, Ref, RefSource};
use crate::config::config;
use crate::diagnostics::warn;
use crate::error::ReactiveError;
use crate::value::{ObjId, Value};

/// Debugger hooks for the computed's effect.
#[derive(Clone, Default)]
pub struct ComputedOptions {
    pub on_track: Option<Rc<dyn Fn(&DebuggerEvent)>>,
    pub on_trigger: Option<Rc<dyn Fn(&DebuggerEvent)>>,
}

struct ComputedInner {
    id: ObjId,
    dep: LazyDep,
    value: RefCell<Value>,
    effect: ReactiveEffect<Value>,
    dirty: Cell<bool>,
    cacheable: bool,
    setter: Option<Box<dyn Fn(Value)>>,
}

impl ComputedInner {
    fn mark_dirty(&self) {
        if !self.dirty.get() {
            self.dirty.set(true);
            trigger_ref_value(self, None);
        }
    }
}

impl RefSource for ComputedInner {
    fn id(&self) -> ObjId {
        self.id
    }

    fn get(&self) -> Value {
        track_ref_value(self);
        if self.dirty.get() || !self.cacheable {
            self.dirty.set(false);
            // A refused run (the computed read itself) caches undefined.
            let value = self.effect.run().unwrap_or_default();
            let old = self.value.replace(value);
            drop(old);
        }
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) {
        match &self.setter {
            Some(setter) => setter(value),
            None => warn(ReactiveError::ReadonlyComputed),
        }
    }

    fn dep(&self) -> &LazyDep {
        &self.dep
    }

    fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }
}

/// A cached derived value.
///
/// Cloning shares the computed. Converts into a [`Ref`] (and so a
/// [`Value`]) for storage inside reactive objects.
#[must_use = "dropping the handle stops the computed from tracking"]
#[derive(Clone)]
pub struct Computed(Rc<ComputedInner>);

impl Computed {
    fn build(
        getter: Box<dyn Fn() -> Value>,
        setter: Option<Box<dyn Fn(Value)>>,
        options: ComputedOptions,
    ) -> Self {
        let cacheable = !config().ssr;
        let inner = Rc::new_cyclic(|this: &std::rc::Weak<ComputedInner>| {
            let scheduler_target = this.clone();
            let effect_options = EffectOptions {
                lazy: true,
                on_track: options.on_track,
                on_trigger: options.on_trigger,
                ..EffectOptions::default()
            }
            .scheduler(move |_| {
                if let Some(computed) = scheduler_target.upgrade() {
                    computed.mark_dirty();
                }
            });

            let effect = ReactiveEffect::with_options(move || getter(), effect_options);
            let backref: std::rc::Weak<dyn RefSource> = this.clone();
            effect.set_computed(backref);
            if !cacheable {
                effect.deactivate();
            }

            ComputedInner {
                id: ObjId::new(),
                dep: LazyDep::default(),
                value: RefCell::new(Value::Undefined),
                effect,
                dirty: Cell::new(true),
                cacheable,
                setter,
            }
        });
        Self(inner)
    }

    /// Read the value, recomputing if a dependency changed.
    pub fn value(&self) -> Value {
        self.0.get()
    }

    /// Call the setter. A getter-only computed warns and ignores the write.
    pub fn set_value(&self, value: impl Into<Value>) {
        self.0.set(value.into());
    }

    pub fn is_readonly(&self) -> bool {
        self.0.is_readonly()
    }

    /// Whether the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn id(&self) -> ObjId {
        self.0.id
    }

    /// The effect running the getter.
    pub fn effect(&self) -> &ReactiveEffect<Value> {
        &self.0.effect
    }

    /// This computed as a ref.
    pub fn to_ref(&self) -> Ref {
        let source: Rc<dyn RefSource> = self.0.clone();
        Ref::from_source(source)
    }
}

impl From<Computed> for Ref {
    fn from(computed: Computed) -> Self {
        computed.to_ref()
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        Value::Ref(computed.to_ref())
    }
}

impl From<&Computed> for Value {
    fn from(computed: &Computed) -> Self {
        Value::Ref(computed.to_ref())
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("dirty", &self.is_dirty())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

/// A getter-only computed.
#[must_use = "dropping the handle stops the computed from tracking"]
pub fn computed<V, G>(getter: G) -> Computed
where
    V: Into<Value>,
    G: Fn() -> V + 'static,
{
    computed_with(getter, None::<fn(Value)>, ComputedOptions::default())
}

/// A computed with a setter.
#[must_use = "dropping the handle stops the computed from tracking"]
pub fn computed_writable<V, G, S>(getter: G, setter: S) -> Computed
where
    V: Into<Value>,
    G: Fn() -> V + 'static,
    S: Fn(Value) + 'static,
{
    computed_with(getter, Some(setter), ComputedOptions::default())
}

/// A computed with an optional setter and debugger hooks.
#[must_use = "dropping the handle stops the computed from tracking"]
pub fn computed_with<V, G, S>(getter: G, setter: Option<S>, options: ComputedOptions) -> Computed
where
    V: Into<Value>,
    G: Fn() -> V + 'static,
    S: Fn(Value) + 'static,
{
    Computed::build(
        Box::new(move || getter().into()),
        setter.map(|setter| Box::new(setter) as Box<dyn Fn(Value)>),
        options,
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
