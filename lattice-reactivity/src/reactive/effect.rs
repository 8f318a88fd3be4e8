//! Effect Implementation
//!
//! An effect is a computation that re-runs whenever the reactive state it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created with [`effect`], the body runs immediately to establish
//!    its initial dependencies.
//!
//! 2. Every tracked read during a run subscribes the effect to the dep of
//!    that key.
//!
//! 3. When a dep is triggered, the effect either re-runs synchronously or,
//!    if it has a scheduler, hands a handle to the scheduler and lets it
//!    decide when to run.
//!
//! 4. After each run, deps that were not read again are dropped (see
//!    [`super::dep`]), so conditional branches do not leave stale
//!    subscriptions behind.
//!
//! # Lifetime
//!
//! Deps hold effects weakly. A [`ReactiveEffect`] stays subscribed while at
//! least one handle to it exists; dropping the last handle unsubscribes it.
//! [`ReactiveEffect::stop`] unsubscribes explicitly and is idempotent.
//!
//! # Stopped effects
//!
//! Running a stopped effect still executes its body and returns the result,
//! but no reads are recorded.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::{self, pause_tracking, ReactiveContext};
use super::dep::Dep;
use super::operations::{DebugOp, DepKey};
use super::refs::RefSource;
use super::subscriber::{EffectHandle, EffectId, Subscriber};
use crate::value::{ObjId, Value};

/// Decides when a triggered effect runs.
pub type Scheduler = Rc<dyn Fn(EffectHandle)>;

/// Development hook invoked on track or trigger.
pub type DebuggerHook = Rc<dyn Fn(&DebuggerEvent)>;

/// Details of a track or trigger, passed to debugger hooks.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    pub target: ObjId,
    pub op: DebugOp,
    pub key: Option<DepKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

/// A debugger event before it is addressed to an effect.
#[derive(Debug, Clone)]
pub(crate) struct EventInfo {
    pub target: ObjId,
    pub op: DebugOp,
    pub key: Option<DepKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

impl EventInfo {
    pub(crate) fn for_effect(&self, effect: EffectId) -> DebuggerEvent {
        DebuggerEvent {
            effect,
            target: self.target,
            op: self.op,
            key: self.key.clone(),
            new_value: self.new_value.clone(),
            old_value: self.old_value.clone(),
        }
    }
}

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    pub scheduler: Option<Scheduler>,
    /// Let the effect be scheduled by its own writes. Only meaningful with
    /// a scheduler: a synchronous re-run from inside the effect is always
    /// refused.
    pub allow_recurse: bool,
    pub on_stop: Option<Rc<dyn Fn()>>,
    pub on_track: Option<DebuggerHook>,
    pub on_trigger: Option<DebuggerHook>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(EffectHandle) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn on_stop<F: Fn() + 'static>(mut self, on_stop: F) -> Self {
        self.on_stop = Some(Rc::new(on_stop));
        self
    }

    pub fn on_track<F: Fn(&DebuggerEvent) + 'static>(mut self, hook: F) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger<F: Fn(&DebuggerEvent) + 'static>(mut self, hook: F) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .finish_non_exhaustive()
    }
}

/// The part of an effect that does not depend on its return type.
pub(crate) struct EffectCore {
    pub(crate) id: EffectId,
    pub(crate) active: Cell<bool>,
    /// Deps this effect is subscribed to, in first-read order.
    pub(crate) deps: RefCell<SmallVec<[Dep; 4]>>,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) allow_recurse: Cell<bool>,
    on_stop: Option<Rc<dyn Fn()>>,
    pub(crate) on_track: Option<DebuggerHook>,
    pub(crate) on_trigger: Option<DebuggerHook>,
    /// The computed value this effect backs, if any.
    pub(crate) computed: RefCell<Option<Weak<dyn RefSource>>>,
}

impl EffectCore {
    fn new(options: EffectOptions) -> Self {
        Self {
            id: EffectId::new(),
            active: Cell::new(true),
            deps: RefCell::new(SmallVec::new()),
            scheduler: options.scheduler,
            allow_recurse: Cell::new(options.allow_recurse),
            on_stop: options.on_stop,
            on_track: options.on_track,
            on_trigger: options.on_trigger,
            computed: RefCell::new(None),
        }
    }

    /// Unsubscribe from every dep.
    pub(crate) fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in &deps {
            dep.remove(self.id);
        }
    }

    pub(crate) fn stop(&self) {
        if !self.active.get() {
            return;
        }
        self.cleanup();
        if let Some(on_stop) = &self.on_stop {
            on_stop();
        }
        self.active.set(false);
        tracing::debug!(effect = ?self.id, "effect stopped");
    }
}

impl Drop for EffectCore {
    fn drop(&mut self) {
        self.cleanup();
    }
}

struct EffectInner<T> {
    core: EffectCore,
    body: Box<dyn Fn() -> T>,
    this: Weak<EffectInner<T>>,
}

impl<T: 'static> EffectInner<T> {
    fn run(&self) -> Option<T> {
        if !self.core.active.get() {
            let _paused = pause_tracking();
            return Some((self.body)());
        }

        if context::is_running(self.core.id) {
            tracing::trace!(effect = ?self.core.id, "refusing re-entrant run");
            return None;
        }

        let this: Rc<dyn Subscriber> = self.this.upgrade()?;
        let _ctx = ReactiveContext::enter(this);
        Some((self.body)())
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn run_erased(&self) {
        let _ = self.run();
    }
}

/// An effect whose body returns `T`.
///
/// Cloning shares the effect. Deps hold effects weakly, so the effect
/// stops reacting once every handle is dropped.
#[must_use = "dropping the handle stops the effect"]
pub struct ReactiveEffect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect without running it.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(body, EffectOptions::default())
    }

    /// Create an effect with options, without running it. `lazy` is
    /// ignored here; see [`effect_with`].
    pub fn with_options<F>(body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|this| EffectInner {
            core: EffectCore::new(options),
            body: Box::new(body),
            this: this.clone(),
        });
        Self { inner }
    }

    pub fn id(&self) -> EffectId {
        self.inner.core.id
    }

    /// Run the body with tracking.
    ///
    /// Returns `None` without running when this effect is already running
    /// further up the active chain.
    pub fn run(&self) -> Option<T> {
        self.inner.run()
    }

    /// Unsubscribe from all deps and call `on_stop`. Idempotent.
    pub fn stop(&self) {
        self.inner.core.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.core.active.get()
    }

    pub fn allow_recurse(&self) -> bool {
        self.inner.core.allow_recurse.get()
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.inner.core.allow_recurse.set(allow);
    }

    /// Number of deps this effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.core.deps.borrow().len()
    }

    /// A type-erased handle to this effect.
    pub fn handle(&self) -> EffectHandle {
        let inner: Rc<dyn Subscriber> = self.inner.clone();
        EffectHandle(inner)
    }

    /// Mark inactive without unsubscribing or calling `on_stop`.
    pub(crate) fn deactivate(&self) {
        self.inner.core.active.set(false);
    }

    pub(crate) fn set_computed(&self, computed: Weak<dyn RefSource>) {
        *self.inner.core.computed.borrow_mut() = Some(computed);
    }

    /// Whether this effect backs a computed value.
    pub fn is_computed(&self) -> bool {
        self.inner
            .core
            .computed
            .borrow()
            .as_ref()
            .is_some_and(|computed| computed.strong_count() > 0)
    }
}

impl<T: 'static> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create an effect and run it immediately.
///
/// ```rust,ignore
/// let state = reactive(json!({ "count": 0 }));
/// let state = state.as_proxy().unwrap().clone();
///
/// let runner = effect(move || {
///     println!("count is {}", state.get("count"));
/// });
/// ```
#[must_use = "dropping the handle stops the effect"]
pub fn effect<T, F>(body: F) -> ReactiveEffect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    effect_with(body, EffectOptions::default())
}

/// Create an effect with options. Runs immediately unless `lazy` is set.
#[must_use = "dropping the handle stops the effect"]
pub fn effect_with<T, F>(body: F, options: EffectOptions) -> ReactiveEffect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    let lazy = options.lazy;
    let runner = ReactiveEffect::with_options(body, options);
    if !lazy {
        runner.run();
    }
    runner
}

/// Stop `runner`.
pub fn stop<T: 'static>(runner: &ReactiveEffect<T>) {
    runner.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (runs, runs_clone) = counter();
        let _runner = effect(move || runs_clone.set(runs_clone.get() + 1));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let (runs, runs_clone) = counter();
        let runner = effect_with(
            move || runs_clone.set(runs_clone.get() + 1),
            EffectOptions::new().lazy(),
        );
        assert_eq!(runs.get(), 0);

        runner.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn run_returns_body_result() {
        let runner = effect_with(|| 42, EffectOptions::new().lazy());
        assert_eq!(runner.run(), Some(42));
    }

    #[test]
    fn stop_is_idempotent_and_calls_on_stop_once() {
        let (stops, stops_clone) = counter();
        let runner = effect_with(
            || (),
            EffectOptions::new().on_stop(move || stops_clone.set(stops_clone.get() + 1)),
        );

        stop(&runner);
        stop(&runner);
        assert!(!runner.is_active());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn stopped_effect_still_runs_body() {
        let (runs, runs_clone) = counter();
        let runner = effect(move || {
            runs_clone.set(runs_clone.get() + 1);
            context::is_tracking()
        });
        runner.stop();

        assert_eq!(runner.run(), Some(false));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn reentrant_run_is_refused() {
        let slot: Rc<RefCell<Option<ReactiveEffect<Option<u32>>>>> = Rc::new(RefCell::new(None));
        let inner_slot = slot.clone();
        let runner = ReactiveEffect::new(move || {
            let me = inner_slot.borrow().clone()?;
            me.run().flatten()
        });
        *slot.borrow_mut() = Some(runner.clone());

        // The inner run is refused and yields None.
        assert_eq!(runner.run(), Some(None));
        slot.borrow_mut().take();
    }

    #[test]
    fn clone_shares_state() {
        let runner = effect(|| ());
        let other = runner.clone();

        assert_eq!(runner.id(), other.id());
        runner.stop();
        assert!(!other.is_active());
        assert!(!other.handle().is_active());
    }
}
