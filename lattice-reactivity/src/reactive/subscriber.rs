//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a [`Dep`](super::Dep) can notify: plain effects,
//! the effects behind computed values, and render effects built by hosts.
//! Deps hold subscribers weakly, so an effect lives exactly as long as some
//! handle to it does.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::effect::EffectCore;

/// Unique identifier for an effect.
///
/// Used to key dep subscriber sets and to detect an effect that is already
/// running somewhere up the active chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of an effect, whatever its body returns.
pub(crate) trait Subscriber {
    fn core(&self) -> &EffectCore;

    /// Run the body, discarding its result.
    fn run_erased(&self);
}

/// A cloneable, type-erased handle to an effect.
///
/// Schedulers receive one of these for every notification.
#[derive(Clone)]
pub struct EffectHandle(pub(crate) Rc<dyn Subscriber>);

impl EffectHandle {
    pub fn id(&self) -> EffectId {
        self.0.core().id
    }

    /// Run the effect now.
    pub fn run(&self) {
        self.0.run_erased();
    }

    pub fn stop(&self) {
        self.0.core().stop();
    }

    pub fn is_active(&self) -> bool {
        self.0.core().active.get()
    }

    pub fn ptr_eq(&self, other: &EffectHandle) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_unique() {
        let id1 = EffectId::new();
        let id2 = EffectId::new();
        let id3 = EffectId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }
}
