//! Dependency Sets
//!
//! A [`Dep`] is the set of effects subscribed to one reactive key. Besides
//! the subscribers it carries two bitfields, `w` ("was tracked") and `n`
//! ("newly tracked"), with one bit per effect nesting level.
//!
//! # Marker diffing
//!
//! Before an effect runs, every dep it currently belongs to gets the bit of
//! the effect's depth set in `w`. Each read during the run sets the same bit
//! in `n`. After the run, a dep with `w` set and `n` clear was not read this
//! time, so the effect is removed from it. Both bits are then cleared.
//!
//! This keeps dependency cleanup proportional to what changed instead of
//! tearing down and rebuilding every subscription on each run.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::effect::EffectCore;
use super::subscriber::{EffectId, Subscriber};

#[derive(Default)]
struct DepInner {
    subscribers: RefCell<IndexMap<EffectId, Weak<dyn Subscriber>>>,
    w: Cell<u32>,
    n: Cell<u32>,
}

/// The set of effects depending on one key.
#[derive(Clone, Default)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dep seeded with the subscribers of `deps`, deduplicated, in order.
    pub(crate) fn merged<'a>(deps: impl IntoIterator<Item = &'a Dep>) -> Self {
        let merged = Self::new();
        {
            let mut target = merged.0.subscribers.borrow_mut();
            for dep in deps {
                for (id, weak) in dep.0.subscribers.borrow().iter() {
                    target.entry(*id).or_insert_with(|| weak.clone());
                }
            }
        }
        merged
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.0
            .subscribers
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.0.subscribers.borrow().contains_key(&id)
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn insert(&self, id: EffectId, subscriber: Weak<dyn Subscriber>) {
        self.0.subscribers.borrow_mut().insert(id, subscriber);
    }

    pub(crate) fn remove(&self, id: EffectId) {
        let removed = self.0.subscribers.borrow_mut().shift_remove(&id);
        drop(removed);
    }

    /// Live subscribers at this instant. Notification iterates this copy so
    /// effects may subscribe and unsubscribe while it runs.
    pub(crate) fn snapshot(&self) -> Vec<Rc<dyn Subscriber>> {
        self.0
            .subscribers
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Whether the bit for the current depth is set in `w`.
    pub fn was_tracked(&self, bit: u32) -> bool {
        self.0.w.get() & bit > 0
    }

    /// Whether the bit for the current depth is set in `n`.
    pub fn is_newly_tracked(&self, bit: u32) -> bool {
        self.0.n.get() & bit > 0
    }

    pub(crate) fn mark_was_tracked(&self, bit: u32) {
        self.0.w.set(self.0.w.get() | bit);
    }

    pub(crate) fn mark_newly_tracked(&self, bit: u32) {
        self.0.n.set(self.0.n.get() | bit);
    }

    fn clear_bits(&self, bit: u32) {
        self.0.w.set(self.0.w.get() & !bit);
        self.0.n.set(self.0.n.get() & !bit);
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.len())
            .field("w", &self.0.w.get())
            .field("n", &self.0.n.get())
            .finish()
    }
}

/// Mark every current dep of `effect` as tracked at `bit`.
pub(crate) fn init_dep_markers(effect: &EffectCore, bit: u32) {
    for dep in effect.deps.borrow().iter() {
        dep.mark_was_tracked(bit);
    }
}

/// Drop deps that were tracked before the run but not during it, then clear
/// the markers for `bit`. Surviving deps keep their order.
pub(crate) fn finalize_dep_markers(effect: &EffectCore, bit: u32) {
    effect.deps.borrow_mut().retain(|dep| {
        let stale = dep.was_tracked(bit) && !dep.is_newly_tracked(bit);
        if stale {
            dep.remove(effect.id);
        }
        dep.clear_bits(bit);
        !stale
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_per_bit() {
        let dep = Dep::new();
        dep.mark_was_tracked(1 << 1);
        dep.mark_newly_tracked(1 << 2);

        assert!(dep.was_tracked(1 << 1));
        assert!(!dep.was_tracked(1 << 2));
        assert!(dep.is_newly_tracked(1 << 2));
        assert!(!dep.is_newly_tracked(1 << 1));

        dep.clear_bits(1 << 1);
        assert!(!dep.was_tracked(1 << 1));
        assert!(dep.is_newly_tracked(1 << 2));
    }

    #[test]
    fn empty_dep() {
        let dep = Dep::new();
        assert!(dep.is_empty());
        assert!(dep.snapshot().is_empty());
        assert!(!dep.contains(EffectId::new()));
    }

    #[test]
    fn clones_share_state() {
        let dep = Dep::new();
        let other = dep.clone();
        dep.mark_was_tracked(2);
        assert!(other.was_tracked(2));
        assert!(dep.ptr_eq(&other));
        assert!(!dep.ptr_eq(&Dep::new()));
    }
}
