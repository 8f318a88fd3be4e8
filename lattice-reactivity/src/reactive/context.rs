//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a reactive property is read,
//! the running effect is registered as a subscriber of that property's dep.
//!
//! # Implementation
//!
//! A thread-local stack holds the chain of running effects. Running an effect
//! pushes it; the innermost entry is the active effect and the entries below
//! it are its parents. Checking the stack for an effect's ID is how a
//! re-entrant run is detected and refused.
//!
//! The stack depth also selects the marker bit used for dep diffing (see
//! [`super::dep`]): depth `d` uses bit `1 << d`.
//!
//! Independently of the stack, a "should track" flag can be switched off
//! for a region of code with [`pause_tracking`]. The previous value is kept
//! on a second stack so pauses nest.

use std::cell::RefCell;
use std::rc::Rc;

use super::dep::{finalize_dep_markers, init_dep_markers};
use super::subscriber::{EffectId, Subscriber};
use crate::config::config;

thread_local! {
    static CONTEXT: RefCell<TrackingState> = RefCell::new(TrackingState::default());
}

struct TrackingState {
    /// Running effects, innermost last.
    stack: Vec<Rc<dyn Subscriber>>,
    should_track: bool,
    track_stack: Vec<bool>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            should_track: true,
            track_stack: Vec::new(),
        }
    }
}

/// Marker bit for nesting depth `depth`.
fn bit_for(depth: u32) -> u32 {
    1u32.checked_shl(depth).unwrap_or(0)
}

/// Guard for one effect run.
///
/// Entering pushes the effect, switches tracking on and prepares its deps for
/// diffing. Dropping the guard finalizes the deps and restores the previous
/// state, even if the effect body panics.
pub(crate) struct ReactiveContext {
    effect: Rc<dyn Subscriber>,
    bit: u32,
    use_markers: bool,
    last_should_track: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for `effect`.
    pub(crate) fn enter(effect: Rc<dyn Subscriber>) -> Self {
        let (depth, last_should_track) = CONTEXT.with(|state| {
            let mut state = state.borrow_mut();
            state.stack.push(effect.clone());
            let last = std::mem::replace(&mut state.should_track, true);
            (state.stack.len() as u32, last)
        });

        let bit = bit_for(depth);
        let use_markers = depth <= config().max_marker_bits;
        if use_markers {
            init_dep_markers(effect.core(), bit);
        } else {
            tracing::trace!(depth, "effect nesting exceeds marker bits, full cleanup");
            effect.core().cleanup();
        }

        Self {
            effect,
            bit,
            use_markers,
            last_should_track,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT
            .try_with(|state| !state.borrow().stack.is_empty())
            .unwrap_or(false)
    }

    /// The ID of the innermost running effect, if any.
    pub fn current_effect() -> Option<EffectId> {
        CONTEXT
            .try_with(|state| state.borrow().stack.last().map(|effect| effect.core().id))
            .ok()
            .flatten()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if self.use_markers {
            finalize_dep_markers(self.effect.core(), self.bit);
        }

        let popped = CONTEXT
            .try_with(|state| {
                let mut state = state.try_borrow_mut().ok()?;
                state.should_track = self.last_should_track;
                state.stack.pop()
            })
            .ok()
            .flatten();

        // Verify we're popping the right context.
        if let Some(popped) = &popped {
            debug_assert_eq!(
                popped.core().id,
                self.effect.core().id,
                "ReactiveContext mismatch"
            );
        }
    }
}

/// The innermost running effect.
pub(crate) fn active_subscriber() -> Option<Rc<dyn Subscriber>> {
    CONTEXT
        .try_with(|state| state.borrow().stack.last().cloned())
        .ok()
        .flatten()
}

/// Whether `id` is the active effect or one of its parents.
pub(crate) fn is_running(id: EffectId) -> bool {
    CONTEXT
        .try_with(|state| state.borrow().stack.iter().any(|effect| effect.core().id == id))
        .unwrap_or(false)
}

/// Current nesting depth and its marker bit.
pub(crate) fn depth_and_bit() -> (u32, u32) {
    CONTEXT.with(|state| {
        let depth = state.borrow().stack.len() as u32;
        (depth, bit_for(depth))
    })
}

/// Whether a read right now would be recorded.
pub fn is_tracking() -> bool {
    CONTEXT
        .try_with(|state| {
            let state = state.borrow();
            state.should_track && !state.stack.is_empty()
        })
        .unwrap_or(false)
}

/// ID of the effect currently running, if any.
pub fn active_effect_id() -> Option<EffectId> {
    ReactiveContext::current_effect()
}

/// Restores the previous "should track" flag when dropped.
#[must_use = "tracking is restored as soon as the guard is dropped"]
pub struct TrackingGuard {
    _private: (),
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        let _ = CONTEXT.try_with(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.should_track = state.track_stack.pop().unwrap_or(true);
            }
        });
    }
}

fn push_tracking(should_track: bool) -> TrackingGuard {
    CONTEXT.with(|state| {
        let mut state = state.borrow_mut();
        let last = state.should_track;
        state.track_stack.push(last);
        state.should_track = should_track;
    });
    TrackingGuard { _private: () }
}

/// Stop recording reads until the guard is dropped.
pub fn pause_tracking() -> TrackingGuard {
    push_tracking(false)
}

/// Record reads again, even inside a paused region, until the guard is
/// dropped.
pub fn enable_tracking() -> TrackingGuard {
    push_tracking(true)
}

/// Restore the flag saved by `guard` now rather than at scope end.
pub fn reset_tracking(guard: TrackingGuard) {
    drop(guard);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::ReactiveEffect;

    #[test]
    fn no_context_outside_effects() {
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_effect().is_none());
        assert!(!is_tracking());
    }

    #[test]
    fn context_tracks_running_effect() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let effect = ReactiveEffect::new(move || {
            sink.borrow_mut().push((active_effect_id(), is_tracking()));
        });
        effect.run();

        assert_eq!(*seen.borrow(), vec![(Some(effect.id()), true)]);
        assert!(active_effect_id().is_none());
    }

    #[test]
    fn nested_contexts() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let outer = ReactiveEffect::new(move || {
            let before = active_effect_id();
            let inner_sink = sink.clone();
            let inner = ReactiveEffect::new(move || {
                inner_sink.borrow_mut().push(depth_and_bit());
            });
            inner.run();
            let after = active_effect_id();
            sink.borrow_mut().push(depth_and_bit());
            assert_eq!(before, after);
        });
        outer.run();

        assert_eq!(*seen.borrow(), vec![(2, 4), (1, 2)]);
    }

    #[test]
    fn pause_and_enable_nest() {
        assert!(CONTEXT.with(|state| state.borrow().should_track));
        {
            let _paused = pause_tracking();
            assert!(!CONTEXT.with(|state| state.borrow().should_track));
            {
                let _enabled = enable_tracking();
                assert!(CONTEXT.with(|state| state.borrow().should_track));
            }
            assert!(!CONTEXT.with(|state| state.borrow().should_track));
        }
        assert!(CONTEXT.with(|state| state.borrow().should_track));
    }

    #[test]
    fn reset_restores_before_scope_end() {
        let paused = pause_tracking();
        assert!(!CONTEXT.with(|state| state.borrow().should_track));
        reset_tracking(paused);
        assert!(CONTEXT.with(|state| state.borrow().should_track));
    }

    #[test]
    fn panicking_effect_restores_context() {
        let effect = ReactiveEffect::new(|| panic!("boom"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| effect.run()));
        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());
        assert!(!is_tracking());
    }
}
