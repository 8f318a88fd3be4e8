//! Development warnings.
//!
//! Every recoverable misuse is logged through `tracing` at `WARN` and, when
//! installed, passed to a per-thread warning handler. Hosts use the handler
//! to surface warnings in their own tooling; tests use it to assert on them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::config;
use crate::error::ReactiveError;

type WarningHandler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static WARNING_HANDLER: RefCell<Option<WarningHandler>> = const { RefCell::new(None) };
}

/// Install a handler that receives every warning on this thread.
pub fn set_warning_handler<F>(handler: F)
where
    F: Fn(&ReactiveError) + 'static,
{
    WARNING_HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Remove the warning handler installed on this thread.
pub fn clear_warning_handler() {
    WARNING_HANDLER.with(|slot| slot.borrow_mut().take());
}

/// Report a warning. Suppressed when `dev_warnings` is off.
pub(crate) fn warn(err: ReactiveError) {
    if !config().dev_warnings {
        return;
    }

    tracing::warn!(error = %err, "reactivity warning");

    // Clone out so the handler may replace itself.
    let handler = WARNING_HANDLER
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten();
    if let Some(handler) = handler {
        handler(&err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{configure, ReactiveConfig};

    #[test]
    fn handler_receives_warnings() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        set_warning_handler(move |err| sink.borrow_mut().push(err.clone()));

        warn(ReactiveError::ReadonlyComputed);
        assert_eq!(*seen.borrow(), vec![ReactiveError::ReadonlyComputed]);

        clear_warning_handler();
        warn(ReactiveError::NotReactive);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn disabled_warnings_are_dropped() {
        let count = Rc::new(std::cell::Cell::new(0));
        let counter = count.clone();
        set_warning_handler(move |_| counter.set(counter.get() + 1));

        configure(ReactiveConfig {
            dev_warnings: false,
            ..ReactiveConfig::default()
        });
        warn(ReactiveError::ReadonlyComputed);
        assert_eq!(count.get(), 0);
    }
}
