//! Error types.
//!
//! Reactive operations mirror the host object model and never fail with a
//! `Result`: a write to a readonly proxy is swallowed, an unwrappable value is
//! handed back unchanged. The conditions are still reported, as
//! [`ReactiveError`] values routed through [`crate::diagnostics`].

use thiserror::Error;

use crate::reactive::TriggerOp;

/// A misuse of the reactive API detected at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A primitive or otherwise unwrappable value was passed to a proxy
    /// factory.
    #[error("value cannot be made reactive: {0}")]
    InvalidTarget(String),

    /// A mutation was attempted through a readonly proxy.
    #[error("{op} operation {}failed: target is readonly", on_key(.key))]
    ReadonlyMutation {
        op: TriggerOp,
        key: Option<String>,
    },

    /// A getter-only computed was written to.
    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    /// `to_refs` was called on a plain, non-reactive object.
    #[error("to_refs() expects a reactive object but received a plain one")]
    NotReactive,

    /// A primitive was used as a key of a weak collection.
    #[error("invalid value used as weak collection key: {0}")]
    InvalidWeakKey(String),

    /// A collection holds both the raw and the reactive form of one object
    /// as keys, which makes lookups ambiguous.
    #[error(
        "reactive {kind} contains both the raw and reactive versions of the same object, \
         which can lead to inconsistencies; use only the reactive version if possible"
    )]
    IdentityKeyConflict { kind: &'static str },
}

fn on_key(key: &Option<String>) -> String {
    key.as_ref()
        .map(|key| format!("on key \"{key}\" "))
        .unwrap_or_default()
}

/// Failure to load a [`crate::config::ReactiveConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid reactive config: {0}")]
    Parse(#[from] serde_json::Error),
}
