//! Runtime Configuration
//!
//! A small set of knobs that change how the reactive core behaves. The
//! configuration is per thread, like the rest of the runtime state, and is
//! usually set once at startup:
//!
//! ```rust,ignore
//! use lattice_reactivity::config::{configure, ReactiveConfig};
//!
//! configure(ReactiveConfig::from_json(r#"{ "dev_warnings": false }"#)?);
//! ```
//!
//! Missing fields fall back to [`ReactiveConfig::default`].

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on the nesting depth that uses the bit-marker algorithm.
///
/// Dep markers are 32-bit fields with one bit per nesting level, and bit 0 is
/// never used.
pub const MAX_MARKER_BITS: u32 = 30;

/// Configuration for the reactive runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Effects nested deeper than this fall back to clearing every dep
    /// before each run instead of diffing with markers. Clamped to
    /// [`MAX_MARKER_BITS`].
    pub max_marker_bits: u32,

    /// Emit development warnings (readonly writes, misuse of refs, key
    /// identity conflicts).
    pub dev_warnings: bool,

    /// Server-side rendering mode. Computed values never cache.
    pub ssr: bool,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            max_marker_bits: MAX_MARKER_BITS,
            dev_warnings: true,
            ssr: false,
        }
    }
}

impl ReactiveConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.max_marker_bits = self.max_marker_bits.min(MAX_MARKER_BITS);
        self
    }
}

thread_local! {
    static CONFIG: Cell<ReactiveConfig> = Cell::new(ReactiveConfig::default());
}

/// Install `config` for the current thread.
pub fn configure(config: ReactiveConfig) {
    let config = config.normalized();
    tracing::debug!(?config, "reactive runtime configured");
    CONFIG.with(|cell| cell.set(config));
}

/// The configuration active on the current thread.
pub fn config() -> ReactiveConfig {
    CONFIG
        .try_with(Cell::get)
        .unwrap_or_default()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
