//! Property keys and symbols.
//!
//! Plain objects and arrays are addressed by [`Key`]s. Integer-like keys are
//! normalized to [`Key::Index`] so that `"3"` and `3` address the same slot,
//! which is what the array length rules in the trigger engine rely on.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::shared::is_integer_key;

/// The built-in symbols of the host object model.
///
/// Reads keyed by one of these are never tracked: they describe protocol
/// behavior (iteration, coercion) rather than user state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    AsyncIterator,
    HasInstance,
    IsConcatSpreadable,
    Iterator,
    Match,
    MatchAll,
    Replace,
    Search,
    Species,
    Split,
    ToPrimitive,
    ToStringTag,
    Unscopables,
}

impl WellKnownSymbol {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AsyncIterator => "Symbol.asyncIterator",
            Self::HasInstance => "Symbol.hasInstance",
            Self::IsConcatSpreadable => "Symbol.isConcatSpreadable",
            Self::Iterator => "Symbol.iterator",
            Self::Match => "Symbol.match",
            Self::MatchAll => "Symbol.matchAll",
            Self::Replace => "Symbol.replace",
            Self::Search => "Symbol.search",
            Self::Species => "Symbol.species",
            Self::Split => "Symbol.split",
            Self::ToPrimitive => "Symbol.toPrimitive",
            Self::ToStringTag => "Symbol.toStringTag",
            Self::Unscopables => "Symbol.unscopables",
        }
    }
}

/// A symbol key: either one of the well-known symbols or a unique one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    WellKnown(WellKnownSymbol),
    Unique { id: u64, description: Rc<str> },
}

impl Symbol {
    /// Create a new unique symbol.
    ///
    /// Two symbols created with the same description are still distinct.
    pub fn new(description: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self::Unique {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: Rc::from(description),
        }
    }

    pub fn iterator() -> Self {
        Self::WellKnown(WellKnownSymbol::Iterator)
    }

    pub fn is_well_known(&self) -> bool {
        matches!(self, Self::WellKnown(_))
    }

    pub fn description(&self) -> &str {
        match self {
            Self::WellKnown(symbol) => symbol.name(),
            Self::Unique { description, .. } => description,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description())
    }
}

/// A property key on an object or array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A canonical non-negative integer key (`"0"`, `"42"`).
    Index(usize),
    /// Any other string key.
    Name(Rc<str>),
    Symbol(Symbol),
}

impl Key {
    /// The `length` key of arrays.
    pub fn length() -> Self {
        Self::Name(Rc::from("length"))
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_length(&self) -> bool {
        self.as_name() == Some("length")
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }
}

/// Largest integer key that names an array element (`2^32 - 2`).
pub const MAX_ARRAY_INDEX: usize = 4_294_967_294;

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        if is_integer_key(key) {
            if let Some(index) = key.parse::<usize>().ok().filter(|i| *i <= MAX_ARRAY_INDEX) {
                return Self::Index(index);
            }
        }
        Self::Name(Rc::from(key))
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self::from(key.as_str())
    }
}

impl From<&String> for Key {
    fn from(key: &String) -> Self {
        Self::from(key.as_str())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        if index <= MAX_ARRAY_INDEX {
            Self::Index(index)
        } else {
            Self::Name(Rc::from(index.to_string()))
        }
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}
