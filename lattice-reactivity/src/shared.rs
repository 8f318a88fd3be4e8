//! Shared predicates used across the reactive core.

use std::collections::HashSet;

use crate::value::{Target, Value};

/// Whether `value` differs from `old` under `Object.is` semantics.
///
/// `NaN` is unchanged from `NaN`, while `+0` and `-0` count as a change.
pub fn has_changed(value: &Value, old: &Value) -> bool {
    !Value::same_value(value, old)
}

/// Whether `key` is the canonical string form of a non-negative integer.
///
/// `"0"` and `"12"` qualify; `"01"`, `"-1"`, `"1.5"` and `"NaN"` do not.
pub fn is_integer_key(key: &str) -> bool {
    match key.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        bytes => {
            bytes.iter().all(u8::is_ascii_digit) && key.parse::<usize>().is_ok()
        }
    }
}

/// A membership set built from a comma separated list.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    entries: HashSet<Box<str>>,
}

impl KeyMap {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build a [`KeyMap`] from `"a,b,c"`.
pub fn make_map(list: &str) -> KeyMap {
    KeyMap {
        entries: list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Box::from)
            .collect(),
    }
}

/// Copy every own property of `source` onto `target`, overwriting existing
/// keys. Returns `target`.
///
/// Writes go to the raw target and trigger nothing.
pub fn extend<'a>(target: &'a Target, source: &Target) -> &'a Target {
    for key in source.own_keys() {
        if key.is_length() && source.is_array() {
            continue;
        }
        let value = source.get(&key);
        target.set(key, value);
    }
    target
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_changed_follows_object_is() {
        assert!(!has_changed(&Value::from(1), &Value::from(1)));
        assert!(has_changed(&Value::from(1), &Value::from(2)));
        assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(has_changed(&Value::from(0.0), &Value::from(-0.0)));
        assert!(has_changed(&Value::from(1), &Value::from("1")));
    }

    #[test]
    fn integer_keys() {
        assert!(is_integer_key("0"));
        assert!(is_integer_key("123"));
        assert!(!is_integer_key(""));
        assert!(!is_integer_key("007"));
        assert!(!is_integer_key("-3"));
        assert!(!is_integer_key("2.0"));
        assert!(!is_integer_key("length"));
        assert!(!is_integer_key("99999999999999999999999999"));
    }

    #[test]
    fn make_map_membership() {
        let map = make_map("__proto__,__v_isRef,__isVue");
        assert_eq!(map.len(), 3);
        assert!(map.contains("__proto__"));
        assert!(map.contains("__isVue"));
        assert!(!map.contains("value"));
    }

    #[test]
    fn extend_merges_shallowly() {
        let nested = Target::object();
        let target = Target::object_from([("a", Value::from(1)), ("b", Value::from(2))]);
        let source = Target::object_from([("b", Value::from(3)), ("c", Value::from(&nested))]);

        extend(&target, &source);
        assert_eq!(target.get(&"a".into()), Value::from(1));
        assert_eq!(target.get(&"b".into()), Value::from(3));
        assert_eq!(target.get(&"c".into()), Value::from(&nested));
    }
}
