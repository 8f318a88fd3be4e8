//! Array instrumentation.
//!
//! Identity searches (`includes`, `index_of`, `last_index_of`) depend on
//! every element, and retry with the raw form of the needle so that a
//! reactive wrapper finds its raw original and vice versa.
//!
//! Length-changing mutators run with tracking paused. They read `length`
//! internally; tracking those reads would subscribe the running effect to
//! the array it is mutating, and two effects pushing onto the same array
//! would then trigger each other forever.

use super::{to_raw, Proxy};
use crate::reactive::{pause_tracking, track, DepKey, TrackOp};
use crate::value::{Key, Value};

#[derive(Clone, Copy)]
enum Search {
    Includes,
    IndexOf,
    LastIndexOf,
}

fn find(items: &[Value], method: Search, needle: &Value) -> Option<usize> {
    match method {
        Search::Includes => items
            .iter()
            .position(|item| Value::same_value_zero(item, needle)),
        Search::IndexOf => items
            .iter()
            .position(|item| Value::strict_equals(item, needle)),
        Search::LastIndexOf => items
            .iter()
            .rposition(|item| Value::strict_equals(item, needle)),
    }
}

impl Proxy {
    /// The array `length` (tracked), or the size of a collection.
    pub fn len(&self) -> usize {
        if self.kind().is_collection() {
            return self.size();
        }
        self.get(Key::length())
            .as_f64()
            .map(|len| len as usize)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search(&self, method: Search, needle: &Value) -> Option<usize> {
        if !self.raw().is_array() {
            return None;
        }
        if let Value::Proxy(inner) = self.target() {
            return inner.search(method, needle);
        }

        if !self.is_readonly() {
            let len = self.len();
            for index in 0..len {
                track(self.raw(), TrackOp::Get, DepKey::Prop(Key::Index(index)));
            }
        }

        let items = self.raw().values();
        find(&items, method, needle).or_else(|| {
            let raw_needle = to_raw(needle);
            find(&items, method, &raw_needle)
        })
    }

    /// Whether the array contains `needle` (SameValueZero).
    pub fn includes(&self, needle: impl Into<Value>) -> bool {
        self.search(Search::Includes, &needle.into()).is_some()
    }

    /// First index strictly equal to `needle`.
    pub fn index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        self.search(Search::IndexOf, &needle.into())
    }

    /// Last index strictly equal to `needle`.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        self.search(Search::LastIndexOf, &needle.into())
    }

    /// Move `from` to `to`, or delete `to` when `from` is absent.
    fn move_element(&self, from: usize, to: usize) {
        if self.has(from) {
            self.set(to, self.get(from));
        } else {
            self.delete(to);
        }
    }

    /// Append `items`; returns the new length.
    pub fn push<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let _paused = pause_tracking();
        let mut len = self.len();
        for item in items {
            self.set(len, item);
            len += 1;
        }
        self.set(Key::length(), len);
        len
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        let _paused = pause_tracking();
        let len = self.len();
        if len == 0 {
            self.set(Key::length(), 0);
            return Value::Undefined;
        }
        let last = len - 1;
        let value = self.get(last);
        self.delete(last);
        self.set(Key::length(), last);
        value
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        let _paused = pause_tracking();
        let len = self.len();
        if len == 0 {
            self.set(Key::length(), 0);
            return Value::Undefined;
        }
        let first = self.get(0usize);
        for index in 1..len {
            self.move_element(index, index - 1);
        }
        self.delete(len - 1);
        self.set(Key::length(), len - 1);
        first
    }

    /// Prepend `items`; returns the new length.
    pub fn unshift<I, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _paused = pause_tracking();
        let len = self.len();
        let count = items.len();
        if count > 0 {
            for index in (0..len).rev() {
                self.move_element(index, index + count);
            }
            for (offset, item) in items.into_iter().enumerate() {
                self.set(offset, item);
            }
        }
        self.set(Key::length(), len + count);
        len + count
    }

    /// Remove `delete_count` elements at `start` (all remaining when
    /// `None`) and insert `items` in their place. A negative `start` counts
    /// from the end. Returns the removed elements.
    pub fn splice<I, V>(&self, start: isize, delete_count: Option<usize>, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        let _paused = pause_tracking();
        let len = self.len();

        let start = if start < 0 {
            len.saturating_sub(start.unsigned_abs())
        } else {
            (start as usize).min(len)
        };
        let delete_count = delete_count.unwrap_or(len - start).min(len - start);
        let item_count = items.len();

        let removed: Vec<Value> = (0..delete_count).map(|k| self.get(start + k)).collect();

        if item_count < delete_count {
            for index in start..(len - delete_count) {
                self.move_element(index + delete_count, index + item_count);
            }
            for index in ((len - delete_count + item_count)..len).rev() {
                self.delete(index);
            }
        } else if item_count > delete_count {
            for index in (start..(len - delete_count)).rev() {
                self.move_element(index + delete_count, index + item_count);
            }
        }

        for (offset, item) in items.into_iter().enumerate() {
            self.set(start + offset, item);
        }
        self.set(Key::length(), len - delete_count + item_count);
        removed
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::{reactive, readonly};
    use super::*;
    use crate::reactive::{effect, Runtime};
    use crate::value::Target;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn array(items: serde_json::Value) -> (Target, Proxy) {
        let raw = Value::from(items);
        let proxy = reactive(raw.clone()).as_proxy().cloned().unwrap();
        (raw.as_target().cloned().unwrap(), proxy)
    }

    fn numbers(raw: &Target) -> Vec<f64> {
        raw.values().iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn length_truncation_notifies_dropped_indices() {
        let (_raw, list) = array(json!([1, 2, 3, 4, 5]));
        let runs = Rc::new(Cell::new(0));

        let l = list.clone();
        let r = runs.clone();
        let _runner = effect(move || {
            r.set(r.get() + 1);
            l.get(4usize);
        });

        list.set(Key::length(), 3);
        assert_eq!(runs.get(), 2);

        list.set(Key::length(), 7);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn adding_an_index_notifies_length() {
        let (_raw, list) = array(json!([1]));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let l = list.clone();
        let sink = seen.clone();
        let _runner = effect(move || sink.borrow_mut().push(l.len()));

        list.set(3usize, 9);
        assert_eq!(*seen.borrow(), vec![1, 4]);
    }

    #[test]
    fn out_of_range_writes_are_rejected_quietly() {
        let (raw, list) = array(json!([1]));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let l = list.clone();
        let sink = seen.clone();
        let _runner = effect(move || sink.borrow_mut().push(l.len()));

        assert!(!list.set("18446744073709551615", 2));
        assert!(!list.set(4_294_967_294usize, 2));
        assert!(!list.set(Key::length(), 4_294_967_295u32));
        assert_eq!(numbers(&raw), vec![1.0]);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn search_finds_raw_and_wrapped_elements() {
        let item = Target::object();
        let raw = Target::array([Value::from(&item)]);
        let list = reactive(&raw).as_proxy().cloned().unwrap();

        let wrapped = reactive(&item);
        assert!(list.includes(&item));
        assert!(list.includes(wrapped.clone()));
        assert_eq!(list.index_of(wrapped), Some(0));
        assert_eq!(list.last_index_of(Target::object()), None);
    }

    #[test]
    fn includes_uses_same_value_zero() {
        let (_raw, list) = array(json!([1]));
        list.push([f64::NAN]);
        assert!(list.includes(f64::NAN));
        assert_eq!(list.index_of(f64::NAN), None);
    }

    #[test]
    fn search_tracks_every_index() {
        let (raw, list) = array(json!([1, 2, 3]));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let l = list.clone();
        let sink = seen.clone();
        let _runner = effect(move || sink.borrow_mut().push(l.includes(9)));
        assert_eq!(
            Runtime::subscriber_count(&raw, &DepKey::Prop(Key::Index(2))),
            1
        );

        list.set(2usize, 9);
        assert_eq!(*seen.borrow(), vec![false, true]);
    }

    #[test]
    fn readonly_view_searches_without_tracking() {
        let (raw, _list) = array(json!([1, 2]));
        let view = readonly(&raw).as_proxy().cloned().unwrap();

        let v = view.clone();
        let _runner = effect(move || v.includes(2));
        assert!(view.includes(2));
        assert!(!Runtime::is_tracked(&raw));
    }

    #[test]
    fn push_pop_shift_unshift() {
        let (raw, list) = array(json!([1, 2, 3]));

        assert_eq!(list.push([4, 5]), 5);
        assert_eq!(numbers(&raw), vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(list.pop(), Value::from(5));
        assert_eq!(list.shift(), Value::from(1));
        assert_eq!(numbers(&raw), vec![2.0, 3.0, 4.0]);

        assert_eq!(list.unshift([0, 1]), 5);
        assert_eq!(numbers(&raw), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn pop_on_empty_array() {
        let (_raw, list) = array(json!([]));
        assert_eq!(list.pop(), Value::Undefined);
        assert_eq!(list.shift(), Value::Undefined);
        assert!(list.is_empty());
    }

    #[test]
    fn splice_removes_and_inserts() {
        let (raw, list) = array(json!([1, 2, 3, 4, 5]));

        let removed = list.splice(1, Some(2), [9]);
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(numbers(&raw), vec![1.0, 9.0, 4.0, 5.0]);

        let removed = list.splice(-1, None, [7, 8]);
        assert_eq!(removed, vec![Value::from(5)]);
        assert_eq!(numbers(&raw), vec![1.0, 9.0, 4.0, 7.0, 8.0]);

        let removed = list.splice(1, Some(0), [6, 6]);
        assert!(removed.is_empty());
        assert_eq!(numbers(&raw), vec![1.0, 6.0, 6.0, 9.0, 4.0, 7.0, 8.0]);
    }

    #[test]
    fn push_inside_two_effects_does_not_recurse() {
        let (raw, list) = array(json!([]));

        let a = list.clone();
        let _first = effect(move || {
            a.push([1]);
        });
        let b = list.clone();
        let _second = effect(move || {
            b.push([2]);
        });

        assert_eq!(numbers(&raw), vec![1.0, 2.0]);
        assert_eq!(Runtime::subscriber_count(&raw, &DepKey::length()), 0);
    }

    #[test]
    fn mutator_notifies_length_observers() {
        let (_raw, list) = array(json!([1]));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let l = list.clone();
        let sink = seen.clone();
        let _runner = effect(move || sink.borrow_mut().push(l.len()));

        list.push([2]);
        list.pop();
        assert_eq!(*seen.borrow(), vec![1, 2, 1]);
    }
}
