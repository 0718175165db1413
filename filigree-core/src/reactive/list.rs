//! Signal List
//!
//! A keyed collection where the key sequence and every row live in separate
//! signals. Structural changes (insert, remove, reorder) write only the key
//! signal; row edits write only that row's signal. Rendered through
//! [`SignalList::view`], a row edit patches the row's own nodes and never
//! touches the region.
//!
//! # Example
//!
//! ```rust
//! use filigree_core::reactive::create_signal_list;
//!
//! let todos = create_signal_list(vec![(1, "write"), (2, "test")], |row| row.0);
//! assert_eq!(todos.ids(), vec![1, 2]);
//!
//! todos.update(&2, (2, "ship")).unwrap();
//! assert_eq!(todos.get(&2).unwrap().get(), (2, "ship"));
//!
//! todos.reorder(vec![2, 1]).unwrap();
//! assert_eq!(todos.ids(), vec![2, 1]);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::rc::Rc;

use super::runtime::batch;
use super::signal::{ReadSignal, Signal};
use crate::dom::{for_each, text, DomNode, NodeKey};
use crate::error::ListError;

/// A keyed list with one signal per row.
pub struct SignalList<T, K> {
    keys: Signal<Vec<K>>,
    rows: Rc<RefCell<HashMap<K, Signal<T>>>>,
    key_fn: Rc<dyn Fn(&T) -> K>,
}

/// Create a [`SignalList`] from `initial`, keyed by `key_fn`.
///
/// Duplicate keys keep their first position and their last value.
pub fn create_signal_list<T, K>(
    initial: impl IntoIterator<Item = T>,
    key_fn: impl Fn(&T) -> K + 'static,
) -> SignalList<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + Debug + 'static,
{
    SignalList::new(initial, key_fn)
}

impl<T, K> SignalList<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + Debug + 'static,
{
    pub fn new(initial: impl IntoIterator<Item = T>, key_fn: impl Fn(&T) -> K + 'static) -> Self {
        let key_fn: Rc<dyn Fn(&T) -> K> = Rc::new(key_fn);
        let (order, values) = collect_rows(initial, key_fn.as_ref());
        let rows = values
            .into_iter()
            .map(|(key, value)| (key, Signal::new(value)))
            .collect();

        Self {
            keys: Signal::new(order),
            rows: Rc::new(RefCell::new(rows)),
            key_fn,
        }
    }

    /// The key sequence. Tracks the keys only, not row contents.
    pub fn ids(&self) -> Vec<K> {
        self.keys.get()
    }

    /// The signal backing one row.
    pub fn get(&self, id: &K) -> Option<ReadSignal<T>> {
        self.rows.borrow().get(id).cloned().map(ReadSignal::from)
    }

    pub fn len(&self) -> usize {
        self.keys.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &K) -> bool {
        self.keys.with(|keys| keys.contains(id))
    }

    /// Every row value in key order. Tracks the keys and every row.
    pub fn snapshot(&self) -> Vec<T> {
        let keys = self.keys.get();
        let rows: Vec<Signal<T>> = {
            let map = self.rows.borrow();
            keys.iter().filter_map(|key| map.get(key).cloned()).collect()
        };
        rows.iter().map(Signal::get).collect()
    }

    /// Replace the whole list.
    ///
    /// Rows whose key survives keep their signal and are written only if
    /// their value changed; rows whose key disappears are dropped. Everything
    /// propagates as one batch.
    pub fn set(&self, rows: impl IntoIterator<Item = T>) {
        let (order, mut values) = collect_rows(rows, self.key_fn.as_ref());

        let changed: Vec<(Signal<T>, T)> = {
            let mut map = self.rows.borrow_mut();
            map.retain(|key, _| values.contains_key(key));
            let mut changed = Vec::new();
            for key in &order {
                let Some(value) = values.remove(key) else {
                    continue;
                };
                match map.get(key) {
                    Some(signal) => changed.push((signal.clone(), value)),
                    None => {
                        map.insert(key.clone(), Signal::new(value));
                    }
                }
            }
            changed
        };

        batch(|| {
            for (signal, value) in changed {
                signal.set(value);
            }
            self.keys.set(order);
        });
    }

    /// Write one row. The key sequence is untouched.
    pub fn update(&self, id: &K, value: T) -> Result<(), ListError> {
        let found = (self.key_fn)(&value);
        if found != *id {
            return Err(ListError::KeyMismatch {
                expected: format!("{id:?}"),
                found: format!("{found:?}"),
            });
        }

        let signal = self
            .rows
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| ListError::UnknownKey(format!("{id:?}")))?;
        signal.set(value);
        Ok(())
    }

    /// Reorder the rows. `ids` must be a permutation of the current keys.
    pub fn reorder(&self, ids: Vec<K>) -> Result<(), ListError> {
        let expected = self.keys.with_untracked(Vec::len);
        let not_a_permutation = |reason: String| ListError::NotAPermutation { expected, reason };

        if ids.len() != expected {
            return Err(not_a_permutation(format!("got {} keys", ids.len())));
        }
        {
            let rows = self.rows.borrow();
            let mut seen = HashSet::with_capacity(ids.len());
            for id in &ids {
                if !rows.contains_key(id) {
                    return Err(not_a_permutation(format!("unknown key {id:?}")));
                }
                if !seen.insert(id) {
                    return Err(not_a_permutation(format!("key {id:?} repeated")));
                }
            }
        }

        self.keys.set(ids);
        Ok(())
    }

    /// Append a row. Fails if its key is already present.
    pub fn push(&self, row: T) -> Result<(), ListError> {
        let key = (self.key_fn)(&row);
        {
            let mut rows = self.rows.borrow_mut();
            if rows.contains_key(&key) {
                return Err(ListError::DuplicateKey(format!("{key:?}")));
            }
            rows.insert(key.clone(), Signal::new(row));
        }
        self.keys.modify(|keys| keys.push(key));
        Ok(())
    }

    /// Remove a row, returning its last value.
    pub fn remove(&self, id: &K) -> Option<T> {
        let signal = self.rows.borrow_mut().remove(id)?;
        self.keys
            .update(|keys| keys.iter().filter(|key| *key != id).cloned().collect());
        Some(signal.get_untracked())
    }

    pub fn clear(&self) {
        self.rows.borrow_mut().clear();
        self.keys.set(Vec::new());
    }
}

impl<T, K> SignalList<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + Debug + Into<NodeKey> + 'static,
{
    /// Render the list as a keyed region.
    ///
    /// `row_fn` runs once per key, when the key first appears. The region
    /// tracks the key sequence only; the row reads its own signal.
    pub fn view<F>(&self, row_fn: F) -> DomNode
    where
        F: Fn(K, ReadSignal<T>) -> DomNode + 'static,
    {
        let keys = self.keys.clone();
        let rows = Rc::clone(&self.rows);
        for_each(
            move || keys.get(),
            move |key: K| {
                let signal = rows.borrow().get(&key).cloned();
                match signal {
                    Some(signal) => row_fn(key, signal.into()),
                    None => {
                        tracing::warn!(?key, "list row has no backing signal");
                        text("")
                    }
                }
            },
        )
    }
}

impl<T, K> Clone for SignalList<T, K> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            rows: Rc::clone(&self.rows),
            key_fn: Rc::clone(&self.key_fn),
        }
    }
}

impl<T, K: Debug + 'static> Debug for SignalList<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalList")
            .field("keys", &self.keys)
            .field("rows", &self.rows.borrow().len())
            .finish()
    }
}

/// Split rows into a duplicate-free key order and the value for each key.
fn collect_rows<T, K>(
    rows: impl IntoIterator<Item = T>,
    key_fn: &dyn Fn(&T) -> K,
) -> (Vec<K>, HashMap<K, T>)
where
    K: Clone + Eq + Hash + Debug,
{
    let mut order = Vec::new();
    let mut values = HashMap::new();
    for row in rows {
        let key = key_fn(&row);
        if values.insert(key.clone(), row).is_some() {
            tracing::warn!(
                ?key,
                "duplicate key in list; keeping its first position and last value"
            );
        } else {
            order.push(key);
        }
    }
    (order, values)
}
