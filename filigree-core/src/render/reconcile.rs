//! Region reconciliation.
//!
//! A region is a run of rows mounted before an anchor comment. Keyed regions
//! keep their rows in a [`RowCache`]; on every update the reconciler
//!
//! 1. drops duplicate keys (the first occurrence wins),
//! 2. prunes rows whose key is gone or that must be rebuilt, and detaches
//!    their nodes,
//! 3. adopts rows whose key is cached and builds rows for new keys,
//! 4. walks the new order backwards from the anchor, inserting new rows and
//!    moving adopted rows that are not on the longest increasing
//!    subsequence of their old positions.
//!
//! Step 4 performs the minimal number of moves for a permutation. Unkeyed
//! regions, and every region when keyed reconciliation is disabled, replace
//! all of their rows instead.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::arena::MountId;
use super::RendererInner;
use crate::dom::{DomNode, NodeKey, NodeRef};
use crate::error::panic_message;
use crate::reactive::Scope;

/// A mounted row and the scope owning its effects.
pub(crate) struct RowEntry {
    pub(crate) scope: Scope,
    pub(crate) mount: MountId,
}

/// Rows of a keyed region, by key, plus their current order.
pub(crate) struct RowCache<K> {
    order: Vec<K>,
    rows: HashMap<K, RowEntry>,
}

impl<K> Default for RowCache<K> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            rows: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> RowCache<K> {
    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    pub(crate) fn get(&self, key: &K) -> Option<&RowEntry> {
        self.rows.get(key)
    }

    pub(crate) fn insert(&mut self, key: K, entry: RowEntry) {
        self.rows.insert(key, entry);
    }

    /// Remove every row whose key is not in `keep`, in their current order.
    pub(crate) fn prune(&mut self, keep: &HashSet<&K>) -> Vec<(K, RowEntry)> {
        let mut removed = Vec::new();
        let rows = &mut self.rows;
        self.order.retain(|key| {
            if keep.contains(key) {
                return true;
            }
            if let Some(entry) = rows.remove(key) {
                removed.push((key.clone(), entry));
            }
            false
        });
        removed
    }

    /// Position of each key in the current order.
    pub(crate) fn positions(&self) -> HashMap<&K, usize> {
        self.order
            .iter()
            .enumerate()
            .map(|(index, key)| (key, index))
            .collect()
    }

    pub(crate) fn set_order(&mut self, order: Vec<K>) {
        self.order = order;
    }

    /// Row mounts in document order.
    pub(crate) fn mounts(&self) -> impl Iterator<Item = MountId> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.rows.get(key))
            .map(|entry| entry.mount)
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = RowEntry> {
        self.rows.into_values()
    }
}

/// The rows currently mounted in a region.
pub(crate) enum RegionRows {
    Keyed(RowCache<NodeKey>),
    Unkeyed(Vec<RowEntry>),
}

impl Default for RegionRows {
    fn default() -> Self {
        Self::Unkeyed(Vec::new())
    }
}

impl RegionRows {
    pub(crate) fn mounts(&self) -> Vec<MountId> {
        match self {
            Self::Keyed(cache) => cache.mounts().collect(),
            Self::Unkeyed(entries) => entries.iter().map(|entry| entry.mount).collect(),
        }
    }

    pub(crate) fn into_entries(self) -> Vec<RowEntry> {
        match self {
            Self::Keyed(cache) => cache.into_entries().collect(),
            Self::Unkeyed(entries) => entries,
        }
    }
}

/// Drop repeated keys, keeping the first occurrence of each.
pub(crate) fn dedupe_keys<K: Clone + Eq + Hash + Debug>(keys: Vec<K>) -> Vec<K> {
    let mut seen = HashSet::with_capacity(keys.len());
    let mut unique = Vec::with_capacity(keys.len());
    for key in keys {
        if seen.contains(&key) {
            tracing::warn!(?key, "duplicate key in keyed region; keeping the first occurrence");
            continue;
        }
        seen.insert(key.clone());
        unique.push(key);
    }
    unique
}

/// Mark the rows that can stay where they are.
///
/// `previous[i]` is the old position of the row now at `i`, or `None` for a
/// new row. The rows on a longest strictly increasing run of old positions
/// keep their relative order already; every other adopted row must move.
pub(crate) fn stable_rows(previous: &[Option<usize>]) -> Vec<bool> {
    // (old position, index) of the smallest tail of each run length.
    let mut tails: Vec<(usize, usize)> = Vec::new();
    let mut links: Vec<Option<usize>> = vec![None; previous.len()];

    for (index, position) in previous.iter().enumerate() {
        let Some(position) = *position else {
            continue;
        };
        let length = tails.partition_point(|&(tail, _)| tail < position);
        if length > 0 {
            links[index] = Some(tails[length - 1].1);
        }
        if length == tails.len() {
            tails.push((position, index));
        } else {
            tails[length] = (position, index);
        }
    }

    let mut stays = vec![false; previous.len()];
    let mut cursor = tails.last().map(|&(_, index)| index);
    while let Some(index) = cursor {
        stays[index] = true;
        cursor = links[index];
    }
    stays
}

impl RendererInner {
    /// Reconcile a keyed region against a new key sequence.
    ///
    /// `produce` builds the descriptor of a row whose key is not cached.
    /// Cached rows whose key is in `stale` are discarded and built again.
    pub(crate) fn reconcile_keyed(
        self: &Rc<Self>,
        anchor: NodeRef,
        rows: &std::cell::RefCell<RegionRows>,
        next: Vec<NodeKey>,
        stale: &HashSet<NodeKey>,
        produce: &mut dyn FnMut(&NodeKey) -> Option<DomNode>,
    ) {
        let Some(parent) = self.dom.parent(anchor) else {
            tracing::error!(%anchor, "region anchor is detached; skipping reconciliation");
            return;
        };

        let mut removed = 0u64;
        let mut cache = match std::mem::take(&mut *rows.borrow_mut()) {
            RegionRows::Keyed(cache) => cache,
            RegionRows::Unkeyed(entries) => {
                for entry in entries {
                    self.discard_row(entry);
                    removed += 1;
                }
                RowCache::default()
            }
        };

        let next = dedupe_keys(next);

        let keep: HashSet<&NodeKey> = next.iter().filter(|key| !stale.contains(*key)).collect();
        for (_, entry) in cache.prune(&keep) {
            self.discard_row(entry);
            removed += 1;
        }

        let mut built = HashMap::new();
        let mut order = Vec::with_capacity(next.len());
        let (mut hits, mut misses) = (0u64, 0u64);
        for key in next {
            if cache.contains(&key) {
                hits += 1;
                order.push(key);
                continue;
            }
            misses += 1;
            if let Some(row) = self.build_row(|| produce(&key)) {
                built.insert(key.clone(), row);
                order.push(key);
            }
        }

        let stays = {
            let positions = cache.positions();
            let previous: Vec<Option<usize>> =
                order.iter().map(|key| positions.get(key).copied()).collect();
            stable_rows(&previous)
        };

        let mut reference = anchor;
        let (mut inserted, mut moved) = (0u64, 0u64);
        for (index, key) in order.iter().enumerate().rev() {
            if let Some((scope, node)) = built.remove(key) {
                let mount = scope.run(|| self.mount(node, parent, Some(reference)));
                cache.insert(key.clone(), RowEntry { scope, mount });
                inserted += 1;
            } else if !stays[index] {
                if let Some(entry) = cache.get(key) {
                    for node in self.host_nodes(entry.mount) {
                        self.insert_node(parent, node, Some(reference));
                    }
                    moved += 1;
                }
            }

            if let Some(first) = cache
                .get(key)
                .and_then(|entry| self.host_nodes(entry.mount).first().copied())
            {
                reference = first;
            }
        }

        cache.set_order(order);
        let total = cache.len();
        *rows.borrow_mut() = RegionRows::Keyed(cache);

        self.metrics.record(|m| {
            m.created += inserted;
            m.inserted += inserted;
            m.removed += removed;
            m.moved += moved;
            m.adopted += hits;
            m.cache_hits += hits;
            m.cache_misses += misses;
        });
        tracing::trace!(
            rows = total,
            created = inserted,
            removed,
            moved,
            adopted = hits,
            "keyed region reconciled"
        );
    }

    /// Replace every row of a region. `produce` is called for `0..count`.
    pub(crate) fn replace_rows(
        self: &Rc<Self>,
        anchor: NodeRef,
        rows: &std::cell::RefCell<RegionRows>,
        count: usize,
        produce: &mut dyn FnMut(usize) -> Option<DomNode>,
    ) {
        let Some(parent) = self.dom.parent(anchor) else {
            tracing::error!(%anchor, "region anchor is detached; skipping update");
            return;
        };

        let previous = std::mem::take(&mut *rows.borrow_mut()).into_entries();
        let removed = previous.len() as u64;
        for entry in previous {
            self.discard_row(entry);
        }

        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            if let Some((scope, node)) = self.build_row(|| produce(index)) {
                let mount = scope.run(|| self.mount(node, parent, Some(anchor)));
                entries.push(RowEntry { scope, mount });
            }
        }

        let created = entries.len() as u64;
        *rows.borrow_mut() = RegionRows::Unkeyed(entries);

        self.metrics.record(|m| {
            m.created += created;
            m.inserted += created;
            m.removed += removed;
        });
        tracing::trace!(created, removed, "region replaced");
    }

    /// Produce a row descriptor in a fresh detached scope, untracked.
    ///
    /// A row that panics is logged and skipped.
    fn build_row(
        &self,
        produce: impl FnOnce() -> Option<DomNode>,
    ) -> Option<(Scope, DomNode)> {
        let scope = Scope::detached();
        match scope.run(|| panic::catch_unwind(AssertUnwindSafe(produce))) {
            Ok(Some(node)) => Some((scope, node)),
            Ok(None) => {
                scope.dispose();
                None
            }
            Err(payload) => {
                tracing::error!(
                    error = %panic_message(payload.as_ref()),
                    "row failed to build; skipping it"
                );
                scope.dispose();
                None
            }
        }
    }

    /// Unmount a row: drop its records, dispose its scope, detach and
    /// release its host nodes.
    pub(crate) fn discard_row(&self, entry: RowEntry) {
        let nodes = self.host_nodes(entry.mount);
        self.free_mount(entry.mount);
        entry.scope.dispose();
        for node in nodes {
            self.detach_node(node);
        }
    }
}
