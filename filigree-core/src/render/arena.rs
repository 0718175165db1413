//! Mount arena.
//!
//! Mounted state is kept apart from descriptors: every mounted node gets a
//! [`MountRecord`] indexed by a [`MountId`], and records refer to host nodes
//! only through [`NodeRef`]s. Unmounting removes records; there are no
//! pointer cycles to break.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use smallvec::SmallVec;

use super::component::ComponentId;
use super::reconcile::RegionRows;
use crate::dom::NodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct MountId(pub(crate) u64);

pub(crate) enum MountRecord {
    Element {
        node: NodeRef,
        children: SmallVec<[MountId; 4]>,
    },
    Text {
        node: NodeRef,
    },
    /// Rows are mounted before the anchor comment, in order.
    Region {
        anchor: NodeRef,
        rows: Rc<RefCell<RegionRows>>,
    },
    Component {
        id: ComponentId,
        child: MountId,
    },
    /// Stands in for a component that failed to render.
    Placeholder {
        node: NodeRef,
    },
}

#[derive(Default)]
pub(crate) struct MountArena {
    next: u64,
    records: HashMap<MountId, MountRecord>,
}

impl MountArena {
    pub(crate) fn insert(&mut self, record: MountRecord) -> MountId {
        self.next += 1;
        let id = MountId(self.next);
        self.records.insert(id, record);
        id
    }

    pub(crate) fn get(&self, id: MountId) -> Option<&MountRecord> {
        self.records.get(&id)
    }

    pub(crate) fn remove(&mut self, id: MountId) -> Option<MountRecord> {
        self.records.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
