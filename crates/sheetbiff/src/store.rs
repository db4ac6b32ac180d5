//! Indexed record storage owned by a container.
//!
//! The store is the only strong owner of its records. Everything else
//! (collections, protection managers, callers) refers to records by
//! [`RecordHandle`], and records point back at their container with a plain
//! [`ContainerId`], so there are no ownership cycles to break on close.

use std::collections::HashMap;

use crate::error::{BiffError, BiffResult};
use crate::record::Record;

/// Back-reference from a record or manager to its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContainerId {
    /// The workbook globals substream
    Book,
    /// A worksheet substream, by BOUNDSHEET position
    Sheet(u16),
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerId::Book => write!(f, "book"),
            ContainerId::Sheet(i) => write!(f, "sheet {i}"),
        }
    }
}

/// Stable index of a record inside its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle(usize);

impl RecordHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Growable slot arena plus the active record order.
///
/// Slots are never reused, so a handle stays valid for the store's lifetime.
/// Records taken out of the active order keep their slot in the Removed state.
#[derive(Debug, Default)]
pub struct RecordStore {
    slots: Vec<Record>,
    order: Vec<RecordHandle>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the active sequence.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Append a record to the active sequence. Attaching is the container's job.
    pub(crate) fn push(&mut self, record: Record) -> RecordHandle {
        let handle = RecordHandle(self.slots.len());
        self.slots.push(record);
        self.order.push(handle);
        handle
    }

    pub fn get(&self, handle: RecordHandle) -> Option<&Record> {
        self.slots.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: RecordHandle) -> Option<&mut Record> {
        self.slots.get_mut(handle.0)
    }

    /// Active records in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordHandle, &Record)> + '_ {
        self.order.iter().map(move |&h| (h, &self.slots[h.0]))
    }

    /// Handles of the active sequence, in order.
    pub fn handles(&self) -> &[RecordHandle] {
        &self.order
    }

    /// Position of `handle` in the active sequence.
    pub fn position(&self, handle: RecordHandle) -> Option<usize> {
        self.order.iter().position(|&h| h == handle)
    }

    /// Replace several records of the active sequence at once, each by its
    /// own run of records, in a single pass over the order.
    ///
    /// Every handle must be active; otherwise nothing changes and the call
    /// fails with `DetachedRecord`. Replaced records stay in their slots,
    /// detached. New records are not attached yet. Returns the new handles
    /// for each replaced handle, in sequence order.
    pub(crate) fn replace_many(
        &mut self,
        mut replacements: HashMap<RecordHandle, Vec<Record>>,
    ) -> BiffResult<HashMap<RecordHandle, Vec<RecordHandle>>> {
        // Active records are exactly the slots not yet Removed
        if let Some(&stale) = replacements
            .keys()
            .find(|&&h| self.get(h).map_or(true, Record::is_removed))
        {
            let record_type = self.get(stale).map_or(0, Record::type_code);
            return Err(BiffError::DetachedRecord { record_type });
        }
        if replacements.is_empty() {
            return Ok(HashMap::new());
        }

        let added: usize = replacements.values().map(Vec::len).sum();
        let mut order = Vec::with_capacity(self.order.len() + added);
        let mut placed = HashMap::with_capacity(replacements.len());
        for &handle in &self.order {
            let Some(records) = replacements.remove(&handle) else {
                order.push(handle);
                continue;
            };
            let start = self.slots.len();
            self.slots.extend(records);
            let handles: Vec<RecordHandle> = (start..self.slots.len()).map(RecordHandle).collect();
            order.extend_from_slice(&handles);
            self.slots[handle.0].detach();
            placed.insert(handle, handles);
        }
        self.order = order;
        Ok(placed)
    }

    /// Detach every record and empty the active sequence.
    pub(crate) fn detach_all(&mut self) {
        for record in &mut self.slots {
            record.detach();
        }
        self.order.clear();
    }
}
