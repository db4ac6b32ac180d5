//! Worksheet substream container

use std::collections::HashMap;

use crate::biff::{self, records, RawRecord};
use crate::container::ContainerCore;
use crate::error::{BiffError, BiffResult};
use crate::kind::Collection;
use crate::mul::{MulGroup, MulRecord};
use crate::observer::{AttachEvent, AttachObserver};
use crate::protection::{ProtectionAspect, ProtectionManager, ProtectionScope};
use crate::record::Record;
use crate::store::{ContainerId, RecordHandle, RecordStore};

/// One BOF..EOF substream after the workbook globals
#[derive(Debug)]
pub struct Sheet {
    core: ContainerCore,
    name: String,
    bof: Vec<u8>,
    retired: Vec<MulGroup>,
}

impl Sheet {
    /// Create an empty worksheet at BOUNDSHEET position `index`.
    pub fn new(index: u16, name: &str) -> Self {
        Self::with_bof(index, name, biff::bof_body(records::BOF_WORKSHEET))
    }

    pub(crate) fn with_bof(index: u16, name: &str, bof: Vec<u8>) -> Self {
        Self {
            core: ContainerCore::new(ContainerId::Sheet(index), ProtectionScope::Sheet),
            name: name.to_string(),
            bof,
            retired: Vec::new(),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.core.id
    }

    /// Position of the sheet's BOUNDSHEET entry in the globals.
    pub fn index(&self) -> u16 {
        match self.core.id {
            ContainerId::Sheet(index) => index,
            ContainerId::Book => 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// BOF substream type (`records::BOF_WORKSHEET`, `BOF_CHART`, ...).
    pub fn substream_type(&self) -> u16 {
        biff::parse_bof(&self.bof)
            .map(|(_, dt)| dt)
            .unwrap_or(records::BOF_WORKSHEET)
    }

    pub fn records(&self) -> &RecordStore {
        &self.core.records
    }

    pub fn record(&self, handle: RecordHandle) -> Option<&Record> {
        self.core.records.get(handle)
    }

    /// Mutable access to a record. Records of a closed sheet are detached and
    /// reject mutation themselves.
    pub fn record_mut(&mut self, handle: RecordHandle) -> Option<&mut Record> {
        self.core.records.get_mut(handle)
    }

    /// Attach `record` to the end of the sheet.
    pub fn insert(
        &mut self,
        record: Record,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<RecordHandle> {
        self.core.insert(record, observer)
    }

    /// Handles registered in `collection`, in attach order.
    pub fn collection(&self, collection: Collection) -> &[RecordHandle] {
        self.core.collection(collection)
    }

    /// Live records registered in `collection`, in attach order.
    pub fn collection_records(&self, collection: Collection) -> impl Iterator<Item = &Record> + '_ {
        self.core.collection_records(collection)
    }

    /// First live record of `type_code` in the print settings collection.
    pub fn print_setting(&self, type_code: u16) -> Option<&Record> {
        self.collection_records(Collection::PrintSettings)
            .find(|r| r.type_code() == type_code)
    }

    pub fn protection(&self) -> &ProtectionManager {
        &self.core.protection
    }

    pub fn is_protected(&self, aspect: ProtectionAspect) -> BiffResult<bool> {
        self.core.is_protected(aspect)
    }

    pub fn set_protected(&mut self, aspect: ProtectionAspect, value: bool) -> BiffResult<()> {
        self.core.set_protected(aspect, value)
    }

    pub fn set_password(&mut self, aspect: ProtectionAspect, password: &str) -> BiffResult<u16> {
        self.core.set_password(aspect, password)
    }

    /// Default handed down from the book for an aspect this sheet may not store.
    pub(crate) fn inherit(&mut self, aspect: ProtectionAspect, value: bool) -> BiffResult<()> {
        self.core.protection.inherit(aspect, value)
    }

    /// Decode every compressed run still in the active sequence.
    pub fn mul_groups(&self) -> BiffResult<Vec<(RecordHandle, MulGroup)>> {
        self.core
            .records
            .iter()
            .filter(|(_, r)| r.kind().is_mul())
            .map(|(h, r)| MulGroup::decode(r).map(|g| (h, g)))
            .collect()
    }

    /// Replace every MULRK / MULBLANK with its per-cell records.
    ///
    /// All runs are validated before the sequence is touched: one malformed
    /// run fails the call and leaves the sheet as it was. Returns the number
    /// of runs expanded.
    pub fn expand_mul_records(&mut self, observer: &mut dyn AttachObserver) -> BiffResult<usize> {
        self.core.ensure_open()?;
        let groups = self.mul_groups()?;
        self.apply_expansion(groups, observer)
    }

    /// Like [`Sheet::expand_mul_records`], but malformed runs are logged and
    /// left compressed instead of failing the call.
    pub fn expand_valid_mul_records(
        &mut self,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<usize> {
        self.core.ensure_open()?;
        let mut groups = Vec::new();
        for (handle, record) in self.core.records.iter() {
            if !record.kind().is_mul() {
                continue;
            }
            match MulGroup::decode(record) {
                Ok(group) => groups.push((handle, group)),
                Err(e @ BiffError::MalformedRecord { .. }) => {
                    log::warn!(
                        "{}: leaving record #{} compressed: {e}",
                        self.core.id,
                        handle.index()
                    );
                }
                Err(e) => return Err(e),
            }
        }
        self.apply_expansion(groups, observer)
    }

    fn apply_expansion(
        &mut self,
        groups: Vec<(RecordHandle, MulGroup)>,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<usize> {
        let mut replacements = HashMap::with_capacity(groups.len());
        let mut ready = Vec::with_capacity(groups.len());
        for (handle, mut group) in groups {
            let cells = match group.expanded_records() {
                Ok(cells) => cells.to_vec(),
                Err(e) => {
                    log::warn!("{}: {e}", self.core.id);
                    continue;
                }
            };
            replacements.insert(handle, cells);
            ready.push((handle, group));
        }

        let mut placed = self.core.records.replace_many(replacements)?;
        let expanded_runs = ready.len();
        for (handle, mut group) in ready {
            for new_handle in placed.remove(&handle).unwrap_or_default() {
                if let Some(record) = self.core.records.get_mut(new_handle) {
                    record.attach(self.core.id)?;
                }
            }
            group.mark_removed();
            observer.on_event(&AttachEvent::Expanded {
                container: self.core.id,
                record_type: group.record_type(),
                row: group.row(),
                start_index: group.start_index(),
                count: group.count(),
            });
            self.retired.push(group);
        }
        Ok(expanded_runs)
    }

    /// Compressed runs that have been replaced by their expansion.
    pub fn retired_groups(&self) -> &[MulGroup] {
        &self.retired
    }

    pub fn retired_groups_mut(&mut self) -> &mut [MulGroup] {
        &mut self.retired
    }

    /// The substream as framed records, BOF and EOF included.
    pub fn to_raw_records(&self) -> Vec<RawRecord> {
        let mut out = Vec::with_capacity(self.core.records.len() + 2);
        out.push(RawRecord::new(records::BOF, self.bof.clone()));
        out.extend(self.core.raw_records());
        out.push(RawRecord::new(records::EOF, Vec::new()));
        out
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed
    }

    /// Close the protection manager and detach every record. Idempotent.
    pub fn close(&mut self, observer: &mut dyn AttachObserver) {
        self.core.close(observer);
    }
}
