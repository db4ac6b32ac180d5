//! State shared by books and sheets: the record store, named collections,
//! the protection manager and the attach/close lifecycle.

use std::collections::BTreeMap;

use crate::biff::RawRecord;
use crate::error::{BiffError, BiffResult};
use crate::kind::Collection;
use crate::observer::{AttachEvent, AttachObserver};
use crate::protection::{ProtectionAspect, ProtectionManager, ProtectionScope};
use crate::record::Record;
use crate::store::{ContainerId, RecordHandle, RecordStore};

#[derive(Debug)]
pub(crate) struct ContainerCore {
    pub(crate) id: ContainerId,
    pub(crate) records: RecordStore,
    pub(crate) collections: BTreeMap<Collection, Vec<RecordHandle>>,
    pub(crate) protection: ProtectionManager,
    pub(crate) closed: bool,
}

impl ContainerCore {
    pub(crate) fn new(id: ContainerId, scope: ProtectionScope) -> Self {
        Self {
            id,
            records: RecordStore::new(),
            collections: BTreeMap::new(),
            protection: ProtectionManager::new(scope, id),
            closed: false,
        }
    }

    pub(crate) fn ensure_open(&self) -> BiffResult<()> {
        if self.closed {
            return Err(BiffError::ContainerClosed);
        }
        Ok(())
    }

    /// Append `record` and run its attach hooks exactly once.
    pub(crate) fn insert(
        &mut self,
        mut record: Record,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<RecordHandle> {
        self.ensure_open()?;
        record.attach(self.id)?;
        let handle = self.records.push(record);
        self.run_attach_hooks(handle, observer)?;
        Ok(handle)
    }

    /// Attach hooks for a record already placed in the store.
    pub(crate) fn run_attach_hooks(
        &mut self,
        handle: RecordHandle,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<()> {
        let Some(record) = self.records.get(handle) else {
            return Ok(());
        };
        let kind = record.kind();
        let type_code = record.type_code();

        let aspect = kind.protection_aspect(self.protection.scope());
        let collection = kind
            .collection()
            .or(aspect.map(|_| Collection::Protection));

        if let Some(collection) = collection {
            self.collections.entry(collection).or_default().push(handle);
            observer.on_event(&AttachEvent::Registered {
                container: self.id,
                handle,
                type_code,
                collection,
            });
        }
        if let Some(aspect) = aspect {
            self.protection.register(aspect, handle)?;
            observer.on_event(&AttachEvent::Protection {
                container: self.id,
                handle,
                aspect,
            });
        }
        if let Some(property) = kind.marker() {
            observer.on_event(&property.event(self.id));
        }
        Ok(())
    }

    pub(crate) fn collection(&self, collection: Collection) -> &[RecordHandle] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Active records of one collection; handles whose records were removed are skipped.
    pub(crate) fn collection_records(
        &self,
        collection: Collection,
    ) -> impl Iterator<Item = &Record> + '_ {
        self.collection(collection)
            .iter()
            .filter_map(|&h| self.records.get(h))
            .filter(|r| !r.is_removed())
    }

    pub(crate) fn is_protected(&self, aspect: ProtectionAspect) -> BiffResult<bool> {
        self.protection.is_protected(&self.records, aspect)
    }

    pub(crate) fn set_protected(&mut self, aspect: ProtectionAspect, value: bool) -> BiffResult<()> {
        self.protection
            .set_protected(&mut self.records, aspect, value)
    }

    pub(crate) fn set_password(&mut self, aspect: ProtectionAspect, password: &str) -> BiffResult<u16> {
        self.protection
            .set_password(&mut self.records, aspect, password)
    }

    pub(crate) fn raw_records(&self) -> impl Iterator<Item = RawRecord> + '_ {
        self.records.iter().map(|(_, r)| r.to_raw())
    }

    /// Close the protection manager, then release every record. Idempotent.
    pub(crate) fn close(&mut self, observer: &mut dyn AttachObserver) {
        if self.closed {
            return;
        }
        self.protection.close(&self.records);
        self.collections.clear();
        self.records.detach_all();
        self.closed = true;
        observer.on_event(&AttachEvent::Closed { container: self.id });
    }
}
