//! Book and sheet protection.
//!
//! Protection state is spread over several small records (PROTECT, PASSWORD,
//! WINDOWPROTECT, ...). A [`ProtectionManager`] maps each
//! [`ProtectionAspect`] to the record that stores it, so callers never need
//! to know which record encodes which flag.
//!
//! The manager holds record handles, not records. The owning container lends
//! it its [`RecordStore`] for each call.
//!
//! After [`ProtectionManager::close`] the manager answers reads from a
//! snapshot taken at close time and rejects every write with
//! [`BiffError::ClosedManager`].

use std::collections::BTreeMap;

use crate::error::{BiffError, BiffResult};
use crate::kind::RecordKind;
use crate::record::Record;
use crate::store::{ContainerId, RecordHandle, RecordStore};

/// Which kind of container a manager belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProtectionScope {
    Book,
    Sheet,
}

/// One protection switch, independent of the record that stores it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProtectionAspect {
    /// Workbook structure locked (book PROTECT)
    Document,
    /// Workbook windows locked (WINDOWPROTECT)
    Windows,
    /// Shared-workbook revision log locked (PROT4REV)
    Revision,
    /// Revision protection has a password (PROT4REVPASS hash is non-zero)
    RevisionPassword,
    /// Protection has a password (PASSWORD hash is non-zero)
    PasswordHash,
    /// Sheet contents locked (sheet PROTECT)
    Sheet,
    /// Sheet objects locked (OBJPROTECT)
    Objects,
    /// Sheet scenarios locked (SCENPROTECT)
    Scenarios,
}

impl ProtectionAspect {
    pub const ALL: [ProtectionAspect; 8] = [
        ProtectionAspect::Document,
        ProtectionAspect::Windows,
        ProtectionAspect::Revision,
        ProtectionAspect::RevisionPassword,
        ProtectionAspect::PasswordHash,
        ProtectionAspect::Sheet,
        ProtectionAspect::Objects,
        ProtectionAspect::Scenarios,
    ];

    /// Sheet aspect whose default follows this book aspect.
    pub fn sheet_default(self) -> Option<ProtectionAspect> {
        match self {
            ProtectionAspect::Document => Some(ProtectionAspect::Sheet),
            ProtectionAspect::PasswordHash => Some(ProtectionAspect::PasswordHash),
            _ => None,
        }
    }
}

/// How an aspect's boolean is stored in its record
#[derive(Debug, Clone, Copy)]
enum Encoding {
    /// Bit 0 of byte 0
    Flag,
    /// Non-zero 16-bit password hash at offset 0
    Hash,
}

fn encoding(kind: RecordKind) -> Encoding {
    match kind {
        RecordKind::Password | RecordKind::Prot4RevPass => Encoding::Hash,
        _ => Encoding::Flag,
    }
}

fn read_aspect(record: &Record) -> BiffResult<bool> {
    match encoding(record.kind()) {
        Encoding::Flag => record.flag("locked"),
        Encoding::Hash => Ok(record.read_u16(0)? != 0),
    }
}

/// Hash a password with Excel's legacy 16-bit XOR scheme (PASSWORD, PROT4REVPASS).
///
/// Not cryptographically meaningful; it is what the file format stores.
pub fn hash_legacy_password(password: &str) -> u16 {
    let mut hash: u16 = 0;
    let mut len: u16 = 0;

    // Only the first 15 characters count
    for (i, ch) in password.encode_utf16().take(15).enumerate() {
        len += 1;
        let shift = (i + 1) as u32;
        let ch = ch as u32;
        // Rotate within 15 bits; the top bit of `ch` still feeds the wrap-around
        let rotated = ((ch << shift) & 0x7FFF) | (ch >> (15 - shift));
        hash ^= rotated as u16;
    }

    hash ^ len ^ 0xCE4B
}

/// Facade over a container's protection records
#[derive(Debug)]
pub struct ProtectionManager {
    scope: ProtectionScope,
    owner: Option<ContainerId>,
    aspects: BTreeMap<ProtectionAspect, RecordHandle>,
    inherited: BTreeMap<ProtectionAspect, bool>,
    frozen: BTreeMap<ProtectionAspect, bool>,
    closed: bool,
}

impl ProtectionManager {
    pub fn new(scope: ProtectionScope, owner: ContainerId) -> Self {
        Self {
            scope,
            owner: Some(owner),
            aspects: BTreeMap::new(),
            inherited: BTreeMap::new(),
            frozen: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn scope(&self) -> ProtectionScope {
        self.scope
    }

    /// The owning container; `None` once closed.
    pub fn owner(&self) -> Option<ContainerId> {
        self.owner
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> BiffResult<()> {
        if self.closed {
            return Err(BiffError::ClosedManager);
        }
        Ok(())
    }

    /// Bind `aspect` to the record at `handle`. A later record for the same aspect wins.
    pub(crate) fn register(
        &mut self,
        aspect: ProtectionAspect,
        handle: RecordHandle,
    ) -> BiffResult<()> {
        self.ensure_open()?;
        if let Some(previous) = self.aspects.insert(aspect, handle) {
            log::debug!(
                "{aspect:?} rebound from record #{} to #{}",
                previous.index(),
                handle.index()
            );
        }
        Ok(())
    }

    /// Record a default handed down from the book. Only used while this
    /// manager has no record of its own for `aspect`.
    pub(crate) fn inherit(&mut self, aspect: ProtectionAspect, value: bool) -> BiffResult<()> {
        self.ensure_open()?;
        self.inherited.insert(aspect, value);
        Ok(())
    }

    /// Aspects backed by a record of this container.
    pub fn aspects(&self) -> impl Iterator<Item = ProtectionAspect> + '_ {
        self.aspects.keys().copied()
    }

    pub fn has_record_for(&self, aspect: ProtectionAspect) -> bool {
        self.aspects.contains_key(&aspect)
    }

    /// Handle of the record backing `aspect`.
    pub fn record_handle(&self, aspect: ProtectionAspect) -> Option<RecordHandle> {
        self.aspects.get(&aspect).copied()
    }

    /// Current value of `aspect`.
    ///
    /// Falls back to the inherited book default, then fails with
    /// `UnsupportedAspect`. After close, answers from the close-time snapshot.
    pub fn is_protected(&self, store: &RecordStore, aspect: ProtectionAspect) -> BiffResult<bool> {
        if self.closed {
            return self
                .frozen
                .get(&aspect)
                .copied()
                .ok_or(BiffError::UnsupportedAspect(aspect));
        }
        if let Some(&handle) = self.aspects.get(&aspect) {
            let record = store
                .get(handle)
                .ok_or(BiffError::UnsupportedAspect(aspect))?;
            return read_aspect(record);
        }
        self.inherited
            .get(&aspect)
            .copied()
            .ok_or(BiffError::UnsupportedAspect(aspect))
    }

    fn backing_mut<'s>(
        &self,
        store: &'s mut RecordStore,
        aspect: ProtectionAspect,
    ) -> BiffResult<&'s mut Record> {
        self.ensure_open()?;
        let handle = self
            .aspects
            .get(&aspect)
            .copied()
            .ok_or(BiffError::UnsupportedAspect(aspect))?;
        store
            .get_mut(handle)
            .ok_or(BiffError::UnsupportedAspect(aspect))
    }

    /// Set `aspect` on its backing record.
    ///
    /// Password aspects can only be cleared here; use
    /// [`ProtectionManager::set_password`] to enable them.
    pub fn set_protected(
        &mut self,
        store: &mut RecordStore,
        aspect: ProtectionAspect,
        value: bool,
    ) -> BiffResult<()> {
        let record = self.backing_mut(store, aspect)?;
        match encoding(record.kind()) {
            Encoding::Flag => record.set_flag_by_name("locked", value),
            Encoding::Hash if value => {
                if record.read_u16(0)? == 0 {
                    return Err(BiffError::PasswordRequired(aspect));
                }
                Ok(())
            }
            Encoding::Hash => record.write_u16(0, 0),
        }
    }

    /// Store the legacy hash of `password` on a password aspect. Returns the hash.
    pub fn set_password(
        &mut self,
        store: &mut RecordStore,
        aspect: ProtectionAspect,
        password: &str,
    ) -> BiffResult<u16> {
        let record = self.backing_mut(store, aspect)?;
        if let Encoding::Flag = encoding(record.kind()) {
            return Err(BiffError::WrongRecordType {
                expected: crate::biff::records::PASSWORD,
                actual: record.type_code(),
            });
        }
        let hash = hash_legacy_password(password);
        record.write_u16(0, hash)?;
        Ok(hash)
    }

    /// Every aspect this manager can currently answer, with its value.
    pub fn snapshot(&self, store: &RecordStore) -> BTreeMap<ProtectionAspect, bool> {
        if self.closed {
            return self.frozen.clone();
        }
        ProtectionAspect::ALL
            .iter()
            .filter_map(|&aspect| {
                self.is_protected(store, aspect)
                    .ok()
                    .map(|value| (aspect, value))
            })
            .collect()
    }

    /// Release the container. Idempotent.
    ///
    /// Freezes the last-known value of every answerable aspect, clears the
    /// owner and drops every record handle.
    pub fn close(&mut self, store: &RecordStore) {
        if self.closed {
            return;
        }
        self.frozen = self.snapshot(store);
        self.owner = None;
        self.aspects.clear();
        self.inherited.clear();
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::records;

    fn store_with(records_in: Vec<Record>) -> (RecordStore, Vec<RecordHandle>) {
        let mut store = RecordStore::new();
        let handles = records_in.into_iter().map(|r| store.push(r)).collect();
        (store, handles)
    }

    #[test]
    fn test_hash_legacy_password() {
        // Excel stores 0x83AF for "password"
        assert_eq!(hash_legacy_password("password"), 0x83AF);
        assert_eq!(hash_legacy_password("test"), 0xCBEB);
        assert_eq!(hash_legacy_password(""), 0xCE4B);
        // Units at or above 0x8000 keep their high bit
        assert_eq!(hash_legacy_password("耀"), 0xCE48);
        assert_eq!(hash_legacy_password("马克"), 0xBFBD);
        // Only 15 characters are significant
        assert_eq!(
            hash_legacy_password("abcdefghijklmnopq"),
            hash_legacy_password("abcdefghijklmno")
        );
    }

    #[test]
    fn test_delegates_to_backing_record() {
        let (mut store, h) = store_with(vec![
            Record::flag_record(records::PROTECT, false),
            Record::new(records::PASSWORD, vec![0, 0]),
        ]);
        let mut mgr = ProtectionManager::new(ProtectionScope::Sheet, ContainerId::Sheet(0));
        mgr.register(ProtectionAspect::Sheet, h[0]).unwrap();
        mgr.register(ProtectionAspect::PasswordHash, h[1]).unwrap();

        assert!(!mgr.is_protected(&store, ProtectionAspect::Sheet).unwrap());
        mgr.set_protected(&mut store, ProtectionAspect::Sheet, true)
            .unwrap();
        assert!(mgr.is_protected(&store, ProtectionAspect::Sheet).unwrap());
        assert_eq!(store.get(h[0]).unwrap().payload(), &[0x01, 0x00]);

        assert!(matches!(
            mgr.set_protected(&mut store, ProtectionAspect::PasswordHash, true),
            Err(BiffError::PasswordRequired(ProtectionAspect::PasswordHash))
        ));
        let hash = mgr
            .set_password(&mut store, ProtectionAspect::PasswordHash, "secret")
            .unwrap();
        assert_ne!(hash, 0);
        assert!(mgr
            .is_protected(&store, ProtectionAspect::PasswordHash)
            .unwrap());
        mgr.set_protected(&mut store, ProtectionAspect::PasswordHash, false)
            .unwrap();
        assert_eq!(store.get(h[1]).unwrap().payload(), &[0, 0]);
    }

    #[test]
    fn test_unsupported_aspect() {
        let (mut store, _) = store_with(Vec::new());
        let mut mgr = ProtectionManager::new(ProtectionScope::Book, ContainerId::Book);
        assert!(matches!(
            mgr.is_protected(&store, ProtectionAspect::Windows),
            Err(BiffError::UnsupportedAspect(ProtectionAspect::Windows))
        ));
        assert!(matches!(
            mgr.set_protected(&mut store, ProtectionAspect::Windows, true),
            Err(BiffError::UnsupportedAspect(_))
        ));
    }

    #[test]
    fn test_inherited_default_yields_to_own_record() {
        let (store, h) = store_with(vec![Record::flag_record(records::PROTECT, false)]);
        let mut mgr = ProtectionManager::new(ProtectionScope::Sheet, ContainerId::Sheet(1));
        mgr.inherit(ProtectionAspect::Sheet, true).unwrap();
        assert!(mgr.is_protected(&store, ProtectionAspect::Sheet).unwrap());

        mgr.register(ProtectionAspect::Sheet, h[0]).unwrap();
        assert!(!mgr.is_protected(&store, ProtectionAspect::Sheet).unwrap());
    }

    #[test]
    fn test_close_freezes_reads_and_rejects_writes() {
        let (mut store, h) = store_with(vec![Record::flag_record(records::PROTECT, true)]);
        let mut mgr = ProtectionManager::new(ProtectionScope::Book, ContainerId::Book);
        mgr.register(ProtectionAspect::Document, h[0]).unwrap();

        mgr.close(&store);
        assert!(mgr.is_closed());
        assert_eq!(mgr.owner(), None);
        assert_eq!(mgr.aspects().count(), 0);

        // Last-known value is still readable, even if the record changes afterwards
        store
            .get_mut(h[0])
            .unwrap()
            .set_flag_by_name("locked", false)
            .unwrap();
        assert!(mgr.is_protected(&store, ProtectionAspect::Document).unwrap());

        assert!(matches!(
            mgr.set_protected(&mut store, ProtectionAspect::Document, false),
            Err(BiffError::ClosedManager)
        ));
        assert!(matches!(
            mgr.set_password(&mut store, ProtectionAspect::PasswordHash, "x"),
            Err(BiffError::ClosedManager)
        ));
        assert!(matches!(
            mgr.register(ProtectionAspect::Windows, h[0]),
            Err(BiffError::ClosedManager)
        ));

        // Second close changes nothing
        mgr.close(&store);
        assert!(mgr.is_protected(&store, ProtectionAspect::Document).unwrap());
        assert!(matches!(
            mgr.is_protected(&store, ProtectionAspect::Windows),
            Err(BiffError::UnsupportedAspect(_))
        ));
    }
}
