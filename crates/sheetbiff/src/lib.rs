//! # sheetbiff
//!
//! Record framework for the legacy Excel binary format (BIFF8, `.xls`).
//!
//! Records are typed, length-prefixed byte payloads that stay mutable in
//! memory. On top of the raw stream this crate provides:
//!
//! - bit-flag accessors that read-modify-write single bits in place
//!   ([`Record::get_flag`], [`Record::set_flag`]);
//! - compressed MULRK / MULBLANK runs that expand into per-cell records
//!   ([`MulGroup`], [`Sheet::expand_mul_records`]);
//! - protection state per book and per sheet with an explicit close
//!   lifecycle ([`ProtectionManager`]).
//!
//! ## Example
//!
//! ```no_run
//! use sheetbiff::{Book, LoadOptions, ProtectionAspect};
//!
//! let book = Book::open("report.xls", &LoadOptions::default())?;
//! for sheet in book.sheets() {
//!     let locked = sheet.is_protected(ProtectionAspect::Sheet).unwrap_or(false);
//!     println!("{}: {} records, locked={locked}", sheet.name(), sheet.records().len());
//! }
//! # Ok::<(), sheetbiff::BiffError>(())
//! ```

pub mod biff;
pub mod book;
mod container;
pub mod error;
pub mod kind;
pub mod marker;
pub mod mul;
pub mod observer;
pub mod protection;
pub mod reader;
pub mod record;
pub mod sheet;
pub mod store;

pub use biff::RawRecord;
pub use book::{Book, BoundSheet};
pub use error::{BiffError, BiffResult};
pub use kind::{Collection, RecordKind};
pub use marker::DocumentProperty;
pub use mul::{MulCell, MulGroup, MulRecord};
pub use observer::{AttachEvent, AttachObserver, CollectingObserver, LogObserver, Tee};
pub use protection::{hash_legacy_password, ProtectionAspect, ProtectionManager, ProtectionScope};
pub use reader::LoadOptions;
pub use record::{FlagField, Record, RecordState};
pub use sheet::Sheet;
pub use store::{ContainerId, RecordHandle, RecordStore};
