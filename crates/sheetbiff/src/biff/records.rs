//! BIFF8 record type constants.
//!
//! Reference: [MS-XLS] §2.3 — Record Enumeration

// ── Stream structure ────────────────────────────────────────────────────
pub const BOF: u16 = 0x0809;
pub const EOF: u16 = 0x000A;
pub const CONTINUE: u16 = 0x003C;

// ── Workbook globals ────────────────────────────────────────────────────
pub const BOUNDSHEET: u16 = 0x0085; // Sheet name, type, visibility, stream offset
pub const WINDOWPROTECT: u16 = 0x0019; // Workbook windows locked
pub const PROT4REV: u16 = 0x01AF; // Shared workbook revision log protected
pub const PROT4REVPASS: u16 = 0x01BC; // Hash of the revision protection password
pub const OBPROJ: u16 = 0x00D3; // Presence means a VBA project is embedded
pub const EXCEL9FILE: u16 = 0x01C0; // Presence means saved by Excel 2000 or later

// ── Protection (globals and worksheet) ──────────────────────────────────
pub const PROTECT: u16 = 0x0012; // Workbook structure / sheet contents locked
pub const PASSWORD: u16 = 0x0013; // Hash of the protection password (0 = none)
pub const OBJPROTECT: u16 = 0x0063; // Sheet objects locked
pub const SCENPROTECT: u16 = 0x00DD; // Sheet scenarios locked

// ── Cell records ────────────────────────────────────────────────────────
pub const RK: u16 = 0x027E; // Cell with compressed number (RK encoding)
pub const MULRK: u16 = 0x00BD; // Multiple RK values in one row
pub const BLANK: u16 = 0x0201; // Empty cell with formatting
pub const MULBLANK: u16 = 0x00BE; // Multiple blanks with formatting

// ── Print settings ──────────────────────────────────────────────────────
pub const PRINTHEADERS: u16 = 0x002A; // Print row/column headings
pub const PRINTGRIDLINES: u16 = 0x002B; // Print gridlines
pub const GRIDSET: u16 = 0x0082; // Gridline printing option was changed
pub const HCENTER: u16 = 0x0083; // Center horizontally when printed
pub const VCENTER: u16 = 0x0084; // Center vertically when printed
pub const WSBOOL: u16 = 0x0081; // Worksheet option bits (fit to page, outline)

// ── BOF subtypes (the `dt` field) ───────────────────────────────────────
pub const BOF_WORKBOOK_GLOBALS: u16 = 0x0005;
pub const BOF_WORKSHEET: u16 = 0x0010;
pub const BOF_CHART: u16 = 0x0020;
pub const BOF_MACRO: u16 = 0x0040;

/// BIFF version we support.
pub const BIFF8_VERSION: u16 = 0x0600;

/// Largest record body before the writer has to emit CONTINUE records.
pub const MAX_RECORD_DATA: usize = 8224;
