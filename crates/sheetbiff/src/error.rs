//! Error types for sheetbiff

use thiserror::Error;

use crate::protection::ProtectionAspect;

/// Result type for record operations
pub type BiffResult<T> = std::result::Result<T, BiffError>;

/// Errors that can occur while decoding, mutating or organizing records
#[derive(Debug, Error)]
pub enum BiffError {
    /// Payload too short for the requested field
    #[error("payload too short: need {needed} byte(s) at offset {offset}, have {len}")]
    Bounds {
        offset: usize,
        len: usize,
        needed: usize,
    },

    /// Structurally invalid compressed-group encoding
    #[error("malformed record 0x{record_type:04X}: {reason}")]
    MalformedRecord { record_type: u16, reason: String },

    /// Expansion requested on a retired group that kept no expansion
    #[error("record 0x{record_type:04X} was already expanded and retired")]
    AlreadyExpanded { record_type: u16 },

    /// No backing record for a protection aspect
    #[error("no protection record loaded for aspect {0:?}")]
    UnsupportedAspect(ProtectionAspect),

    /// Mutation through a protection manager after `close()`
    #[error("protection manager is closed")]
    ClosedManager,

    /// Mutation of a record that has been removed from its container
    #[error("record 0x{record_type:04X} is detached from its container")]
    DetachedRecord { record_type: u16 },

    /// Attaching a record that already has an owner
    #[error("record 0x{record_type:04X} is already attached")]
    AlreadyAttached { record_type: u16 },

    /// Typed accessor used on a record of another kind
    #[error("expected record 0x{expected:04X}, got 0x{actual:04X}")]
    WrongRecordType { expected: u16, actual: u16 },

    /// A password hash aspect cannot be switched on without a password
    #[error("aspect {0:?} needs a password to be enabled")]
    PasswordRequired(ProtectionAspect),

    /// Structural edit on a closed book or sheet
    #[error("container is closed")]
    ContainerClosed,

    /// IO error (also covers CFB errors which use std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file format
    #[error("Invalid XLS format: {0}")]
    InvalidFormat(String),

    /// Unsupported version
    #[error("Unsupported XLS version: {0}")]
    UnsupportedVersion(String),
}

impl BiffError {
    /// Create a malformed-record error for `record_type`
    pub fn malformed<S: Into<String>>(record_type: u16, reason: S) -> Self {
        BiffError::MalformedRecord {
            record_type,
            reason: reason.into(),
        }
    }

    /// Use-after-teardown errors. These point at a bug in the caller and are never retried.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            BiffError::ClosedManager | BiffError::DetachedRecord { .. } | BiffError::ContainerClosed
        )
    }

    /// Errors a caller may reasonably skip past.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BiffError::AlreadyExpanded { .. } | BiffError::UnsupportedAspect(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(BiffError::ClosedManager.is_lifecycle());
        assert!(BiffError::DetachedRecord { record_type: 0x84 }.is_lifecycle());
        assert!(!BiffError::ClosedManager.is_recoverable());

        let err = BiffError::UnsupportedAspect(ProtectionAspect::Objects);
        assert!(err.is_recoverable());
        assert!(!err.is_lifecycle());

        let err = BiffError::malformed(0x00BD, "zero count");
        assert_eq!(err.to_string(), "malformed record 0x00BD: zero count");
    }
}
