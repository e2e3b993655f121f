//! Error types for LK image parsing and manipulation

use thiserror::Error;

use crate::NAME_SIZE;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, LkImageError>;

/// Errors raised by the LK image codec and mutation operations
#[derive(Debug, Error)]
pub enum LkImageError {
    /// The byte stream does not describe a valid partition at the reported
    /// location (bad magic, truncated header, certificate without an owner).
    #[error("invalid LK partition: {reason}")]
    InvalidPartition { reason: String },

    /// A partition with this name already exists in the image
    #[error("duplicate partition name: {name}")]
    DuplicateName { name: String },

    /// Partition names are limited to 32 bytes on disk
    #[error("partition name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Lookup, removal or patching of a name that is not in the image
    #[error("partition not found: {name}")]
    PartitionNotFound { name: String },

    /// The byte sequence to patch does not occur in the search buffer
    #[error("needle not found: {needle}")]
    NeedleNotFound { needle: String },

    /// Certificate tags are limited to `cert1` and `cert2`
    #[error("invalid certificate type: {value} (expected cert1 or cert2)")]
    InvalidCertificateType { value: String },

    /// A user-supplied hex string could not be decoded
    #[error("invalid hex string: {value}")]
    InvalidHex { value: String },

    /// I/O error at the load/save boundary
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LkImageError {
    pub fn invalid_partition(reason: impl Into<String>) -> Self {
        Self::InvalidPartition {
            reason: reason.into(),
        }
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    pub fn name_too_long(len: usize) -> Self {
        Self::NameTooLong {
            len,
            max: NAME_SIZE,
        }
    }

    pub fn partition_not_found(name: impl Into<String>) -> Self {
        Self::PartitionNotFound { name: name.into() }
    }

    pub fn needle_not_found(needle: &[u8]) -> Self {
        Self::NeedleNotFound {
            needle: hex::encode(needle),
        }
    }

    pub fn invalid_certificate_type(value: impl Into<String>) -> Self {
        Self::InvalidCertificateType {
            value: value.into(),
        }
    }

    pub fn invalid_hex(value: impl Into<String>) -> Self {
        Self::InvalidHex {
            value: value.into(),
        }
    }
}
