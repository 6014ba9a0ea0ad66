//! Conversion errors.
//!
//! Store and pipeline functions return `anyhow::Result`. The conditions a
//! caller may want to branch on are raised as [`FormatError`] and can be
//! recovered with `err.downcast_ref::<FormatError>()`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Identifier '{identifier}' is already used by another {kind}")]
    DuplicateIdentifier {
        kind: &'static str,
        identifier: String,
    },

    #[error("Unknown {kind} '{identifier}'")]
    UnknownFormat {
        kind: &'static str,
        identifier: String,
    },

    #[error("Unknown value for 'root' in export: '{0}'")]
    UnknownRoot(String),

    #[error("Invalid feature key '{0}', expected 'tier:name'")]
    InvalidFeatureKey(String),

    #[error("Level chain is not a connected path at '{0}'")]
    BrokenChain(String),

    #[error("Unit identity '{0}' was produced more than once")]
    IdentityCollision(String),
}
