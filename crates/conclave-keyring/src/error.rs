//! Keyring domain error types.

use conclave_acl::AclError;
use conclave_common::error::ErrorCode;

use crate::protocol::KeyringScope;

#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error("{0}")]
    Acl(#[from] AclError),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("relay factor must be at most {max}, got {got}")]
    InvalidRelayFactor { got: u8, max: u8 },

    #[error("removing the primary key of the {0} keyring is not allowed")]
    PrimaryKeyRemoval(KeyringScope),

    #[error("key is not installed: {0}")]
    KeyNotInstalled(String),

    #[error("keyring is empty")]
    EmptyKeyring,

    #[error("failed to load keyring file {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<&KeyringError> for ErrorCode {
    fn from(e: &KeyringError) -> Self {
        match e {
            KeyringError::Acl(acl) => ErrorCode::from(acl),
            KeyringError::InvalidKey(_)
            | KeyringError::InvalidRelayFactor { .. }
            | KeyringError::PrimaryKeyRemoval(_)
            | KeyringError::KeyNotInstalled(_) => ErrorCode::BadRequest,
            KeyringError::EmptyKeyring | KeyringError::Load { .. } => ErrorCode::Internal,
            KeyringError::Io(_) => ErrorCode::Io,
        }
    }
}

/// Why a single member did not apply an operation. Never escalates to a
/// request failure; it becomes that member's entry in the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemberError {
    #[error("member unreachable")]
    Unreachable,

    #[error("member did not respond within {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Rejected(String),
}
