//! Access guard error types.

use conclave_common::error::ErrorCode;

/// Message fragment clients (and older tooling) match on for denials.
pub const PERMISSION_DENIED: &str = "Permission denied";

/// Message fragment for tokens that resolve to nothing.
pub const ACL_NOT_FOUND: &str = "ACL not found";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AclError {
    #[error("Permission denied")]
    Denied,

    #[error("ACL not found")]
    NotFound,

    #[error("ACL resolution failed: {0}")]
    Internal(String),
}

impl From<&AclError> for ErrorCode {
    fn from(e: &AclError) -> Self {
        match e {
            AclError::Denied => ErrorCode::PermissionDenied,
            AclError::NotFound => ErrorCode::AclNotFound,
            AclError::Internal(_) => ErrorCode::Internal,
        }
    }
}
