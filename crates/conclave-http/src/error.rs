//! Gateway error type: every handler failure funnels through here on its
//! way to a status code.

use conclave_acl::AclError;
use conclave_common::error::ErrorCode;
use conclave_keyring::KeyringError;
use conclave_store::StoreError;

use crate::query::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Acl(#[from] AclError),

    #[error("{0}")]
    Keyring(#[from] KeyringError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Request decode failed: {0}")]
    Decode(String),

    #[error("Missing key name")]
    MissingKey,

    #[error("Invalid flags")]
    InvalidFlags,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Internal(String),
}

impl From<&GatewayError> for ErrorCode {
    fn from(e: &GatewayError) -> Self {
        match e {
            GatewayError::Parse(_)
            | GatewayError::Decode(_)
            | GatewayError::MissingKey
            | GatewayError::InvalidFlags => ErrorCode::BadRequest,
            GatewayError::Acl(acl) => ErrorCode::from(acl),
            GatewayError::Keyring(keyring) => ErrorCode::from(keyring),
            GatewayError::Store(store) => ErrorCode::from(store),
            GatewayError::MethodNotAllowed => ErrorCode::MethodNotAllowed,
            GatewayError::Internal(_) => ErrorCode::Internal,
        }
    }
}
