use conclave_acl::AclError;
use conclave_common::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Acl(#[from] AclError),

    #[error("No cluster leader")]
    NoLeader,

    #[error("No path to datacenter")]
    NoPathToDatacenter,

    #[error("{0}")]
    Internal(String),
}

impl From<&StoreError> for ErrorCode {
    fn from(e: &StoreError) -> Self {
        match e {
            StoreError::Acl(acl) => ErrorCode::from(acl),
            StoreError::NoLeader | StoreError::NoPathToDatacenter | StoreError::Internal(_) => {
                ErrorCode::Internal
            }
        }
    }
}
