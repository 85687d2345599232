use serde::{Deserialize, Serialize};

/// Machine-readable failure kinds shared by every domain crate.
///
/// Domain errors convert into one of these with `impl From<&E> for ErrorCode`;
/// the transport maps the code to a status with [`ErrorCode::http_status`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed query parameters, conflicting flags, undecodable bodies.
    BadRequest,
    /// The resolved policy does not grant the required capability.
    PermissionDenied,
    /// The supplied token does not resolve to any known ACL.
    AclNotFound,
    /// No route is registered for the path.
    NotFound,
    MethodNotAllowed,
    Io,
    Internal,
}

impl ErrorCode {
    /// Suggested HTTP status code for this error.
    /// Transport-agnostic (returns u16, not an axum type).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::PermissionDenied | Self::AclNotFound => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Io | Self::Internal => 500,
        }
    }

    /// True for the two authorization failure kinds.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::AclNotFound)
    }
}
