//! Shared building blocks for the conclave crates: the error-code to
//! HTTP-status contract, JSON persistence, and data paths.

pub mod error;
pub mod http;
pub mod paths;
pub mod persist;
pub mod test;
