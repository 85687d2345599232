//! Conclave Store: the consensus-store surface the gateway talks to.
//!
//! [`StateStore`] is the seam; [`MemoryStore`] is the in-process
//! implementation used by single-node agents and tests.

pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::StateStore;
pub use types::{KvEntry, Node, QueryMeta, QueryOptions, QuerySource};
