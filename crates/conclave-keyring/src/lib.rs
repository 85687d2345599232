//! Conclave Keyring: cluster-wide rotation of the gossip encryption keys.
//!
//! Each node holds a keyring per gossip scope: the LAN pool always, the WAN
//! pool on servers. The [`RotationCoordinator`] authorizes a request, checks
//! it locally, then fans it out to every member through a
//! [`KeyringTransport`] and folds the replies into a [`KeyringResults`]
//! aggregate. Member failures are reported, never raised.

pub mod bootstrap;
pub mod coordinator;
pub mod error;
pub mod keyring;
pub mod memory;
pub mod protocol;
pub mod transport;

pub use bootstrap::{
    bootstrap_keyrings, init_keyring_file, load_keyring_file, save_keyring_file, LoadedKeyrings,
};
pub use coordinator::RotationCoordinator;
pub use error::{KeyringError, MemberError};
pub use keyring::{validate_key, Keyring};
pub use memory::{federation_member_name, MemoryCluster};
pub use protocol::{
    KeyringOp, KeyringRequest, KeyringResults, KeyringScope, MemberOutcome, MemberReply,
    ScopeResult,
};
pub use transport::KeyringTransport;
