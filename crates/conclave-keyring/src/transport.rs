//! The gossip collaborator seam.
//!
//! The coordinator never talks to members itself; it asks a
//! [`KeyringTransport`] for the membership of a scope and for one member's
//! answer to an operation. Production wires the gossip layer in here; tests
//! and single-node agents use [`crate::memory::MemoryCluster`].

use async_trait::async_trait;

use crate::error::{KeyringError, MemberError};
use crate::keyring::Keyring;
use crate::protocol::{KeyringOp, KeyringScope, MemberReply};

#[async_trait]
pub trait KeyringTransport: Send + Sync {
    /// Names of the reachable-or-not members currently known in `scope`.
    async fn members(&self, scope: KeyringScope) -> Result<Vec<String>, KeyringError>;

    /// Apply `op` on one member and return its keyring afterwards.
    ///
    /// `relay_factor` is the number of extra members asked to relay the
    /// reply back.
    async fn query(
        &self,
        scope: KeyringScope,
        member: &str,
        op: &KeyringOp,
        relay_factor: u8,
    ) -> Result<MemberReply, MemberError>;

    /// This node's own keyring for `scope`, if it has one.
    async fn local_keyring(&self, scope: KeyringScope) -> Result<Option<Keyring>, KeyringError>;
}
