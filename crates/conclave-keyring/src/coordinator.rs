//! Cluster-wide key rotation: list, install, use and remove fanned out to
//! every member of the applicable scopes.

use std::sync::Arc;
use std::time::Duration;

use conclave_acl::{AccessGuard, Capability};
use futures_util::stream::{self, StreamExt};

use crate::error::{KeyringError, MemberError};
use crate::keyring::validate_key;
use crate::protocol::{KeyringOp, KeyringResults, KeyringScope, MemberOutcome, ScopeResult};
use crate::transport::KeyringTransport;

/// Per-member reply deadline.
pub const DEFAULT_MEMBER_TIMEOUT: Duration = Duration::from_secs(5);

/// In-flight member calls per scope.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Highest relay factor accepted from callers.
pub const MAX_RELAY_FACTOR: u8 = 5;

pub struct RotationCoordinator {
    guard: AccessGuard,
    transport: Arc<dyn KeyringTransport>,
    server: bool,
    member_timeout: Duration,
    concurrency: usize,
}

impl RotationCoordinator {
    /// `server` decides whether the federation scope is in play.
    pub fn new(guard: AccessGuard, transport: Arc<dyn KeyringTransport>, server: bool) -> Self {
        Self {
            guard,
            transport,
            server,
            member_timeout: DEFAULT_MEMBER_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_member_timeout(mut self, timeout: Duration) -> Self {
        self.member_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn list(&self, token: &str, relay_factor: u8) -> Result<KeyringResults, KeyringError> {
        self.execute(token, KeyringOp::List, relay_factor).await
    }

    pub async fn install(
        &self,
        token: &str,
        key: &str,
        relay_factor: u8,
    ) -> Result<KeyringResults, KeyringError> {
        self.execute(token, KeyringOp::Install(key.to_string()), relay_factor)
            .await
    }

    pub async fn use_key(
        &self,
        token: &str,
        key: &str,
        relay_factor: u8,
    ) -> Result<KeyringResults, KeyringError> {
        self.execute(token, KeyringOp::Use(key.to_string()), relay_factor)
            .await
    }

    pub async fn remove(
        &self,
        token: &str,
        key: &str,
        relay_factor: u8,
    ) -> Result<KeyringResults, KeyringError> {
        self.execute(token, KeyringOp::Remove(key.to_string()), relay_factor)
            .await
    }

    fn scopes(&self) -> &'static [KeyringScope] {
        if self.server {
            &[KeyringScope::Local, KeyringScope::Federation]
        } else {
            &[KeyringScope::Local]
        }
    }

    /// Authorize, validate, then fan out. Nothing reaches the transport
    /// until the first two steps pass.
    async fn execute(
        &self,
        token: &str,
        op: KeyringOp,
        relay_factor: u8,
    ) -> Result<KeyringResults, KeyringError> {
        let capability = match op {
            KeyringOp::List => Capability::KeyringRead,
            _ => Capability::KeyringWrite,
        };
        self.guard.authorize(token, capability).await?;

        if relay_factor > MAX_RELAY_FACTOR {
            return Err(KeyringError::InvalidRelayFactor {
                got: relay_factor,
                max: MAX_RELAY_FACTOR,
            });
        }

        match &op {
            KeyringOp::List => {}
            KeyringOp::Install(key) | KeyringOp::Use(key) => validate_key(key)?,
            KeyringOp::Remove(key) => {
                validate_key(key)?;
                self.refuse_primary_removal(key).await?;
            }
        }

        let local = self.fan_out(KeyringScope::Local, &op, relay_factor).await?;
        let federation = if self.server {
            Some(
                self.fan_out(KeyringScope::Federation, &op, relay_factor)
                    .await?,
            )
        } else {
            None
        };

        let results = KeyringResults { local, federation };
        if results.num_errors() > 0 {
            tracing::warn!(
                op = op.name(),
                errors = results.num_errors(),
                "Keyring operation incomplete on some members"
            );
        } else {
            tracing::debug!(op = op.name(), "Keyring operation applied on all members");
        }
        Ok(results)
    }

    async fn refuse_primary_removal(&self, key: &str) -> Result<(), KeyringError> {
        for &scope in self.scopes() {
            if let Some(ring) = self.transport.local_keyring(scope).await? {
                if ring.primary() == key {
                    return Err(KeyringError::PrimaryKeyRemoval(scope));
                }
            }
        }
        Ok(())
    }

    async fn fan_out(
        &self,
        scope: KeyringScope,
        op: &KeyringOp,
        relay_factor: u8,
    ) -> Result<ScopeResult, KeyringError> {
        let members = self.transport.members(scope).await?;
        let transport = &self.transport;
        let timeout = self.member_timeout;

        let outcomes: Vec<MemberOutcome> = stream::iter(members)
            .map(|member| async move {
                let reply = tokio::time::timeout(
                    timeout,
                    transport.query(scope, &member, op, relay_factor),
                )
                .await
                .unwrap_or(Err(MemberError::Timeout(timeout)));

                match reply {
                    Ok(reply) => MemberOutcome {
                        member,
                        keys: reply.keys,
                        primary_key: reply.primary_key,
                        error: None,
                    },
                    Err(e) => {
                        tracing::debug!(%scope, %member, error = %e, "Keyring member failed");
                        MemberOutcome {
                            member,
                            keys: Vec::new(),
                            primary_key: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        Ok(ScopeResult::from_outcomes(scope, outcomes))
    }
}

impl std::fmt::Debug for RotationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationCoordinator")
            .field("server", &self.server)
            .field("member_timeout", &self.member_timeout)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
