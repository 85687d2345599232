//! Conclave ACL: the access guard in front of every handler.
//!
//! Policy evaluation belongs to a [`PolicyResolver`] (normally the
//! consensus store's ACL tables; [`StaticPolicy`] serves agent-local
//! configuration). This crate owns the mapping from resolution outcomes
//! to the typed [`AclError`] kinds the transport turns into status codes.

pub mod error;
pub mod policy;

use std::sync::Arc;

pub use error::AclError;
pub use policy::{
    AccessLevel, AclConfig, Capability, DefaultPolicy, Policy, PolicyResolver, Rules,
    StaticPolicy,
};

/// Authorizes tokens against capabilities.
#[derive(Clone)]
pub struct AccessGuard {
    resolver: Arc<dyn PolicyResolver>,
}

impl AccessGuard {
    pub fn new(resolver: Arc<dyn PolicyResolver>) -> Self {
        Self { resolver }
    }

    /// Guard over the agent's configured ACL table.
    pub fn from_config(config: AclConfig) -> Self {
        Self::new(Arc::new(StaticPolicy::new(config)))
    }

    /// Guard that allows everything.
    pub fn disabled() -> Self {
        Self::from_config(AclConfig::default())
    }

    /// `Ok(())` when `token` grants `capability`.
    ///
    /// Unknown tokens fail with [`AclError::NotFound`], insufficient
    /// grants with [`AclError::Denied`]; resolver faults pass through.
    pub async fn authorize(&self, token: &str, capability: Capability) -> Result<(), AclError> {
        let Some(policy) = self.resolver.resolve(token).await? else {
            return Ok(());
        };
        if policy.allows(capability) {
            Ok(())
        } else {
            tracing::debug!(?capability, "ACL denied request");
            Err(AclError::Denied)
        }
    }
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard").finish_non_exhaustive()
    }
}
