//! Capabilities, access levels, and the static policy table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AclError;

/// Something a request needs to be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    KeyringRead,
    KeyringWrite,
    KeyRead,
    KeyWrite,
    NodeRead,
    OperatorRead,
}

impl Capability {
    /// Minimum access level on the capability's resource.
    pub fn required_level(&self) -> AccessLevel {
        match self {
            Self::KeyringWrite | Self::KeyWrite => AccessLevel::Write,
            Self::KeyringRead | Self::KeyRead | Self::NodeRead | Self::OperatorRead => {
                AccessLevel::Read
            }
        }
    }
}

/// Ordered access level: `deny < read < write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Deny,
    Read,
    Write,
}

/// What the default (anonymous) policy grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    #[default]
    Allow,
    Deny,
}

impl DefaultPolicy {
    fn level(self) -> AccessLevel {
        match self {
            Self::Allow => AccessLevel::Write,
            Self::Deny => AccessLevel::Deny,
        }
    }
}

/// Per-resource rules attached to a configured token. Unset resources fall
/// back to the default policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub keyring: Option<AccessLevel>,
    pub key: Option<AccessLevel>,
    pub node: Option<AccessLevel>,
    pub operator: Option<AccessLevel>,
}

/// A fully resolved policy: one access level per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub keyring: AccessLevel,
    pub key: AccessLevel,
    pub node: AccessLevel,
    pub operator: AccessLevel,
}

impl Policy {
    pub fn uniform(level: AccessLevel) -> Self {
        Self {
            keyring: level,
            key: level,
            node: level,
            operator: level,
        }
    }

    /// Grants everything.
    pub fn management() -> Self {
        Self::uniform(AccessLevel::Write)
    }

    fn from_rules(rules: &Rules, default: DefaultPolicy) -> Self {
        let fallback = default.level();
        Self {
            keyring: rules.keyring.unwrap_or(fallback),
            key: rules.key.unwrap_or(fallback),
            node: rules.node.unwrap_or(fallback),
            operator: rules.operator.unwrap_or(fallback),
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        let granted = match capability {
            Capability::KeyringRead | Capability::KeyringWrite => self.keyring,
            Capability::KeyRead | Capability::KeyWrite => self.key,
            Capability::NodeRead => self.node,
            Capability::OperatorRead => self.operator,
        };
        granted >= capability.required_level()
    }
}

/// Source of policies for tokens.
///
/// `Ok(None)` means ACL enforcement is off and every request is allowed.
#[async_trait::async_trait]
pub trait PolicyResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<Policy>, AclError>;
}

/// ACL section of the agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    pub enabled: bool,
    pub default_policy: DefaultPolicy,
    /// Token granting management access to everything.
    pub master_token: Option<String>,
    /// Token used when a request supplies none.
    pub default_token: Option<String>,
    pub tokens: HashMap<String, Rules>,
}

/// Resolver backed by the agent's own configuration.
#[derive(Debug, Clone)]
pub struct StaticPolicy {
    config: AclConfig,
}

impl StaticPolicy {
    pub fn new(config: AclConfig) -> Self {
        Self { config }
    }

    fn resolve_sync(&self, token: &str) -> Result<Option<Policy>, AclError> {
        if !self.config.enabled {
            return Ok(None);
        }
        if token.is_empty() {
            return Ok(Some(Policy::uniform(self.config.default_policy.level())));
        }
        if self.config.master_token.as_deref() == Some(token) {
            return Ok(Some(Policy::management()));
        }
        match self.config.tokens.get(token) {
            Some(rules) => Ok(Some(Policy::from_rules(rules, self.config.default_policy))),
            None => Err(AclError::NotFound),
        }
    }
}

#[async_trait::async_trait]
impl PolicyResolver for StaticPolicy {
    async fn resolve(&self, token: &str) -> Result<Option<Policy>, AclError> {
        self.resolve_sync(token)
    }
}
