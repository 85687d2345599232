//! Wire types for the keyring endpoint and the gossip collaborator.
//!
//! Field casing follows the operator keyring API clients already speak:
//! PascalCase on the wire.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which gossip pool a keyring protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyringScope {
    /// Intra-datacenter gossip.
    Local,
    /// Cross-datacenter gossip between servers.
    Federation,
}

impl fmt::Display for KeyringScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Federation => f.write_str("federation"),
        }
    }
}

/// A key operation fanned out to every member of a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyringOp {
    List,
    Install(String),
    Use(String),
    Remove(String),
}

impl KeyringOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Install(_) => "install",
            Self::Use(_) => "use",
            Self::Remove(_) => "remove",
        }
    }
}

/// Request body for install/use/remove.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyringRequest {
    pub key: String,
}

/// One member's keyring as reported after it applied an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberReply {
    pub keys: Vec<String>,
    pub primary_key: Option<String>,
}

/// Outcome for a single member. Exactly one of `error` or the key view is
/// meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberOutcome {
    pub member: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate over every member of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScopeResult {
    pub scope: KeyringScope,
    pub num_nodes: usize,
    pub num_responses: usize,
    pub num_errors: usize,
    /// Key → number of members holding it.
    pub keys: BTreeMap<String, usize>,
    /// Key → number of members using it as primary.
    pub primary_keys: BTreeMap<String, usize>,
    /// Member → error text, for every failed member.
    pub messages: BTreeMap<String, String>,
    pub members: Vec<MemberOutcome>,
}

impl ScopeResult {
    /// Fold member outcomes into the aggregate. Members are sorted by name
    /// so the report is stable regardless of completion order.
    pub fn from_outcomes(scope: KeyringScope, mut outcomes: Vec<MemberOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.member.cmp(&b.member));

        let mut keys = BTreeMap::new();
        let mut primary_keys = BTreeMap::new();
        let mut messages = BTreeMap::new();
        let mut num_errors = 0;

        for outcome in &outcomes {
            if let Some(error) = &outcome.error {
                num_errors += 1;
                messages.insert(outcome.member.clone(), error.clone());
                continue;
            }
            for key in &outcome.keys {
                *keys.entry(key.clone()).or_insert(0) += 1;
            }
            if let Some(primary) = &outcome.primary_key {
                *primary_keys.entry(primary.clone()).or_insert(0) += 1;
            }
        }

        Self {
            scope,
            num_nodes: outcomes.len(),
            num_responses: outcomes.len() - num_errors,
            num_errors,
            keys,
            primary_keys,
            messages,
            members: outcomes,
        }
    }
}

/// The full answer to a keyring request: local always, federation only on
/// servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyringResults {
    pub local: ScopeResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation: Option<ScopeResult>,
}

impl KeyringResults {
    pub fn num_errors(&self) -> usize {
        self.local.num_errors + self.federation.as_ref().map_or(0, |f| f.num_errors)
    }
}
