//! In-process gossip cluster.
//!
//! Serves single-node agents (the only member of each scope is the node
//! itself) and tests that need unreachable, slow or divergent members.
//! When a scope has a keyring file, every change applied to the node's own
//! member is written back to it before the reply goes out.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::bootstrap::save_keyring_file;
use crate::error::{KeyringError, MemberError};
use crate::keyring::Keyring;
use crate::protocol::{KeyringOp, KeyringScope, MemberReply};
use crate::transport::KeyringTransport;

struct Member {
    keyring: Keyring,
    reachable: bool,
    delay: Duration,
}

type Pool = BTreeMap<String, Member>;

pub struct MemoryCluster {
    node: String,
    federation_name: String,
    files: BTreeMap<KeyringScope, PathBuf>,
    pools: Mutex<BTreeMap<KeyringScope, Pool>>,
    queries: AtomicUsize,
}

impl MemoryCluster {
    /// A cluster whose local pool holds only `node`, keyed with `primary`.
    pub fn new(node: impl Into<String>, datacenter: &str, primary: &str) -> Self {
        let cluster = Self::empty(node, datacenter);
        let node = cluster.node.clone();
        cluster.add_member(KeyringScope::Local, &node, primary);
        cluster
    }

    /// No members in any scope.
    pub fn empty(node: impl Into<String>, datacenter: &str) -> Self {
        let node = node.into();
        Self {
            federation_name: federation_member_name(&node, datacenter),
            node,
            files: BTreeMap::new(),
            pools: Mutex::new(BTreeMap::new()),
            queries: AtomicUsize::new(0),
        }
    }

    /// A single-node cluster seeded from this node's loaded keyrings.
    pub fn from_keyrings(
        node: &str,
        datacenter: &str,
        local: Option<Keyring>,
        federation: Option<Keyring>,
    ) -> Self {
        let cluster = Self::empty(node, datacenter);
        {
            let mut pools = cluster.pools.lock().expect("keyring cluster lock poisoned");
            if let Some(keyring) = local {
                pools
                    .entry(KeyringScope::Local)
                    .or_default()
                    .insert(cluster.node.clone(), Member::new(keyring));
            }
            if let Some(keyring) = federation {
                pools
                    .entry(KeyringScope::Federation)
                    .or_default()
                    .insert(cluster.federation_name.clone(), Member::new(keyring));
            }
        }
        cluster
    }

    /// Persist this node's `scope` keyring to `path` after every change.
    pub fn with_keyring_file(mut self, scope: KeyringScope, path: impl Into<PathBuf>) -> Self {
        self.files.insert(scope, path.into());
        self
    }

    pub fn add_member(&self, scope: KeyringScope, name: &str, primary: &str) {
        self.with_pool(scope, |pool| {
            pool.insert(name.to_string(), Member::new(Keyring::new(primary)));
        });
    }

    pub fn set_reachable(&self, scope: KeyringScope, name: &str, reachable: bool) {
        self.with_member(scope, name, |m| m.reachable = reachable);
    }

    pub fn set_delay(&self, scope: KeyringScope, name: &str, delay: Duration) {
        self.with_member(scope, name, |m| m.delay = delay);
    }

    /// Install a key on one member directly, bypassing the coordinator.
    pub fn install_on(&self, scope: KeyringScope, name: &str, key: &str) {
        self.with_member(scope, name, |m| m.keyring.install(key));
    }

    /// Promote a key on one member directly. Ignored if not installed.
    pub fn use_on(&self, scope: KeyringScope, name: &str, key: &str) {
        self.with_member(scope, name, |m| {
            let _ = m.keyring.use_key(key);
        });
    }

    pub fn keyring_of(&self, scope: KeyringScope, name: &str) -> Option<Keyring> {
        let pools = self.pools.lock().expect("keyring cluster lock poisoned");
        pools
            .get(&scope)
            .and_then(|pool| pool.get(name))
            .map(|m| m.keyring.clone())
    }

    /// Number of member queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// This node's member name within `scope`.
    pub fn local_member(&self, scope: KeyringScope) -> &str {
        match scope {
            KeyringScope::Local => &self.node,
            KeyringScope::Federation => &self.federation_name,
        }
    }

    fn with_pool(&self, scope: KeyringScope, f: impl FnOnce(&mut Pool)) {
        let mut pools = self.pools.lock().expect("keyring cluster lock poisoned");
        f(pools.entry(scope).or_default());
    }

    fn with_member(&self, scope: KeyringScope, name: &str, f: impl FnOnce(&mut Member)) {
        self.with_pool(scope, |pool| {
            if let Some(member) = pool.get_mut(name) {
                f(member);
            }
        });
    }
}

/// A node's name in the WAN pool: `node.datacenter`.
pub fn federation_member_name(node: &str, datacenter: &str) -> String {
    format!("{node}.{datacenter}")
}

impl Member {
    fn new(keyring: Keyring) -> Self {
        Self {
            keyring,
            reachable: true,
            delay: Duration::ZERO,
        }
    }

    fn reply(&self) -> MemberReply {
        MemberReply {
            keys: self.keyring.keys().to_vec(),
            primary_key: Some(self.keyring.primary().to_string()),
        }
    }
}

#[async_trait]
impl KeyringTransport for MemoryCluster {
    async fn members(&self, scope: KeyringScope) -> Result<Vec<String>, KeyringError> {
        let pools = self.pools.lock().expect("keyring cluster lock poisoned");
        Ok(pools
            .get(&scope)
            .map(|pool| pool.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn query(
        &self,
        scope: KeyringScope,
        member: &str,
        op: &KeyringOp,
        _relay_factor: u8,
    ) -> Result<MemberReply, MemberError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let delay = {
            let pools = self.pools.lock().expect("keyring cluster lock poisoned");
            match pools.get(&scope).and_then(|pool| pool.get(member)) {
                Some(m) if m.reachable => m.delay,
                _ => return Err(MemberError::Unreachable),
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut pools = self.pools.lock().expect("keyring cluster lock poisoned");
        let Some(m) = pools.get_mut(&scope).and_then(|pool| pool.get_mut(member)) else {
            return Err(MemberError::Unreachable);
        };
        if matches!(op, KeyringOp::List) {
            return Ok(m.reply());
        }

        let mut keyring = m.keyring.clone();
        let applied = match op {
            KeyringOp::Install(key) => {
                keyring.install(key.as_str());
                Ok(())
            }
            KeyringOp::Use(key) => keyring.use_key(key),
            KeyringOp::Remove(key) => keyring.remove(key),
            KeyringOp::List => Ok(()),
        };
        applied.map_err(|e| MemberError::Rejected(e.to_string()))?;

        // Written under the lock; a failed write leaves the member unchanged.
        if member == self.local_member(scope) {
            if let Some(path) = self.files.get(&scope) {
                save_keyring_file(path, &keyring).map_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to persist keyring");
                    MemberError::Rejected(e.to_string())
                })?;
            }
        }
        m.keyring = keyring;
        Ok(m.reply())
    }

    async fn local_keyring(&self, scope: KeyringScope) -> Result<Option<Keyring>, KeyringError> {
        let pools = self.pools.lock().expect("keyring cluster lock poisoned");
        Ok(pools
            .get(&scope)
            .and_then(|pool| pool.get(self.local_member(scope)))
            .map(|m| m.keyring.clone()))
    }
}

impl std::fmt::Debug for MemoryCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCluster")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
