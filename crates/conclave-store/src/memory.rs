//! In-process state store with blocking-query support.
//!
//! Every write bumps one store-wide modify index and publishes it on the
//! written table's watch channel. Blocking reads subscribe to that channel
//! and return as soon as the table index moves past the caller's minimum.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use conclave_acl::{AccessGuard, Capability};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::store::StateStore;
use crate::types::{KvEntry, Node, QueryMeta, QueryOptions};

/// Blocking wait used when the caller does not set one.
pub const DEFAULT_MAX_QUERY_TIME: Duration = Duration::from_secs(300);

/// Hard ceiling on any blocking wait.
pub const MAX_QUERY_TIME: Duration = Duration::from_secs(600);

#[derive(Default)]
struct Tables {
    index: u64,
    kv: BTreeMap<String, KvEntry>,
    nodes: BTreeMap<String, Node>,
}

pub struct MemoryStore {
    guard: AccessGuard,
    datacenter: String,
    leader: Mutex<Option<String>>,
    tables: Mutex<Tables>,
    kv_index: watch::Sender<u64>,
    nodes_index: watch::Sender<u64>,
}

impl MemoryStore {
    /// Empty store for `datacenter`, led by `leader` if set.
    pub fn new(guard: AccessGuard, datacenter: impl Into<String>, leader: Option<String>) -> Self {
        let (kv_index, _) = watch::channel(0);
        let (nodes_index, _) = watch::channel(0);
        Self {
            guard,
            datacenter: datacenter.into(),
            leader: Mutex::new(leader),
            tables: Mutex::new(Tables::default()),
            kv_index,
            nodes_index,
        }
    }

    pub fn set_leader(&self, leader: Option<String>) {
        *self.leader.lock().expect("store leader lock poisoned") = leader;
    }

    /// Add or replace a catalog node. Returns the new modify index.
    pub fn register_node(&self, node: Node) -> u64 {
        let mut tables = self.tables.lock().expect("store tables lock poisoned");
        tables.index += 1;
        let index = tables.index;
        tables.nodes.insert(node.node.clone(), node);
        self.nodes_index.send_replace(index);
        index
    }

    /// Current store-wide modify index.
    pub fn index(&self) -> u64 {
        self.tables.lock().expect("store tables lock poisoned").index
    }

    fn leader(&self) -> Option<String> {
        self.leader.lock().expect("store leader lock poisoned").clone()
    }

    /// Datacenter, ACL and consistency checks shared by every read.
    async fn admit(
        &self,
        opts: &QueryOptions,
        capability: Option<Capability>,
    ) -> Result<QueryMeta, StoreError> {
        if !opts.datacenter.is_empty() && opts.datacenter != self.datacenter {
            return Err(StoreError::NoPathToDatacenter);
        }
        if let Some(capability) = capability {
            self.guard.authorize(&opts.token, capability).await?;
        }
        let known_leader = self.leader().is_some();
        if !known_leader && !opts.allow_stale {
            return Err(StoreError::NoLeader);
        }
        Ok(QueryMeta {
            index: 0,
            last_contact: Duration::ZERO,
            known_leader,
        })
    }

    async fn block(&self, table: &watch::Sender<u64>, opts: &QueryOptions) {
        if opts.min_query_index == 0 {
            return;
        }
        let wait = opts
            .max_query_time
            .unwrap_or(DEFAULT_MAX_QUERY_TIME)
            .min(MAX_QUERY_TIME);
        let deadline = Instant::now() + wait;
        let mut rx = table.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if current > opts.min_query_index {
                return;
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                _ => return,
            }
        }
    }

    fn write_kv(&self, f: impl FnOnce(&mut Tables, u64) -> bool) {
        let mut tables = self.tables.lock().expect("store tables lock poisoned");
        let next = tables.index + 1;
        if f(&mut tables, next) {
            tables.index = next;
            self.kv_index.send_replace(next);
        }
    }
}

/// Responses never carry index 0, so a client echoing it back still blocks.
fn table_index(table: &watch::Sender<u64>) -> u64 {
    (*table.borrow()).max(1)
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn kv_get(
        &self,
        key: &str,
        opts: &QueryOptions,
    ) -> Result<(Option<KvEntry>, QueryMeta), StoreError> {
        let mut meta = self.admit(opts, Some(Capability::KeyRead)).await?;
        self.block(&self.kv_index, opts).await;

        let tables = self.tables.lock().expect("store tables lock poisoned");
        meta.index = table_index(&self.kv_index);
        Ok((tables.kv.get(key).cloned(), meta))
    }

    async fn kv_list(
        &self,
        prefix: &str,
        opts: &QueryOptions,
    ) -> Result<(Vec<KvEntry>, QueryMeta), StoreError> {
        let mut meta = self.admit(opts, Some(Capability::KeyRead)).await?;
        self.block(&self.kv_index, opts).await;

        let tables = self.tables.lock().expect("store tables lock poisoned");
        meta.index = table_index(&self.kv_index);
        let entries = tables
            .kv
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect();
        Ok((entries, meta))
    }

    async fn kv_put(
        &self,
        key: &str,
        value: Vec<u8>,
        flags: u64,
        opts: &QueryOptions,
    ) -> Result<bool, StoreError> {
        self.admit(opts, Some(Capability::KeyWrite)).await?;
        self.write_kv(|tables, index| {
            let create_index = tables.kv.get(key).map_or(index, |e| e.create_index);
            tables.kv.insert(
                key.to_string(),
                KvEntry {
                    key: key.to_string(),
                    value,
                    flags,
                    create_index,
                    modify_index: index,
                },
            );
            true
        });
        Ok(true)
    }

    async fn kv_delete(
        &self,
        key: &str,
        recurse: bool,
        opts: &QueryOptions,
    ) -> Result<bool, StoreError> {
        self.admit(opts, Some(Capability::KeyWrite)).await?;
        self.write_kv(|tables, _| {
            let before = tables.kv.len();
            if recurse {
                tables.kv.retain(|k, _| !k.starts_with(key));
            } else {
                tables.kv.remove(key);
            }
            tables.kv.len() != before
        });
        Ok(true)
    }

    async fn catalog_nodes(
        &self,
        opts: &QueryOptions,
    ) -> Result<(Vec<Node>, QueryMeta), StoreError> {
        let mut meta = self.admit(opts, Some(Capability::NodeRead)).await?;
        self.block(&self.nodes_index, opts).await;

        let tables = self.tables.lock().expect("store tables lock poisoned");
        meta.index = table_index(&self.nodes_index);
        let mut nodes: Vec<Node> = tables
            .nodes
            .values()
            .filter(|n| n.matches_meta(&opts.node_meta_filters))
            .cloned()
            .collect();

        let near = &opts.source.node;
        if !near.is_empty() {
            if let Some(pos) = nodes.iter().position(|n| &n.node == near) {
                let source = nodes.remove(pos);
                nodes.insert(0, source);
            }
        }
        Ok((nodes, meta))
    }

    async fn leader(&self, opts: &QueryOptions) -> Result<String, StoreError> {
        if !opts.datacenter.is_empty() && opts.datacenter != self.datacenter {
            return Err(StoreError::NoPathToDatacenter);
        }
        Ok(self.leader().unwrap_or_default())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("datacenter", &self.datacenter)
            .finish_non_exhaustive()
    }
}
