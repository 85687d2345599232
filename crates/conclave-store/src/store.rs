use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{KvEntry, Node, QueryMeta, QueryOptions};

/// The consensus-backed state the gateway reads and writes.
///
/// Reads honour blocking semantics: with `min_query_index > 0` they wait
/// until the backing index moves past it or `max_query_time` elapses.
/// Every call authorizes `opts.token` itself.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn kv_get(
        &self,
        key: &str,
        opts: &QueryOptions,
    ) -> Result<(Option<KvEntry>, QueryMeta), StoreError>;

    /// Every entry whose key starts with `prefix`, sorted by key.
    async fn kv_list(
        &self,
        prefix: &str,
        opts: &QueryOptions,
    ) -> Result<(Vec<KvEntry>, QueryMeta), StoreError>;

    async fn kv_put(
        &self,
        key: &str,
        value: Vec<u8>,
        flags: u64,
        opts: &QueryOptions,
    ) -> Result<bool, StoreError>;

    /// Delete `key`, or every key under it when `recurse` is set.
    async fn kv_delete(
        &self,
        key: &str,
        recurse: bool,
        opts: &QueryOptions,
    ) -> Result<bool, StoreError>;

    async fn catalog_nodes(&self, opts: &QueryOptions)
        -> Result<(Vec<Node>, QueryMeta), StoreError>;

    /// Address of the current leader, empty when there is none.
    async fn leader(&self, opts: &QueryOptions) -> Result<String, StoreError>;
}
