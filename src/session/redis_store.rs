// Redis-backed session store
// Persists opaque session records under a prefixed keyspace with server-side expiry

use super::scan::scan_pages;
use super::storage::{LegacySessionStore, SessionStore};
use super::types::{DEFAULT_PREFIX, SessionMap, match_pattern, ttl_seconds};
use crate::context::Context;
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use redis::Value;
use redis::aio::ConnectionLike;
use std::pin::pin;
use tracing::{debug, trace};

/// Session store over a Redis connection.
///
/// Records live at `<prefix><token>` as plain string values with a Redis TTL.
/// The store never opens or closes connections: it holds clones of the handles
/// it was given, and those stay owned by the caller.
///
/// `C` carries key operations (GET/SET/DEL). `N` is the per-node connection used
/// for enumeration; for a standalone server it is the same connection, for a
/// cluster it is one connection per primary.
pub struct RedisStore<C, N = C> {
    /// Connection used for single-key commands
    conn: C,
    /// Connections scanned during enumeration, one per node
    nodes: Vec<N>,
    /// Keyspace prefix, fixed for the store's lifetime
    prefix: String,
    /// Optional `COUNT` hint sent with each SCAN
    scan_count: Option<usize>,
}

impl<C: Clone> RedisStore<C> {
    /// Create a store using the default `scs:session:` prefix.
    ///
    /// Enumeration scans `conn` itself, which only covers a standalone server.
    /// A cluster connection routes SCAN to a single node, so pair it with
    /// [`RedisStore::with_nodes`] (one connection per primary) or build the
    /// store through [`StoreConfig::open_cluster`](crate::StoreConfig::open_cluster).
    pub fn new(conn: C) -> Self {
        Self::with_prefix(conn, DEFAULT_PREFIX)
    }

    /// Create a store using a custom key prefix.
    ///
    /// The same single-node caveat as [`RedisStore::new`] applies to enumeration.
    pub fn with_prefix(conn: C, prefix: impl Into<String>) -> Self {
        Self {
            nodes: vec![conn.clone()],
            conn,
            prefix: prefix.into(),
            scan_count: None,
        }
    }
}

impl<C, N> RedisStore<C, N> {
    /// Scan these connections instead of the main one when enumerating
    pub fn with_nodes<M>(self, nodes: Vec<M>) -> RedisStore<C, M> {
        RedisStore {
            conn: self.conn,
            nodes,
            prefix: self.prefix,
            scan_count: self.scan_count,
        }
    }

    /// Send `COUNT count` with every SCAN
    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = Some(count);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Storage key for a session token
    pub fn key_for(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }

    /// Session token for a storage key, if the key belongs to this store
    pub fn token_for<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
    }
}

#[async_trait]
impl<C, N> SessionStore for RedisStore<C, N>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
    N: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn find_ctx(&self, ctx: &Context, token: &str) -> Result<Option<Vec<u8>>> {
        let key = self.key_for(token);
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("GET");
        cmd.arg(&key);
        let reply: Value = ctx.run(cmd.query_async(&mut conn)).await?;

        match reply {
            Value::Nil => Ok(None),
            Value::Data(bytes) => Ok(Some(bytes)),
            other => Err(StoreError::Parse(format!(
                "expected a bulk string for GET, got {:?}",
                other
            ))),
        }
    }

    async fn commit_ctx(
        &self,
        ctx: &Context,
        token: &str,
        data: &[u8],
        expiry: DateTime<Utc>,
    ) -> Result<()> {
        let key = self.key_for(token);
        let ttl = ttl_seconds(expiry, Utc::now());
        let mut conn = self.conn.clone();

        trace!("Committing {} byte(s) with ttl {}s", data.len(), ttl);

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(data).arg("EX").arg(ttl);
        let _: () = ctx.run(cmd.query_async(&mut conn)).await?;

        Ok(())
    }

    async fn delete_ctx(&self, ctx: &Context, token: &str) -> Result<()> {
        let key = self.key_for(token);
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("DEL");
        cmd.arg(&key);
        let _: () = ctx.run(cmd.query_async(&mut conn)).await?;

        Ok(())
    }

    async fn all_ctx(&self, ctx: &Context) -> Result<SessionMap> {
        let pattern = match_pattern(&self.prefix);
        let mut sessions = SessionMap::new();

        for node in &self.nodes {
            let mut pages = pin!(scan_pages(node.clone(), pattern.clone(), self.scan_count));

            while let Some(page) = ctx.run(pages.try_next()).await? {
                for key in &page.keys {
                    let Some(token) = self.token_for(key) else {
                        continue;
                    };

                    // The key may have expired or been deleted since the scan saw it
                    if let Some(data) = self.find_ctx(ctx, token).await? {
                        sessions.insert(token.to_string(), data);
                    }
                }
            }
        }

        debug!(
            "Enumerated {} session(s) across {} node(s)",
            sessions.len(),
            self.nodes.len()
        );

        Ok(sessions)
    }
}

impl<C, N> LegacySessionStore for RedisStore<C, N> {
    fn find(&self, _token: &str) -> Result<Option<Vec<u8>>> {
        panic!("missing context arg: RedisStore::find is unsupported, use find_ctx")
    }

    fn commit(&self, _token: &str, _data: &[u8], _expiry: DateTime<Utc>) -> Result<()> {
        panic!("missing context arg: RedisStore::commit is unsupported, use commit_ctx")
    }

    fn delete(&self, _token: &str) -> Result<()> {
        panic!("missing context arg: RedisStore::delete is unsupported, use delete_ctx")
    }
}
