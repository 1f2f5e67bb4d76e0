// Session storage interfaces

use super::types::SessionMap;
use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Context-aware session store.
///
/// Every call is a single remote round trip (enumeration is a bounded sequence
/// of them) and aborts when `ctx` is cancelled or its deadline passes. Failures
/// are returned as-is; implementations never retry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the record for `token`.
    ///
    /// Returns `Ok(None)` if the token is unknown or its record has expired.
    async fn find_ctx(&self, ctx: &Context, token: &str) -> Result<Option<Vec<u8>>>;

    /// Store `data` under `token` until `expiry`, replacing any existing record
    /// and its expiry.
    async fn commit_ctx(
        &self,
        ctx: &Context,
        token: &str,
        data: &[u8],
        expiry: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove the record for `token`. Removing an unknown token succeeds.
    async fn delete_ctx(&self, ctx: &Context, token: &str) -> Result<()>;

    /// Every live token mapped to its record
    async fn all_ctx(&self, ctx: &Context) -> Result<SessionMap>;
}

/// Context-less store operations.
///
/// These exist so the store can be handed to callers typed against the older,
/// context-free interface. They are not usable: every method panics. Use the
/// `*_ctx` methods of [`SessionStore`] instead.
pub trait LegacySessionStore {
    /// # Panics
    ///
    /// Always. Use [`SessionStore::find_ctx`].
    fn find(&self, token: &str) -> Result<Option<Vec<u8>>>;

    /// # Panics
    ///
    /// Always. Use [`SessionStore::commit_ctx`].
    fn commit(&self, token: &str, data: &[u8], expiry: DateTime<Utc>) -> Result<()>;

    /// # Panics
    ///
    /// Always. Use [`SessionStore::delete_ctx`].
    fn delete(&self, token: &str) -> Result<()>;
}
