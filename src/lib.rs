//! Redis-backed session record store.
//!
//! Persists opaque session records under `<prefix><token>` keys with a Redis
//! TTL derived from each record's absolute expiry. Lookup, upsert, delete and
//! full enumeration all take a [`Context`] that can cancel or time out the
//! remote call.
//!
//! ```rust,ignore
//! use session_redis_store::{Context, RedisStore, SessionStore};
//!
//! let conn = redis::Client::open("redis://127.0.0.1/")?
//!     .get_multiplexed_tokio_connection()
//!     .await?;
//! let store = RedisStore::new(conn);
//! let ctx = Context::with_timeout(std::time::Duration::from_secs(2));
//!
//! store.commit_ctx(&ctx, "token", b"payload", expiry).await?;
//! let data = store.find_ctx(&ctx, "token").await?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod session;

pub use config::{StoreConfig, load_config, load_config_with_fallback};
pub use context::Context;
pub use error::{Result, StoreError};
pub use session::{
    DEFAULT_PREFIX, LegacySessionStore, RedisStore, ScanPage, SessionMap, SessionStore,
};
