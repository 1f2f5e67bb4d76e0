use crate::context::Context;
use crate::session::cluster::discover_primary_infos;
use crate::session::{DEFAULT_PREFIX, RedisStore};
use redis::{ErrorKind, IntoConnectionInfo, RedisError, RedisResult};
use redis::aio::MultiplexedConnection;
use redis::cluster_async::ClusterConnection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable pointing at a YAML config file
pub const CONFIG_PATH_ENV: &str = "SESSION_STORE_CONFIG";

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis URL for a standalone server (e.g. `redis://127.0.0.1/`)
    #[serde(default)]
    pub redis_url: String,
    /// Key prefix isolating this store's keyspace
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Cluster seed URLs; when non-empty the store runs in cluster mode and
    /// enumerates every primary discovered from the seeds
    #[serde(default)]
    pub cluster_nodes: Vec<String>,
    /// `COUNT` hint for enumeration scans
    #[serde(default)]
    pub scan_count: Option<usize>,
    /// Deadline applied to contexts built with [`StoreConfig::context`]
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1/".to_string(),
            prefix: default_prefix(),
            cluster_nodes: Vec::new(),
            scan_count: None,
            operation_timeout_secs: None,
        }
    }
}

impl StoreConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err("Session key prefix must not be empty".to_string());
        }

        if self.cluster_nodes.is_empty() {
            if self.redis_url.is_empty() {
                return Err("Either redis_url or cluster_nodes must be configured".to_string());
            }
            redis::Client::open(self.redis_url.as_str())
                .map_err(|e| format!("Invalid redis_url '{}': {}", self.redis_url, e))?;
        }

        for node in &self.cluster_nodes {
            redis::Client::open(node.as_str())
                .map_err(|e| format!("Invalid cluster node '{}': {}", node, e))?;
        }

        if self.scan_count == Some(0) {
            return Err("scan_count must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn is_cluster(&self) -> bool {
        !self.cluster_nodes.is_empty()
    }

    /// Build a configuration from environment variables, starting from defaults.
    ///
    /// Reads `REDIS_URL`, `REDIS_CLUSTER_NODES` (comma separated), `SESSION_PREFIX`,
    /// `SESSION_SCAN_COUNT` and `SESSION_OPERATION_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(nodes) = lookup("REDIS_CLUSTER_NODES") {
            config.cluster_nodes = nodes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(prefix) = lookup("SESSION_PREFIX") {
            config.prefix = prefix;
        }
        if let Some(count) = lookup("SESSION_SCAN_COUNT") {
            let count = count
                .parse()
                .map_err(|e| format!("Invalid SESSION_SCAN_COUNT '{}': {}", count, e))?;
            config.scan_count = Some(count);
        }
        if let Some(secs) = lookup("SESSION_OPERATION_TIMEOUT_SECS") {
            let secs = secs
                .parse()
                .map_err(|e| format!("Invalid SESSION_OPERATION_TIMEOUT_SECS '{}': {}", secs, e))?;
            config.operation_timeout_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// A fresh context carrying the configured operation timeout, if any
    pub fn context(&self) -> Context {
        match self.operation_timeout_secs {
            Some(secs) => Context::with_timeout(Duration::from_secs(secs)),
            None => Context::background(),
        }
    }

    /// Open a multiplexed connection to the standalone server
    pub async fn open_connection(&self) -> RedisResult<MultiplexedConnection> {
        let client = redis::Client::open(self.redis_url.as_str())?;
        client.get_multiplexed_tokio_connection().await
    }

    /// Open a cluster connection for key commands plus one connection per
    /// primary for enumeration.
    ///
    /// `cluster_nodes` is only the seed list. The primaries are discovered from
    /// `CLUSTER NODES`, so a partial seed list or one naming replicas still
    /// scans the whole keyspace. Credentials and TLS settings come from the
    /// first seed URL.
    pub async fn open_cluster(
        &self,
    ) -> RedisResult<(ClusterConnection, Vec<MultiplexedConnection>)> {
        let seed = match self.cluster_nodes.first() {
            Some(url) => url.as_str().into_connection_info()?,
            None => {
                return Err(RedisError::from((
                    ErrorKind::InvalidClientConfig,
                    "cluster_nodes is empty",
                )));
            }
        };

        let cluster = redis::cluster::ClusterClient::new(self.cluster_nodes.clone())?;
        let mut conn = cluster.get_async_connection().await?;

        let infos = discover_primary_infos(&mut conn, &seed).await?;
        let mut nodes = Vec::with_capacity(infos.len());
        for info in infos {
            let client = redis::Client::open(info)?;
            nodes.push(client.get_multiplexed_tokio_connection().await?);
        }

        info!(
            "Opened cluster session store scanning {} primary node(s)",
            nodes.len()
        );
        Ok((conn, nodes))
    }

    /// Open the cluster and wrap it in a store that enumerates every primary
    pub async fn open_cluster_store(
        &self,
    ) -> RedisResult<RedisStore<ClusterConnection, MultiplexedConnection>> {
        let (conn, nodes) = self.open_cluster().await?;
        Ok(self.cluster_store(conn, nodes))
    }

    /// Wrap a caller-owned connection in a store using this configuration
    pub fn store<C: Clone>(&self, conn: C) -> RedisStore<C> {
        let store = RedisStore::with_prefix(conn, self.prefix.clone());
        match self.scan_count {
            Some(count) => store.with_scan_count(count),
            None => store,
        }
    }

    /// Wrap caller-owned cluster connections in a store using this configuration
    pub fn cluster_store<C: Clone, N>(&self, conn: C, nodes: Vec<N>) -> RedisStore<C, N> {
        self.store(conn).with_nodes(nodes)
    }
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StoreConfig, String> {
    let path = path.as_ref();
    info!("Loading session store configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config: StoreConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse YAML config: {}", e))?;

    config.validate()?;

    info!(
        "Session store configured with prefix '{}' ({})",
        config.prefix,
        if config.is_cluster() {
            format!("cluster, {} node(s)", config.cluster_nodes.len())
        } else {
            "standalone".to_string()
        }
    );

    Ok(config)
}

/// Load configuration with fallback options
///
/// Tries the file named by `SESSION_STORE_CONFIG`, then `session-store.yaml` /
/// `session-store.yml` in the working directory, then environment variables
/// (after loading a `.env` file if present).
pub fn load_config_with_fallback() -> Result<StoreConfig, String> {
    dotenvy::dotenv().ok();

    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        match load_config(&config_path) {
            Ok(config) => return Ok(config),
            Err(e) => warn!(
                "Failed to load config from {} ({}): {}",
                CONFIG_PATH_ENV, config_path, e
            ),
        }
    }

    for path in ["session-store.yaml", "session-store.yml"] {
        if Path::new(path).exists() {
            match load_config(path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from '{}': {}", path, e),
            }
        }
    }

    info!("No session store config file found, using environment");
    StoreConfig::from_env()
}
