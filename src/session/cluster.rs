// Cluster topology discovery for enumeration
//
// SCAN is a per-node command, so enumerating a cluster needs one connection per
// primary. The primaries are read from `CLUSTER NODES` rather than trusted from
// the seed list, which may be partial or contain replicas.

use redis::aio::ConnectionLike;
use redis::{ConnectionAddr, ConnectionInfo, ErrorKind, RedisError, RedisResult};
use tracing::debug;

/// Address of a primary node as reported by `CLUSTER NODES`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClusterPrimary {
    pub host: String,
    pub port: u16,
}

/// Parse a `CLUSTER NODES` reply into the set of reachable primaries.
///
/// Each line reads `<id> <ip:port@cport[,hostname]> <flags> <master-id> ...`.
/// Replicas, failed primaries and nodes without an address are skipped. The
/// result is sorted and free of duplicates.
pub fn parse_cluster_nodes(reply: &str) -> Vec<ClusterPrimary> {
    let mut primaries: Vec<ClusterPrimary> = reply
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _id = fields.next()?;
            let address = fields.next()?;
            let flags = fields.next()?;

            let flags: Vec<&str> = flags.split(',').collect();
            if !flags.contains(&"master")
                || flags
                    .iter()
                    .any(|f| matches!(*f, "fail" | "noaddr" | "handshake"))
            {
                return None;
            }

            // Drop the cluster-bus port and optional hostname
            let address = address.split(['@', ',']).next()?;
            let (host, port) = address.rsplit_once(':')?;
            if host.is_empty() {
                return None;
            }
            let port = port.parse().ok().filter(|p| *p != 0)?;

            Some(ClusterPrimary {
                host: host.to_string(),
                port,
            })
        })
        .collect();

    primaries.sort();
    primaries.dedup();
    primaries
}

/// Ask the cluster for its current primaries
pub async fn discover_primaries<C>(conn: &mut C) -> RedisResult<Vec<ClusterPrimary>>
where
    C: ConnectionLike + Send,
{
    let reply: String = redis::cmd("CLUSTER").arg("NODES").query_async(conn).await?;
    let primaries = parse_cluster_nodes(&reply);

    if primaries.is_empty() {
        return Err(RedisError::from((
            ErrorKind::ClientError,
            "CLUSTER NODES reported no reachable primaries",
        )));
    }

    debug!("Discovered {} cluster primary node(s)", primaries.len());
    Ok(primaries)
}

/// Connection info for `primary`, reusing the seed's TLS mode, credentials and
/// protocol settings
pub fn primary_connection_info(
    seed: &ConnectionInfo,
    primary: &ClusterPrimary,
) -> RedisResult<ConnectionInfo> {
    let mut info = seed.clone();
    match &mut info.addr {
        ConnectionAddr::Tcp(host, port) => {
            *host = primary.host.clone();
            *port = primary.port;
        }
        ConnectionAddr::TcpTls { host, port, .. } => {
            *host = primary.host.clone();
            *port = primary.port;
        }
        _ => {
            return Err(RedisError::from((
                ErrorKind::InvalidClientConfig,
                "cluster seed must be a TCP address",
            )));
        }
    }
    Ok(info)
}

/// Discover the primaries and build a connection info for each from `seed`
pub async fn discover_primary_infos<C>(
    conn: &mut C,
    seed: &ConnectionInfo,
) -> RedisResult<Vec<ConnectionInfo>>
where
    C: ConnectionLike + Send,
{
    discover_primaries(conn)
        .await?
        .iter()
        .map(|primary| primary_connection_info(seed, primary))
        .collect()
}
