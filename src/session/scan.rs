// Cursor-based keyspace scanning

use futures::Stream;
use redis::{RedisError, RedisResult};
use redis::aio::ConnectionLike;
use tracing::trace;

/// Cursor value that starts a scan and signals its completion
pub const SCAN_START: u64 = 0;

/// One page of a `SCAN` iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// UTF-8 keys matched on this page (possibly none)
    pub keys: Vec<String>,
    /// Cursor to resume from; [`SCAN_START`] once the scan is complete
    pub cursor: u64,
}

impl ScanPage {
    pub fn is_last(&self) -> bool {
        self.cursor == SCAN_START
    }
}

struct ScanState<N> {
    node: N,
    pattern: String,
    count: Option<usize>,
    cursor: Option<u64>,
}

/// Lazily scan a single node for keys matching `pattern`.
///
/// Pages are fetched on demand; the stream ends after the page whose cursor
/// returns to [`SCAN_START`], or after the first error.
pub fn scan_pages<N>(
    node: N,
    pattern: String,
    count: Option<usize>,
) -> impl Stream<Item = RedisResult<ScanPage>> + Send
where
    N: ConnectionLike + Send + 'static,
{
    scan_pages_from(node, pattern, SCAN_START, count)
}

/// Resume a scan from `cursor`, as returned by a previous [`ScanPage`].
pub fn scan_pages_from<N>(
    node: N,
    pattern: String,
    cursor: u64,
    count: Option<usize>,
) -> impl Stream<Item = RedisResult<ScanPage>> + Send
where
    N: ConnectionLike + Send + 'static,
{
    let state = ScanState {
        node,
        pattern,
        count,
        cursor: Some(cursor),
    };

    futures::stream::try_unfold(state, |mut state| async move {
        let Some(cursor) = state.cursor else {
            return Ok::<_, RedisError>(None);
        };

        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(&state.pattern);
        if let Some(count) = state.count {
            cmd.arg("COUNT").arg(count);
        }

        let (next, raw): (u64, Vec<Vec<u8>>) = cmd.query_async(&mut state.node).await?;
        let reported = raw.len();

        // Keys that are not UTF-8 cannot belong to a string token
        let keys: Vec<String> = raw
            .into_iter()
            .filter_map(|key| String::from_utf8(key).ok())
            .collect();
        trace!(
            "SCAN {} returned {} key(s) ({} skipped), next cursor {}",
            cursor,
            keys.len(),
            reported - keys.len(),
            next
        );

        state.cursor = (next != SCAN_START).then_some(next);
        Ok(Some((ScanPage { keys, cursor: next }, state)))
    })
}
