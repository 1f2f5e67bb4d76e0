// In-process stand-in for a Redis connection, used by unit tests
//
// Understands GET, SET (with EX), DEL, SCAN (MATCH/COUNT) and CLUSTER NODES. Expiry runs on
// tokio's clock so paused-time tests can advance past TTLs.

use redis::aio::ConnectionLike;
use redis::{Arg, Cmd, ErrorKind, Pipeline, RedisError, RedisFuture, RedisResult, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    vanish_after_scan: HashSet<String>,
    raw_scan_keys: Vec<Vec<u8>>,
    cluster_nodes: Option<String>,
    commands: Vec<Vec<String>>,
}

/// Shared fake keyspace; clones see the same data
#[derive(Clone)]
pub struct FakeRedis {
    state: Arc<Mutex<State>>,
    page_size: usize,
    /// `(index, total)` restricts SCAN to the keys owned by one shard
    shard: Option<(usize, usize)>,
    stalled: bool,
}

impl FakeRedis {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            page_size: 10,
            shard: None,
            stalled: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reply served for `CLUSTER NODES`
    pub fn with_cluster_nodes(self, reply: &str) -> Self {
        self.lock().cluster_nodes = Some(reply.to_string());
        self
    }

    /// Report `key` on the first SCAN page without storing it; lets tests
    /// emit keys that are not valid UTF-8
    pub fn add_raw_scan_key(&self, key: &[u8]) {
        self.lock().raw_scan_keys.push(key.to_vec());
    }

    /// A view over the same data whose SCAN only sees shard `index` of `total`
    pub fn node(&self, index: usize, total: usize) -> Self {
        Self {
            shard: Some((index, total)),
            ..self.clone()
        }
    }

    /// A view whose commands never complete
    pub fn stalled(&self) -> Self {
        Self {
            stalled: true,
            ..self.clone()
        }
    }

    pub fn shard_of(key: &str, total: usize) -> usize {
        key.bytes().map(usize::from).sum::<usize>() % total
    }

    pub fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        self.set_value(key, Value::Data(value.to_vec()), ttl);
    }

    pub fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock()
            .entries
            .insert(key.to_string(), Entry { value, expires_at });
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        match self.lock().entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.value {
                Value::Data(bytes) => Some(bytes.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Remaining time-to-live of a live key
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at - now)
    }

    /// Delete `key` right after a SCAN page has reported it
    pub fn vanish_after_scan(&self, key: &str) {
        self.lock().vanish_after_scan.insert(key.to_string());
    }

    /// Every command received so far, as its argument strings
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.lock().commands.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn execute(&self, cmd: &Cmd) -> RedisResult<Value> {
        let args: Vec<Vec<u8>> = cmd
            .args_iter()
            .map(|arg| match arg {
                Arg::Simple(bytes) => bytes.to_vec(),
                Arg::Cursor => b"0".to_vec(),
            })
            .collect();

        let text: Vec<String> = args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        self.lock().commands.push(text.clone());

        let name = text.first().map(|s| s.to_ascii_uppercase()).unwrap_or_default();
        match name.as_str() {
            "GET" => self.cmd_get(&text),
            "SET" => self.cmd_set(&text, &args),
            "DEL" => self.cmd_del(&text),
            "SCAN" => self.cmd_scan(&text),
            "CLUSTER" => self.cmd_cluster(&text),
            _ => Err(RedisError::from((
                ErrorKind::ResponseError,
                "unknown command",
                name,
            ))),
        }
    }

    fn cmd_get(&self, args: &[String]) -> RedisResult<Value> {
        let key = arg(args, 1)?;
        let now = Instant::now();
        let state = self.lock();
        Ok(match state.entries.get(key) {
            Some(entry) if entry.is_live(now) => entry.value.clone(),
            _ => Value::Nil,
        })
    }

    fn cmd_set(&self, args: &[String], raw: &[Vec<u8>]) -> RedisResult<Value> {
        let key = arg(args, 1)?;
        let value = raw.get(2).cloned().ok_or_else(syntax_error)?;

        let expires_at = match args.get(3).map(|s| s.to_ascii_uppercase()) {
            None => None,
            Some(opt) if opt == "EX" => {
                let secs: i64 = arg(args, 4)?.parse().map_err(|_| syntax_error())?;
                if secs <= 0 {
                    return Err(RedisError::from((
                        ErrorKind::ResponseError,
                        "invalid expire time in 'set' command",
                    )));
                }
                Some(Instant::now() + Duration::from_secs(secs as u64))
            }
            Some(_) => return Err(syntax_error()),
        };

        self.lock().entries.insert(
            key.to_string(),
            Entry {
                value: Value::Data(value),
                expires_at,
            },
        );
        Ok(Value::Okay)
    }

    fn cmd_del(&self, args: &[String]) -> RedisResult<Value> {
        let now = Instant::now();
        let mut state = self.lock();
        let mut removed = 0;
        for key in args.iter().skip(1) {
            if let Some(entry) = state.entries.remove(key)
                && entry.is_live(now)
            {
                removed += 1;
            }
        }
        Ok(Value::Int(removed))
    }

    fn cmd_scan(&self, args: &[String]) -> RedisResult<Value> {
        let cursor: usize = arg(args, 1)?.parse().map_err(|_| syntax_error())?;
        let mut pattern = "*".to_string();
        let mut page_size = self.page_size;

        let mut rest = args.iter().skip(2);
        while let Some(opt) = rest.next() {
            let value = rest.next().ok_or_else(syntax_error)?;
            match opt.to_ascii_uppercase().as_str() {
                "MATCH" => pattern = value.clone(),
                "COUNT" => page_size = value.parse().map_err(|_| syntax_error())?,
                _ => return Err(syntax_error()),
            }
        }

        let now = Instant::now();
        let mut state = self.lock();
        let matching: Vec<String> = state
            .entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && glob_match(&pattern, key))
            .filter(|(key, _)| {
                self.shard
                    .is_none_or(|(index, total)| Self::shard_of(key, total) == index)
            })
            .map(|(key, _)| key.clone())
            .collect();

        let end = (cursor + page_size.max(1)).min(matching.len());
        let page: Vec<String> = matching.get(cursor..end).unwrap_or_default().to_vec();
        let next = if end >= matching.len() { 0 } else { end };

        for key in &page {
            if state.vanish_after_scan.remove(key) {
                state.entries.remove(key);
            }
        }

        let mut keys: Vec<Value> = page.into_iter().map(|k| Value::Data(k.into_bytes())).collect();
        if cursor == 0 {
            keys.extend(state.raw_scan_keys.iter().cloned().map(Value::Data));
        }

        Ok(Value::Bulk(vec![
            Value::Data(next.to_string().into_bytes()),
            Value::Bulk(keys),
        ]))
    }

    fn cmd_cluster(&self, args: &[String]) -> RedisResult<Value> {
        let sub = arg(args, 1)?.to_ascii_uppercase();
        match (sub.as_str(), self.lock().cluster_nodes.clone()) {
            ("NODES", Some(reply)) => Ok(Value::Data(reply.into_bytes())),
            _ => Err(RedisError::from((
                ErrorKind::ResponseError,
                "This instance has cluster support disabled",
            ))),
        }
    }
}

impl Default for FakeRedis {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLike for FakeRedis {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        if self.stalled {
            return Box::pin(std::future::pending());
        }
        let result = self.execute(cmd);
        Box::pin(async move { result })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        _cmd: &'a Pipeline,
        _offset: usize,
        _count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        Box::pin(async {
            Err(RedisError::from((
                ErrorKind::ClientError,
                "pipelines are not supported by the fake",
            )))
        })
    }

    fn get_db(&self) -> i64 {
        0
    }
}

fn arg(args: &[String], index: usize) -> RedisResult<&str> {
    args.get(index).map(String::as_str).ok_or_else(syntax_error)
}

fn syntax_error() -> RedisError {
    RedisError::from((ErrorKind::ResponseError, "syntax error"))
}

/// Matches the subset of Redis globs the store emits: an escaped literal,
/// optionally followed by a trailing `*`.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    let mut wildcard = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    literal.push(escaped);
                }
            }
            '*' if chars.peek().is_none() => wildcard = true,
            c => literal.push(c),
        }
    }

    if wildcard {
        key.starts_with(&literal)
    } else {
        key == literal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match_literal_prefix() {
        assert!(glob_match("scs:session:*", "scs:session:abc"));
        assert!(!glob_match("scs:session:*", "other:abc"));
        assert!(glob_match(r"a\*b:*", "a*b:token"));
        assert!(!glob_match(r"a\*b:*", "axb:token"));
        assert!(glob_match("*", "anything"));
    }
}
