//! Gateway operations: read, write and delete.
//!
//! Each operation fans its per-key store calls out onto the blocking pool
//! and waits for all of them. Every key is attempted; if any fails, the
//! first failure is reported and keys that succeeded stay written.

use crate::auth::{Credentials, ReadGrant, WriteGrant};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use mediasync_protocol::{
    parse_key_list, sanitize_list, DeleteRequest, StatusBody, WriteBody, MAX_KEYS_PER_REQUEST,
};
use mediasync_storage::{KvStore, StorageError};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What a write did with each key of the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Keys replaced with a validated list.
    pub written: Vec<String>,
    /// Keys reset to an empty list.
    pub cleared: Vec<String>,
    /// Keys ignored for failing the allow-list or not holding an array.
    pub skipped: Vec<String>,
    /// Keys left untouched because no record survived validation.
    pub rejected: Vec<String>,
}

impl WriteSummary {
    /// Number of keys that were stored.
    pub fn stored(&self) -> usize {
        self.written.len() + self.cleared.len()
    }
}

/// The sync gateway.
///
/// Holds the configuration, the secrets derived from it and the store
/// binding. A gateway without a store answers every request with an
/// internal error.
pub struct Gateway {
    config: GatewayConfig,
    credentials: Credentials,
    store: Option<Arc<dyn KvStore>>,
}

impl Gateway {
    /// Creates a gateway over `store`.
    pub fn new(config: GatewayConfig, store: Arc<dyn KvStore>) -> Self {
        Self::with_store(config, Some(store))
    }

    /// Creates a gateway with an optional store binding.
    pub fn with_store(config: GatewayConfig, store: Option<Arc<dyn KvStore>>) -> Self {
        let credentials = Credentials::from_config(&config);
        Self {
            config,
            credentials,
            store,
        }
    }

    /// Returns the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Fails if no store is bound.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StoreNotConfigured`].
    pub fn check_store(&self) -> GatewayResult<()> {
        self.store().map(|_| ())
    }

    /// Authorizes a read with the presented secret.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] on mismatch.
    pub fn authorize_read(&self, api_key: Option<&str>) -> GatewayResult<ReadGrant> {
        let grant = self.credentials.authorize_read(api_key);
        if grant.is_err() {
            warn!("read authorization failed");
        }
        grant
    }

    /// Authorizes a write or delete with the presented secret.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] on mismatch.
    pub fn authorize_write(&self, api_key: Option<&str>) -> GatewayResult<WriteGrant> {
        let grant = self.credentials.authorize_write(api_key);
        if grant.is_err() {
            warn!("write authorization failed");
        }
        grant
    }

    /// Reads the lists named by a comma-separated `keys` parameter.
    ///
    /// Disallowed names are dropped and at most
    /// [`MAX_KEYS_PER_REQUEST`] keys are read. A key with nothing stored
    /// maps to an empty list. A missing or empty parameter yields an
    /// empty object.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unbound or any read fails.
    pub async fn read(
        &self,
        _grant: ReadGrant,
        keys_param: Option<&str>,
    ) -> GatewayResult<Map<String, Value>> {
        let store = self.store()?;
        let Some(param) = keys_param.filter(|p| !p.is_empty()) else {
            return Ok(Map::new());
        };

        let keys = dedup(
            self.config
                .key_policy
                .select_keys(parse_key_list(param), MAX_KEYS_PER_REQUEST),
        );

        let values = fan_out(store, keys.clone(), |store, key| {
            let value = match store.get(&key)? {
                Some(text) => decode_stored(&key, &text)?,
                None => Value::Array(Vec::new()),
            };
            Ok((key, value))
        })
        .await?;

        let mut values: HashMap<String, Value> = values.into_iter().collect();
        let mut out = Map::new();
        for key in keys {
            let value = values.remove(&key).unwrap_or(Value::Array(Vec::new()));
            out.insert(key, value);
        }
        debug!(keys = out.len(), "read lists");
        Ok(out)
    }

    /// Replaces lists from a raw write body.
    ///
    /// Entries whose key fails the allow-list or whose value is not an
    /// array are skipped. An empty array resets the key. Otherwise the list
    /// is truncated to the configured item limit and validated; if nothing
    /// survives, the key is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is too large, is not a JSON object, the
    /// store is unbound, or any write fails.
    pub async fn write(&self, _grant: WriteGrant, body: &[u8]) -> GatewayResult<WriteSummary> {
        let store = self.store()?;
        self.check_size(body)?;
        let body = WriteBody::parse(body)?;

        let mut summary = WriteSummary::default();
        let mut puts = Vec::new();
        for (key, value) in body.into_entries() {
            if !self.config.key_policy.is_allowed(&key) {
                debug!(key = %key, "skipping disallowed key");
                summary.skipped.push(key);
                continue;
            }
            let Value::Array(items) = value else {
                debug!(key = %key, "skipping non-array value");
                summary.skipped.push(key);
                continue;
            };
            if items.is_empty() {
                puts.push((key.clone(), "[]".to_string()));
                summary.cleared.push(key);
                continue;
            }

            let safe = sanitize_list(&items, self.config.max_items);
            if safe.is_empty() {
                debug!(key = %key, submitted = items.len(), "no valid records, key untouched");
                summary.rejected.push(key);
                continue;
            }
            let text = serde_json::to_string(&safe)
                .map_err(|e| GatewayError::Internal(format!("encoding {key}: {e}")))?;
            puts.push((key.clone(), text));
            summary.written.push(key);
        }

        fan_out(store, puts, |store, (key, text)| {
            store.put(&key, &text)?;
            Ok(())
        })
        .await?;

        info!(
            written = summary.written.len(),
            cleared = summary.cleared.len(),
            skipped = summary.skipped.len(),
            rejected = summary.rejected.len(),
            "write applied"
        );
        Ok(summary)
    }

    /// Applies a raw delete body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PurgeDenied`] when a purge names a key
    /// outside the allow-list, and an error if the body is too large, the
    /// store is unbound, or any store call fails.
    pub async fn delete(&self, _grant: WriteGrant, body: &[u8]) -> GatewayResult<StatusBody> {
        let store = self.store()?;
        self.check_size(body)?;

        match DeleteRequest::parse(body) {
            DeleteRequest::Purge { key } => {
                if !self.config.key_policy.is_allowed(&key) {
                    warn!(key = %key, "purge denied");
                    return Err(GatewayError::PurgeDenied { key });
                }
                fan_out(store, vec![key.clone()], |store, key| {
                    store.delete(&key)?;
                    Ok(())
                })
                .await?;
                info!(key = %key, "purged key");
                Ok(StatusBody::KeyDeleted { key })
            }
            DeleteRequest::RemoveUrl { url, keys } => {
                let keys = dedup(
                    self.config
                        .key_policy
                        .select_keys(keys, MAX_KEYS_PER_REQUEST),
                );
                let target = Arc::new(url);
                let rewritten = {
                    let target = Arc::clone(&target);
                    fan_out(store, keys, move |store, key| {
                        remove_url_from(store, &key, &target)
                    })
                    .await?
                };
                let rewritten = rewritten.into_iter().filter(|r| *r).count();
                info!(url = %target, rewritten, "removed url");
                Ok(StatusBody::SingleDeleted)
            }
            DeleteRequest::Ignored => {
                debug!("delete body had no recognized shape");
                Ok(StatusBody::Ignored)
            }
        }
    }

    fn store(&self) -> GatewayResult<Arc<dyn KvStore>> {
        self.store
            .as_ref()
            .map(Arc::clone)
            .ok_or(GatewayError::StoreNotConfigured)
    }

    fn check_size(&self, body: &[u8]) -> GatewayResult<()> {
        if body.len() > self.config.max_body_bytes {
            debug!(size = body.len(), limit = self.config.max_body_bytes, "body too large");
            return Err(GatewayError::PayloadTooLarge {
                limit: self.config.max_body_bytes,
            });
        }
        Ok(())
    }
}

/// Runs `op` for every job on the blocking pool.
///
/// All jobs run to completion. The first failure, in completion order, is
/// returned after the rest have finished.
async fn fan_out<J, T, F>(store: Arc<dyn KvStore>, jobs: Vec<J>, op: F) -> GatewayResult<Vec<T>>
where
    J: Send + 'static,
    T: Send + 'static,
    F: Fn(&dyn KvStore, J) -> GatewayResult<T> + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let mut tasks = JoinSet::new();
    for job in jobs {
        let store = Arc::clone(&store);
        let op = Arc::clone(&op);
        tasks.spawn_blocking(move || op(store.as_ref(), job));
    }

    let mut results = Vec::with_capacity(tasks.len());
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|e| GatewayError::Internal(format!("store task failed: {e}")));
        match outcome.and_then(|r| r) {
            Ok(value) => results.push(value),
            Err(e) => {
                error!(error = %e, "store operation failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

/// Filters `url` out of the list stored under `key`. Writes back only if
/// the list got shorter; returns whether it did.
fn remove_url_from(store: &dyn KvStore, key: &str, url: &str) -> GatewayResult<bool> {
    let Some(text) = store.get(key)? else {
        return Ok(false);
    };
    let Value::Array(items) = decode_stored(key, &text)? else {
        return Ok(false);
    };

    let before = items.len();
    let kept: Vec<Value> = items
        .into_iter()
        .filter(|item| record_url(item).as_deref() != Some(url))
        .collect();
    if kept.len() == before {
        return Ok(false);
    }

    let text = serde_json::to_string(&kept).map_err(StorageError::from)?;
    store.put(key, &text)?;
    Ok(true)
}

/// The trimmed `url` of a stored record, with scalars rendered as text.
fn record_url(item: &Value) -> Option<String> {
    match item.get("url")? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decodes a stored value. `null` reads back as an empty list.
fn decode_stored(key: &str, text: &str) -> GatewayResult<Value> {
    match serde_json::from_str(text) {
        Ok(Value::Null) => Ok(Value::Array(Vec::new())),
        Ok(value) => Ok(value),
        Err(e) => Err(StorageError::Corrupted(format!("value under {key:?}: {e}")).into()),
    }
}

fn dedup(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasync_storage::{InMemoryStore, StorageResult};
    use serde_json::json;

    const KEY: &str = "secret1";

    fn gateway() -> (Gateway, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let config = GatewayConfig::default().with_api_key(KEY);
        (Gateway::new(config, store.clone()), store)
    }

    fn grants(gateway: &Gateway) -> (ReadGrant, WriteGrant) {
        (
            gateway.authorize_read(Some(KEY)).unwrap(),
            gateway.authorize_write(Some(KEY)).unwrap(),
        )
    }

    fn stored(store: &InMemoryStore, key: &str) -> Option<Value> {
        store
            .get(key)
            .unwrap()
            .map(|t| serde_json::from_str(&t).unwrap())
    }

    #[tokio::test]
    async fn read_missing_key_is_empty_list() {
        let (gateway, _) = gateway();
        let (read, _) = grants(&gateway);
        let out = gateway
            .read(read, Some("filmin_catalog_paid"))
            .await
            .unwrap();
        assert_eq!(Value::Object(out), json!({"filmin_catalog_paid": []}));
    }

    #[tokio::test]
    async fn read_without_param_is_empty_object() {
        let (gateway, _) = gateway();
        let (read, _) = grants(&gateway);
        assert!(gateway.read(read, None).await.unwrap().is_empty());
        assert!(gateway.read(read, Some("")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_filters_disallowed_and_keeps_request_order() {
        let (gateway, store) = gateway();
        store.put("viki_list", r#"[{"url":"v"}]"#).unwrap();
        let (read, _) = grants(&gateway);

        let out = gateway
            .read(read, Some(" viki_list , evil_key,filmin_x,viki_list"))
            .await
            .unwrap();
        let keys: Vec<&String> = out.keys().collect();
        assert_eq!(keys, vec!["viki_list", "filmin_x"]);
        assert_eq!(out["viki_list"], json!([{"url": "v"}]));
    }

    #[tokio::test]
    async fn read_caps_key_count() {
        let (gateway, _) = gateway();
        let (read, _) = grants(&gateway);
        let param: Vec<String> = (0..40).map(|i| format!("filmin_{i}")).collect();
        let out = gateway.read(read, Some(&param.join(","))).await.unwrap();
        assert_eq!(out.len(), MAX_KEYS_PER_REQUEST);
        assert!(out.contains_key("filmin_24"));
        assert!(!out.contains_key("filmin_25"));
    }

    #[tokio::test]
    async fn write_summarizes_each_key() {
        let (gateway, store) = gateway();
        store.put("filmin_stale", r#"[{"url":"old"}]"#).unwrap();
        let (_, write) = grants(&gateway);

        let body = json!({
            "filmin_a": [{"url": " https://x/1 ", "saved_at": "1700000000000.9"}],
            "filmin_b": [],
            "filmin_stale": [{"title": "no url"}],
            "evil_key": [{"url": "u"}],
            "filmin_c": {"url": "u"}
        });
        let summary = gateway
            .write(write, body.to_string().as_bytes())
            .await
            .unwrap();

        assert_eq!(summary.written, vec!["filmin_a"]);
        assert_eq!(summary.cleared, vec!["filmin_b"]);
        assert_eq!(summary.rejected, vec!["filmin_stale"]);
        assert_eq!(summary.skipped, vec!["evil_key", "filmin_c"]);
        assert_eq!(summary.stored(), 2);

        assert_eq!(
            stored(&store, "filmin_a"),
            Some(json!([{"url": "https://x/1", "saved_at": 1700000000000i64}]))
        );
        assert_eq!(stored(&store, "filmin_b"), Some(json!([])));
        assert_eq!(stored(&store, "filmin_stale"), Some(json!([{"url": "old"}])));
        assert!(store.get("evil_key").unwrap().is_none());
    }

    #[tokio::test]
    async fn write_truncates_before_filtering() {
        let store = Arc::new(InMemoryStore::new());
        let config = GatewayConfig::default()
            .with_api_key(KEY)
            .with_max_items(2);
        let gateway = Gateway::new(config, store.clone());
        let (_, write) = grants(&gateway);

        let body = json!({"filmin_a": [{"url": "1"}, {"nope": true}, {"url": "3"}]});
        gateway
            .write(write, body.to_string().as_bytes())
            .await
            .unwrap();
        assert_eq!(stored(&store, "filmin_a"), Some(json!([{"url": "1"}])));
    }

    #[tokio::test]
    async fn write_rejects_large_and_malformed_bodies() {
        let store = Arc::new(InMemoryStore::new());
        let config = GatewayConfig::default()
            .with_api_key(KEY)
            .with_max_body_bytes(16);
        let gateway = Gateway::new(config, store);
        let (_, write) = grants(&gateway);

        let big = json!({"filmin_a": [{"url": "https://example.com"}]}).to_string();
        assert!(matches!(
            gateway.write(write, big.as_bytes()).await,
            Err(GatewayError::PayloadTooLarge { limit: 16 })
        ));

        let err = gateway.write(write, b"{nope").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_body().error, "Invalid JSON");

        let err = gateway.write(write, b"[]").await.unwrap_err();
        assert_eq!(err.to_body().error, "Invalid body");
    }

    #[tokio::test]
    async fn purge_respects_allow_list() {
        let (gateway, store) = gateway();
        store.put("filmin_a", "[]").unwrap();
        let (_, write) = grants(&gateway);

        let status = gateway
            .delete(write, br#"{"purgeKey":" filmin_a "}"#)
            .await
            .unwrap();
        assert_eq!(
            status,
            StatusBody::KeyDeleted {
                key: "filmin_a".into()
            }
        );
        assert!(store.is_empty());

        let err = gateway
            .delete(write, br#"{"purgeKey":"evil_prefix_key"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PurgeDenied { ref key } if key == "evil_prefix_key"));
    }

    #[tokio::test]
    async fn remove_url_rewrites_only_matching_lists() {
        let (gateway, store) = gateway();
        store
            .put("filmin_a", r#"[{"url":"https://x/1"},{"url":"https://x/2"}]"#)
            .unwrap();
        store.put("filmin_b", r#"[{"url":"https://x/2"}]"#).unwrap();
        store.put("filmin_c", r#"[{"url":" https://x/1 "}]"#).unwrap();
        let (_, write) = grants(&gateway);

        let body = json!({
            "url": "https://x/1",
            "keys": ["filmin_a", "filmin_b", "filmin_c", "evil_key", "", null]
        });
        let status = gateway
            .delete(write, body.to_string().as_bytes())
            .await
            .unwrap();
        assert_eq!(status, StatusBody::SingleDeleted);

        assert_eq!(stored(&store, "filmin_a"), Some(json!([{"url": "https://x/2"}])));
        assert_eq!(stored(&store, "filmin_b"), Some(json!([{"url": "https://x/2"}])));
        assert_eq!(stored(&store, "filmin_c"), Some(json!([])));
    }

    #[tokio::test]
    async fn delete_unknown_shape_is_ignored() {
        let (gateway, _) = gateway();
        let (_, write) = grants(&gateway);
        for body in [&b"not json"[..], b"{}", br#"{"url":"u"}"#, br#"{"purgeKey":""}"#] {
            assert_eq!(
                gateway.delete(write, body).await.unwrap(),
                StatusBody::Ignored
            );
        }
    }

    #[tokio::test]
    async fn missing_store_is_reported() {
        let gateway = Gateway::with_store(GatewayConfig::default().with_api_key(KEY), None);
        assert!(matches!(
            gateway.check_store(),
            Err(GatewayError::StoreNotConfigured)
        ));
        let (read, _) = grants(&gateway);
        assert!(matches!(
            gateway.read(read, Some("filmin_a")).await,
            Err(GatewayError::StoreNotConfigured)
        ));
    }

    /// Fails every put to keys containing `broken`.
    struct FlakyStore {
        inner: InMemoryStore,
    }

    impl KvStore for FlakyStore {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> StorageResult<()> {
            if key.contains("broken") {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.put(key, value)
        }

        fn delete(&self, key: &str) -> StorageResult<()> {
            self.inner.delete(key)
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            self.inner.keys()
        }
    }

    #[tokio::test]
    async fn failed_put_reports_error_but_keeps_other_writes() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
        });
        let gateway = Gateway::new(GatewayConfig::default().with_api_key(KEY), store.clone());
        let (_, write) = grants(&gateway);

        let body = json!({
            "filmin_ok": [{"url": "u"}],
            "filmin_broken": [{"url": "u"}]
        });
        let err = gateway
            .write(write, body.to_string().as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Storage(_)));
        assert!(store.inner.get("filmin_ok").unwrap().is_some());
    }
}
