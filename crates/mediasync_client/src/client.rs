//! HTTP client for the sync gateway.

use crate::config::{now_millis, ClientConfig};
use crate::error::{ClientError, ClientResult};
use mediasync_protocol::{
    merge_records, ErrorBody, MergePolicy, Record, StatusBody, API_KEY_HEADER, KEYS_QUERY_PARAM,
    MAX_KEYS_PER_REQUEST,
};
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Lists keyed by store key.
pub type Lists = BTreeMap<String, Vec<Record>>;

/// Client for one gateway.
///
/// A collector reads the current lists, merges its local findings into
/// them and writes the result back; [`SyncClient::sync`] does all three.
///
/// # Example
///
/// ```no_run
/// use mediasync_client::{ClientConfig, Lists, SyncClient};
/// use mediasync_protocol::Record;
///
/// # async fn run() -> mediasync_client::ClientResult<()> {
/// let client = SyncClient::new(ClientConfig::new("http://127.0.0.1:8787", "secret1"))?;
/// let mut local = Lists::new();
/// local.insert(
///     "filmin_catalog_paid".to_string(),
///     vec![Record::new("https://www.filmin.pt/filme/a").with_title("A")],
/// );
/// let merged = client.sync(local).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    config: ClientConfig,
    endpoint: String,
}

impl SyncClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        let endpoint = format!("{}/", config.base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Reads the lists stored under `keys`.
    ///
    /// Keys are requested in batches the gateway accepts. Keys the gateway
    /// refuses are absent from the result; keys with nothing stored map to
    /// an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if any batch fails after retries.
    pub async fn fetch<I, S>(&self, keys: I) -> ClientResult<Lists>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        let mut lists = Lists::new();

        for batch in keys.chunks(MAX_KEYS_PER_REQUEST) {
            let param = batch.join(",");
            let response = self
                .execute(|| {
                    self.http
                        .get(&self.endpoint)
                        .query(&[(KEYS_QUERY_PARAM, param.as_str())])
                })
                .await?;
            let body: Map<String, Value> = response.json().await?;

            for (key, value) in body {
                let records = match value {
                    Value::Array(items) => items.iter().filter_map(Record::from_value).collect(),
                    _ => Vec::new(),
                };
                lists.insert(key, records);
            }
        }

        debug!(keys = lists.len(), "fetched lists");
        Ok(lists)
    }

    /// Replaces the stored lists with `lists`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the write after retries.
    pub async fn replace(&self, lists: &Lists) -> ClientResult<()> {
        if lists.is_empty() {
            return Ok(());
        }

        let body: Map<String, Value> = lists
            .iter()
            .map(|(key, records)| {
                let items = records.iter().map(Record::to_value).collect();
                (key.clone(), Value::Array(items))
            })
            .collect();
        let body = Value::Object(body);

        let response = self
            .execute(|| self.http.post(&self.endpoint).json(&body))
            .await?;
        expect_status(response, |s| matches!(s, StatusBody::Ok)).await?;
        debug!(keys = lists.len(), "replaced lists");
        Ok(())
    }

    /// Fetches, merges and writes back each list in `local`.
    ///
    /// Each key is merged as `cloud ++ local` with the policy its name
    /// selects. Returns what was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch or the write fails.
    pub async fn sync(&self, local: Lists) -> ClientResult<Lists> {
        let mut cloud = self.fetch(local.keys()).await?;
        let now = now_millis();

        let merged: Lists = local
            .into_iter()
            .map(|(key, records)| {
                let remote = cloud.remove(&key).unwrap_or_default();
                let policy = MergePolicy::for_key(&key);
                let list = merge_records(remote.into_iter().chain(records), policy, now);
                (key, list)
            })
            .collect();

        self.replace(&merged).await?;
        info!(
            keys = merged.len(),
            records = merged.values().map(Vec::len).sum::<usize>(),
            "sync complete"
        );
        Ok(merged)
    }

    /// Removes every record whose URL is `url` from the lists in `keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the delete after retries.
    pub async fn remove_url<I, S>(&self, url: &str, keys: I) -> ClientResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        for batch in keys.chunks(MAX_KEYS_PER_REQUEST) {
            let body = json!({ "url": url, "keys": batch });
            let response = self
                .execute(|| self.http.delete(&self.endpoint).json(&body))
                .await?;
            expect_status(response, |s| matches!(s, StatusBody::SingleDeleted)).await?;
        }
        debug!(url, "removed url");
        Ok(())
    }

    /// Deletes `key` and its whole list.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] with 403 for keys outside the
    /// gateway's allow-list.
    pub async fn purge(&self, key: &str) -> ClientResult<()> {
        let body = json!({ "purgeKey": key });
        let response = self
            .execute(|| self.http.delete(&self.endpoint).json(&body))
            .await?;
        expect_status(response, |s| matches!(s, StatusBody::KeyDeleted { .. })).await?;
        info!(key, "purged key");
        Ok(())
    }

    /// Empties the list under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway rejects the write after retries.
    pub async fn clear(&self, key: &str) -> ClientResult<()> {
        let mut lists = Lists::new();
        lists.insert(key.to_string(), Vec::new());
        self.replace(&lists).await
    }

    /// Sends a request, retrying per the retry configuration.
    async fn execute<F>(&self, build: F) -> ClientResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            let delay = retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let request = build().header(API_KEY_HEADER, &self.config.api_key);
            let outcome = match request.send().await {
                Ok(response) => check_response(response).await,
                Err(e) => Err(ClientError::from(e)),
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    warn!(attempt, error = %e, "request failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Turns non-success statuses into [`ClientError::Status`].
async fn check_response(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reason = status.canonical_reason().unwrap_or("error").to_string();
    let body = response.json::<ErrorBody>().await.ok();
    Err(ClientError::Status {
        status: status.as_u16(),
        error: body.as_ref().map_or(reason, |b| b.error.clone()),
        message: body.and_then(|b| b.message),
    })
}

/// Decodes a status body and checks it is the one the operation expects.
async fn expect_status<P>(response: Response, expected: P) -> ClientResult<StatusBody>
where
    P: Fn(&StatusBody) -> bool,
{
    let status: StatusBody = response.json().await?;
    if expected(&status) {
        Ok(status)
    } else {
        Err(ClientError::InvalidResponse(format!(
            "unexpected status {status:?}"
        )))
    }
}
