//! HTTP gateway to the REST API
//!
//! Every network operation in the SDK funnels through [`ApiGateway`]: it
//! attaches the bearer token, performs the single silent refresh-and-retry
//! cycle on 401, normalizes success and failure bodies into one shape, and
//! fronts GET traffic with a TTL cache. Services above this layer never see
//! a raw `reqwest::Response`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use common::cache::TtlCache;
use common::clock::Clock;

use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};

/// Cached normalized GET response
#[derive(Debug, Clone)]
struct CachedResponse {
    data: Value,
}

/// Downloaded body plus the server-suggested file name, when any
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// One file plus its accompanying form fields for a multipart upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Extra text fields sent alongside the file part
    pub fields: Vec<(String, String)>,
}

/// Central HTTP client for the Subasta30 API
pub struct ApiGateway {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    session: Arc<AuthSession>,
    cache: TtlCache<CachedResponse>,
}

impl ApiGateway {
    pub fn new(config: &ClientConfig, session: Arc<AuthSession>, clock: Arc<dyn Clock>) -> Self {
        ApiGateway {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            session,
            cache: TtlCache::with_ttl(clock, config.cache_ttl_secs),
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, refreshing the session and retrying exactly once on
    /// a 401.
    ///
    /// If the refresh itself fails the session has already been cleared and
    /// the session-expired hook fired; the caller sees
    /// [`ApiError::SessionExpired`].
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> ApiResult<Value> {
        let mut refreshed = false;

        loop {
            let mut req = self
                .http
                .request(method.clone(), self.url(path))
                .timeout(self.timeout);

            if let Some(token) = self.session.token() {
                req = req.bearer_auth(token);
            }
            if let Some(json) = body {
                req = req.json(json);
            }

            debug!(%method, path, "API request");
            let resp = req.send().await.map_err(ApiError::Network)?;

            // with no refresh token on hand the 401 surfaces as a plain
            // normalized error
            if resp.status() == StatusCode::UNAUTHORIZED
                && !refreshed
                && self.session.has_refresh_token()
            {
                warn!(path, "401 received, attempting silent token refresh");
                self.session.refresh().await?;
                refreshed = true;
                continue;
            }

            return normalize(resp).await;
        }
    }

    /// GET without caching
    pub async fn get(&self, path: &str) -> ApiResult<Value> {
        self.request(Method::GET, path, None).await
    }

    /// GET through the TTL cache; `ttl_secs` overrides the default entry TTL
    pub async fn get_cached(&self, path: &str, ttl_secs: Option<i64>) -> ApiResult<Value> {
        if let Some(hit) = self.cache.get(path) {
            debug!(path, "cache hit");
            return Ok(hit.data);
        }

        let data = self.get(path).await?;
        self.cache
            .set(path, CachedResponse { data: data.clone() }, ttl_secs);
        Ok(data)
    }

    pub async fn post(&self, path: &str, body: &impl Serialize) -> ApiResult<Value> {
        let json = to_json(body)?;
        self.request(Method::POST, path, Some(&json)).await
    }

    pub async fn put(&self, path: &str, body: &impl Serialize) -> ApiResult<Value> {
        let json = to_json(body)?;
        self.request(Method::PUT, path, Some(&json)).await
    }

    pub async fn patch(&self, path: &str, body: &impl Serialize) -> ApiResult<Value> {
        let json = to_json(body)?;
        self.request(Method::PATCH, path, Some(&json)).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<Value> {
        self.request(Method::DELETE, path, None).await
    }

    /// Multipart upload; the file always travels in a part named `File`,
    /// which is what the API's controllers bind to
    pub async fn upload(&self, path: &str, upload: UploadRequest) -> ApiResult<Value> {
        let mut refreshed = false;

        loop {
            let part = Part::bytes(upload.bytes.clone())
                .file_name(upload.file_name.clone())
                .mime_str(&upload.content_type)
                .map_err(|_| {
                    ApiError::Validation(format!(
                        "Invalid content type: {}",
                        upload.content_type
                    ))
                })?;

            let mut form = Form::new().part("File", part);
            for (key, value) in &upload.fields {
                form = form.text(key.clone(), value.clone());
            }

            let mut req = self
                .http
                .post(self.url(path))
                .timeout(self.timeout)
                .multipart(form);
            if let Some(token) = self.session.token() {
                req = req.bearer_auth(token);
            }

            debug!(path, file = %upload.file_name, "multipart upload");
            let resp = req.send().await.map_err(ApiError::Network)?;

            if resp.status() == StatusCode::UNAUTHORIZED
                && !refreshed
                && self.session.has_refresh_token()
            {
                warn!(path, "401 received during upload, refreshing token");
                self.session.refresh().await?;
                refreshed = true;
                continue;
            }

            return normalize(resp).await;
        }
    }

    /// GET returning the raw body, for document and image downloads. The
    /// caller persists the bytes; the suggested name comes from the
    /// Content-Disposition header when the server sent one.
    pub async fn download(&self, path: &str) -> ApiResult<DownloadedFile> {
        let mut refreshed = false;

        loop {
            let mut req = self.http.get(self.url(path)).timeout(self.timeout);
            if let Some(token) = self.session.token() {
                req = req.bearer_auth(token);
            }

            let resp = req.send().await.map_err(ApiError::Network)?;

            if resp.status() == StatusCode::UNAUTHORIZED
                && !refreshed
                && self.session.has_refresh_token()
            {
                self.session.refresh().await?;
                refreshed = true;
                continue;
            }

            let status = resp.status();
            if !status.is_success() {
                error!(path, status = status.as_u16(), "download failed");
                return match normalize(resp).await {
                    Err(err) => Err(err),
                    Ok(_) => Err(ApiError::HttpText {
                        status: status.as_u16(),
                        message: "Download failed".to_string(),
                    }),
                };
            }

            let file_name = resp
                .headers()
                .get(reqwest::header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_disposition_filename);
            let bytes = resp.bytes().await.map_err(ApiError::Network)?;

            return Ok(DownloadedFile {
                file_name,
                bytes: bytes.to_vec(),
            });
        }
    }

    /// Retry an operation with linear backoff (`delay * attempt_index`
    /// between attempts), stopping at the first success.
    ///
    /// Any failure is re-attempted up to `max_retries` times, except
    /// session expiry, whose logout side effects have already run.
    pub async fn retry_request<T, F, Fut>(
        &self,
        max_retries: u32,
        delay: Duration,
        mut op: F,
    ) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let attempts = max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(ApiError::SessionExpired) => return Err(ApiError::SessionExpired),
                Err(err) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(err);
                    }
                    warn!(attempt, error = %err, "request failed, retrying");
                    tokio::time::sleep(delay * attempt).await;
                }
            }
        }
    }

    /// Drop cached entries whose key contains `pattern`
    pub fn invalidate_cache(&self, pattern: &str) {
        self.cache.invalidate(pattern);
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Serializes a request body, surfacing serialization failures as parse
/// errors rather than panicking
fn to_json(body: &impl Serialize) -> ApiResult<Value> {
    serde_json::to_value(body).map_err(|_| ApiError::Parse { status: 0 })
}

/// Deserialize a normalized response body into a typed model
pub fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|_| ApiError::Parse { status: 0 })
}

/// Collapse a response into either a JSON value or a normalized error.
///
/// Error bodies carry `message` (or `title` from problem-details payloads)
/// plus an `errors` collection that can be a flat array or the ASP.NET
/// model-state map of field name to message list.
pub(crate) async fn normalize(resp: reqwest::Response) -> ApiResult<Value> {
    let status = resp.status().as_u16();
    let is_json = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    if (200..300).contains(&status) {
        if !is_json {
            return Ok(Value::Null);
        }
        return resp
            .json::<Value>()
            .await
            .map_err(|_| ApiError::Parse { status });
    }

    if is_json {
        let body: Value = resp
            .json()
            .await
            .map_err(|_| ApiError::Parse { status })?;

        let message = body
            .get("message")
            .or_else(|| body.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("Request failed")
            .to_string();

        return Err(ApiError::Http {
            status,
            message,
            errors: collect_errors(body.get("errors")),
        });
    }

    let text = resp.text().await.unwrap_or_default();
    Err(ApiError::HttpText {
        status,
        message: if text.is_empty() {
            "Request failed".to_string()
        } else {
            text
        },
    })
}

/// Pull `filename="..."` (or the unquoted form) out of a
/// Content-Disposition header value
fn parse_disposition_filename(header: &str) -> Option<String> {
    let after = header.split("filename=").nth(1)?;
    let name = after
        .split(';')
        .next()
        .unwrap_or(after)
        .trim()
        .trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn collect_errors(errors: Option<&Value>) -> Vec<String> {
    match errors {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::Object(map)) => map
            .values()
            .flat_map(|v| match v {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
                Value::String(s) => vec![s.clone()],
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Serializes requests so they hit the API one at a time, in call order.
///
/// The tokio mutex hands the lock out FIFO, which is what makes the
/// ordering guarantee hold.
pub struct RequestQueue {
    gate: tokio::sync::Mutex<()>,
}

impl RequestQueue {
    pub fn new() -> Self {
        RequestQueue {
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn run<T>(&self, fut: impl Future<Output = T>) -> T {
        let _guard = self.gate.lock().await;
        fut.await
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Run independent requests concurrently, preserving input order in the
/// results
pub async fn batch<T, Fut>(futures: Vec<Fut>) -> Vec<ApiResult<T>>
where
    T: Send + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    let mut set = JoinSet::new();
    let total = futures.len();
    for (index, fut) in futures.into_iter().enumerate() {
        set.spawn(async move { (index, fut.await) });
    }

    let mut slots: Vec<Option<ApiResult<T>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(err) => error!(error = %err, "batched request task failed"),
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(ApiError::Validation("Batched request was aborted".to_string()))
            })
        })
        .collect()
}
