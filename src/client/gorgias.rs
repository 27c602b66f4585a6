//! Gorgias client module
//!
//! Provides `GorgiasClient` for making API requests to
//! `https://<subdomain>.gorgias.com`. Every request is signed with the
//! configured credentials and goes through one retry loop: transient failures
//! (connection errors, timeouts, connections dropped mid-response, 429 and
//! 5xx) are retried with exponential backoff, 401/403 abort immediately.
//! A response counts as received only once its whole body was read.

use super::Auth;
use crate::config::TapConfig;
use crate::error::{Result, TapError};

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// How the client retries transient failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled on every further retry
    pub base_delay: Duration,
    /// Upper bound of the exponential delay
    pub max_delay: Duration,
    /// Upper bound of a server supplied `Retry-After`
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Gorgias client for making API requests.
///
/// # Example
/// ```no_run
/// use tap_gorgias::client::{Auth, GorgiasClient};
/// use std::time::Duration;
/// use url::Url;
///
/// # async fn example() -> tap_gorgias::Result<()> {
/// let url = Url::parse("https://acme.gorgias.com").unwrap();
/// let auth = Auth::basic("ops@acme.test", "api-key");
/// let client = GorgiasClient::try_new(url, auth, Duration::from_secs(30))?;
///
/// let user_id = client.current_user_id().await?;
/// let surveys = client.get_json("/api/satisfaction-surveys", &[("limit", "10".into())]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct GorgiasClient {
    client: Client,
    url: Url,
    retry: RetryPolicy,
}

impl GorgiasClient {
    /// Create a client for the given API root.
    ///
    /// # Errors
    /// Returns an error if the credentials cannot be encoded as a header or
    /// the HTTP client cannot be built.
    pub fn try_new(mut url: Url, auth: Auth, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("tap-gorgias/", env!("CARGO_PKG_VERSION"))),
        );
        let credentials = auth
            .header_value()
            .map_err(|e| TapError::Configuration(format!("invalid credentials: {}", e)))?;
        if let Some(credentials) = credentials {
            headers.insert(AUTHORIZATION, credentials);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        // Paths are joined relative to the root, so keep any prefix intact
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }

        log::debug!("Gorgias client for {} using {} auth", url, auth);

        Ok(Self {
            client,
            url,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client from validated tap settings.
    pub fn from_config(config: &TapConfig) -> Result<Self> {
        let auth = Auth::basic(&config.username, &config.password);
        let client = Self::try_new(
            config.base_url()?,
            auth,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(client.with_retry_policy(RetryPolicy {
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        }))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Id of the user owning the credentials (`GET /api/users/0`).
    pub async fn current_user_id(&self) -> Result<i64> {
        let path = "/api/users/0";
        let user = self.get_json(path, &[]).await?;
        user.get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| TapError::malformed(path, "user has no integer 'id'"))
    }

    /// Verify the connection and the credentials.
    pub async fn test_connection(&self) -> Result<i64> {
        self.current_user_id().await
    }

    /// GET a path and parse the JSON body.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let body = self.request(Method::GET, path, query, None).await?;
        Self::parse_json(path, &body)
    }

    /// POST a JSON value and parse the JSON body of the response.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let body = self.request(Method::POST, path, &[], Some(body)).await?;
        Self::parse_json(path, &body)
    }

    /// DELETE a path, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    fn parse_json(path: &str, body: &str) -> Result<Value> {
        serde_json::from_str(body).map_err(|e| TapError::malformed(path, e.to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // Strip leading slash from path if present, to keep any base path
        let path_stripped = path.strip_prefix('/').unwrap_or(path);
        self.url
            .join(path_stripped)
            .map_err(|e| TapError::Configuration(format!("invalid path '{}': {}", path, e)))
    }

    /// Send a request, retrying transient failures.
    ///
    /// Returns the body of the first successful response.
    ///
    /// # Errors
    /// - [`TapError::Authentication`] on 401/403, without retrying
    /// - [`TapError::Http`] on any other 4xx except 429
    /// - [`TapError::RetriesExhausted`] once every attempt failed transiently
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String> {
        let url = self.endpoint(path)?;
        let mut last_error = String::new();
        let mut waited = false;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 && !waited {
                let delay = self.retry.backoff(attempt);
                log::warn!(
                    "Retrying {} {} in {:?} (attempt {}/{}): {}",
                    method,
                    path,
                    delay,
                    attempt + 1,
                    self.retry.max_retries + 1,
                    last_error
                );
                tokio::time::sleep(delay).await;
            }
            waited = false;

            let mut builder = self.client.request(method.clone(), url.clone());
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            log::trace!("{} {}", method, url);
            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) if is_transient(&e) => {
                    last_error = e.to_string();
                    continue;
                }
                Err(e) => return Err(TapError::Request(e)),
            };

            let status = response.status();
            if status.is_success() {
                match response.text().await {
                    Ok(body) => return Ok(body),
                    Err(e) if is_transient(&e) => {
                        last_error = format!("reading response of {}: {}", path, e);
                        continue;
                    }
                    Err(e) => return Err(TapError::Request(e)),
                }
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                return Err(TapError::Authentication { status, body });
            }

            // Honor Retry-After header for 429, unless this was the last attempt
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .filter(|_| attempt < self.retry.max_retries);
                if let Some(retry_after) = retry_after {
                    let wait = Duration::from_secs(retry_after).min(self.retry.max_retry_after);
                    log::warn!("Rate limited on {}, waiting {:?} (Retry-After)", path, wait);
                    tokio::time::sleep(wait).await;
                    waited = true;
                }
                last_error = format!("{} for {}", status, path);
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{}: {}", status, body);
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(TapError::Http {
                status,
                path: path.to_string(),
                body,
            });
        }

        Err(TapError::RetriesExhausted {
            attempts: self.retry.max_retries + 1,
            last_error,
        })
    }
}

/// Transport failures worth another attempt. Builder, redirect and status
/// errors would fail the same way again.
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout()
        || error.is_connect()
        || error.is_request()
        || error.is_body()
        || error.is_decode()
}

impl std::fmt::Display for GorgiasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}
