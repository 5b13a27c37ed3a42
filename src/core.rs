use async_trait::async_trait;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::config::XbrlConfig;
use super::error::{ApiError, ApiErrorGroup, Result, XbrlError};
use super::parsing::{FieldPathReader, ParseSettings};

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);

/// Number of API requests made by this process.
pub fn api_request_count() -> u64 {
    REQUEST_COUNT.load(Ordering::Relaxed)
}

/// Raw result of one GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase of the status, e.g. `Not Found`
    pub reason: String,
    /// URL the response was received from
    pub url: String,
    pub body: String,
}

/// Performs the HTTP requests of a client.
///
/// [`HttpTransport`] is the implementation used by default. Tests and
/// callers with their own HTTP stack can supply another one through
/// [`Xbrl::with_transport`].
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Fetches `url`, which already contains the query string.
    ///
    /// Connection failures are errors. Any HTTP status is a response.
    async fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// `reqwest` based transport with token bucket rate limiting.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    rate_limiter: Arc<Governor>,
}

impl HttpTransport {
    /// Builds the HTTP client from the user agent, timeout and rate limit
    /// of `config`.
    ///
    /// # Errors
    ///
    /// Returns `XbrlError::ConfigError` if the user agent is malformed, the
    /// rate limit is zero, or the HTTP client cannot be built.
    pub fn new(config: &XbrlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| XbrlError::ConfigError(format!("Invalid user agent: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| XbrlError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(config.rate_limit).ok_or_else(|| {
                XbrlError::ConfigError("Rate limit must be greater than zero".to_string())
            })?,
        )));

        Ok(Self {
            client,
            rate_limiter,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(XbrlError::RequestError)?;

        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.map_err(XbrlError::RequestError)?;
        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            url,
            body,
        })
    }
}

/// Client for the filings.xbrl.org JSON:API.
///
/// The client is cheap to clone; clones share the transport and its rate
/// limiter. Queries are made through the
/// [`FilingsOperations`](crate::FilingsOperations) trait.
///
/// # Examples
///
/// ```rust
/// # use xbrlkit::Xbrl;
/// let xbrl = Xbrl::new("my_app/1.0 (my@email.com)")?;
/// # Ok::<(), xbrlkit::XbrlError>(())
/// ```
///
/// With custom configuration:
///
/// ```rust
/// # use xbrlkit::{Xbrl, XbrlConfig};
/// # use std::time::Duration;
/// let config = XbrlConfig::new("research_tool/1.0", 2, Duration::from_secs(60))
///     .with_utc_time(true);
/// let xbrl = Xbrl::with_config(config)?;
/// # Ok::<(), xbrlkit::XbrlError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Xbrl {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: Arc<XbrlConfig>,
    pub(crate) settings: Arc<ParseSettings>,
}

impl Xbrl {
    /// Creates a client with the default configuration and the given
    /// user agent.
    pub fn new(user_agent: &str) -> Result<Self> {
        let config = XbrlConfig {
            user_agent: user_agent.to_string(),
            ..XbrlConfig::default()
        };
        Self::with_config(config)
    }

    /// Creates a client with an [`HttpTransport`] built from `config`.
    ///
    /// # Errors
    ///
    /// `XbrlError::ConfigError` for an invalid user agent, entry point URL,
    /// zero rate limit or zero maximum page size.
    pub fn with_config(config: XbrlConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client which makes its requests through `transport`.
    pub fn with_transport(config: XbrlConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        if config.max_page_size == 0 {
            return Err(XbrlError::ConfigError(
                "Maximum page size must be greater than zero".to_string(),
            ));
        }
        let settings = ParseSettings::from_config(&config)?;
        Ok(Self {
            transport,
            config: Arc::new(config),
            settings: Arc::new(settings),
        })
    }

    pub fn config(&self) -> &XbrlConfig {
        &self.config
    }

    pub(crate) fn settings(&self) -> &ParseSettings {
        &self.settings
    }

    /// Requests `url` with `params` appended and returns the JSON document
    /// together with the URL the response came from.
    ///
    /// # Errors
    ///
    /// * `XbrlError::Api` - the body holds a non-empty `errors` array
    /// * `XbrlError::HttpStatus` - any other status than 200
    /// * `XbrlError::JsonError` - the body is not JSON
    /// * `XbrlError::RequestError` - connection failure
    pub(crate) async fn get_json(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<(Value, String)> {
        let full_url = compose_url(url, params)?;
        let n = REQUEST_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("GET Req#{} {}", n, full_url);

        let response = self.transport.get(&full_url).await?;
        let json = classify_response(&response)?;
        Ok((json, response.url))
    }
}

fn compose_url(url: &str, params: &[(String, String)]) -> Result<String> {
    if params.is_empty() {
        return Ok(url.to_string());
    }
    let query = serde_urlencoded::to_string(params)
        .map_err(|e| XbrlError::ConfigError(format!("Invalid request parameters: {}", e)))?;
    let separator = if url.contains('?') { '&' } else { '?' };
    Ok(format!("{url}{separator}{query}"))
}

/// Structured errors take precedence over the HTTP status.
fn classify_response(response: &TransportResponse) -> Result<Value> {
    let parsed = serde_json::from_str::<Value>(&response.body);

    if let Ok(json) = &parsed {
        let errors = json
            .get("errors")
            .and_then(Value::as_array)
            .filter(|errors| !errors.is_empty());
        if let Some(errors) = errors {
            let group = ApiErrorGroup {
                errors: errors.iter().map(read_api_error).collect(),
                status: response.status,
                status_text: response.reason.clone(),
            };
            tracing::error!("{} for {}", group, response.url);
            return Err(XbrlError::Api(group));
        }
    }

    if response.status != 200 {
        tracing::error!(
            "HTTP status {} {} for {}",
            response.status,
            response.reason,
            response.url
        );
        return Err(XbrlError::HttpStatus {
            status: response.status,
            reason: response.reason.clone(),
            body: response.body.clone(),
        });
    }

    parsed.map_err(XbrlError::JsonError)
}

fn read_api_error(json: &Value) -> ApiError {
    let settings = ParseSettings::default();
    let mut reader = FieldPathReader::untracked("ApiError", json, &settings);
    let error = ApiError {
        title: reader.get_str("title"),
        detail: reader.get_str("detail"),
        code: reader.get_str("code"),
        api_status: reader.get_str("status"),
    };
    // untracked readers cannot fail to close
    let _ = reader.close();
    error
}
