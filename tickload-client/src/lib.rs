use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use std::time::Duration;
use tickload_common::{
    LoadTestError, Result, TicketRequest, CUSTOMER_NAME_PREFIX, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SERVICE_ID,
};
use uuid::Uuid;

/// Ticket client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and authority of the target, e.g. `https://example.com`.
    pub base_url: String,
    pub shop_slug: String,
    pub service_id: u64,
    /// Per-request timeout covering connect, send and response.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, shop_slug: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            shop_slug: shop_slug.into(),
            service_id: DEFAULT_SERVICE_ID,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Client for the ticket-creation endpoint.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct TicketClient {
    pub config: ClientConfig,
    tickets_url: String,
    http_client: reqwest::Client,
}

impl TicketClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // HTTP/2 is negotiated through ALPN when the target speaks TLS.
        // Redirects are not followed: a 3xx is itself the outcome.
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| LoadTestError::InvalidConfig(e.to_string()))?;

        let tickets_url = format!(
            "{}/api/shops/{}/tickets",
            config.base_url.trim_end_matches('/'),
            config.shop_slug
        );

        Ok(Self { config, tickets_url, http_client })
    }

    /// URL every ticket is posted to.
    pub fn tickets_url(&self) -> &str {
        &self.tickets_url
    }

    /// Build a request body with a freshly generated customer name so the
    /// server never sees two identical tickets.
    pub fn build_request(&self) -> TicketRequest {
        TicketRequest {
            service_id: self.config.service_id,
            customer_name: format!("{CUSTOMER_NAME_PREFIX}{}", Uuid::new_v4()),
        }
    }

    /// Post one ticket. Returns the response status when it is below 400.
    ///
    /// The body is always read to the end, so the timing covers the whole
    /// response and the connection goes back to the pool.
    pub async fn create_ticket(&self) -> Result<StatusCode> {
        let body = self.build_request();

        let response = self
            .http_client
            .post(&self.tickets_url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        response.bytes().await.map_err(map_transport_error)?;

        if status.as_u16() >= 400 {
            return Err(LoadTestError::HttpError(status.as_u16()));
        }
        Ok(status)
    }
}

/// Returns `true` if `outcome` counts as a successful request.
/// Every error kind folds into a single failure bucket.
pub fn is_success(outcome: &Result<StatusCode>) -> bool {
    outcome.is_ok()
}

fn map_transport_error(e: reqwest::Error) -> LoadTestError {
    if e.is_timeout() {
        LoadTestError::Timeout
    } else {
        LoadTestError::NetworkError(e.to_string())
    }
}
