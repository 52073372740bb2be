//! data.gov.in mandi price provider implementation.
//!
//! Serves the "current daily price of various commodities from various markets"
//! resource of the Open Government Data platform:
//! - `GET {base}/{resource_id}?api-key&format=json&offset&limit`
//! - `filters[state.keyword]` narrows to one state
//! - `filters[arrival_date]` narrows to one `dd/mm/yyyy` day
//!
//! The public key tier is slow and tightly rate limited; prices are quoted per tonne.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{format_arrival_date, PageRequest, PricePage, RawPriceRow};
use crate::provider::{PriceProvider, RateLimit};

pub const DEFAULT_BASE_URL: &str = "https://api.data.gov.in/resource";
pub const DEFAULT_RESOURCE_ID: &str = "9ef84268-d588-465a-a308-a864a43d0070";
const PROVIDER_ID: &str = "DATA_GOV";

/// Largest page the resource will serve.
pub const MAX_PAGE_LIMIT: usize = 1000;

// ============================================================================
// API Response Structures
// ============================================================================

/// Body of a successful resource query.
#[derive(Debug, Deserialize)]
struct ResourceResponse {
    /// Present on error payloads that still come back with HTTP 200.
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    records: Option<Vec<RawPriceRow>>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the data.gov.in resource.
#[derive(Clone, Debug)]
pub struct DataGovConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub resource_id: String,
    pub requests_per_minute: u32,
    /// Transport timeout for a single HTTP call.
    pub request_timeout: Duration,
}

impl Default for DataGovConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            requests_per_minute: 30,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// DataGovProvider
// ============================================================================

/// data.gov.in mandi price provider.
pub struct DataGovProvider {
    client: Client,
    config: DataGovConfig,
}

impl DataGovProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: DataGovConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.resource_id
        )
    }

    /// Build the query string for a page request, without the API key.
    fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("format", "json".to_string()),
            ("offset", request.offset.to_string()),
            ("limit", request.limit.min(MAX_PAGE_LIMIT).to_string()),
            ("filters[state.keyword]", request.state.clone()),
        ];
        if let Some(date) = request.date {
            params.push(("filters[arrival_date]", format_arrival_date(date)));
        }
        params
    }

    /// Make a GET request to the resource.
    async fn fetch(&self, api_key: &str, request: &PageRequest) -> Result<String, MarketDataError> {
        let params = Self::query_params(request);

        debug!(
            "data.gov.in request: state={} date={:?} offset={} limit={}",
            request.state, request.date, request.offset, request.limit
        );

        let response = self
            .client
            .get(self.endpoint())
            .query(&[("api-key", api_key)])
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    MarketDataError::Network(e)
                }
            })?;

        let status = response.status();

        // Handle rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("data.gov.in returned HTTP {}: {}", status, body);
            return Err(MarketDataError::HttpStatus {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Network(e)
            }
        })
    }
}

/// Parse a resource response body into rows stamped with the requested state.
fn parse_records(body: &str, state: &str) -> Result<Vec<RawPriceRow>, MarketDataError> {
    let response: ResourceResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::InvalidResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse resource response: {}", e),
        })?;

    if response.status.as_deref() == Some("error") {
        return Err(MarketDataError::InvalidResponse {
            provider: PROVIDER_ID.to_string(),
            message: response
                .message
                .unwrap_or_else(|| "error status without message".to_string()),
        });
    }

    let records = response.records.ok_or_else(|| MarketDataError::InvalidResponse {
        provider: PROVIDER_ID.to_string(),
        message: "response has no records field".to_string(),
    })?;

    // The keyword filter is case-insensitive upstream; keep the caller's spelling.
    Ok(records
        .into_iter()
        .map(|mut row| {
            row.state = state.to_string();
            row
        })
        .collect())
}

#[async_trait]
impl PriceProvider for DataGovProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: self.config.requests_per_minute,
            burst: 2,
            min_delay: Duration::from_millis(500),
        }
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PricePage, MarketDataError> {
        if request.state.trim().is_empty() {
            return Err(MarketDataError::InvalidRequest("state is required".to_string()));
        }
        if request.limit == 0 {
            return Err(MarketDataError::InvalidRequest(
                "limit must be positive".to_string(),
            ));
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| MarketDataError::MissingApiKey(PROVIDER_ID.to_string()))?;

        let body = self.fetch(api_key, request).await?;
        let rows = parse_records(&body, &request.state)?;

        debug!(
            "data.gov.in returned {} rows for {} at offset {}",
            rows.len(),
            request.state,
            request.offset
        );

        Ok(PricePage::from_rows(rows, request.limit.min(MAX_PAGE_LIMIT)))
    }
}
