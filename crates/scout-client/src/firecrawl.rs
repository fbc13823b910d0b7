use std::time::Duration;

use reqwest::{Client, StatusCode};
use scout_core::error::AppError;
use scout_core::traits::{ExtractRequest, ExtractResponse, Extractor};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";

/// Extra settle time for pages that render their listings lazily.
const LAZY_CONTENT_WAIT_MS: u64 = 3000;

/// Client-side slack over the service-side scrape timeout.
const RESPONSE_GRACE: Duration = Duration::from_secs(15);

/// Remaining-credit levels that trigger a warning / critical log.
const CREDIT_WARNING_THRESHOLD: u64 = 1000;
const CREDIT_CRITICAL_THRESHOLD: u64 = 100;

/// Client for the Firecrawl `/v2/scrape` JSON extraction endpoint.
#[derive(Clone)]
pub struct FirecrawlExtractor {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FirecrawlExtractor {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("Firecrawl API key is empty".into()));
        }
        Url::parse(base_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid Firecrawl base URL '{base_url}': {e}"))
        })?;
        // Per-request timeouts are set from the retry policy; this client
        // only bounds connection setup.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Read configuration from `FIRECRAWL_API_KEY` (required) and
    /// `FIRECRAWL_BASE_URL` (optional).
    pub fn from_env() -> Result<Self, AppError> {
        let api_key = std::env::var("FIRECRAWL_API_KEY").map_err(|_| {
            AppError::ConfigError("FIRECRAWL_API_KEY not set. Required for extraction.".into())
        })?;
        let base_url =
            std::env::var("FIRECRAWL_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(&api_key, &base_url)
    }

    /// Fetch the remaining account credits and log when they run low.
    pub async fn remaining_credits(&self) -> Result<u64, AppError> {
        let url = format!("{}/v2/team/credit-usage", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| map_transport_error(e, 10))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        let usage: CreditUsageResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse credit usage: {e}")))?;
        let remaining = usage.data.remaining_credits;

        if remaining < CREDIT_CRITICAL_THRESHOLD {
            tracing::error!(critical = true, remaining, "Extraction credits almost exhausted");
        } else if remaining < CREDIT_WARNING_THRESHOLD {
            tracing::warn!(remaining, "Extraction credits running low");
        } else {
            tracing::info!(remaining, "Extraction credits");
        }
        Ok(remaining)
    }
}

// ---- Firecrawl API types ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<JsonFormat<'a>>,
    actions: Vec<Action>,
    /// Milliseconds.
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for: Option<u64>,
}

#[derive(Serialize)]
struct JsonFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    schema: &'a serde_json::Value,
    prompt: &'a str,
}

#[derive(Serialize)]
struct Action {
    #[serde(rename = "type")]
    action_type: &'static str,
    direction: &'static str,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    #[serde(default)]
    json: Option<serde_json::Value>,
    #[serde(default)]
    metadata: Option<ScrapeMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeMetadata {
    status_code: Option<u16>,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

#[derive(Deserialize)]
struct CreditUsageResponse {
    data: CreditUsage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditUsage {
    remaining_credits: u64,
}

fn map_transport_error(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::HttpError(format!("connect failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());
    let lowered = message.to_lowercase();

    match status {
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimitExceeded,
        StatusCode::PAYMENT_REQUIRED => AppError::QuotaExhausted(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AppError::Timeout(0),
        _ if lowered.contains("credit") || lowered.contains("insufficient") => {
            AppError::QuotaExhausted(message)
        }
        _ => AppError::ExtractionError {
            message,
            status_code: status.as_u16(),
        },
    }
}

impl Extractor for FirecrawlExtractor {
    async fn extract(&self, request: ExtractRequest) -> Result<ExtractResponse, AppError> {
        let url = format!("{}/v2/scrape", self.base_url);
        let timeout_secs = request.timeout.as_secs();

        let body = ScrapeRequest {
            url: &request.url,
            formats: vec![JsonFormat {
                format_type: "json",
                schema: &request.schema,
                prompt: &request.prompt,
            }],
            actions: vec![Action {
                action_type: "scroll",
                direction: "down",
            }],
            timeout: request.timeout.as_millis() as u64,
            wait_for: request.wait_for_content.then_some(LAZY_CONTENT_WAIT_MS),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout + RESPONSE_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match map_status_error(status, &text) {
                AppError::Timeout(_) => AppError::Timeout(timeout_secs),
                other => other,
            });
        }

        let scrape: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse scrape response: {e}")))?;
        let data = scrape.data.unwrap_or(ScrapeData {
            json: None,
            metadata: None,
        });

        // The target page's status, not the API call's
        let status_code = data
            .metadata
            .and_then(|m| m.status_code)
            .unwrap_or(200);

        tracing::debug!(url = %request.url, status_code, "Scrape finished");

        Ok(ExtractResponse {
            status_code,
            data: data.json.unwrap_or(serde_json::Value::Null),
        })
    }
}
