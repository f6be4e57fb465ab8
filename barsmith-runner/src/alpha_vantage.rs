//! Alpha Vantage row provider.
//!
//! Requests `TIME_SERIES_DAILY` with `outputsize=full` and clips the answer
//! to the requested dates, since the endpoint has no range parameters. Rows
//! come out as `Date, Open, High, Low, Close, Volume` with the provider's own
//! text values; the engine does the coercion.
//!
//! Alpha Vantage reports throttling and bad keys inside an HTTP 200 body
//! (`Note`, `Information`, `Error Message`), so status codes alone say little.

use barsmith_core::{Cell, RawTable};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AlphaVantageConfig;
use crate::provider::{ProviderError, RowProvider};
use crate::rate_limiter::RateLimiter;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const HEADERS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

/// `TIME_SERIES_DAILY` response. Exactly one of the fields is usually set.
#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
    base_delay: Duration,
}

impl fmt::Debug for AlphaVantageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantageProvider")
            .field("limiter", &self.limiter)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl AlphaVantageProvider {
    pub fn new(
        api_key: impl Into<String>,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            limiter,
            max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Provider with its own limiter sized from config.
    pub fn from_config(config: &AlphaVantageConfig) -> Result<Self, ProviderError> {
        let limiter = Arc::new(RateLimiter::new(
            config.calls,
            Duration::from_secs(config.period_secs),
        ));
        Self::new(
            config.api_key.clone(),
            limiter,
            Duration::from_secs(config.timeout_secs),
            config.retry_attempts,
        )
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn query(&self, symbol: &str) -> [(&'static str, String); 4] {
        [
            ("function", "TIME_SERIES_DAILY".to_string()),
            ("symbol", symbol.to_string()),
            ("outputsize", "full".to_string()),
            ("apikey", self.api_key.clone()),
        ]
    }

    /// Turn a daily response into provider rows dated within `[start, end]`.
    fn parse_response(
        symbol: &str,
        resp: DailyResponse,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, ProviderError> {
        if let Some(message) = resp.error_message {
            return Err(if message.to_ascii_lowercase().contains("apikey") {
                ProviderError::AuthenticationRequired(message)
            } else {
                ProviderError::SymbolNotFound {
                    symbol: symbol.to_string(),
                }
            });
        }

        let series = match (resp.series, resp.note, resp.information) {
            (Some(series), _, _) => series,
            (None, Some(_), _) => return Err(ProviderError::RateLimited { retry_after_secs: 60 }),
            (None, None, Some(info)) => {
                let lower = info.to_ascii_lowercase();
                return Err(if lower.contains("rate limit") || lower.contains("frequency") {
                    ProviderError::RateLimited {
                        retry_after_secs: 60,
                    }
                } else {
                    ProviderError::AuthenticationRequired(info)
                });
            }
            (None, None, None) => {
                return Err(ProviderError::ResponseFormatChanged(
                    "no \"Time Series (Daily)\" in response".into(),
                ))
            }
        };

        let mut table = RawTable::new(HEADERS);
        // Keys are ISO dates, so map order is date order.
        for (day, bar) in series {
            let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|_| {
                ProviderError::ResponseFormatChanged(format!("invalid date key: {day}"))
            })?;
            if date < start || date > end {
                continue;
            }
            table.push_row(vec![
                Cell::from(day),
                Cell::from(bar.open),
                Cell::from(bar.high),
                Cell::from(bar.low),
                Cell::from(bar.close),
                Cell::from(bar.volume),
            ]);
        }

        debug!(symbol, rows = table.len(), "parsed daily series");
        Ok(table)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, ProviderError> {
        let query = self.query(symbol);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }

            self.limiter.acquire();

            let resp = match self.client.get(BASE_URL).query(&query).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(ProviderError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if !status.is_success() {
                last_error = Some(ProviderError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let daily: DailyResponse = resp.json().map_err(|e| {
                ProviderError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;

            match Self::parse_response(symbol, daily, start, end) {
                Err(err @ ProviderError::RateLimited { .. }) => {
                    warn!(symbol, "provider rate limited the request");
                    last_error = Some(err);
                }
                other => return other,
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Other("max retries exceeded".into())))
    }
}

impl RowProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, ProviderError> {
        self.fetch_with_retry(symbol, start, end)
    }
}
