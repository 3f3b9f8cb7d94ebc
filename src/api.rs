// ===============================
// src/api.rs
// ===============================
//
// Trade-management backend client.
// - One async call per backend capability, fixed method/path/params (see `Endpoint`).
// - Fixed client timeout; a timeout is just another failed call for the controllers.
// - No retries, no caching.
//
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{
    BlotterQuery, DashboardSummary, Listing, PaginationParams, Row, SearchParams, Trade,
    TradeBlotterRow, User, ValidationResult,
};
use crate::metrics::{API_LATENCY, API_REQUESTS};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const FALLBACK_MESSAGE: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Network(String),
    #[error("timeout of {0}ms exceeded")]
    Timeout(u64),
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid base url: {0}")]
    BadUrl(String),
}

impl ApiError {
    /// Text for the error notification; falls back when nothing usable came back.
    pub fn user_message(&self) -> String {
        let msg = self.to_string();
        if msg.trim().is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            msg
        }
    }
}

/// Builds the error for a non-2xx reply, preferring the backend's own message.
pub fn backend_error(status: u16, body: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error", "detail"].iter().find_map(|k| {
                v.get(*k)
                    .and_then(|m| m.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("Request failed with status code {status}"));
    ApiError::Backend { status, message }
}

/// Every backend capability with its fixed method, path and parameter mapping.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint<'a> {
    SearchTrades(&'a SearchParams),
    TradesPaginated(&'a PaginationParams),
    SearchRsql(&'a str),
    DashboardSummary(Option<i64>),
    TradeBlotter(&'a BlotterQuery),
    TraderBlotter(i64),
    ValidateCreate { trade: &'a Trade, user_id: &'a str },
    ValidateAmend { trade: &'a Trade, user_id: &'a str },
    ValidateRead(&'a str),
    Login { login: &'a str, password: &'a str },
    UserByLogin(&'a str),
}

impl<'a> Endpoint<'a> {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::ValidateCreate { .. } | Endpoint::ValidateAmend { .. } | Endpoint::Login { .. } => {
                Method::POST
            }
            _ => Method::GET,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::SearchTrades(_) => "/trades/search".to_string(),
            Endpoint::TradesPaginated(_) => "/trades/filter".to_string(),
            Endpoint::SearchRsql(_) => "/trades/rsql".to_string(),
            Endpoint::DashboardSummary(_) => "/dashboard/summary".to_string(),
            Endpoint::TradeBlotter(_) => "/dashboard/blotter".to_string(),
            Endpoint::TraderBlotter(id) => format!("/dashboard/trader/{id}/blotter"),
            Endpoint::ValidateCreate { .. } => "/trades/validate/create".to_string(),
            Endpoint::ValidateAmend { .. } => "/trades/validate/amend".to_string(),
            Endpoint::ValidateRead(_) => "/trades/validate/read".to_string(),
            Endpoint::Login { login, .. } => format!("/login/{}", urlencoding::encode(login)),
            Endpoint::UserByLogin(login) => {
                format!("/users/loginId/{}", urlencoding::encode(login))
            }
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::SearchTrades(p) => p.to_query(),
            Endpoint::TradesPaginated(p) => p.to_query(),
            Endpoint::SearchRsql(q) => vec![("query", q.to_string())],
            Endpoint::DashboardSummary(user_id) => {
                user_id.map(|id| vec![("userId", id.to_string())]).unwrap_or_default()
            }
            Endpoint::TradeBlotter(q) => q.to_query(),
            Endpoint::TraderBlotter(_) | Endpoint::UserByLogin(_) => Vec::new(),
            Endpoint::ValidateCreate { user_id, .. }
            | Endpoint::ValidateAmend { user_id, .. }
            | Endpoint::ValidateRead(user_id) => vec![("userId", user_id.to_string())],
            Endpoint::Login { password, .. } => vec![("Authorization", password.to_string())],
        }
    }

    pub fn body(&self) -> Option<&'a Trade> {
        match self {
            Endpoint::ValidateCreate { trade, .. } | Endpoint::ValidateAmend { trade, .. } => {
                Some(*trade)
            }
            _ => None,
        }
    }

    /// Metric / log label.
    pub fn label(&self) -> &'static str {
        match self {
            Endpoint::SearchTrades(_) => "search_trades",
            Endpoint::TradesPaginated(_) => "trades_paginated",
            Endpoint::SearchRsql(_) => "search_rsql",
            Endpoint::DashboardSummary(_) => "dashboard_summary",
            Endpoint::TradeBlotter(_) => "trade_blotter",
            Endpoint::TraderBlotter(_) => "trader_blotter",
            Endpoint::ValidateCreate { .. } => "validate_create",
            Endpoint::ValidateAmend { .. } => "validate_amend",
            Endpoint::ValidateRead(_) => "validate_read",
            Endpoint::Login { .. } => "login",
            Endpoint::UserByLogin(_) => "user_by_login",
        }
    }
}

/// Backend capabilities used by the controllers.
#[async_trait]
pub trait TradeApi: Send + Sync {
    async fn search_trades(&self, params: &SearchParams) -> Result<Listing<Row>, ApiError>;

    async fn trades_paginated(&self, params: &PaginationParams)
        -> Result<Listing<Row>, ApiError>;

    async fn search_trades_rsql(&self, query: &str) -> Result<Listing<Row>, ApiError>;

    /// `Ok(None)` when the backend had nothing to report.
    async fn dashboard_summary(
        &self,
        user_id: Option<i64>,
    ) -> Result<Option<DashboardSummary>, ApiError>;

    async fn trade_blotter(
        &self,
        query: &BlotterQuery,
    ) -> Result<Listing<TradeBlotterRow>, ApiError>;

    async fn trader_blotter(&self, trader_id: i64) -> Result<Listing<TradeBlotterRow>, ApiError>;

    async fn validate_creation(
        &self,
        trade: &Trade,
        user_id: &str,
    ) -> Result<ValidationResult, ApiError>;

    async fn validate_amendment(
        &self,
        trade: &Trade,
        user_id: &str,
    ) -> Result<ValidationResult, ApiError>;

    async fn validate_read(&self, user_id: &str) -> Result<ValidationResult, ApiError>;

    async fn authenticate(&self, login: &str, password: &str) -> Result<(), ApiError>;

    async fn user_by_login(&self, login: &str) -> Result<User, ApiError>;
}

/// reqwest-backed client for the trade-management REST API.
#[derive(Debug, Clone)]
pub struct HttpTradeApi {
    base: String,
    timeout_ms: u64,
    http: reqwest::Client,
}

impl HttpTradeApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed =
            Url::parse(base_url).map_err(|e| ApiError::BadUrl(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
            timeout_ms: timeout.as_millis() as u64,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn request(&self, ep: &Endpoint<'_>) -> RequestBuilder {
        let url = format!("{}{}", self.base, ep.path());
        let mut rb = self
            .http
            .request(ep.method(), url)
            .header(ACCEPT, "application/json");
        let query = ep.query();
        if !query.is_empty() {
            rb = rb.query(&query);
        }
        if let Some(trade) = ep.body() {
            rb = rb.json(trade);
        }
        rb
    }

    /// Sends the call and returns the raw body of a 2xx reply.
    async fn send(&self, ep: Endpoint<'_>) -> Result<Vec<u8>, ApiError> {
        let label = ep.label();
        let started = Instant::now();
        debug!(endpoint = label, path = %ep.path(), "api call");

        let outcome = self.send_inner(&ep).await;

        API_LATENCY
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        let tag = match &outcome {
            Ok(_) => "ok",
            Err(ApiError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        API_REQUESTS.with_label_values(&[label, tag]).inc();
        if let Err(e) = &outcome {
            warn!(endpoint = label, error = %e, "api call failed");
        }
        outcome
    }

    async fn send_inner(&self, ep: &Endpoint<'_>) -> Result<Vec<u8>, ApiError> {
        let rsp = self
            .request(ep)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = rsp.status();
        let body = rsp
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?
            .to_vec();
        if status.is_success() {
            Ok(body)
        } else {
            Err(backend_error(status.as_u16(), &body))
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout_ms)
        } else {
            ApiError::Network(e.to_string())
        }
    }

    /// `None` for an empty or `null` body.
    async fn fetch<T: DeserializeOwned>(&self, ep: Endpoint<'_>) -> Result<Option<T>, ApiError> {
        let body = self.send(ep).await?;
        decode_body(&body)
    }
}

pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<T>>(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn required<T>(v: Option<T>, what: &str) -> Result<T, ApiError> {
    v.ok_or_else(|| ApiError::Decode(format!("empty {what} response")))
}

#[async_trait]
impl TradeApi for HttpTradeApi {
    async fn search_trades(&self, params: &SearchParams) -> Result<Listing<Row>, ApiError> {
        Ok(self
            .fetch(Endpoint::SearchTrades(params))
            .await?
            .unwrap_or_default())
    }

    async fn trades_paginated(
        &self,
        params: &PaginationParams,
    ) -> Result<Listing<Row>, ApiError> {
        Ok(self
            .fetch(Endpoint::TradesPaginated(params))
            .await?
            .unwrap_or_default())
    }

    async fn search_trades_rsql(&self, query: &str) -> Result<Listing<Row>, ApiError> {
        Ok(self
            .fetch(Endpoint::SearchRsql(query))
            .await?
            .unwrap_or_default())
    }

    async fn dashboard_summary(
        &self,
        user_id: Option<i64>,
    ) -> Result<Option<DashboardSummary>, ApiError> {
        self.fetch(Endpoint::DashboardSummary(user_id)).await
    }

    async fn trade_blotter(
        &self,
        query: &BlotterQuery,
    ) -> Result<Listing<TradeBlotterRow>, ApiError> {
        Ok(self
            .fetch(Endpoint::TradeBlotter(query))
            .await?
            .unwrap_or_default())
    }

    async fn trader_blotter(&self, trader_id: i64) -> Result<Listing<TradeBlotterRow>, ApiError> {
        Ok(self
            .fetch(Endpoint::TraderBlotter(trader_id))
            .await?
            .unwrap_or_default())
    }

    async fn validate_creation(
        &self,
        trade: &Trade,
        user_id: &str,
    ) -> Result<ValidationResult, ApiError> {
        let v = self.fetch(Endpoint::ValidateCreate { trade, user_id }).await?;
        required(v, "validation")
    }

    async fn validate_amendment(
        &self,
        trade: &Trade,
        user_id: &str,
    ) -> Result<ValidationResult, ApiError> {
        let v = self.fetch(Endpoint::ValidateAmend { trade, user_id }).await?;
        required(v, "validation")
    }

    async fn validate_read(&self, user_id: &str) -> Result<ValidationResult, ApiError> {
        let v = self.fetch(Endpoint::ValidateRead(user_id)).await?;
        required(v, "validation")
    }

    async fn authenticate(&self, login: &str, password: &str) -> Result<(), ApiError> {
        // body is a free-form acknowledgement; only the status matters
        self.send(Endpoint::Login { login, password }).await.map(|_| ())
    }

    async fn user_by_login(&self, login: &str) -> Result<User, ApiError> {
        let v = self.fetch(Endpoint::UserByLogin(login)).await?;
        required(v, "user")
    }
}
