// ===============================
// src/testkit.rs (test-only fake backend)
// ===============================
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::api::{ApiError, TradeApi};
use crate::domain::{
    BlotterQuery, DashboardSummary, Listing, Page, PaginationParams, Row, SearchParams, Trade,
    TradeBlotterRow, User, ValidationResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Search(SearchParams),
    Paginated(PaginationParams),
    Rsql(String),
    Summary(Option<i64>),
    Blotter(BlotterQuery),
    TraderBlotter(i64),
    ValidateCreate { trade: Trade, user_id: String },
    ValidateAmend { trade: Trade, user_id: String },
    ValidateRead(String),
    Login(String),
    UserByLogin(String),
}

/// Records every call and answers with canned replies.
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    pub search: Mutex<Result<Listing<Row>, ApiError>>,
    /// Per-call (delay, reply) overrides for the three search endpoints, consumed in order.
    pub search_script: Mutex<VecDeque<(Duration, Result<Listing<Row>, ApiError>)>>,
    pub summary: Mutex<Result<Option<DashboardSummary>, ApiError>>,
    pub blotter: Mutex<Result<Listing<TradeBlotterRow>, ApiError>>,
    pub trader: Mutex<Result<Listing<TradeBlotterRow>, ApiError>>,
    pub validation: Mutex<Result<ValidationResult, ApiError>>,
    pub login: Mutex<Result<(), ApiError>>,
    pub user: Mutex<Result<User, ApiError>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            search: Mutex::new(Ok(Listing::default())),
            search_script: Mutex::new(VecDeque::new()),
            summary: Mutex::new(Ok(None)),
            blotter: Mutex::new(Ok(Listing::default())),
            trader: Mutex::new(Ok(Listing::default())),
            validation: Mutex::new(Ok(ValidationResult {
                is_valid: true,
                ..ValidationResult::default()
            })),
            login: Mutex::new(Ok(())),
            user: Mutex::new(Ok(User::default())),
        }
    }
}

impl FakeApi {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn search_reply(&self) -> Result<Listing<Row>, ApiError> {
        let scripted = self.search_script.lock().unwrap().pop_front();
        match scripted {
            Some((delay, reply)) => {
                tokio::time::sleep(delay).await;
                reply
            }
            None => self.search.lock().unwrap().clone(),
        }
    }
}

pub fn trade_rows(n: usize) -> Listing<Row> {
    Listing::Rows(
        (0..n)
            .map(|i| json!({ "tradeId": 1000 + i as i64, "counterpartyName": "Goldman" }))
            .collect(),
    )
}

pub fn blotter_page(rows: usize, total_pages: u32, total_elements: u64) -> Listing<TradeBlotterRow> {
    Listing::Page(Page {
        content: (0..rows)
            .map(|i| TradeBlotterRow {
                trade_id: Some(i as i64 + 1),
                total_notional: Some(1_000_000.0),
                ..TradeBlotterRow::default()
            })
            .collect(),
        total_pages,
        total_elements,
    })
}

#[async_trait]
impl TradeApi for FakeApi {
    async fn search_trades(&self, params: &SearchParams) -> Result<Listing<Row>, ApiError> {
        self.record(Call::Search(params.clone()));
        self.search_reply().await
    }

    async fn trades_paginated(
        &self,
        params: &PaginationParams,
    ) -> Result<Listing<Row>, ApiError> {
        self.record(Call::Paginated(params.clone()));
        self.search_reply().await
    }

    async fn search_trades_rsql(&self, query: &str) -> Result<Listing<Row>, ApiError> {
        self.record(Call::Rsql(query.to_string()));
        self.search_reply().await
    }

    async fn dashboard_summary(
        &self,
        user_id: Option<i64>,
    ) -> Result<Option<DashboardSummary>, ApiError> {
        self.record(Call::Summary(user_id));
        self.summary.lock().unwrap().clone()
    }

    async fn trade_blotter(
        &self,
        query: &BlotterQuery,
    ) -> Result<Listing<TradeBlotterRow>, ApiError> {
        self.record(Call::Blotter(query.clone()));
        self.blotter.lock().unwrap().clone()
    }

    async fn trader_blotter(&self, trader_id: i64) -> Result<Listing<TradeBlotterRow>, ApiError> {
        self.record(Call::TraderBlotter(trader_id));
        self.trader.lock().unwrap().clone()
    }

    async fn validate_creation(
        &self,
        trade: &Trade,
        user_id: &str,
    ) -> Result<ValidationResult, ApiError> {
        self.record(Call::ValidateCreate {
            trade: trade.clone(),
            user_id: user_id.to_string(),
        });
        self.validation.lock().unwrap().clone()
    }

    async fn validate_amendment(
        &self,
        trade: &Trade,
        user_id: &str,
    ) -> Result<ValidationResult, ApiError> {
        self.record(Call::ValidateAmend {
            trade: trade.clone(),
            user_id: user_id.to_string(),
        });
        self.validation.lock().unwrap().clone()
    }

    async fn validate_read(&self, user_id: &str) -> Result<ValidationResult, ApiError> {
        self.record(Call::ValidateRead(user_id.to_string()));
        self.validation.lock().unwrap().clone()
    }

    async fn authenticate(&self, login: &str, _password: &str) -> Result<(), ApiError> {
        self.record(Call::Login(login.to_string()));
        self.login.lock().unwrap().clone()
    }

    async fn user_by_login(&self, login: &str) -> Result<User, ApiError> {
        self.record(Call::UserByLogin(login.to_string()));
        self.user.lock().unwrap().clone()
    }
}
