// ===============================
// src/search.rs
// ===============================
//
// Trade search modal: basic filters, paginated listing, RSQL query.
//
// Overlapping searches: the newest one wins. Every `search()` takes a
// fresh request number; a completion whose number is no longer pending
// (superseded, or abandoned by `clear()`) is dropped by the reducer.
//
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::TradeApi;
use crate::domain::{PaginationParams, Row, SearchField, SearchParams, SortDir, DEFAULT_PAGE_SIZE};
use crate::notify::Snackbar;
use crate::store::{Reducer, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Basic,
    Advanced,
    Rsql,
}

impl SearchMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(SearchMode::Basic),
            "advanced" | "paginated" | "paged" => Some(SearchMode::Advanced),
            "rsql" | "query" => Some(SearchMode::Rsql),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SearchMode::Basic => "Basic Search",
            SearchMode::Advanced => "Paginated Search",
            SearchMode::Rsql => "RSQL Query",
        }
    }
}

/// One edit of the paginated-search inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEdit {
    Page(u32),
    Size(u32),
    SortBy(String),
    SortDir(SortDir),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub mode: SearchMode,
    pub params: SearchParams,
    pub pagination: PaginationParams,
    pub rsql_query: String,
    pub results: Vec<Row>,
    /// At least one search completed since the last clear.
    pub completed: bool,
    pub loading: bool,
    pub pending: Option<u64>,
    pub requests: u64,
    pub snackbar: Snackbar,
}

#[derive(Debug, Clone)]
pub enum SearchAction {
    SetMode(SearchMode),
    SetField(SearchField, String),
    EditPage(PageEdit),
    SetRsql(String),
    Clear,
    Start,
    Succeeded { request: u64, rows: Vec<Row> },
    Failed { request: u64, message: String },
    DismissNotice,
}

impl SearchState {
    pub fn search_enabled(&self) -> bool {
        !self.loading
    }

    pub fn search_label(&self) -> &'static str {
        if self.loading {
            "Searching..."
        } else {
            "Search"
        }
    }

    fn accepts(&self, request: u64) -> bool {
        self.pending == Some(request)
    }
}

impl Reducer for SearchState {
    type Action = SearchAction;

    fn reduce(&self, action: SearchAction) -> Self {
        let mut next = self.clone();
        match action {
            // inputs of the other modes are kept
            SearchAction::SetMode(mode) => next.mode = mode,
            SearchAction::SetField(field, value) => next.params.set(field, &value),
            SearchAction::EditPage(edit) => match edit {
                PageEdit::Page(p) => next.pagination.page = p,
                PageEdit::Size(s) => {
                    next.pagination.size = if s == 0 { DEFAULT_PAGE_SIZE } else { s }
                }
                PageEdit::SortBy(f) => next.pagination.sort_by = f,
                PageEdit::SortDir(d) => next.pagination.sort_dir = d,
            },
            SearchAction::SetRsql(q) => next.rsql_query = q,
            SearchAction::Clear => {
                next.params = SearchParams::default();
                next.pagination = PaginationParams::default();
                next.rsql_query.clear();
                next.results.clear();
                next.completed = false;
                next.loading = false;
                next.pending = None;
            }
            SearchAction::Start => {
                next.requests += 1;
                next.pending = Some(next.requests);
                next.loading = true;
            }
            SearchAction::Succeeded { request, rows } => {
                if !self.accepts(request) {
                    return next;
                }
                next.snackbar = self.snackbar.success(format!("Found {} trades", rows.len()));
                next.results = rows;
                next.completed = true;
                next.loading = false;
                next.pending = None;
            }
            SearchAction::Failed { request, message } => {
                if !self.accepts(request) {
                    return next;
                }
                // previous results stay on screen
                next.snackbar = self.snackbar.error(format!("Search failed: {message}"));
                next.loading = false;
                next.pending = None;
            }
            SearchAction::DismissNotice => next.snackbar = self.snackbar.dismiss(),
        }
        next
    }
}

pub struct SearchController<A: TradeApi + ?Sized> {
    api: Arc<A>,
    store: Store<SearchState>,
}

impl<A: TradeApi + ?Sized> SearchController<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            store: Store::new(SearchState::default()),
        }
    }

    pub fn state(&self) -> Arc<SearchState> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SearchState>> {
        self.store.subscribe()
    }

    pub fn dispatch(&self, action: SearchAction) -> Arc<SearchState> {
        self.store.dispatch(action)
    }

    pub fn clear(&self) -> Arc<SearchState> {
        self.store.dispatch(SearchAction::Clear)
    }

    /// Runs the search for the current mode and applies the outcome,
    /// unless a newer search or a clear came in meanwhile.
    pub async fn search(&self) -> Arc<SearchState> {
        let started = self.store.dispatch(SearchAction::Start);
        let request = started.requests;
        info!(mode = ?started.mode, request, "trade search");

        let outcome = match started.mode {
            SearchMode::Rsql => self.api.search_trades_rsql(&started.rsql_query).await,
            SearchMode::Advanced => self.api.trades_paginated(&started.pagination).await,
            SearchMode::Basic => self.api.search_trades(&started.params).await,
        };

        match outcome {
            Ok(listing) => {
                let rows = listing.into_rows();
                info!(request, count = rows.len(), "trade search done");
                self.store.dispatch(SearchAction::Succeeded { request, rows })
            }
            Err(e) => {
                warn!(request, error = %e, "trade search failed");
                self.store.dispatch(SearchAction::Failed {
                    request,
                    message: e.user_message(),
                })
            }
        }
    }
}
