// ===============================
// src/dashboard.rs
// ===============================
//
// Trading dashboard modal: summary metrics, paged blotter, "my trades".
//
// - Summary + blotter are refreshed by a background task (immediately on
//   open, then every `refresh_every`) that lives exactly as long as the
//   `RefreshGuard` returned by `open()`.
// - A change of the blotter query (page/size/sort) refetches the blotter
//   right away; answers for an older query are ignored.
// - The trader blotter is fetched on demand only.
//
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::api::TradeApi;
use crate::domain::{
    BlotterQuery, DashboardSummary, Listing, PageMeta, TradeBlotterRow, DEFAULT_PAGE_SIZE,
};
use crate::metrics::DASHBOARD_REFRESHES;
use crate::notify::Snackbar;
use crate::session::Session;
use crate::store::{Reducer, Store};

pub const DEFAULT_REFRESH_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardTab {
    #[default]
    Summary,
    Blotter,
    Trader,
}

impl DashboardTab {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Some(DashboardTab::Summary),
            "blotter" => Some(DashboardTab::Blotter),
            "trader" | "mine" | "my" => Some(DashboardTab::Trader),
            _ => None,
        }
    }
}

/// Remote data slot: last good data, whether a fetch is running, last error.
#[derive(Debug, Clone, PartialEq)]
pub struct Remote<T> {
    pub data: Option<T>,
    pub in_flight: bool,
    pub error: Option<String>,
}

impl<T> Default for Remote<T> {
    fn default() -> Self {
        Self {
            data: None,
            in_flight: false,
            error: None,
        }
    }
}

impl<T> Remote<T> {
    /// Spinner state: fetching and nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.in_flight
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlotterData {
    pub query: BlotterQuery,
    pub rows: Vec<TradeBlotterRow>,
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub tab: DashboardTab,
    pub query: BlotterQuery,
    /// `Some(None)`: fetched, backend had nothing.
    pub summary: Remote<Option<DashboardSummary>>,
    pub blotter: Remote<BlotterData>,
    pub trader: Remote<Vec<TradeBlotterRow>>,
    pub trader_requests: u64,
    pub trader_pending: Option<u64>,
    pub snackbar: Snackbar,
}

#[derive(Debug, Clone)]
pub enum DashboardAction {
    SelectTab(DashboardTab),
    PrevPage,
    NextPage,
    SetPageSize(u32),
    SetSort(String),
    SummaryStarted,
    SummaryLoaded(Option<DashboardSummary>),
    SummaryFailed(String),
    BlotterStarted(BlotterQuery),
    BlotterLoaded {
        query: BlotterQuery,
        listing: Listing<TradeBlotterRow>,
    },
    BlotterFailed {
        query: BlotterQuery,
        message: String,
    },
    TraderUnavailable,
    TraderStarted,
    TraderLoaded {
        request: u64,
        rows: Vec<TradeBlotterRow>,
    },
    TraderFailed {
        request: u64,
        message: String,
    },
    DismissNotice,
}

/// Same listing up to the page number, so page counts carry over.
fn same_listing(a: &BlotterQuery, b: &BlotterQuery) -> bool {
    a.user_id == b.user_id && a.size == b.size && a.sort == b.sort
}

impl DashboardState {
    /// Page counts of the loaded blotter, if they still describe the current size and sort.
    pub fn page_meta(&self) -> Option<PageMeta> {
        self.blotter
            .data
            .as_ref()
            .filter(|d| same_listing(&d.query, &self.query))
            .and_then(|d| d.meta)
    }

    pub fn can_prev(&self) -> bool {
        self.query.page > 0
    }

    pub fn can_next(&self) -> bool {
        match self.page_meta() {
            Some(m) => m.total_pages > 0 && self.query.page + 1 < m.total_pages,
            None => false,
        }
    }

    /// (first, last, total) row numbers shown on the current blotter page.
    pub fn showing_range(&self) -> Option<(u64, u64, u64)> {
        let meta = self.page_meta()?;
        let size = self.query.size.max(1) as u64;
        let first = self.query.page as u64 * size + 1;
        let last = ((self.query.page as u64 + 1) * size).min(meta.total_elements);
        Some((first, last, meta.total_elements))
    }
}

impl Reducer for DashboardState {
    type Action = DashboardAction;

    fn reduce(&self, action: DashboardAction) -> Self {
        let mut next = self.clone();
        match action {
            DashboardAction::SelectTab(tab) => {
                // the trader tab opens only through a successful trader fetch
                if tab != DashboardTab::Trader {
                    next.tab = tab;
                }
            }
            DashboardAction::PrevPage => {
                if self.can_prev() {
                    next.query.page -= 1;
                }
            }
            DashboardAction::NextPage => {
                if self.can_next() {
                    next.query.page += 1;
                }
            }
            DashboardAction::SetPageSize(size) => {
                next.query.size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };
                next.query.page = 0;
            }
            DashboardAction::SetSort(sort) => {
                next.query.sort = sort;
                next.query.page = 0;
            }
            DashboardAction::SummaryStarted => next.summary.in_flight = true,
            DashboardAction::SummaryLoaded(summary) => {
                next.summary = Remote {
                    data: Some(summary),
                    in_flight: false,
                    error: None,
                };
            }
            DashboardAction::SummaryFailed(message) => {
                if self.summary.error.is_none() {
                    next.snackbar = self
                        .snackbar
                        .error(format!("Failed to load dashboard summary: {message}"));
                }
                next.summary.in_flight = false;
                next.summary.error = Some(message);
            }
            DashboardAction::BlotterStarted(query) => {
                if query == self.query {
                    next.blotter.in_flight = true;
                }
            }
            DashboardAction::BlotterLoaded { query, listing } => {
                if query != self.query {
                    return next;
                }
                let meta = listing.page_meta();
                // a shrunken listing can leave us past its end
                if let Some(m) = meta {
                    next.query.page = next.query.page.min(m.total_pages.saturating_sub(1));
                }
                next.blotter = Remote {
                    data: Some(BlotterData {
                        query,
                        rows: listing.into_rows(),
                        meta,
                    }),
                    in_flight: false,
                    error: None,
                };
            }
            DashboardAction::BlotterFailed { query, message } => {
                if query != self.query {
                    return next;
                }
                if self.blotter.error.is_none() {
                    next.snackbar = self
                        .snackbar
                        .error(format!("Failed to load trade blotter: {message}"));
                }
                next.blotter.in_flight = false;
                next.blotter.error = Some(message);
            }
            DashboardAction::TraderUnavailable => {
                next.snackbar = self.snackbar.error("User ID not available");
            }
            DashboardAction::TraderStarted => {
                next.trader_requests += 1;
                next.trader_pending = Some(next.trader_requests);
                next.trader.in_flight = true;
            }
            DashboardAction::TraderLoaded { request, rows } => {
                if self.trader_pending != Some(request) {
                    return next;
                }
                next.snackbar = self
                    .snackbar
                    .success(format!("Loaded {} trades for trader", rows.len()));
                next.trader = Remote {
                    data: Some(rows),
                    in_flight: false,
                    error: None,
                };
                next.trader_pending = None;
                next.tab = DashboardTab::Trader;
            }
            DashboardAction::TraderFailed { request, message } => {
                if self.trader_pending != Some(request) {
                    return next;
                }
                next.snackbar = self
                    .snackbar
                    .error(format!("Failed to load trader blotter: {message}"));
                next.trader.in_flight = false;
                next.trader.error = Some(message);
                next.trader_pending = None;
            }
            DashboardAction::DismissNotice => next.snackbar = self.snackbar.dismiss(),
        }
        next
    }
}

pub struct DashboardController<A: TradeApi + ?Sized> {
    api: Arc<A>,
    session: Session,
    store: Store<DashboardState>,
    refresh_every: Duration,
}

/// Keeps the background refresh alive; dropping it stops the task.
pub struct RefreshGuard {
    cancel: DropGuard,
    handle: JoinHandle<()>,
}

impl RefreshGuard {
    /// Stops the refresh task and waits for it to wind down.
    pub async fn close(self) {
        let RefreshGuard { cancel, handle } = self;
        drop(cancel);
        let _ = handle.await;
    }
}

impl<A: TradeApi + ?Sized + 'static> DashboardController<A> {
    pub fn new(api: Arc<A>, session: Session, refresh_every: Duration) -> Self {
        Self {
            api,
            session,
            store: Store::new(DashboardState::default()),
            refresh_every,
        }
    }

    pub fn state(&self) -> Arc<DashboardState> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.store.subscribe()
    }

    pub fn dispatch(&self, action: DashboardAction) -> Arc<DashboardState> {
        self.store.dispatch(action)
    }

    /// Starts the background refresh for as long as the guard is held.
    pub fn open(self: &Arc<Self>) -> RefreshGuard {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_refresh(self.clone(), token.clone()));
        RefreshGuard {
            cancel: token.drop_guard(),
            handle,
        }
    }

    pub async fn refresh(&self) {
        join(self.refresh_summary(), self.refresh_blotter()).await;
    }

    pub async fn refresh_summary(&self) {
        self.store.dispatch(DashboardAction::SummaryStarted);
        match self.api.dashboard_summary(None).await {
            Ok(summary) => {
                self.store.dispatch(DashboardAction::SummaryLoaded(summary));
            }
            Err(e) => {
                warn!(error = %e, "dashboard summary fetch failed");
                self.store
                    .dispatch(DashboardAction::SummaryFailed(e.user_message()));
            }
        }
    }

    pub async fn refresh_blotter(&self) {
        let query = self.store.snapshot().query.clone();
        self.store
            .dispatch(DashboardAction::BlotterStarted(query.clone()));
        match self.api.trade_blotter(&query).await {
            Ok(listing) => {
                debug!(page = query.page, rows = listing.len(), "blotter loaded");
                self.store
                    .dispatch(DashboardAction::BlotterLoaded { query, listing });
            }
            Err(e) => {
                warn!(page = query.page, error = %e, "blotter fetch failed");
                self.store.dispatch(DashboardAction::BlotterFailed {
                    query,
                    message: e.user_message(),
                });
            }
        }
    }

    /// "My Trades": fetch once for the signed-in trader, switch tab on success.
    pub async fn show_trader_blotter(&self) -> Arc<DashboardState> {
        let Some(trader_id) = self.session.user_id() else {
            warn!("trader blotter requested without a signed-in user id");
            return self.store.dispatch(DashboardAction::TraderUnavailable);
        };
        let started = self.store.dispatch(DashboardAction::TraderStarted);
        let request = started.trader_requests;
        match self.api.trader_blotter(trader_id).await {
            Ok(listing) => self.store.dispatch(DashboardAction::TraderLoaded {
                request,
                rows: listing.into_rows(),
            }),
            Err(e) => {
                warn!(trader_id, error = %e, "trader blotter fetch failed");
                self.store.dispatch(DashboardAction::TraderFailed {
                    request,
                    message: e.user_message(),
                })
            }
        }
    }
}

async fn run_refresh<A: TradeApi + ?Sized + 'static>(
    ctl: Arc<DashboardController<A>>,
    token: CancellationToken,
) {
    let mut tick = interval(ctl.refresh_every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut state_rx = ctl.store.subscribe();
    let mut last_query = ctl.store.snapshot().query.clone();
    info!(every_secs = ctl.refresh_every.as_secs(), "dashboard refresh started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tick.tick() => {
                DASHBOARD_REFRESHES.inc();
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ctl.refresh() => {}
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let query = state_rx.borrow_and_update().query.clone();
                if query != last_query {
                    last_query = query;
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ctl.refresh_blotter() => {}
                    }
                }
            }
        }
    }
    info!("dashboard refresh stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::domain::User;
    use crate::notify::NoticeKind;
    use crate::testkit::{blotter_page, Call, FakeApi};

    const EVERY: Duration = Duration::from_secs(DEFAULT_REFRESH_SECS);

    fn controller(session: Session) -> (Arc<FakeApi>, Arc<DashboardController<FakeApi>>) {
        let api = Arc::new(FakeApi::default());
        let ctl = Arc::new(DashboardController::new(api.clone(), session, EVERY));
        (api, ctl)
    }

    fn with_pages(total_pages: u32, page: u32) -> DashboardState {
        let mut st = DashboardState::default();
        st.query.page = page;
        st.blotter.data = Some(BlotterData {
            query: st.query.clone(),
            rows: Vec::new(),
            meta: Some(PageMeta {
                total_pages,
                total_elements: total_pages as u64 * 20,
            }),
        });
        st
    }

    #[test]
    fn previous_and_next_follow_page_bounds() {
        let first = with_pages(3, 0);
        assert!(!first.can_prev());
        assert!(first.can_next());

        let middle = with_pages(3, 1);
        assert!(middle.can_prev() && middle.can_next());

        let last = with_pages(3, 2);
        assert!(last.can_prev());
        assert!(!last.can_next());
        assert_eq!(last.reduce(DashboardAction::NextPage).query.page, 2);
        assert_eq!(first.reduce(DashboardAction::PrevPage).query.page, 0);
        assert_eq!(first.reduce(DashboardAction::NextPage).query.page, 1);
    }

    #[test]
    fn next_is_disabled_without_page_metadata() {
        let st = DashboardState::default();
        assert!(!st.can_next());
        assert!(!with_pages(0, 0).can_next());
    }

    #[test]
    fn showing_range_is_clamped_to_total() {
        let mut st = with_pages(3, 2);
        if let Some(d) = st.blotter.data.as_mut() {
            d.meta = Some(PageMeta {
                total_pages: 3,
                total_elements: 45,
            });
        }
        assert_eq!(st.showing_range(), Some((41, 45, 45)));
    }

    #[test]
    fn size_or_sort_change_returns_to_first_page() {
        let st = with_pages(5, 3).reduce(DashboardAction::SetPageSize(50));
        assert_eq!((st.query.page, st.query.size), (0, 50));
        let st = with_pages(5, 3).reduce(DashboardAction::SetSort("bookName,asc".into()));
        assert_eq!((st.query.page, st.query.sort.as_str()), (0, "bookName,asc"));
    }

    #[test]
    fn blotter_answer_for_an_old_query_is_ignored() {
        let old = DashboardState::default().query;
        let st = with_pages(3, 0)
            .reduce(DashboardAction::NextPage)
            .reduce(DashboardAction::BlotterLoaded {
                query: old,
                listing: blotter_page(20, 9, 180),
            });
        assert_eq!(st.page_meta().unwrap().total_pages, 3);
    }

    #[test]
    fn resize_does_not_page_past_the_new_end() {
        let st = with_pages(3, 2).reduce(DashboardAction::SetPageSize(100));
        assert_eq!(st.page_meta(), None);
        assert!(!st.can_next());
        let st = st.reduce(DashboardAction::NextPage);
        assert_eq!(st.query.page, 0);

        let st = st.reduce(DashboardAction::BlotterLoaded {
            query: st.query.clone(),
            listing: blotter_page(45, 1, 45),
        });
        assert_eq!(st.query.page, 0);
        assert!(!st.can_next() && !st.can_prev());
    }

    #[test]
    fn shrunken_listing_pulls_page_back_in_range() {
        let st = with_pages(5, 4);
        let st = st.reduce(DashboardAction::BlotterLoaded {
            query: st.query.clone(),
            listing: blotter_page(0, 2, 30),
        });
        assert_eq!(st.query.page, 1);
        assert!(st.can_prev());
        assert!(!st.can_next());
    }

    #[tokio::test]
    async fn trader_tab_without_user_sends_nothing() {
        let (api, ctl) = controller(Session::anonymous());
        let st = ctl.show_trader_blotter().await;
        assert!(api.calls().is_empty());
        assert_eq!(st.tab, DashboardTab::Summary);
        assert_eq!(st.snackbar.kind(), Some(NoticeKind::Error));
        assert_eq!(st.snackbar.message(), Some("User ID not available"));
    }

    #[tokio::test]
    async fn trader_tab_loads_and_switches() {
        let session = Session::with_user(User {
            id: Some(42),
            login_id: Some("jsmith".into()),
            ..User::default()
        });
        let (api, ctl) = controller(session);
        *api.trader.lock().unwrap() = Ok(blotter_page(4, 1, 4));

        let st = ctl.show_trader_blotter().await;
        assert_eq!(api.calls(), vec![Call::TraderBlotter(42)]);
        assert_eq!(st.tab, DashboardTab::Trader);
        assert_eq!(st.trader.data.as_ref().map(Vec::len), Some(4));
        assert_eq!(st.snackbar.message(), Some("Loaded 4 trades for trader"));
    }

    #[tokio::test]
    async fn trader_failure_keeps_current_tab() {
        let session = Session::with_user(User {
            id: Some(42),
            ..User::default()
        });
        let (api, ctl) = controller(session);
        ctl.dispatch(DashboardAction::SelectTab(DashboardTab::Blotter));
        *api.trader.lock().unwrap() = Err(ApiError::Timeout(10_000));

        let st = ctl.show_trader_blotter().await;
        assert_eq!(st.tab, DashboardTab::Blotter);
        assert_eq!(
            st.snackbar.message(),
            Some("Failed to load trader blotter: timeout of 10000ms exceeded")
        );
    }

    #[tokio::test]
    async fn summary_failures_notify_once_per_streak_and_keep_data() {
        let (api, ctl) = controller(Session::anonymous());
        *api.summary.lock().unwrap() = Ok(Some(DashboardSummary {
            total_trades: 12,
            ..DashboardSummary::default()
        }));
        ctl.refresh_summary().await;

        *api.summary.lock().unwrap() = Err(ApiError::Network("connection refused".into()));
        let first = {
            ctl.refresh_summary().await;
            ctl.state()
        };
        let id = first.snackbar.current.as_ref().unwrap().id;
        ctl.refresh_summary().await;
        let st = ctl.state();
        assert_eq!(st.snackbar.current.as_ref().unwrap().id, id);
        assert_eq!(
            st.summary.data.clone().flatten().map(|s| s.total_trades),
            Some(12)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_runs_while_open_and_stops_on_close() {
        let (api, ctl) = controller(Session::anonymous());
        *api.blotter.lock().unwrap() = Ok(blotter_page(20, 3, 60));
        let summaries = |api: &FakeApi| api.count(|c| matches!(c, Call::Summary(_)));
        let blotters = |api: &FakeApi| api.count(|c| matches!(c, Call::Blotter(_)));

        let guard = ctl.open();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(summaries(&api), 1);
        assert_eq!(blotters(&api), 1);
        assert!(ctl.state().can_next());

        tokio::time::sleep(EVERY).await;
        assert_eq!(summaries(&api), 2);
        assert_eq!(blotters(&api), 2);

        guard.close().await;
        tokio::time::sleep(EVERY * 4).await;
        assert_eq!(summaries(&api), 2);
        assert_eq!(blotters(&api), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn page_change_refetches_blotter_immediately() {
        let (api, ctl) = controller(Session::anonymous());
        *api.blotter.lock().unwrap() = Ok(blotter_page(20, 3, 60));

        let _guard = ctl.open();
        tokio::time::sleep(Duration::from_millis(1)).await;
        ctl.dispatch(DashboardAction::NextPage);
        tokio::time::sleep(Duration::from_millis(1)).await;

        let pages: Vec<u32> = api
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Blotter(q) => Some(q.page),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![0, 1]);
        assert_eq!(ctl.state().blotter.data.as_ref().unwrap().query.page, 1);
    }

    #[test]
    fn spinner_only_before_first_data() {
        let st = DashboardState::default().reduce(DashboardAction::SummaryStarted);
        assert!(st.summary.is_loading());
        let st = st
            .reduce(DashboardAction::SummaryLoaded(None))
            .reduce(DashboardAction::SummaryStarted);
        assert!(!st.summary.is_loading());
    }
}
