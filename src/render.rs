// ===============================
// src/render.rs
// ===============================
//
// Plain-text views of the controller snapshots. Pure: snapshot in, text out.
//
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::dashboard::{DashboardState, DashboardTab};
use crate::domain::{DashboardSummary, SearchField, TradeBlotterRow, User};
use crate::mapping::{columns_from_results, humanize, rows_from_results};
use crate::notify::{Notice, NoticeKind};
use crate::pages::{Role, View, QUICK_ACCESS};
use crate::search::{SearchMode, SearchState};
use crate::validation::{ValidationMode, ValidationState};

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[1;31m";
const BOLD: &str = "\x1b[1m";

/// Widest cell before it is clipped.
const MAX_CELL: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub color: bool,
}

impl Palette {
    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn ansi() -> Self {
        Self { color: true }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint(BOLD, &format!("== {text} =="))
    }
}

/// Whole US dollars with thousands separators: `$1,234,567`, `-$42`.
pub fn format_usd(amount: f64) -> String {
    if !amount.is_finite() {
        return "$0".to_string();
    }
    let whole = amount.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Short US date (`1/15/2024`); `Invalid Date` when the input does not parse.
pub fn format_date(raw: &str) -> String {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|d| d.date())
        });
    match date {
        Some(d) => d.format("%-m/%-d/%Y").to_string(),
        None => "Invalid Date".to_string(),
    }
}

pub fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn or_dash(v: Option<&str>) -> String {
    match v {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => "-".to_string(),
    }
}

fn clip(s: &str) -> String {
    if s.chars().count() > MAX_CELL {
        let mut t: String = s.chars().take(MAX_CELL - 3).collect();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}

/// Fixed-width text table; long cells are clipped.
pub fn table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers: Vec<String> = headers.iter().map(|h| clip(h)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|c| clip(c)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}", w = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = line(&headers);
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

fn button(label: &str, enabled: bool) -> String {
    if enabled {
        format!("[{label}]")
    } else {
        format!("[{label}] (disabled)")
    }
}

fn tabs<T: PartialEq + Copy>(items: &[(T, &str)], active: T) -> String {
    items
        .iter()
        .map(|(t, label)| {
            if *t == active {
                format!("[{label}]")
            } else {
                format!(" {label} ")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_notice(notice: &Notice, palette: Palette) -> String {
    let tag = match notice.kind {
        NoticeKind::Success => palette.paint(GREEN, "[success]"),
        NoticeKind::Error => palette.paint(RED, "[error]"),
    };
    format!("{tag} {}", notice.message)
}

// ---- Home ----
pub fn render_home(role: Role, user: Option<&User>, palette: Palette) -> String {
    let mut out = palette.heading("Welcome to the Trade Platform");
    out.push('\n');
    out.push_str(&format!("{} workspace\n", role.title()));
    match user {
        Some(u) => {
            let name = [u.first_name.as_deref(), u.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            let login = u.login_id.as_deref().unwrap_or("-");
            if name.is_empty() {
                out.push_str(&format!("Welcome, {login}\n"));
            } else {
                out.push_str(&format!("Welcome, {name} ({login})\n"));
            }
        }
        None => out.push_str("Not logged in\n"),
    }

    out.push_str("Quick access:\n");
    for view in QUICK_ACCESS {
        let (title, blurb) = match view {
            View::Search => (
                "Advanced Search",
                "Search trades by criteria, RSQL query or page",
            ),
            View::Dashboard => (
                "Trading Dashboard",
                "Summary statistics, trade blotter and your own trades",
            ),
            _ => (
                "Trade Validation",
                "Validate a trade for creation, amendment or read access",
            ),
        };
        out.push_str(&format!("  {:<11} {:<18} {}\n", view.as_str(), title, blurb));
    }
    out.push_str("Type `launch <name>` to open one, `help` for all commands.\n");
    out
}

pub fn render_delegated(view: View) -> String {
    format!("The {view} view opens in its own screen and is not part of this console.\n")
}

// ---- Search ----
pub fn render_search(st: &SearchState, palette: Palette) -> String {
    let mut out = palette.heading("Trade Search");
    out.push('\n');
    out.push_str(&format!(
        "Mode: {}\n",
        tabs(
            &[
                (SearchMode::Basic, SearchMode::Basic.title()),
                (SearchMode::Advanced, SearchMode::Advanced.title()),
                (SearchMode::Rsql, SearchMode::Rsql.title()),
            ],
            st.mode,
        )
    ));

    match st.mode {
        SearchMode::Basic => {
            for field in SearchField::ALL {
                out.push_str(&format!(
                    "  {:<18} {}\n",
                    format!("{}:", humanize(field.param())),
                    or_dash(st.params.get(field))
                ));
            }
        }
        SearchMode::Advanced => {
            let p = &st.pagination;
            out.push_str(&format!(
                "  Page: {}  Size: {}  Sort By: {}  Sort Dir: {}\n",
                p.page,
                p.size,
                p.sort_by,
                p.sort_dir.as_str()
            ));
        }
        SearchMode::Rsql => {
            out.push_str(&format!("  Query: {}\n", or_dash(Some(st.rsql_query.as_str()))));
        }
    }
    out.push_str(&button(st.search_label(), st.search_enabled()));
    out.push('\n');

    if st.loading {
        out.push_str("Searching trades...\n");
    } else if !st.results.is_empty() {
        out.push_str(&format!("\nSearch Results ({} trades)\n", st.results.len()));
        let columns = columns_from_results(&st.results);
        let headers: Vec<String> = columns.iter().map(|c| c.header.clone()).collect();
        let rows: Vec<Vec<String>> = rows_from_results(&st.results)
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(&c.field).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        out.push_str(&table(&headers, &rows));
    } else if st.completed {
        out.push_str("No trades found\n");
    }
    out
}

// ---- Dashboard ----
fn summary_cards(s: &DashboardSummary) -> String {
    let cards = [
        ("Total Trades", s.total_trades.to_string()),
        ("Active Trades", s.active_trades.to_string()),
        ("New Trades", s.new_trades.to_string()),
        ("Amended Trades", s.amended_trades.to_string()),
        ("Terminated Trades", s.terminated_trades.to_string()),
        ("Total Notional", format_usd(s.total_notional)),
        ("Notional Today", format_usd(s.notional_today)),
        ("Notional This Week", format_usd(s.notional_this_week)),
        ("Notional This Month", format_usd(s.notional_this_month)),
        ("Trades Today", s.trades_today.to_string()),
        ("Trades This Week", s.trades_this_week.to_string()),
        ("Trades This Month", s.trades_this_month.to_string()),
        ("Most Active Counterparty", or_dash(s.most_active_counterparty.as_deref())),
        ("Most Active Book", or_dash(s.most_active_book.as_deref())),
        (
            "Last Trade Date",
            s.last_trade_date
                .as_deref()
                .map(format_date)
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];
    cards
        .iter()
        .map(|(k, v)| format!("  {:<26} {v}\n", format!("{k}:")))
        .collect()
}

fn blotter_table(rows: &[TradeBlotterRow]) -> String {
    let headers: Vec<String> = [
        "Trade ID",
        "Trade Date",
        "Counterparty",
        "Book",
        "Type",
        "Status",
        "Notional",
        "Currency",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.trade_id.map(|id| id.to_string()).unwrap_or_default(),
                r.trade_date.as_deref().map(format_date).unwrap_or_default(),
                r.counterparty_name.clone().unwrap_or_default(),
                r.book_name.clone().unwrap_or_default(),
                r.trade_type.clone().unwrap_or_default(),
                r.trade_status.clone().unwrap_or_default(),
                r.total_notional.map(format_usd).unwrap_or_default(),
                r.primary_currency.clone().unwrap_or_default(),
            ]
        })
        .collect();
    table(&headers, &cells)
}

pub fn render_dashboard(st: &DashboardState, palette: Palette) -> String {
    let mut out = palette.heading("Trading Dashboard");
    out.push('\n');
    out.push_str(&tabs(
        &[
            (DashboardTab::Summary, "Summary"),
            (DashboardTab::Blotter, "Trade Blotter"),
            (DashboardTab::Trader, "My Trades"),
        ],
        st.tab,
    ));
    out.push('\n');

    match st.tab {
        DashboardTab::Summary => {
            if st.summary.is_loading() {
                out.push_str("Loading summary...\n");
            } else if let Some(Some(summary)) = &st.summary.data {
                out.push_str(&summary_cards(summary));
            } else {
                out.push_str("No summary data available\n");
            }
        }
        DashboardTab::Blotter => {
            let data = st.blotter.data.as_ref().filter(|d| !d.rows.is_empty());
            if st.blotter.is_loading() {
                out.push_str("Loading trades...\n");
            } else {
                let meta = st.page_meta();
                if let Some(meta) = meta {
                    out.push_str(&format!(
                        "Page {} of {} ({} total trades)\n",
                        st.query.page + 1,
                        meta.total_pages,
                        meta.total_elements
                    ));
                }
                match data {
                    Some(data) => out.push_str(&blotter_table(&data.rows)),
                    None => out.push_str("No trade data available\n"),
                }
                // paging stays reachable from an empty page
                if data.is_some() || meta.is_some() || st.can_prev() {
                    out.push_str(&format!(
                        "{}  {}\n",
                        button("< Previous", st.can_prev()),
                        button("Next >", st.can_next())
                    ));
                }
                if data.is_some() {
                    if let Some((first, last, total)) = st.showing_range() {
                        out.push_str(&format!("Showing {first} to {last} of {total} trades\n"));
                    }
                }
            }
        }
        DashboardTab::Trader => {
            let rows = st.trader.data.as_ref().filter(|r| !r.is_empty());
            if st.trader.is_loading() {
                out.push_str("Loading your trades...\n");
            } else if let Some(rows) = rows {
                out.push_str(&format!("My Trades ({})\n", rows.len()));
                out.push_str(&blotter_table(rows));
            } else {
                out.push_str("No trades found for this trader\n");
            }
        }
    }
    out
}

// ---- Validation ----
pub fn render_validation(st: &ValidationState, login: Option<&str>, palette: Palette) -> String {
    let mut out = palette.heading("Trade Validation");
    out.push('\n');
    out.push_str(&format!(
        "Mode: {}\n",
        tabs(
            &[
                (ValidationMode::Create, "Create"),
                (ValidationMode::Amend, "Amend"),
                (ValidationMode::Read, "Read"),
            ],
            st.mode,
        )
    ));

    let t = &st.trade;
    out.push_str("Trade Information\n");
    let info = [
        (
            "Trade ID",
            t.trade_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "New Trade".to_string()),
        ),
        ("Counterparty", or_dash(t.counterparty_name.as_deref())),
        ("Book", or_dash(t.book_name.as_deref())),
        ("Trade Type", or_dash(t.trade_type.as_deref())),
        (
            "Trade Date",
            t.trade_date
                .as_deref()
                .map(format_date)
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Status", or_dash(t.trade_status.as_deref())),
        ("Legs", t.trade_legs.len().to_string()),
        ("User", login.unwrap_or("Not logged in").to_string()),
    ];
    for (k, v) in info {
        out.push_str(&format!("  {:<14} {v}\n", format!("{k}:")));
    }

    let label = if st.loading { "Validating..." } else { "Validate" };
    out.push_str(&button(label, !st.loading));
    out.push('\n');

    if let Some(result) = &st.result {
        out.push('\n');
        if result.is_valid {
            out.push_str(&palette.paint(GREEN, "Validation Passed"));
        } else {
            out.push_str(&palette.paint(RED, "Validation Failed"));
        }
        out.push('\n');
        if !result.errors.is_empty() {
            out.push_str("Errors:\n");
            for e in &result.errors {
                out.push_str(&format!("  - {e}\n"));
            }
        }
        if !result.warnings.is_empty() {
            out.push_str("Warnings:\n");
            for w in &result.warnings {
                out.push_str(&format!("  - {w}\n"));
            }
        }
        out.push_str("Validation Summary\n");
        out.push_str(&format!("  Mode: {} Validation\n", st.mode.title()));
        out.push_str(&format!(
            "  Status: {}\n",
            if result.is_valid { "PASSED" } else { "FAILED" }
        ));
        out.push_str(&format!("  Errors: {}\n", result.errors.len()));
        out.push_str(&format!("  Warnings: {}\n", result.warnings.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{BlotterData, DashboardAction};
    use crate::domain::{PageMeta, ValidationResult};
    use crate::search::SearchAction;
    use crate::store::Reducer;
    use serde_json::json;

    #[test]
    fn usd_is_whole_dollars_with_grouping() {
        assert_eq!(format_usd(1_234_567.0), "$1,234,567");
        assert_eq!(format_usd(999.6), "$1,000");
        assert_eq!(format_usd(0.0), "$0");
        assert_eq!(format_usd(-42_000.0), "-$42,000");
    }

    #[test]
    fn dates_are_short_us_style() {
        assert_eq!(format_date("2024-01-15"), "1/15/2024");
        assert_eq!(format_date("2024-11-05T10:30:00"), "11/5/2024");
        assert_eq!(format_date("2024-11-05T10:30:00Z"), "11/5/2024");
        assert_eq!(format_date("yesterday"), "Invalid Date");
    }

    #[test]
    fn long_cells_are_clipped() {
        let out = table(
            &["Name".to_string()],
            &[vec!["a very long counterparty name indeed".to_string()]],
        );
        assert!(out.contains("a very long counterpa..."));
        assert!(!out.contains("indeed"));
    }

    #[test]
    fn search_shows_spinner_and_hides_results_while_loading() {
        let st = SearchState::default()
            .reduce(SearchAction::Start)
            .reduce(SearchAction::Succeeded {
                request: 1,
                rows: vec![json!({ "tradeId": 1, "bookName": "FX" })],
            });
        let done = render_search(&st, Palette::plain());
        assert!(done.contains("Search Results (1 trades)"));
        assert!(done.contains("Trade Id | Book Name"));

        let again = render_search(&st.reduce(SearchAction::Start), Palette::plain());
        assert!(again.contains("Searching trades..."));
        assert!(again.contains("[Searching...] (disabled)"));
        assert!(!again.contains("Search Results"));
    }

    #[test]
    fn empty_search_says_so_only_after_a_search() {
        let fresh = render_search(&SearchState::default(), Palette::plain());
        assert!(!fresh.contains("No trades found"));
        let st = SearchState::default()
            .reduce(SearchAction::Start)
            .reduce(SearchAction::Succeeded {
                request: 1,
                rows: Vec::new(),
            });
        assert!(render_search(&st, Palette::plain()).contains("No trades found"));
    }

    #[test]
    fn dashboard_empty_states() {
        let st = DashboardState::default().reduce(DashboardAction::SummaryLoaded(None));
        assert!(render_dashboard(&st, Palette::plain()).contains("No summary data available"));

        let st = st.reduce(DashboardAction::SelectTab(DashboardTab::Blotter));
        assert!(render_dashboard(&st, Palette::plain()).contains("No trade data available"));

        let mut st = st;
        st.tab = DashboardTab::Trader;
        assert!(render_dashboard(&st, Palette::plain())
            .contains("No trades found for this trader"));
    }

    #[test]
    fn blotter_page_header_and_navigation() {
        let mut st = DashboardState::default().reduce(DashboardAction::SelectTab(DashboardTab::Blotter));
        st.blotter.data = Some(BlotterData {
            query: st.query.clone(),
            rows: vec![TradeBlotterRow {
                trade_id: Some(1),
                total_notional: Some(2_500_000.0),
                ..TradeBlotterRow::default()
            }],
            meta: Some(PageMeta {
                total_pages: 3,
                total_elements: 45,
            }),
        });
        let out = render_dashboard(&st, Palette::plain());
        assert!(out.contains("Page 1 of 3 (45 total trades)"));
        assert!(out.contains("[< Previous] (disabled)"));
        assert!(out.contains("[Next >]"));
        assert!(!out.contains("[Next >] (disabled)"));
        assert!(out.contains("Showing 1 to 20 of 45 trades"));
        assert!(out.contains("$2,500,000"));
    }

    #[test]
    fn empty_page_keeps_navigation() {
        let mut st = DashboardState::default().reduce(DashboardAction::SelectTab(DashboardTab::Blotter));
        st.query.page = 1;
        st.blotter.data = Some(BlotterData {
            query: st.query.clone(),
            rows: Vec::new(),
            meta: Some(PageMeta {
                total_pages: 2,
                total_elements: 20,
            }),
        });
        let out = render_dashboard(&st, Palette::plain());
        assert!(out.contains("No trade data available"));
        assert!(out.contains("Page 2 of 2 (20 total trades)"));
        assert!(out.contains("[< Previous]"));
        assert!(!out.contains("[< Previous] (disabled)"));
        assert!(out.contains("[Next >] (disabled)"));
        assert!(!out.contains("Showing"));
    }

    #[test]
    fn failed_read_validation_summary() {
        let st = ValidationState {
            mode: ValidationMode::Read,
            result: Some(ValidationResult {
                is_valid: false,
                errors: vec!["Trade not visible to user".into()],
                warnings: Vec::new(),
            }),
            ..ValidationState::default()
        };
        let out = render_validation(&st, Some("jsmith"), Palette::plain());
        assert!(out.contains("Validation Failed"));
        assert!(out.contains("  - Trade not visible to user"));
        assert!(out.contains("Mode: Read Validation"));
        assert!(out.contains("Status: FAILED"));
        assert!(out.contains("Errors: 1"));
        assert!(out.contains("Warnings: 0"));
        assert!(!out.contains("Warnings:\n"));
        assert!(out.contains("New Trade"));
        assert!(out.contains("jsmith"));
    }

    #[test]
    fn passed_banner_is_green_when_colored() {
        let st = ValidationState {
            result: Some(ValidationResult {
                is_valid: true,
                ..ValidationResult::default()
            }),
            ..ValidationState::default()
        };
        let out = render_validation(&st, None, Palette::ansi());
        assert!(out.contains("\x1b[92mValidation Passed\x1b[0m"));
        assert!(out.contains("Not logged in"));
    }

    #[test]
    fn home_offers_all_three_screens_to_every_role() {
        for role in Role::ALL {
            let out = render_home(role, None, Palette::plain());
            assert!(out.starts_with("== Welcome to the Trade Platform ==\n"));
            assert!(out.contains(&format!("{} workspace", role.title())));
            assert!(out.contains("Advanced Search"));
            assert!(out.contains("Trading Dashboard"));
            assert!(out.contains("Trade Validation"));
        }
    }
}
