// ===============================
// src/domain.rs
// ===============================
use std::fmt;

use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Open-ended side map for fields the backend sends that we do not model.
pub type Extra = Map<String, Value>;

/// A generic result row (search results are displayed column-by-column, not typed).
pub type Row = Value;

/// Backend fields that are sometimes numbers and sometimes strings (ids, notionals, rates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for NumberOrText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberOrText::Int(v) => write!(f, "{v}"),
            NumberOrText::Float(v) => write!(f, "{v}"),
            NumberOrText::Text(s) => f.write_str(s),
        }
    }
}

// ---- Trade model ----
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLeg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg_id: Option<NumberOrText>,
    #[serde(default)]
    pub leg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notional: Option<NumberOrText>,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<NumberOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_period_schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_business_day_convention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_receive_flag: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<NumberOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<NumberOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader_user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputter_user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uti_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_touch_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_instructions: Option<String>,
    #[serde(default)]
    pub trade_legs: Vec<TradeLeg>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Trade {
    /// Blank trade for the validation screen: today's dates, NEW status, fixed + floating leg.
    pub fn draft() -> Self {
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        let leg = |leg_type: &str| TradeLeg {
            leg_type: leg_type.to_string(),
            ..TradeLeg::default()
        };
        Trade {
            trade_status: Some("NEW".to_string()),
            trade_date: Some(today.clone()),
            start_date: Some(today),
            trade_legs: vec![leg("Fixed"), leg("Floating")],
            ..Trade::default()
        }
    }
}

// ---- Search / pagination inputs ----
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    CounterpartyName,
    BookName,
    Status,
    StartDate,
    EndDate,
}

impl SearchField {
    pub const ALL: [SearchField; 5] = [
        SearchField::CounterpartyName,
        SearchField::BookName,
        SearchField::Status,
        SearchField::StartDate,
        SearchField::EndDate,
    ];

    /// Query parameter name on the wire.
    pub fn param(&self) -> &'static str {
        match self {
            SearchField::CounterpartyName => "counterpartyName",
            SearchField::BookName => "bookName",
            SearchField::Status => "status",
            SearchField::StartDate => "startDate",
            SearchField::EndDate => "endDate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counterparty" | "counterpartyname" | "cp" => Some(SearchField::CounterpartyName),
            "book" | "bookname" => Some(SearchField::BookName),
            "status" => Some(SearchField::Status),
            "start" | "startdate" | "from" => Some(SearchField::StartDate),
            "end" | "enddate" | "to" => Some(SearchField::EndDate),
            _ => None,
        }
    }
}

/// Basic-search filters. `None` means "no filter on this field".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub counterparty_name: Option<String>,
    pub book_name: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl SearchParams {
    pub fn get(&self, field: SearchField) -> Option<&str> {
        let slot = match field {
            SearchField::CounterpartyName => &self.counterparty_name,
            SearchField::BookName => &self.book_name,
            SearchField::Status => &self.status,
            SearchField::StartDate => &self.start_date,
            SearchField::EndDate => &self.end_date,
        };
        slot.as_deref()
    }

    /// Sets one field; an empty value unsets it.
    pub fn set(&mut self, field: SearchField, value: &str) {
        let value = (!value.is_empty()).then(|| value.to_string());
        let slot = match field {
            SearchField::CounterpartyName => &mut self.counterparty_name,
            SearchField::BookName => &mut self.book_name,
            SearchField::Status => &mut self.status,
            SearchField::StartDate => &mut self.start_date,
            SearchField::EndDate => &mut self.end_date,
        };
        *slot = value;
    }

    /// Query pairs actually sent: unset and empty fields are left out.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        SearchField::ALL
            .iter()
            .filter_map(|f| match self.get(*f) {
                Some(v) if !v.is_empty() => Some((f.param(), v.to_string())),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDir::Asc),
            "desc" | "descending" => Some(SortDir::Desc),
            _ => None,
        }
    }
}

/// Sort keys offered by the paginated listing.
pub const SORT_FIELDS: [&str; 5] = [
    "tradeDate",
    "tradeId",
    "counterpartyName",
    "bookName",
    "tradeStatus",
];

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    pub page: u32,
    pub size: u32,
    pub sort_by: String,
    pub sort_dir: SortDir,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort_by: "tradeDate".to_string(),
            sort_dir: SortDir::Desc,
        }
    }
}

impl PaginationParams {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("size", self.size.max(1).to_string()),
            ("sortBy", self.sort_by.clone()),
            ("sortDir", self.sort_dir.as_str().to_string()),
        ]
    }
}

/// Parameters of the dashboard blotter fetch; a change re-triggers the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlotterQuery {
    pub user_id: Option<i64>,
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl Default for BlotterQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: "tradeDate,desc".to_string(),
        }
    }
}

impl BlotterQuery {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::with_capacity(4);
        if let Some(id) = self.user_id {
            q.push(("userId", id.to_string()));
        }
        q.push(("page", self.page.to_string()));
        q.push(("size", self.size.max(1).to_string()));
        if !self.sort.is_empty() {
            q.push(("sort", self.sort.clone()));
        }
        q
    }
}

// ---- Results ----
/// Backend contract: a non-empty `errors` implies `is_valid == false` (not enforced here).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Missing flag counts as failed.
    #[serde(default, alias = "valid")]
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Aggregates over an empty window come back as `null`; they read as zero.
fn null_as_zero<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "null_as_zero")]
    pub total_trades: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub active_trades: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub new_trades: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub amended_trades: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub terminated_trades: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub total_notional: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub notional_today: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub notional_this_week: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub notional_this_month: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub trades_today: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub trades_this_week: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub trades_this_month: i64,
    pub most_active_counterparty: Option<String>,
    pub most_active_book: Option<String>,
    pub last_trade_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeBlotterRow {
    pub trade_id: Option<i64>,
    pub version: Option<i64>,
    pub trade_date: Option<String>,
    pub trade_start_date: Option<String>,
    pub trade_maturity_date: Option<String>,
    pub active: Option<bool>,
    pub created_date: Option<String>,
    pub last_touch_timestamp: Option<String>,
    pub trade_status: Option<String>,
    pub counterparty_name: Option<String>,
    pub book_name: Option<String>,
    pub trader_user_name: Option<String>,
    pub inputter_user_name: Option<String>,
    pub trade_type: Option<String>,
    pub trade_sub_type: Option<String>,
    pub leg1_notional: Option<f64>,
    pub leg1_currency: Option<String>,
    pub leg1_type: Option<String>,
    pub leg1_rate: Option<f64>,
    pub leg2_notional: Option<f64>,
    pub leg2_currency: Option<String>,
    pub leg2_type: Option<String>,
    pub leg2_rate: Option<f64>,
    pub total_notional: Option<f64>,
    pub primary_currency: Option<String>,
    pub cashflow_count: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Page object returned by the paged listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    pub total_pages: u32,
    pub total_elements: u64,
}

/// Listing payload: either a bare array or a page object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    Rows(Vec<T>),
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Listing::Rows(Vec::new())
    }
}

impl<T> Listing<T> {
    pub fn page_meta(&self) -> Option<PageMeta> {
        match self {
            Listing::Page(p) => Some(PageMeta {
                total_pages: p.total_pages,
                total_elements: p.total_elements,
            }),
            Listing::Rows(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Listing::Page(p) => p.content.len(),
            Listing::Rows(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_rows(self) -> Vec<T> {
        match self {
            Listing::Page(p) => p.content,
            Listing::Rows(r) => r,
        }
    }
}

// ---- Users ----
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trade_keeps_unknown_fields_for_the_backend() {
        let raw = json!({
            "tradeId": 1001,
            "bookName": "FX-LDN",
            "desk": "rates",
            "tradeLegs": [
                { "legId": "L1", "legType": "Fixed", "notional": "1000000", "currency": "USD", "stub": true }
            ]
        });
        let trade: Trade = serde_json::from_value(raw).unwrap();
        assert_eq!(trade.trade_id, Some(NumberOrText::Int(1001)));
        assert_eq!(trade.extra.get("desk"), Some(&json!("rates")));
        assert_eq!(trade.trade_legs[0].notional, Some(NumberOrText::Text("1000000".into())));
        assert_eq!(trade.trade_legs[0].extra.get("stub"), Some(&json!(true)));

        let back = serde_json::to_value(&trade).unwrap();
        assert_eq!(back["desk"], json!("rates"));
        assert_eq!(back["tradeLegs"][0]["stub"], json!(true));
        assert!(back.get("counterpartyName").is_none());
    }

    #[test]
    fn empty_search_value_unsets_the_field() {
        let mut p = SearchParams::default();
        p.set(SearchField::CounterpartyName, "Goldman");
        p.set(SearchField::BookName, "FX");
        p.set(SearchField::BookName, "");
        assert_eq!(p.counterparty_name.as_deref(), Some("Goldman"));
        assert_eq!(p.book_name, None);
    }

    #[test]
    fn search_query_skips_empty_strings_even_if_set_directly() {
        let p = SearchParams {
            counterparty_name: Some("Goldman".into()),
            status: Some(String::new()),
            ..SearchParams::default()
        };
        assert_eq!(p.to_query(), vec![("counterpartyName", "Goldman".to_string())]);
    }

    #[test]
    fn validation_result_accepts_both_flag_spellings() {
        let a: ValidationResult =
            serde_json::from_value(json!({ "isValid": false, "errors": ["x"] })).unwrap();
        let b: ValidationResult = serde_json::from_value(json!({ "valid": true })).unwrap();
        assert!(!a.is_valid);
        assert_eq!(a.errors, vec!["x".to_string()]);
        assert!(a.warnings.is_empty());
        assert!(b.is_valid);

        let bare: ValidationResult =
            serde_json::from_value(json!({ "errors": ["no flag"] })).unwrap();
        assert!(!bare.is_valid);
        assert_eq!(bare.errors, vec!["no flag".to_string()]);
    }

    #[test]
    fn summary_reads_null_aggregates_as_zero() {
        let s: DashboardSummary = serde_json::from_str(
            r#"{"totalTrades":0,"activeTrades":null,"totalNotional":null,
                "notionalToday":null,"tradesToday":null,"mostActiveBook":null}"#,
        )
        .unwrap();
        assert_eq!(s.total_trades, 0);
        assert_eq!(s.active_trades, 0);
        assert_eq!(s.total_notional, 0.0);
        assert_eq!(s.notional_today, 0.0);
        assert_eq!(s.trades_today, 0);
        assert_eq!(s.notional_this_week, 0.0);
        assert_eq!(s.most_active_book, None);
    }

    #[test]
    fn listing_branches_on_shape() {
        let page: Listing<Row> = serde_json::from_value(json!({
            "content": [{ "tradeId": 1 }, { "tradeId": 2 }],
            "totalPages": 4,
            "totalElements": 70
        }))
        .unwrap();
        assert_eq!(
            page.page_meta(),
            Some(PageMeta { total_pages: 4, total_elements: 70 })
        );
        assert_eq!(page.into_rows().len(), 2);

        let rows: Listing<Row> = serde_json::from_value(json!([{ "tradeId": 1 }])).unwrap();
        assert_eq!(rows.page_meta(), None);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn draft_trade_has_two_legs_and_new_status() {
        let t = Trade::draft();
        assert_eq!(t.trade_status.as_deref(), Some("NEW"));
        assert_eq!(t.trade_legs.len(), 2);
        assert!(t.trade_id.is_none());
    }
}
