// ===============================
// src/mapping.rs
// ===============================
//
// Result rows -> generic column schema for the text tables.
// Columns are the union of keys over all rows, in first-seen order,
// so rows with a different shape still get every field displayed.
//
use ahash::AHashSet as HashSet;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub field: String,
    pub header: String,
}

impl ColumnDef {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            header: humanize(field),
        }
    }
}

pub fn columns_from_results<T: Serialize>(rows: &[T]) -> Vec<ColumnDef> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut cols = Vec::new();
    for row in rows {
        // rows that are not JSON objects contribute no columns
        if let Ok(Value::Object(map)) = serde_json::to_value(row) {
            for key in map.keys() {
                if seen.insert(key.clone()) {
                    cols.push(ColumnDef::new(key));
                }
            }
        }
    }
    cols
}

pub fn rows_from_results<T: Clone>(rows: &[T]) -> Vec<T> {
    rows.to_vec()
}

/// "counterpartyName" -> "Counterparty Name", "leg1Notional" -> "Leg1 Notional"
pub fn humanize(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for (i, ch) in field.chars().enumerate() {
        if ch == '_' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            out.push(' ');
        }
        if i == 0 || out.ends_with(' ') {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeBlotterRow;
    use serde_json::json;

    #[test]
    fn empty_input_gives_empty_output() {
        let rows: Vec<Value> = Vec::new();
        assert!(columns_from_results(&rows).is_empty());
        assert!(rows_from_results(&rows).is_empty());
    }

    #[test]
    fn columns_are_the_union_of_keys_in_first_seen_order() {
        let rows = vec![
            json!({ "tradeId": 1, "bookName": "FX" }),
            json!({ "tradeId": 2, "counterpartyName": "Goldman" }),
            json!("not an object"),
        ];
        let fields: Vec<String> = columns_from_results(&rows)
            .into_iter()
            .map(|c| c.field)
            .collect();
        assert_eq!(fields, vec!["tradeId", "bookName", "counterpartyName"]);
    }

    #[test]
    fn typed_rows_map_through_their_wire_names() {
        let rows = vec![TradeBlotterRow {
            trade_id: Some(7),
            ..TradeBlotterRow::default()
        }];
        let cols = columns_from_results(&rows);
        assert_eq!(cols[0].field, "tradeId");
        assert_eq!(cols[0].header, "Trade Id");
        assert!(cols.iter().any(|c| c.field == "cashflowCount"));
        assert_eq!(rows_from_results(&rows), rows);
    }

    #[test]
    fn humanize_splits_camel_case() {
        assert_eq!(humanize("counterpartyName"), "Counterparty Name");
        assert_eq!(humanize("leg1Notional"), "Leg1 Notional");
        assert_eq!(humanize("status"), "Status");
    }
}
