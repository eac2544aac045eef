//! Locate semantic columns among arbitrarily named spreadsheet headers.
//!
//! Matching is heuristic: when more than one header satisfies a rule, the first one in
//! column order wins. Exports that carry two "quantity" columns will silently bind to the
//! leftmost one.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// How a semantic field is found in a header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRule {
    /// Always the first column.
    First,
    /// Header equals one of the names after trimming, ignoring case.
    Exact(Vec<String>),
    /// Lowercased header contains one of the markers.
    Contains(Vec<String>),
}

impl ColumnRule {
    pub fn exact(names: &[&str]) -> Self {
        Self::Exact(names.iter().map(|n| n.to_string()).collect())
    }

    pub fn contains(markers: &[&str]) -> Self {
        Self::Contains(markers.iter().map(|m| m.to_string()).collect())
    }

    pub fn matches(&self, index: usize, header: &str) -> bool {
        match self {
            Self::First => index == 0,
            Self::Exact(names) => {
                let header = header.trim();
                names.iter().any(|n| n.trim().eq_ignore_ascii_case(header))
            }
            Self::Contains(markers) => {
                let header = header.to_lowercase();
                markers.iter().any(|m| header.contains(&m.to_lowercase()))
            }
        }
    }

    /// First header in column order satisfying the rule.
    pub fn locate(&self, headers: &[String]) -> Option<usize> {
        headers
            .iter()
            .enumerate()
            .position(|(i, h)| self.matches(i, h))
    }
}

/// Semantic fields the pipeline needs from uploaded sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    OrderId,
    Sku,
    Quantity,
    Shipped,
    Status,
    SettlementAmount,
    SettlementType,
}

impl Field {
    /// Human-readable name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::OrderId => "order id",
            Self::Sku => "SKU",
            Self::Quantity => "quantity",
            Self::Shipped => "shipped flag",
            Self::Status => "platform status",
            Self::SettlementAmount => "settlement amount",
            Self::SettlementType => "settlement type",
        }
    }
}

/// Resolves a single field or fails naming it.
pub fn resolve_column(
    table: &'static str,
    headers: &[String],
    field: Field,
    rule: &ColumnRule,
) -> Result<usize, PipelineError> {
    rule.locate(headers)
        .ok_or_else(|| PipelineError::missing_column(table, field.label()))
}

/// Resolves several fields at once. Headers are visited in column order and each header
/// is claimed by at most one field: the first still-unresolved field whose rule matches.
/// Every field that stays unresolved is reported in one error.
pub fn resolve_columns(
    table: &'static str,
    headers: &[String],
    wanted: &[(Field, &ColumnRule)],
) -> Result<Vec<usize>, PipelineError> {
    let mut found: Vec<Option<usize>> = vec![None; wanted.len()];

    for (index, header) in headers.iter().enumerate() {
        let claim = wanted
            .iter()
            .enumerate()
            .find(|(slot, (_, rule))| found[*slot].is_none() && rule.matches(index, header));
        if let Some((slot, _)) = claim {
            found[slot] = Some(index);
        }
    }

    let missing: Vec<&'static str> = wanted
        .iter()
        .zip(&found)
        .filter(|(_, hit)| hit.is_none())
        .map(|((field, _), _)| field.label())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingColumns {
            table,
            fields: missing,
        });
    }

    Ok(found.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn contains_is_case_insensitive_and_first_match_wins() {
        let h = headers(&["Order", "Seller SKU", "SKU name"]);
        assert_eq!(ColumnRule::contains(&["sku"]).locate(&h), Some(1));
    }

    #[test]
    fn exact_ignores_surrounding_whitespace() {
        let h = headers(&["Order ID ", "Quantity"]);
        assert_eq!(ColumnRule::exact(&["order id"]).locate(&h), Some(0));
        assert_eq!(ColumnRule::exact(&["qty"]).locate(&h), None);
    }

    #[test]
    fn missing_field_error_names_the_field() {
        let h = headers(&["order_id", "amount"]);
        let err = resolve_column(
            "settlements",
            &h,
            Field::SettlementAmount,
            &ColumnRule::contains(&["settlement"]),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "settlements table is missing required columns: settlement amount"
        );
    }

    #[test]
    fn each_header_is_claimed_by_one_field() {
        let qty = ColumnRule::contains(&["数量"]);
        let sku = ColumnRule::contains(&["sku"]);
        let h = headers(&["order_id", "SKU数量", "SKU"]);
        let cols = resolve_columns(
            "orders",
            &h,
            &[(Field::Quantity, &qty), (Field::Sku, &sku)],
        )
        .unwrap();
        assert_eq!(cols, vec![1, 2]);
    }

    #[test]
    fn all_missing_fields_are_reported_together() {
        let qty = ColumnRule::contains(&["数量"]);
        let status = ColumnRule::contains(&["平台状态"]);
        let sku = ColumnRule::contains(&["sku"]);
        let h = headers(&["order_id", "sku"]);
        let err = resolve_columns(
            "orders",
            &h,
            &[
                (Field::Quantity, &qty),
                (Field::Sku, &sku),
                (Field::Status, &status),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "orders table is missing required columns: quantity, platform status"
        );
    }
}
