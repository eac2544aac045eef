//! Order lines and the settlement join.

use std::collections::HashMap;

use serde::Serialize;

use crate::data::{
    parse_number, parse_quantity, resolve_columns, Field, Table, ORDER_ID_COLUMN,
};
use crate::error::PipelineError;
use crate::recon::combo::ComboNormalizer;
use crate::recon::profile::{RegionProfile, ShipmentRule, StatusVocabulary};

/// Canonical header of the settlement amount after merging.
pub const SETTLEMENT_AMOUNT_COLUMN: &str = "Total settlement amount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipFlag {
    Yes,
    No,
    Unknown,
}

impl ShipFlag {
    pub fn from_cell(rule: &ShipmentRule, cell: &str) -> Self {
        let value = cell.trim();
        match rule {
            ShipmentRule::YesNo { yes, no } => {
                let lowered = value.to_lowercase();
                if yes.iter().any(|w| w.to_lowercase() == lowered) {
                    Self::Yes
                } else if no.iter().any(|w| w.to_lowercase() == lowered) {
                    Self::No
                } else {
                    Self::Unknown
                }
            }
            ShipmentRule::Timestamp => {
                if value.is_empty() {
                    Self::No
                } else {
                    Self::Yes
                }
            }
        }
    }

    pub fn is_shipped(self) -> bool {
        self == Self::Yes
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        }
    }
}

/// Platform status bucket. Delivered covers both delivered and completed orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Delivered,
    Cancelled,
    InTransit,
    Other,
}

impl StatusBucket {
    pub fn classify(vocabulary: &StatusVocabulary, normalized: &str) -> Self {
        fn listed(words: &[String], value: &str) -> bool {
            words.iter().any(|w| w.trim().to_lowercase() == value)
        }

        if listed(&vocabulary.delivered, normalized) {
            Self::Delivered
        } else if listed(&vocabulary.cancelled, normalized) {
            Self::Cancelled
        } else if listed(&vocabulary.in_transit, normalized) {
            Self::InTransit
        } else {
            Self::Other
        }
    }
}

/// One order line after normalization, joined to its settlement and allocated fees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    /// Row index in the enriched order table.
    pub row: usize,
    pub order_id: String,
    pub sku: String,
    pub quantity: u64,
    pub shipped: ShipFlag,
    pub status: StatusBucket,
    /// Trimmed, lowercased platform status.
    pub status_text: String,
    /// Settlement total of the whole order; zero when unmatched or excluded.
    pub settlement_total: f64,
    pub settled: bool,
    pub settlement_per_line: f64,
    /// Fee of the whole order in the reference currency.
    pub order_fee: f64,
    pub operation_fee_per_line: f64,
}

/// Deduplicated settlement amounts plus the rows excluded for sharing an order id.
#[derive(Debug, Clone, Default)]
pub struct SettlementIndex {
    amounts: HashMap<String, f64>,
    pub excluded: Table,
}

impl SettlementIndex {
    /// Builds the index from the merged settlement table. Rows failing the profile's
    /// row filter are dropped first. Any id that still appears on more than one row is
    /// excluded entirely; a malformed amount on a unique row counts as zero.
    pub fn build(mut settlements: Table, profile: &RegionProfile) -> Result<Self, PipelineError> {
        if let Some(filter) = &profile.settlements.row_filter {
            if let Some(col) = filter.column.locate(&settlements.headers) {
                let wanted = filter.equals.trim().to_lowercase();
                settlements.retain_rows(|row| {
                    row.get(col)
                        .is_some_and(|v| v.trim().to_lowercase() == wanted)
                });
            }
        }

        let id_col = settlements
            .column(ORDER_ID_COLUMN)
            .ok_or_else(|| PipelineError::missing_column("settlements", Field::OrderId.label()))?;
        let amount_col = settlements.column(SETTLEMENT_AMOUNT_COLUMN).ok_or_else(|| {
            PipelineError::missing_column("settlements", Field::SettlementAmount.label())
        })?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in 0..settlements.len() {
            *counts.entry(settlements.cell(row, id_col)).or_default() += 1;
        }

        let mut amounts = HashMap::new();
        let mut excluded_rows = Vec::new();
        for (row, cells) in settlements.rows.iter().enumerate() {
            let id = settlements.cell(row, id_col);
            if counts.get(id).copied().unwrap_or(0) > 1 {
                excluded_rows.push(cells.clone());
            } else {
                let amount = parse_number(settlements.cell(row, amount_col)).unwrap_or(0.0);
                amounts.insert(id.to_string(), amount);
            }
        }

        if !excluded_rows.is_empty() {
            tracing::info!(
                rows = excluded_rows.len(),
                "excluded settlements sharing an order id"
            );
        }

        Ok(Self {
            amounts,
            excluded: Table::with_rows(settlements.headers.clone(), excluded_rows),
        })
    }

    pub fn amount(&self, order_id: &str) -> Option<f64> {
        self.amounts.get(order_id).copied()
    }
}

/// Result of reading order lines out of the merged order table.
#[derive(Debug, Clone)]
pub struct ParsedOrders {
    pub lines: Vec<OrderLine>,
    /// Header of the SKU column, used to find the SKU in the consumption table.
    pub sku_header: String,
    pub combos_rewritten: usize,
}

/// Reads order lines, applies combo normalization (rewriting the table cells in place),
/// and joins each line to its settlement total. Fee and per-line shares are filled in
/// by the allocation step.
pub fn parse_orders(
    orders: &mut Table,
    profile: &RegionProfile,
    normalizer: &ComboNormalizer,
    settlements: &SettlementIndex,
) -> Result<ParsedOrders, PipelineError> {
    let columns = &profile.orders;
    let id_col = orders
        .column(ORDER_ID_COLUMN)
        .ok_or_else(|| PipelineError::missing_column("orders", Field::OrderId.label()))?;
    let resolved = resolve_columns(
        "orders",
        &orders.headers,
        &[
            (Field::Quantity, &columns.quantity),
            (Field::Sku, &columns.sku),
            (Field::Shipped, &columns.shipped),
            (Field::Status, &columns.status),
        ],
    )?;
    let (qty_col, sku_col, ship_col, status_col) =
        (resolved[0], resolved[1], resolved[2], resolved[3]);
    tracing::info!(
        quantity = %orders.headers[qty_col],
        sku = %orders.headers[sku_col],
        shipped = %orders.headers[ship_col],
        status = %orders.headers[status_col],
        "resolved order columns"
    );

    let mut lines = Vec::with_capacity(orders.len());
    let mut combos_rewritten = 0;
    for row in 0..orders.len() {
        let mut sku = orders.cell(row, sku_col).trim().to_string();
        let mut quantity = parse_quantity(orders.cell(row, qty_col));

        if let Some((canonical, scaled)) = normalizer.normalize(&sku, quantity) {
            tracing::debug!(from = %sku, to = %canonical, quantity, scaled, "combo SKU rewritten");
            orders.set_cell(row, sku_col, canonical.clone());
            orders.set_cell(row, qty_col, scaled.to_string());
            sku = canonical;
            quantity = scaled;
            combos_rewritten += 1;
        }

        let order_id = orders.cell(row, id_col).to_string();
        let status_text = orders.cell(row, status_col).trim().to_lowercase();
        let settlement = settlements.amount(&order_id);

        lines.push(OrderLine {
            row,
            shipped: ShipFlag::from_cell(&profile.shipment, orders.cell(row, ship_col)),
            status: StatusBucket::classify(&profile.statuses, &status_text),
            status_text,
            settlement_total: settlement.unwrap_or(0.0),
            settled: settlement.is_some(),
            settlement_per_line: 0.0,
            order_fee: 0.0,
            operation_fee_per_line: 0.0,
            order_id,
            sku,
            quantity,
        });
    }

    if !normalizer.is_empty() {
        tracing::info!(combos_rewritten, "combo SKU normalization finished");
    }

    Ok(ParsedOrders {
        lines,
        sku_header: orders.headers[sku_col].clone(),
        combos_rewritten,
    })
}
