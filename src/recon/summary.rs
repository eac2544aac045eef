//! Per-SKU aggregation: bucket counts, sums, rates, cost merge and profit.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::recon::consumption::CostTable;
use crate::recon::lines::{OrderLine, ShipFlag, StatusBucket};
use crate::recon::profile::CurrencyTable;

/// Financial summary of one SKU. Amounts suffixed `_local` are in the region currency,
/// `_reference` in the reference currency (RMB). `None` marks an undefined ratio.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkuSummary {
    pub sku: String,

    pub total_settlement: f64,
    /// Sum of per-line operation fee shares, reference currency.
    pub total_operation_fee: f64,
    pub shipped_quantity: u64,
    pub operation_fee_local: f64,
    pub delivered_quantity: u64,
    pub delivered_amount: f64,

    pub order_count: u64,
    pub shipped_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
    pub cancelled_before_shipment: u64,
    pub cancelled_after_shipment: u64,
    pub in_transit_orders: u64,

    pub delivered_rate: Option<f64>,
    pub cancel_rate: Option<f64>,
    pub cancel_before_shipment_rate: Option<f64>,
    pub cancel_after_shipment_rate: Option<f64>,
    pub in_transit_rate: Option<f64>,

    pub ad_spend_local: f64,
    pub gmv_max_spend_local: f64,
    pub ad_spend_usd: Option<f64>,
    pub gmv_max_spend_usd: Option<f64>,
    pub unit_cost_local: f64,
    pub unit_cost_reference: f64,

    pub total_ad_spend_local: f64,
    pub product_cost_local: f64,
    pub profit_local: f64,
    pub profit_reference: f64,
    pub gross_margin: Option<f64>,
    pub profit_per_delivered_order: Option<f64>,
}

/// `numerator / denominator`, undefined when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

fn rate(count: u64, total: u64) -> Option<f64> {
    ratio(count as f64, total as f64)
}

/// Groups lines by SKU (sorted by SKU). Order counts are taken over the first line of
/// each (SKU, order) pair so multi-line orders count once; sums run over every line.
/// Lines without a SKU belong to no summary.
pub fn aggregate(lines: &[OrderLine]) -> Vec<SkuSummary> {
    let mut by_sku: BTreeMap<&str, SkuSummary> = BTreeMap::new();
    let mut seen_pairs: HashSet<(&str, &str)> = HashSet::new();

    for line in lines.iter().filter(|l| !l.sku.is_empty()) {
        let summary = by_sku
            .entry(line.sku.as_str())
            .or_insert_with(|| SkuSummary {
                sku: line.sku.clone(),
                ..SkuSummary::default()
            });

        let shipped = line.shipped == ShipFlag::Yes;
        let delivered = line.status == StatusBucket::Delivered;

        summary.total_settlement += line.settlement_per_line;
        summary.total_operation_fee += line.operation_fee_per_line;
        if shipped {
            summary.shipped_quantity = summary.shipped_quantity.saturating_add(line.quantity);
        }
        if delivered {
            summary.delivered_quantity = summary.delivered_quantity.saturating_add(line.quantity);
            summary.delivered_amount += line.settlement_per_line;
        }

        if !seen_pairs.insert((line.sku.as_str(), line.order_id.as_str())) {
            continue;
        }
        let cancelled = line.status == StatusBucket::Cancelled;
        summary.order_count += 1;
        summary.shipped_orders += u64::from(shipped);
        summary.delivered_orders += u64::from(delivered);
        summary.cancelled_orders += u64::from(cancelled);
        summary.cancelled_before_shipment += u64::from(cancelled && line.shipped == ShipFlag::No);
        summary.cancelled_after_shipment += u64::from(cancelled && shipped);
        summary.in_transit_orders += u64::from(line.status == StatusBucket::InTransit);
    }

    by_sku
        .into_values()
        .map(|mut s| {
            s.delivered_rate = rate(s.delivered_orders, s.order_count);
            s.cancel_rate = rate(s.cancelled_orders, s.order_count);
            s.cancel_before_shipment_rate = rate(s.cancelled_before_shipment, s.order_count);
            s.cancel_after_shipment_rate = rate(s.cancelled_after_shipment, s.order_count);
            s.in_transit_rate = rate(s.in_transit_orders, s.order_count);
            s
        })
        .collect()
}

/// Left-joins consumption costs onto each summary and derives profit fields.
///
/// `profit = settlement - fee * local_per_reference - unit_cost * shipped_qty - ad spend`
pub fn apply_costs(summaries: &mut [SkuSummary], costs: &CostTable, currency: &CurrencyTable) {
    for s in summaries.iter_mut() {
        let cost = costs.get(&s.sku);
        s.ad_spend_local = cost.ad_spend;
        s.gmv_max_spend_local = cost.gmv_max_spend;
        s.ad_spend_usd = currency.to_usd(cost.ad_spend);
        s.gmv_max_spend_usd = currency.to_usd(cost.gmv_max_spend);
        s.unit_cost_local = cost.unit_cost;
        s.unit_cost_reference = currency.to_reference(cost.unit_cost);

        s.operation_fee_local = currency.to_local(s.total_operation_fee);
        s.total_ad_spend_local = cost.ad_spend + cost.gmv_max_spend;
        s.product_cost_local = cost.unit_cost * s.shipped_quantity as f64;
        s.profit_local = s.total_settlement
            - s.operation_fee_local
            - s.product_cost_local
            - s.total_ad_spend_local;
        s.profit_reference = currency.to_reference(s.profit_local);
        s.gross_margin = ratio(s.profit_local, s.delivered_amount);
        s.profit_per_delivered_order = ratio(s.profit_reference, s.delivered_orders as f64);
    }
}
