//! Per-line allocation of order-level amounts.
//!
//! Order-level values (settlement total, tiered operation fee) are computed once per
//! order group and then broadcast to every line of that order.

use std::collections::HashMap;

use crate::recon::lines::{OrderLine, ShipFlag};
use crate::recon::profile::FeePolicy;

#[derive(Debug, Default, Clone, Copy)]
struct OrderGroup {
    lines: usize,
    total_quantity: u64,
    fee: f64,
}

impl FeePolicy {
    /// Fee candidate for one line of a tiered order whose lines sum to `order_quantity`.
    pub fn tier(single_unit: f64, multi_unit: f64, shipped: ShipFlag, order_quantity: u64) -> f64 {
        match (shipped.is_shipped(), order_quantity) {
            (false, _) | (true, 0) => 0.0,
            (true, 1) => single_unit,
            (true, _) => multi_unit,
        }
    }
}

/// Fills `settlement_per_line`, `order_fee` and `operation_fee_per_line` on every line.
pub fn allocate(lines: &mut [OrderLine], policy: &FeePolicy) {
    let mut groups: HashMap<String, OrderGroup> = HashMap::new();
    for line in lines.iter() {
        let group = groups.entry(line.order_id.clone()).or_default();
        group.lines += 1;
        group.total_quantity = group.total_quantity.saturating_add(line.quantity);
    }

    if let FeePolicy::QuantityTiered {
        single_unit,
        multi_unit,
    } = policy
    {
        for line in lines.iter() {
            if let Some(group) = groups.get_mut(&line.order_id) {
                let candidate =
                    FeePolicy::tier(*single_unit, *multi_unit, line.shipped, group.total_quantity);
                group.fee = group.fee.max(candidate);
            }
        }
    }

    for line in lines.iter_mut() {
        let group = groups.get(&line.order_id).copied().unwrap_or_default();
        let share = group.lines.max(1) as f64;
        line.settlement_per_line = line.settlement_total / share;

        match policy {
            FeePolicy::QuantityTiered { .. } => {
                line.order_fee = group.fee;
                line.operation_fee_per_line = group.fee / share;
            }
            FeePolicy::PerSku { fees, default } => {
                let fee = if line.shipped.is_shipped() {
                    fees.get(&line.sku).copied().unwrap_or(*default)
                } else {
                    0.0
                };
                line.order_fee = fee;
                line.operation_fee_per_line = fee;
            }
        }
    }
}
