//! Reconciliation pipeline: merge uploads, join settlements, allocate per line,
//! aggregate per SKU and merge costs. Every region runs the same steps; the
//! [`RegionProfile`] carries the differences.

pub mod combo;
pub mod consumption;
pub mod fees;
pub mod lines;
pub mod profile;
pub mod summary;

use std::path::PathBuf;

use crate::data::{
    format_number, merge_tables, read_table, read_tables, ColumnRename, Field, Table,
};
use crate::error::PipelineError;

pub use combo::ComboNormalizer;
pub use consumption::{CostRow, CostTable};
pub use lines::{OrderLine, SettlementIndex, ShipFlag, StatusBucket, SETTLEMENT_AMOUNT_COLUMN};
pub use profile::{FeePolicy, Region, RegionProfile};
pub use summary::{aggregate, apply_costs, ratio, SkuSummary};

/// Parsed but unmerged uploads, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ReconInputs {
    pub orders: Vec<Table>,
    pub settlements: Vec<Table>,
    pub consumption: Table,
}

/// Upload locations on disk.
#[derive(Debug, Clone, Default)]
pub struct InputPaths {
    pub orders: Vec<PathBuf>,
    pub settlements: Vec<PathBuf>,
    pub consumption: PathBuf,
}

/// Everything the report needs from one run.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub region: Region,
    /// Merged order table after combo normalization, with derived columns appended.
    pub orders: Table,
    pub lines: Vec<OrderLine>,
    /// Settlement rows dropped because their order id appears more than once.
    pub excluded: Table,
    pub skus: Vec<SkuSummary>,
    pub consumption: Table,
    pub combos_rewritten: usize,
}

impl InputPaths {
    pub fn load(&self, profile: &RegionProfile) -> Result<ReconInputs, PipelineError> {
        Ok(ReconInputs {
            orders: read_tables("orders", &self.orders, profile.orders.skip_after_header)?,
            settlements: read_tables("settlements", &self.settlements, 0)?,
            consumption: read_table(&self.consumption, 0)?,
        })
    }
}

/// Reads the uploads from disk and reconciles them.
pub fn reconcile_files(
    profile: &RegionProfile,
    paths: &InputPaths,
) -> Result<Reconciliation, PipelineError> {
    let inputs = paths.load(profile)?;
    reconcile(profile, inputs)
}

pub fn reconcile(
    profile: &RegionProfile,
    inputs: ReconInputs,
) -> Result<Reconciliation, PipelineError> {
    tracing::info!(
        region = %profile.region,
        order_files = inputs.orders.len(),
        settlement_files = inputs.settlements.len(),
        "starting reconciliation"
    );

    let mut orders = merge_tables("orders", inputs.orders, &profile.orders.id, &[])?;
    let settlements = merge_tables(
        "settlements",
        inputs.settlements,
        &profile.settlements.id,
        &[ColumnRename {
            field: Field::SettlementAmount,
            rule: &profile.settlements.amount,
            canonical: SETTLEMENT_AMOUNT_COLUMN,
            required: false,
        }],
    )?;
    let settlements = SettlementIndex::build(settlements, profile)?;

    let normalizer = ComboNormalizer::new(&profile.combo_patterns)?;
    let parsed = lines::parse_orders(&mut orders, profile, &normalizer, &settlements)?;
    let mut order_lines = parsed.lines;
    fees::allocate(&mut order_lines, &profile.fees);

    let mut skus = aggregate(&order_lines);
    let costs =
        CostTable::from_table(&inputs.consumption, &profile.consumption, &parsed.sku_header);
    apply_costs(&mut skus, &costs, &profile.currency);

    append_derived_columns(&mut orders, &order_lines);

    tracing::info!(
        region = %profile.region,
        order_lines = order_lines.len(),
        skus = skus.len(),
        excluded_settlements = settlements.excluded.len(),
        "reconciliation finished"
    );

    Ok(Reconciliation {
        region: profile.region,
        orders,
        lines: order_lines,
        excluded: settlements.excluded,
        skus,
        consumption: inputs.consumption,
        combos_rewritten: parsed.combos_rewritten,
    })
}

fn append_derived_columns(orders: &mut Table, lines: &[OrderLine]) {
    fn column(lines: &[OrderLine], f: impl Fn(&OrderLine) -> String) -> Vec<String> {
        lines.iter().map(f).collect()
    }

    let settlement = column(lines, |l| {
        if l.settled {
            format_number(l.settlement_total)
        } else {
            String::new()
        }
    });
    let shipped = column(lines, |l| l.shipped.as_str().to_string());
    let status = column(lines, |l| l.status_text.clone());
    let per_line = column(lines, |l| format_number(l.settlement_per_line));
    let order_fee = column(lines, |l| format_number(l.order_fee));
    let fee_per_line = column(lines, |l| format_number(l.operation_fee_per_line));

    orders.push_column("settlement_amount", settlement);
    orders.push_column("shipped_flag", shipped);
    orders.push_column("status_normalized", status);
    orders.push_column("settlement_per_line", per_line);
    orders.push_column("order_fee_rmb", order_fee);
    orders.push_column("operation_fee_per_line_rmb", fee_per_line);
}
