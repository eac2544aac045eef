//! Multi-sheet `.xlsx` report. Pure serialization of a [`Reconciliation`]: sheet names
//! and column order are fixed so repeated runs diff cleanly.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::data::{parse_number, Table};
use crate::error::PipelineError;
use crate::recon::{Reconciliation, RegionProfile, SkuSummary};

pub const ORDERS_SHEET: &str = "orders_enriched";
pub const SKU_SETTLEMENT_SHEET: &str = "sku_settlement_fee";
pub const EXCLUDED_SHEET: &str = "excluded_multi_settlement";
pub const SKU_FINANCIALS_SHEET: &str = "sku_financials";
pub const CONSUMPTION_SHEET: &str = "consumption";

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Derived order columns written as numbers rather than text.
const NUMERIC_ORDER_COLUMNS: [&str; 4] = [
    "settlement_amount",
    "settlement_per_line",
    "order_fee_rmb",
    "operation_fee_per_line_rmb",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Number,
    Integer,
    Rate,
}

/// One column of the SKU financial sheet.
struct SummaryColumn {
    header: String,
    kind: CellKind,
    value: fn(&SkuSummary) -> Option<f64>,
}

impl SummaryColumn {
    fn new(
        header: impl Into<String>,
        kind: CellKind,
        value: fn(&SkuSummary) -> Option<f64>,
    ) -> Self {
        Self {
            header: header.into(),
            kind,
            value,
        }
    }
}

/// Column layout of the SKU financial sheet. The local operation fee is pinned right
/// after shipped quantity; in-transit and USD columns only appear when the region has them.
fn financial_columns(profile: &RegionProfile) -> Vec<SummaryColumn> {
    use CellKind::{Integer, Number, Rate};

    let local = profile.currency.local.to_lowercase();
    let reference = profile.currency.reference.to_lowercase();
    let in_transit = profile.statuses.tracks_in_transit();
    let usd = profile.currency.local_per_usd.is_some();

    let mut cols = vec![
        SummaryColumn::new("total_settlement", Number, |s| Some(s.total_settlement)),
        SummaryColumn::new(format!("total_operation_fee_{reference}"), Number, |s| {
            Some(s.total_operation_fee)
        }),
        SummaryColumn::new("shipped_quantity", Integer, |s| Some(s.shipped_quantity as f64)),
        SummaryColumn::new(format!("operation_fee_{local}"), Number, |s| {
            Some(s.operation_fee_local)
        }),
        SummaryColumn::new("delivered_amount", Number, |s| Some(s.delivered_amount)),
        SummaryColumn::new("delivered_quantity", Integer, |s| {
            Some(s.delivered_quantity as f64)
        }),
        SummaryColumn::new("order_count", Integer, |s| Some(s.order_count as f64)),
        SummaryColumn::new("shipped_orders", Integer, |s| Some(s.shipped_orders as f64)),
        SummaryColumn::new("delivered_orders", Integer, |s| Some(s.delivered_orders as f64)),
        SummaryColumn::new("delivered_rate", Rate, |s| s.delivered_rate),
        SummaryColumn::new("cancel_rate", Rate, |s| s.cancel_rate),
        SummaryColumn::new("cancel_before_shipment_rate", Rate, |s| {
            s.cancel_before_shipment_rate
        }),
        SummaryColumn::new("cancel_after_shipment_rate", Rate, |s| {
            s.cancel_after_shipment_rate
        }),
    ];
    if in_transit {
        cols.push(SummaryColumn::new("in_transit_rate", Rate, |s| s.in_transit_rate));
    }
    cols.push(SummaryColumn::new(format!("ad_spend_{local}"), Number, |s| {
        Some(s.ad_spend_local)
    }));
    cols.push(SummaryColumn::new(format!("gmv_max_spend_{local}"), Number, |s| {
        Some(s.gmv_max_spend_local)
    }));
    if usd {
        cols.push(SummaryColumn::new("ad_spend_usd", Number, |s| s.ad_spend_usd));
        cols.push(SummaryColumn::new("gmv_max_spend_usd", Number, |s| {
            s.gmv_max_spend_usd
        }));
    }
    cols.extend([
        SummaryColumn::new(format!("unit_cost_{local}"), Number, |s| Some(s.unit_cost_local)),
        SummaryColumn::new(format!("unit_cost_{reference}"), Number, |s| {
            Some(s.unit_cost_reference)
        }),
        SummaryColumn::new(format!("total_ad_spend_{local}"), Number, |s| {
            Some(s.total_ad_spend_local)
        }),
        SummaryColumn::new(format!("product_cost_{local}"), Number, |s| {
            Some(s.product_cost_local)
        }),
        SummaryColumn::new(format!("profit_{local}"), Number, |s| Some(s.profit_local)),
        SummaryColumn::new(format!("profit_{reference}"), Number, |s| Some(s.profit_reference)),
        SummaryColumn::new("gross_margin", Rate, |s| s.gross_margin),
        SummaryColumn::new(format!("profit_per_delivered_order_{reference}"), Number, |s| {
            s.profit_per_delivered_order
        }),
    ]);
    cols
}

/// Header row of the SKU financial sheet, SKU first.
pub fn financial_headers(profile: &RegionProfile) -> Vec<String> {
    std::iter::once("sku".to_string())
        .chain(financial_columns(profile).into_iter().map(|c| c.header))
        .collect()
}

/// Sheet names in write order for a given run.
pub fn sheet_names(recon: &Reconciliation, profile: &RegionProfile) -> Vec<&'static str> {
    let mut names = vec![ORDERS_SHEET, SKU_SETTLEMENT_SHEET];
    if !recon.excluded.is_empty() {
        names.push(EXCLUDED_SHEET);
    }
    names.push(SKU_FINANCIALS_SHEET);
    if profile.report.include_consumption_sheet {
        names.push(CONSUMPTION_SHEET);
    }
    names
}

pub fn build_workbook(
    recon: &Reconciliation,
    profile: &RegionProfile,
) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for name in sheet_names(recon, profile) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        match name {
            ORDERS_SHEET => write_table(sheet, &recon.orders, &NUMERIC_ORDER_COLUMNS, &header)?,
            SKU_SETTLEMENT_SHEET => write_settlement_summary(sheet, &recon.skus, &header)?,
            EXCLUDED_SHEET => write_table(sheet, &recon.excluded, &[], &header)?,
            SKU_FINANCIALS_SHEET => write_financials(sheet, &recon.skus, profile, &header)?,
            CONSUMPTION_SHEET => write_table(sheet, &recon.consumption, &[], &header)?,
            _ => {}
        }
    }

    Ok(workbook)
}

/// Writes the report to `path`.
pub fn write_report(
    recon: &Reconciliation,
    profile: &RegionProfile,
    path: &Path,
) -> Result<(), PipelineError> {
    let mut workbook = build_workbook(recon, profile)?;
    workbook.save(path)?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}

fn write_header(
    sheet: &mut Worksheet,
    headers: &[String],
    format: &Format,
) -> Result<(), XlsxError> {
    for (col, text) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, text, format)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_table(
    sheet: &mut Worksheet,
    table: &Table,
    numeric_columns: &[&str],
    header: &Format,
) -> Result<(), XlsxError> {
    write_header(sheet, &table.headers, header)?;
    let numeric: Vec<bool> = table
        .headers
        .iter()
        .map(|h| numeric_columns.contains(&h.as_str()))
        .collect();

    for (r, row) in table.rows.iter().enumerate() {
        let xl_row = r as u32 + 1;
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            match parse_number(value).filter(|_| numeric.get(c).copied().unwrap_or(false)) {
                Some(n) => sheet.write_number(xl_row, c as u16, n)?,
                None => sheet.write_string(xl_row, c as u16, value)?,
            };
        }
    }
    Ok(())
}

fn write_settlement_summary(
    sheet: &mut Worksheet,
    skus: &[SkuSummary],
    header: &Format,
) -> Result<(), XlsxError> {
    let headers = ["sku", "total_settlement", "total_operation_fee_rmb"].map(String::from);
    write_header(sheet, &headers, header)?;
    for (r, s) in skus.iter().enumerate() {
        let row = r as u32 + 1;
        sheet.write_string(row, 0, &s.sku)?;
        sheet.write_number(row, 1, s.total_settlement)?;
        sheet.write_number(row, 2, s.total_operation_fee)?;
    }
    Ok(())
}

fn write_financials(
    sheet: &mut Worksheet,
    skus: &[SkuSummary],
    profile: &RegionProfile,
    header: &Format,
) -> Result<(), XlsxError> {
    let columns = financial_columns(profile);
    write_header(sheet, &financial_headers(profile), header)?;

    let number = Format::new().set_num_format("#,##0.00");
    let integer = Format::new().set_num_format("0");
    let rate = Format::new().set_num_format("0.00%");

    for (r, s) in skus.iter().enumerate() {
        let row = r as u32 + 1;
        sheet.write_string(row, 0, &s.sku)?;
        for (c, column) in columns.iter().enumerate() {
            // Undefined ratios stay blank.
            let Some(value) = (column.value)(s) else {
                continue;
            };
            let format = match column.kind {
                CellKind::Number => &number,
                CellKind::Integer => &integer,
                CellKind::Rate => &rate,
            };
            sheet.write_number_with_format(row, c as u16 + 1, value, format)?;
        }
    }
    sheet.set_column_width(0, 24)?;
    Ok(())
}
