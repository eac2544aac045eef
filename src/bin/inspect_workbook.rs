//! Inspect an upload before running it: print sheet names, the first rows of the data
//! sheet, and which order/settlement columns a region profile resolves to.
//! Usage: cargo run --bin inspect_workbook -- path/to/file.xlsx [indonesia|malaysia]

use std::path::Path;

use calamine::Reader;
use skuledger::data::{
    cell_text, read_table, resolve_column, resolve_columns, ColumnRule, Field, Table,
    ORDER_ID_COLUMN,
};
use skuledger::recon::{Region, RegionProfile};

fn print_binding(field: Field, headers: &[String], col: usize) {
    println!("  {:<18} -> [{col}] {}", field.label(), headers[col]);
}

fn report_field(table: &Table, field: Field, rule: &ColumnRule) {
    match resolve_column("upload", &table.headers, field, rule) {
        Ok(col) => print_binding(field, &table.headers, col),
        Err(_) => println!("  {:<18} -> (not found)", field.label()),
    }
}

/// Binds order columns the way the pipeline does: the id first, then the remaining fields
/// claim headers once each, in column order.
fn report_order_fields(orders: &Table, profile: &RegionProfile) {
    let mut headers = orders.headers.clone();
    report_field(orders, Field::OrderId, &profile.orders.id);
    if let Some(id_col) = profile.orders.id.locate(&headers) {
        headers[id_col] = ORDER_ID_COLUMN.to_string();
    }

    let columns = &profile.orders;
    let wanted = [
        (Field::Quantity, &columns.quantity),
        (Field::Sku, &columns.sku),
        (Field::Shipped, &columns.shipped),
        (Field::Status, &columns.status),
    ];
    match resolve_columns("orders", &headers, &wanted) {
        Ok(cols) => {
            for ((field, _), col) in wanted.iter().zip(cols) {
                print_binding(*field, &orders.headers, col);
            }
        }
        Err(err) => println!("  {err}"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or("Usage: inspect_workbook <path-to.xlsx> [indonesia|malaysia]")?;
    let region: Region = args.next().unwrap_or_default().parse()?;
    let profile = RegionProfile::for_region(region);

    let path = Path::new(&path);
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }

    let mut wb = calamine::open_workbook_auto(path)?;
    let names = wb.sheet_names();
    println!("Sheets ({}): {}", names.len(), names.join(", "));
    let sheet_name = names.first().ok_or("No sheets")?.clone();

    let range = wb.worksheet_range(&sheet_name)?;
    let (height, width) = range.get_size();
    println!("\nUsing sheet: {sheet_name}\nSize: {height} rows x {width} cols\nFirst 10 rows:");
    for (i, row) in range.rows().take(10).enumerate() {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        println!("  {}: {}", i, cells.join(" | "));
    }

    let orders = read_table(path, profile.orders.skip_after_header)?;
    println!("\nAs {region} order export ({} data rows):", orders.len());
    report_order_fields(&orders, &profile);

    let settlements = read_table(path, 0)?;
    println!("\nAs {region} settlement statement ({} data rows):", settlements.len());
    report_field(&settlements, Field::OrderId, &profile.settlements.id);
    report_field(&settlements, Field::SettlementAmount, &profile.settlements.amount);
    if let Some(filter) = &profile.settlements.row_filter {
        report_field(&settlements, Field::SettlementType, &filter.column);
    }
    Ok(())
}
