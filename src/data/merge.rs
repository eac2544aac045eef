//! Combine several uploads of the same kind (orders or settlements) into one table.

use crate::data::columns::{resolve_column, ColumnRule, Field};
use crate::data::table::Table;
use crate::error::PipelineError;

/// Canonical header given to the identifying column of every merged table.
pub const ORDER_ID_COLUMN: &str = "order_id";

/// A per-file column rename applied before concatenation.
#[derive(Debug, Clone)]
pub struct ColumnRename<'a> {
    pub field: Field,
    pub rule: &'a ColumnRule,
    pub canonical: &'a str,
    /// Files lacking an optional column are merged as-is; the merged table is
    /// validated afterwards.
    pub required: bool,
}

/// Renames the located columns of each table to their canonical names, drops rows
/// whose canonical id cell is blank, and concatenates in the given order.
pub fn merge_tables(
    table: &'static str,
    sources: Vec<Table>,
    id_rule: &ColumnRule,
    extra: &[ColumnRename<'_>],
) -> Result<Table, PipelineError> {
    if sources.is_empty() {
        return Err(PipelineError::EmptyBatch(table));
    }

    let mut normalized = Vec::with_capacity(sources.len());
    for mut source in sources {
        let id_col = resolve_column(table, &source.headers, Field::OrderId, id_rule)?;
        source.rename_column(id_col, ORDER_ID_COLUMN);
        for rename in extra {
            match rename.rule.locate(&source.headers) {
                Some(col) => source.rename_column(col, rename.canonical),
                None if rename.required => {
                    return Err(PipelineError::missing_column(table, rename.field.label()))
                }
                None => {}
            }
        }
        source.retain_rows(|row| row.get(id_col).is_some_and(|id| !id.trim().is_empty()));
        normalized.push(source);
    }

    let merged = Table::concat(normalized);
    tracing::info!(table, rows = merged.len(), "merged input files");
    Ok(merged)
}
