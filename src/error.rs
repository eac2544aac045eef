use std::path::PathBuf;

/// Failures that abort a whole reconciliation batch.
///
/// Malformed numeric cells and duplicated settlement ids are deliberately absent:
/// the former are coerced to zero, the latter are reported as excluded rows.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read workbook {}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {} has no sheets", .0.display())]
    EmptyWorkbook(PathBuf),

    #[error("no {0} files were provided")]
    EmptyBatch(&'static str),

    #[error("{table} table is missing required columns: {}", .fields.join(", "))]
    MissingColumns {
        table: &'static str,
        fields: Vec<&'static str>,
    },

    #[error("invalid combo SKU pattern '{pattern}': {source}")]
    ComboPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to write report: {0}")]
    Report(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn missing_column(table: &'static str, field: &'static str) -> Self {
        Self::MissingColumns {
            table,
            fields: vec![field],
        }
    }
}
