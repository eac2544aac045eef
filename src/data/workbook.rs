//! Read the first sheet of an `.xlsx` / `.xls` file into a text [`Table`].

use std::path::{Path, PathBuf};

use calamine::{Data, Reader};

use crate::data::table::{dedupe_headers, format_number, Table};
use crate::error::PipelineError;

/// Converts a cell to the text form the pipeline works with. Whole floats lose their
/// fractional part so numeric order ids written by different tools compare equal.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| format_number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// Reads the first worksheet. Row 0 is the header; `skip_after_header` rows below it are
/// discarded (some exports put a description row there). Fully blank rows are dropped.
/// Blank headers become `Unnamed: {index}` and repeated ones get `.1`, `.2` suffixes.
pub fn read_table(path: &Path, skip_after_header: usize) -> Result<Table, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingFile(path.to_path_buf()));
    }

    let mut workbook = calamine::open_workbook_auto(path).map_err(|source| {
        PipelineError::Workbook {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::EmptyWorkbook(path.to_path_buf()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| PipelineError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };
    let headers = dedupe_headers(
        header_row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let text = cell_text(cell);
                if text.is_empty() {
                    format!("Unnamed: {i}")
                } else {
                    text
                }
            })
            .collect(),
    );

    let body: Vec<Vec<String>> = rows
        .skip(skip_after_header)
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    tracing::debug!(
        path = %path.display(),
        sheet = %sheet_name,
        rows = body.len(),
        "read worksheet"
    );
    Ok(Table::with_rows(headers, body))
}

/// Reads several files of the same kind in order. The first unreadable file aborts.
pub fn read_tables(
    kind: &'static str,
    paths: &[PathBuf],
    skip_after_header: usize,
) -> Result<Vec<Table>, PipelineError> {
    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        let table = read_table(path, skip_after_header)?;
        tracing::info!(kind, file = %path.display(), rows = table.len(), "read input file");
        tables.push(table);
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported_before_opening() {
        let err = read_table(Path::new("/definitely/not/here.xlsx"), 0).unwrap_err();
        assert!(matches!(err, PipelineError::MissingFile(_)));
    }

    #[test]
    fn unreadable_file_aborts_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("missing-later.xlsx");
        let bad = dir.path().join("broken.xlsx");
        std::fs::write(&bad, b"not a spreadsheet").unwrap();

        let err = read_tables("orders", &[bad, good], 0).unwrap_err();
        assert!(matches!(err, PipelineError::Workbook { .. }));
    }

    #[test]
    fn repeated_headers_are_suffixed_and_comment_row_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        let rows: [&[&str]; 3] = [
            &["Order ID", "SKU", "Quantity", "SKU", ""],
            &["Platform unique order ID", "Seller SKU", "Count", "", ""],
            &["M1", "first", "1", "second", "x"],
        ];
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save(&path).unwrap();

        let table = read_table(&path, 1).unwrap();
        assert_eq!(
            table.headers,
            vec!["Order ID", "SKU", "Quantity", "SKU.1", "Unnamed: 4"]
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 1), "first");
        assert_eq!(table.cell(0, 3), "second");
    }

    #[test]
    fn cells_render_as_trimmed_text() {
        assert_eq!(cell_text(&Data::String("  yes ".into())), "yes");
        assert_eq!(cell_text(&Data::Float(5.78e11)), "578000000000");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
