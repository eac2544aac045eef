//! In-memory text table: every uploaded sheet is held as headers plus rows of strings,
//! the same shape regardless of which spreadsheet tool produced it.

use std::collections::HashMap;

/// A sheet with all cells as trimmed text. Rows may be shorter than the header;
/// missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn with_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Index of a header by exact name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: String) {
        if let Some(r) = self.rows.get_mut(row) {
            if r.len() <= col {
                r.resize(col + 1, String::new());
            }
            r[col] = value;
        }
    }

    pub fn rename_column(&mut self, col: usize, name: &str) {
        if let Some(header) = self.headers.get_mut(col) {
            *header = name.to_string();
        }
    }

    /// Appends a derived column; `values` must hold one entry per row.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) {
        let width = self.headers.len();
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.resize(width, String::new());
            row.push(value);
        }
    }

    /// Keeps only rows for which `keep` returns true.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Concatenates tables in order. The merged header is the union of source headers in
    /// first-appearance order; cells a source lacks are left empty. A name repeated within
    /// one source keeps one merged column per occurrence, matched by occurrence index.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut headers: Vec<String> = Vec::new();
        for table in &tables {
            for (header, nth) in occurrences(&table.headers) {
                if nth_position(&headers, header, nth).is_none() {
                    headers.push(header.to_string());
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(Table::len).sum());
        for table in tables {
            let mapping: Vec<Option<usize>> = occurrences(&table.headers)
                .map(|(header, nth)| nth_position(&headers, header, nth))
                .collect();
            for row in table.rows {
                let mut merged = vec![String::new(); headers.len()];
                for (value, target) in row.into_iter().zip(&mapping) {
                    if let Some(target) = *target {
                        merged[target] = value;
                    }
                }
                rows.push(merged);
            }
        }

        Table { headers, rows }
    }
}

/// Pairs each header with how many times the same name appeared before it.
fn occurrences(headers: &[String]) -> impl Iterator<Item = (&str, usize)> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    headers.iter().map(move |h| {
        let count = seen.entry(h.as_str()).or_default();
        let nth = *count;
        *count += 1;
        (h.as_str(), nth)
    })
}

fn nth_position(headers: &[String], name: &str, nth: usize) -> Option<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| *h == name)
        .nth(nth)
        .map(|(i, _)| i)
}

/// Renames repeated header names `name.1`, `name.2`, ... so every column of a sheet stays
/// addressable by name. The first occurrence keeps its name.
pub fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let mut name = header.clone();
        let mut suffix = 0;
        while unique.contains(&name) {
            suffix += 1;
            name = format!("{header}.{suffix}");
        }
        unique.push(name);
    }
    unique
}

/// Coerces a text cell to a number. Anything unparseable is missing, never an error.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Quantity cells truncate toward zero and clamp at zero; missing counts as zero.
pub fn parse_quantity(value: &str) -> u64 {
    parse_number(value).map_or(0, |v| v.max(0.0) as u64)
}

/// Renders a number the way it is written back into text cells.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
