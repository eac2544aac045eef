pub mod columns;
pub mod merge;
pub mod table;
pub mod workbook;

pub use columns::{resolve_column, resolve_columns, ColumnRule, Field};
pub use merge::{merge_tables, ColumnRename, ORDER_ID_COLUMN};
pub use table::{format_number, parse_number, parse_quantity, Table};
pub use workbook::{cell_text, read_table, read_tables};
