//! Per-SKU ad spend and unit cost from the consumption sheet.

use std::collections::HashMap;

use crate::data::{parse_number, Table};
use crate::recon::profile::ConsumptionColumns;

/// Local-currency spend and cost for one SKU. Absent columns and malformed cells are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostRow {
    pub ad_spend: f64,
    pub gmv_max_spend: f64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CostTable {
    rows: HashMap<String, CostRow>,
}

impl CostTable {
    /// The SKU column is the profile's named column, else a header equal to the order
    /// table's SKU header, else the first column. The first row of a repeated SKU wins.
    pub fn from_table(table: &Table, columns: &ConsumptionColumns, order_sku_header: &str) -> Self {
        let sku_col = columns
            .sku
            .locate(&table.headers)
            .or_else(|| table.column(order_sku_header))
            .or(if table.width() > 0 { Some(0) } else { None });
        let Some(sku_col) = sku_col else {
            return Self::default();
        };

        let ad_col = columns.ad_spend.locate(&table.headers);
        let gmv_col = columns.gmv_max_spend.locate(&table.headers);
        let cost_col = columns.unit_cost.locate(&table.headers);
        let value = |row: usize, col: Option<usize>| {
            col.and_then(|c| parse_number(table.cell(row, c)))
                .unwrap_or(0.0)
        };

        let mut rows = HashMap::new();
        for row in 0..table.len() {
            let sku = table.cell(row, sku_col).trim();
            if sku.is_empty() {
                continue;
            }
            rows.entry(sku.to_string()).or_insert_with(|| CostRow {
                ad_spend: value(row, ad_col),
                gmv_max_spend: value(row, gmv_col),
                unit_cost: value(row, cost_col),
            });
        }

        tracing::info!(skus = rows.len(), "loaded consumption table");
        Self { rows }
    }

    /// Left-join lookup: SKUs without a consumption row cost nothing.
    pub fn get(&self, sku: &str) -> CostRow {
        self.rows.get(sku).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::profile::RegionProfile;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::with_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn first_column_is_sku_and_missing_columns_default_to_zero() {
        let t = table(&["产品", "印尼盾ads消耗"], &[&["foo-1", "16000"], &["bar", "x"]]);
        let costs = CostTable::from_table(&t, &RegionProfile::indonesia().consumption, "SKU");

        assert_eq!(
            costs.get("foo-1"),
            CostRow {
                ad_spend: 16000.0,
                gmv_max_spend: 0.0,
                unit_cost: 0.0
            }
        );
        assert_eq!(costs.get("bar").ad_spend, 0.0);
        assert_eq!(costs.get("absent"), CostRow::default());
    }

    #[test]
    fn order_sku_header_is_preferred_over_first_column() {
        let t = table(
            &["name", "SKU", "印尼盾单sku成本"],
            &[&["Foo", "foo-1", "2300"]],
        );
        let costs = CostTable::from_table(&t, &RegionProfile::indonesia().consumption, "SKU");
        assert_eq!(costs.get("foo-1").unit_cost, 2300.0);
    }

    #[test]
    fn malaysia_accepts_either_unit_cost_header() {
        let t = table(
            &["seller sku", "马来币单sku成本", "马来币ads消耗"],
            &[&["kingstick", "12.5", "3"]],
        );
        let costs = CostTable::from_table(&t, &RegionProfile::malaysia().consumption, "Seller SKU");
        assert_eq!(costs.get("kingstick").unit_cost, 12.5);
        assert_eq!(costs.get("kingstick").ad_spend, 3.0);
    }

    #[test]
    fn first_row_of_a_repeated_sku_wins() {
        let t = table(&["sku", "印尼盾单sku成本"], &[&["a", "1"], &["a", "2"]]);
        let costs = CostTable::from_table(&t, &RegionProfile::indonesia().consumption, "sku");
        assert_eq!(costs.get("a").unit_cost, 1.0);
    }
}
