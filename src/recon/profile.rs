//! Region profiles: everything that differs between store regions lives here, so the
//! reconciliation engine itself has no region branches.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::ColumnRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Indonesia,
    Malaysia,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Indonesia => "indonesia",
            Self::Malaysia => "malaysia",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    /// Blank input selects the default region.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "indonesia" => Ok(Self::Indonesia),
            "malaysia" => Ok(Self::Malaysia),
            other => Err(format!("unknown region '{other}' (expected indonesia or malaysia)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderColumns {
    pub id: ColumnRule,
    pub sku: ColumnRule,
    pub quantity: ColumnRule,
    pub shipped: ColumnRule,
    pub status: ColumnRule,
    /// Rows between the header and the first data row (export notes).
    #[serde(default)]
    pub skip_after_header: usize,
}

/// Keep only settlement rows whose `column` equals `equals` (case-insensitive).
/// Applied only when the column exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: ColumnRule,
    pub equals: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementColumns {
    pub id: ColumnRule,
    pub amount: ColumnRule,
    #[serde(default)]
    pub row_filter: Option<RowFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionColumns {
    /// Falls back to the order table's SKU header, then to the first column.
    pub sku: ColumnRule,
    pub ad_spend: ColumnRule,
    pub gmv_max_spend: ColumnRule,
    pub unit_cost: ColumnRule,
}

/// How the shipped flag is read from its cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShipmentRule {
    /// Explicit yes/no words; anything else is unknown.
    YesNo { yes: Vec<String>, no: Vec<String> },
    /// Shipped when a shipment timestamp is present.
    Timestamp,
}

/// Status words per bucket, compared after trimming and lowercasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusVocabulary {
    pub delivered: Vec<String>,
    pub cancelled: Vec<String>,
    #[serde(default)]
    pub in_transit: Vec<String>,
}

impl StatusVocabulary {
    pub fn tracks_in_transit(&self) -> bool {
        !self.in_transit.is_empty()
    }
}

/// Operation fee in the reference currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeePolicy {
    /// Charged once per shipped order by its total quantity, split across its lines.
    QuantityTiered { single_unit: f64, multi_unit: f64 },
    /// Fixed fee per shipped line, looked up by SKU.
    PerSku {
        fees: BTreeMap<String, f64>,
        #[serde(default)]
        default: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyTable {
    pub local: String,
    pub reference: String,
    /// Local units per reference unit (operation fees and profit conversion).
    pub local_per_reference: f64,
    /// Local units per USD, for the ad-spend columns. `None` skips the USD fields.
    #[serde(default)]
    pub local_per_usd: Option<f64>,
}

impl CurrencyTable {
    pub fn to_reference(&self, local: f64) -> f64 {
        divide(local, self.local_per_reference)
    }

    pub fn to_local(&self, reference: f64) -> f64 {
        reference * self.local_per_reference
    }

    pub fn to_usd(&self, local: f64) -> Option<f64> {
        self.local_per_usd.map(|rate| divide(local, rate))
    }
}

fn divide(value: f64, rate: f64) -> f64 {
    if rate == 0.0 {
        0.0
    } else {
        value / rate
    }
}

/// A combo-SKU rewrite: `pattern` must define named groups `base` and `mult`;
/// `canonical` is a replacement template such as `${base}-1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboPattern {
    pub pattern: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportLayout {
    pub download_name: String,
    /// Echo the raw consumption table as its own sheet.
    #[serde(default)]
    pub include_consumption_sheet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionProfile {
    pub region: Region,
    pub orders: OrderColumns,
    pub settlements: SettlementColumns,
    pub consumption: ConsumptionColumns,
    pub shipment: ShipmentRule,
    pub statuses: StatusVocabulary,
    pub fees: FeePolicy,
    pub currency: CurrencyTable,
    #[serde(default)]
    pub combo_patterns: Vec<ComboPattern>,
    pub report: ReportLayout,
}

fn words(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl RegionProfile {
    pub fn indonesia() -> Self {
        Self {
            region: Region::Indonesia,
            orders: OrderColumns {
                id: ColumnRule::First,
                quantity: ColumnRule::contains(&["数量"]),
                sku: ColumnRule::contains(&["sku"]),
                shipped: ColumnRule::contains(&["是否出库"]),
                status: ColumnRule::contains(&["平台状态"]),
                skip_after_header: 0,
            },
            settlements: SettlementColumns {
                id: ColumnRule::First,
                amount: ColumnRule::contains(&["settlement"]),
                row_filter: None,
            },
            consumption: ConsumptionColumns {
                sku: ColumnRule::Exact(Vec::new()),
                ad_spend: ColumnRule::exact(&["印尼盾ads消耗"]),
                gmv_max_spend: ColumnRule::exact(&["印尼盾gmvmax消耗"]),
                unit_cost: ColumnRule::exact(&["印尼盾单sku成本"]),
            },
            shipment: ShipmentRule::YesNo {
                yes: words(&["yes"]),
                no: words(&["no"]),
            },
            statuses: StatusVocabulary {
                delivered: words(&["delivered", "completed"]),
                cancelled: words(&["cancelled"]),
                in_transit: words(&["in transit"]),
            },
            fees: FeePolicy::QuantityTiered {
                single_unit: 2.0,
                multi_unit: 2.5,
            },
            currency: CurrencyTable {
                local: "IDR".to_string(),
                reference: "RMB".to_string(),
                local_per_reference: 2300.0,
                local_per_usd: Some(16000.0),
            },
            combo_patterns: vec![
                ComboPattern {
                    pattern: r"^(?P<base>.+)-(?P<mult>\d+)$".to_string(),
                    canonical: "${base}-1".to_string(),
                },
                ComboPattern {
                    pattern: r"^(?P<base>.+)\*(?P<mult>\d+)$".to_string(),
                    canonical: "${base}*1".to_string(),
                },
            ],
            report: ReportLayout {
                download_name: "indonesia_financial_analysis.xlsx".to_string(),
                include_consumption_sheet: false,
            },
        }
    }

    pub fn malaysia() -> Self {
        let fees = [("xifashui", 2.5), ("kingstick", 2.5)]
            .into_iter()
            .map(|(sku, fee)| (sku.to_string(), fee))
            .collect();

        Self {
            region: Region::Malaysia,
            orders: OrderColumns {
                id: ColumnRule::exact(&["Order ID"]),
                quantity: ColumnRule::exact(&["Quantity"]),
                sku: ColumnRule::exact(&["Seller SKU"]),
                shipped: ColumnRule::exact(&["Shipped Time"]),
                status: ColumnRule::exact(&["Order Status"]),
                skip_after_header: 1,
            },
            settlements: SettlementColumns {
                id: ColumnRule::exact(&["Order/adjustment ID"]),
                amount: ColumnRule::exact(&["Total settlement amount"]),
                row_filter: Some(RowFilter {
                    column: ColumnRule::exact(&["Type"]),
                    equals: "order".to_string(),
                }),
            },
            consumption: ConsumptionColumns {
                sku: ColumnRule::exact(&["Seller SKU"]),
                ad_spend: ColumnRule::exact(&["马来币ads消耗"]),
                gmv_max_spend: ColumnRule::exact(&["马来币gmvmax消耗"]),
                unit_cost: ColumnRule::exact(&["单sku马来币成本", "马来币单sku成本"]),
            },
            shipment: ShipmentRule::Timestamp,
            statuses: StatusVocabulary {
                delivered: words(&["completed", "delivered"]),
                cancelled: words(&["canceled"]),
                in_transit: Vec::new(),
            },
            fees: FeePolicy::PerSku { fees, default: 0.0 },
            currency: CurrencyTable {
                local: "MYR".to_string(),
                reference: "RMB".to_string(),
                local_per_reference: 0.6,
                local_per_usd: None,
            },
            combo_patterns: Vec::new(),
            report: ReportLayout {
                download_name: "malaysia_financial_analysis.xlsx".to_string(),
                include_consumption_sheet: true,
            },
        }
    }

    pub fn for_region(region: Region) -> Self {
        match region {
            Region::Indonesia => Self::indonesia(),
            Region::Malaysia => Self::malaysia(),
        }
    }
}
