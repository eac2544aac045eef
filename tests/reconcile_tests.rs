use skuledger::data::Table;
use skuledger::recon::{reconcile, ReconInputs, RegionProfile, SkuSummary};
use skuledger::PipelineError;

fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
    Table::with_rows(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}

const ID_ORDER_HEADERS: [&str; 5] = ["订单号", "SKU", "数量", "是否出库", "平台状态"];
const ID_SETTLEMENT_HEADERS: [&str; 2] = ["订单号", "Total settlement amount"];
const ID_CONSUMPTION_HEADERS: [&str; 4] =
    ["SKU", "印尼盾ads消耗", "印尼盾gmvmax消耗", "印尼盾单sku成本"];

fn sku<'a>(skus: &'a [SkuSummary], name: &str) -> &'a SkuSummary {
    skus.iter()
        .find(|s| s.sku == name)
        .unwrap_or_else(|| panic!("sku {name} should be summarized"))
}

#[test]
fn settlement_is_split_across_the_lines_of_an_order() {
    let inputs = ReconInputs {
        orders: vec![table(
            &ID_ORDER_HEADERS,
            &[
                &["A1", "a", "1", "yes", "Delivered"],
                &["A1", "b", "1", "yes", "Delivered"],
                &["A1", "c", "1", "yes", "Delivered"],
            ],
        )],
        settlements: vec![table(&ID_SETTLEMENT_HEADERS, &[&["A1", "300"]])],
        consumption: table(&ID_CONSUMPTION_HEADERS, &[]),
    };

    let recon = reconcile(&RegionProfile::indonesia(), inputs).expect("reconcile");

    assert_eq!(recon.skus.len(), 3);
    for summary in &recon.skus {
        assert_eq!(summary.total_settlement, 100.0);
        assert_eq!(summary.shipped_orders, 1);
        assert_eq!(summary.delivered_orders, 1);
        assert_eq!(summary.total_operation_fee, 2.5 / 3.0);
    }
    let per_line: f64 = recon.lines.iter().map(|l| l.settlement_per_line).sum();
    assert_eq!(per_line, 300.0);
}

#[test]
fn duplicated_settlement_ids_are_excluded_not_summed() {
    let inputs = ReconInputs {
        orders: vec![table(
            &ID_ORDER_HEADERS,
            &[
                &["A1", "a", "1", "yes", "delivered"],
                &["B2", "a", "1", "yes", "delivered"],
            ],
        )],
        settlements: vec![
            table(&ID_SETTLEMENT_HEADERS, &[&["A1", "50"], &["B2", "70"]]),
            table(&ID_SETTLEMENT_HEADERS, &[&["A1", "60"]]),
        ],
        consumption: Table::default(),
    };

    let recon = reconcile(&RegionProfile::indonesia(), inputs).expect("reconcile");

    assert_eq!(recon.excluded.len(), 2);
    let a1 = recon
        .lines
        .iter()
        .find(|l| l.order_id == "A1")
        .expect("A1 line");
    assert_eq!(a1.settlement_total, 0.0);
    assert!(!a1.settled);
    assert_eq!(sku(&recon.skus, "a").total_settlement, 70.0);

    let settlement_col = recon
        .orders
        .column("settlement_amount")
        .expect("derived column");
    assert_eq!(recon.orders.cell(a1.row, settlement_col), "");
}

#[test]
fn combo_skus_are_rewritten_in_the_enriched_table() {
    let inputs = ReconInputs {
        orders: vec![table(
            &ID_ORDER_HEADERS,
            &[&["A1", "foo-3", "2", "yes", "delivered"], &["B1", "foo-1", "1", "no", "cancelled"]],
        )],
        settlements: vec![table(&ID_SETTLEMENT_HEADERS, &[&["A1", "10"]])],
        consumption: Table::default(),
    };

    let recon = reconcile(&RegionProfile::indonesia(), inputs).expect("reconcile");

    assert_eq!(recon.combos_rewritten, 1);
    assert_eq!(recon.skus.len(), 1);
    let foo = sku(&recon.skus, "foo-1");
    assert_eq!(foo.shipped_quantity, 6);
    assert_eq!(foo.order_count, 2);
    assert_eq!(foo.cancelled_before_shipment, 1);
    assert_eq!(recon.orders.cell(0, 1), "foo-1");
    assert_eq!(recon.orders.cell(0, 2), "6");
}

#[test]
fn costs_and_currency_flow_into_profit() {
    let inputs = ReconInputs {
        orders: vec![table(
            &ID_ORDER_HEADERS,
            &[&["A1", "a", "2", "yes", "delivered"], &["B1", "b", "1", "yes", "delivered"]],
        )],
        settlements: vec![table(
            &ID_SETTLEMENT_HEADERS,
            &[&["A1", "100000"], &["B1", "20000"]],
        )],
        consumption: table(&ID_CONSUMPTION_HEADERS, &[&["a", "16000", "4000", "2300"]]),
    };

    let recon = reconcile(&RegionProfile::indonesia(), inputs).expect("reconcile");

    let a = sku(&recon.skus, "a");
    assert_eq!(a.unit_cost_reference, 1.0);
    assert_eq!(a.ad_spend_usd, Some(1.0));
    assert_eq!(a.operation_fee_local, 2.5 * 2300.0);
    assert_eq!(a.product_cost_local, 4600.0);
    assert_eq!(a.total_ad_spend_local, 20000.0);
    assert_eq!(a.profit_local, 100000.0 - 5750.0 - 4600.0 - 20000.0);
    assert_eq!(a.gross_margin, Some(a.profit_local / 100000.0));

    // No consumption row: settlement minus the local fee.
    let b = sku(&recon.skus, "b");
    assert_eq!(b.unit_cost_local, 0.0);
    assert_eq!(b.profit_local, 20000.0 - 4600.0);
    assert_eq!(b.profit_per_delivered_order, Some(b.profit_reference));
}

#[test]
fn missing_order_columns_are_reported_together() {
    let inputs = ReconInputs {
        orders: vec![table(&["订单号", "SKU"], &[&["A1", "a"]])],
        settlements: vec![table(&ID_SETTLEMENT_HEADERS, &[])],
        consumption: Table::default(),
    };

    let err = reconcile(&RegionProfile::indonesia(), inputs).expect_err("should fail");
    match err {
        PipelineError::MissingColumns { table, fields } => {
            assert_eq!(table, "orders");
            assert_eq!(fields, vec!["quantity", "shipped flag", "platform status"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_settlement_batch_is_rejected() {
    let inputs = ReconInputs {
        orders: vec![table(&ID_ORDER_HEADERS, &[])],
        settlements: Vec::new(),
        consumption: Table::default(),
    };
    assert!(matches!(
        reconcile(&RegionProfile::indonesia(), inputs),
        Err(PipelineError::EmptyBatch("settlements"))
    ));
}

#[test]
fn malaysia_uses_per_sku_fees_and_type_filter() {
    let orders = table(
        &["Order ID", "Seller SKU", "Quantity", "Shipped Time", "Order Status"],
        &[
            &["M1", "xifashui", "2", "2025-03-01 10:00:00", "Completed"],
            &["M2", "kingstick", "1", "", "Canceled"],
            &["M3", "other", "1", "2025-03-02 09:00:00", "Shipped"],
        ],
    );
    let settlements = table(
        &["Order/adjustment ID", "Type", "Total settlement amount"],
        &[
            &["M1", "Order", "30"],
            &["M1", "Adjustment", "-5"],
            &["M3", "Order", "12"],
        ],
    );
    let consumption = table(
        &["Seller SKU", "马来币ads消耗", "马来币单sku成本"],
        &[&["xifashui", "3", "4"]],
    );

    let recon = reconcile(
        &RegionProfile::malaysia(),
        ReconInputs {
            orders: vec![orders],
            settlements: vec![settlements],
            consumption,
        },
    )
    .expect("reconcile");

    assert!(recon.excluded.is_empty());
    let x = sku(&recon.skus, "xifashui");
    assert_eq!(x.total_settlement, 30.0);
    assert_eq!(x.total_operation_fee, 2.5);
    assert_eq!(x.operation_fee_local, 2.5 * 0.6);
    assert_eq!(x.delivered_quantity, 2);
    assert_eq!(x.ad_spend_usd, None);
    assert_eq!(x.profit_local, 30.0 - 1.5 - 8.0 - 3.0);

    let k = sku(&recon.skus, "kingstick");
    assert_eq!(k.total_operation_fee, 0.0);
    assert_eq!(k.cancelled_before_shipment, 1);
    assert_eq!(k.in_transit_orders, 0);

    assert_eq!(sku(&recon.skus, "other").total_operation_fee, 0.0);
    assert_eq!(recon.consumption.len(), 1);
}

#[test]
fn repeated_sku_header_binds_to_the_first_column() {
    let inputs = ReconInputs {
        orders: vec![table(
            &["订单号", "SKU", "数量", "SKU", "是否出库", "平台状态"],
            &[&["A1", "first-sku", "1", "second-sku", "yes", "Delivered"]],
        )],
        settlements: vec![table(&ID_SETTLEMENT_HEADERS, &[&["A1", "40"]])],
        consumption: Table::default(),
    };

    let recon = reconcile(&RegionProfile::indonesia(), inputs).expect("reconcile");

    let skus: Vec<&str> = recon.skus.iter().map(|s| s.sku.as_str()).collect();
    assert_eq!(skus, vec!["first-sku"]);
    let sku_columns = recon.orders.headers.iter().filter(|h| *h == "SKU").count();
    assert_eq!(sku_columns, 2);
    assert_eq!(recon.orders.cell(0, 3), "second-sku");
}

#[test]
fn absurd_quantities_saturate_without_failing() {
    let inputs = ReconInputs {
        orders: vec![table(
            &ID_ORDER_HEADERS,
            &[
                &["A1", "a", "1e20", "yes", "Delivered"],
                &["A1", "a", "5", "yes", "Delivered"],
            ],
        )],
        settlements: vec![table(&ID_SETTLEMENT_HEADERS, &[&["A1", "300"]])],
        consumption: Table::default(),
    };

    let recon = reconcile(&RegionProfile::indonesia(), inputs).expect("reconcile");

    let a = sku(&recon.skus, "a");
    assert_eq!(a.shipped_quantity, u64::MAX);
    assert_eq!(a.delivered_quantity, u64::MAX);
    assert_eq!(a.total_operation_fee, 2.5);
    assert_eq!(a.total_settlement, 300.0);
}
