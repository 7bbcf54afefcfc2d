use anyhow::Result;
use calamine::{Data, Range};
use rust_decimal::Decimal;
use sales_pivot::*;

fn s(text: &str) -> Data {
    Data::String(text.to_string())
}

fn n(value: f64) -> Data {
    Data::Float(value)
}

fn sheet(rows: Vec<Vec<Data>>) -> Range<Data> {
    let height = rows.len() as u32;
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
    let mut range = Range::new((0, 0), (height.saturating_sub(1), width.saturating_sub(1)));
    for (r, row) in rows.into_iter().enumerate() {
        for (c, cell) in row.into_iter().enumerate() {
            if !matches!(cell, Data::Empty) {
                range.set_value((r as u32, c as u32), cell);
            }
        }
    }
    range
}

/// A category-mode branch sheet with a title row, merged-cell blank runs and
/// a subtotal row, the shape the branch fleet actually exports.
fn branch_sheet(amounts: &[(&str, &str, &str, f64, f64)]) -> Range<Data> {
    let mut rows = vec![
        vec![s("Ventas Consolidadas")],
        vec![
            s("Año Mes"),
            s("Proveedor"),
            s("Familia"),
            s("Total"),
            s("% Utilidad"),
        ],
    ];
    let mut last_period = "";
    let mut last_supplier = "";
    for &(period, supplier, family, amount, margin) in amounts {
        let period_cell = if period == last_period {
            Data::Empty
        } else {
            last_period = period;
            s(period)
        };
        let supplier_cell = if supplier == last_supplier {
            Data::Empty
        } else {
            last_supplier = supplier;
            s(supplier)
        };
        rows.push(vec![
            period_cell,
            supplier_cell,
            s(family),
            n(amount),
            n(margin),
        ]);
    }
    rows.push(vec![Data::Empty, s("Total General"), Data::Empty, n(9999.0)]);
    sheet(rows)
}

fn ingest() -> Snapshot {
    let north = branch_sheet(&[
        ("2024-01", "Acme", "Snacks", 600.0, 0.10),
        ("2024-01", "Acme", "Drinks", 250.0, 0.20),
        ("2024-02", "Bulk Co", "Drinks", 150.0, 0.30),
    ]);
    let south = branch_sheet(&[
        ("2024-01", "Acme", "Snacks", 400.0, 0.15),
        ("2024-02", "Bulk Co", "Snacks", 300.0, 0.25),
    ]);

    let mut records = parse_range(&north, None, "north");
    records.extend(parse_range(&south, None, "south"));
    Snapshot::new(records)
}

#[test]
fn test_full_pipeline_parse_filter_pivot() {
    let snapshot = ingest();
    assert_eq!(snapshot.len(), 5);

    // The trailing subtotal row of each sheet must not have been ingested.
    assert!(snapshot
        .records()
        .iter()
        .all(|r| !r.supplier.to_lowercase().contains("total")));

    let filters = FilterSet::all_from(snapshot.records());
    let report = aggregate(
        snapshot.records(),
        &filters,
        Dimension::Family,
        &[],
        Operator::Sum,
    );

    // Snacks: 600 + 400 + 300 = 1300; Drinks: 250 + 150 = 400.
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].label, "Snacks");
    assert_eq!(report.rows[0].measure_value, 1300.0);
    let share = report.rows[0].share_of_total.unwrap();
    assert!((share - 1300.0 / 1700.0).abs() < 1e-12);
}

#[test]
fn test_breakdown_by_branch_over_time() {
    let snapshot = ingest();
    let filters = FilterSet::all_from(snapshot.records());

    let report = aggregate(
        snapshot.records(),
        &filters,
        Dimension::Period,
        &[Dimension::Branch],
        Operator::Sum,
    );

    // Chronological row order when grouping by period.
    assert_eq!(report.rows[0].label, "2024-01");
    assert_eq!(report.chart.x_labels, vec!["2024-01", "2024-02"]);
    assert_eq!(report.chart.series.len(), 2);

    let north = report
        .chart
        .series
        .iter()
        .find(|series| series.name == "north")
        .unwrap();
    assert_eq!(north.points, vec![Some(850.0), Some(150.0)]);
}

#[test]
fn test_filters_narrow_the_report() {
    let snapshot = ingest();
    let mut filters = FilterSet::all_from(snapshot.records());
    filters.branches.remove("south");
    filters.periods.remove("2024-02");

    let report = aggregate(
        snapshot.records(),
        &filters,
        Dimension::Supplier,
        &[],
        Operator::Count,
    );

    // Only north's two January rows remain.
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].label, "Acme");
    assert_eq!(report.rows[0].measure_value, 2.0);
    assert_eq!(report.rows[0].share_of_total, None);
}

#[test]
fn test_currency_text_amounts_survive_ingestion() -> Result<()> {
    let range = sheet(vec![
        vec![s("Año Mes"), s("Familia"), s("Total")],
        vec![s("2024-01"), s("Snacks"), s("₡1,000.00")],
        vec![s("2024-01"), s("Drinks"), s("1.234,56")],
    ]);
    let records = parse_range(&range, None, "kiosk");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].total_amount, "1000.00".parse::<Decimal>()?);
    assert_eq!(records[1].total_amount, "1234.56".parse::<Decimal>()?);
    Ok(())
}

#[test]
fn test_comparative_view_shows_gap_not_zero() {
    // Branch A sells the product in January only; branch B in both months.
    let a = branch_sheet(&[("2024-01", "Acme", "Cola", 100.0, 0.10)]);
    let b = branch_sheet(&[
        ("2024-01", "Acme", "Cola", 100.0, 0.20),
        ("2024-02", "Acme", "Cola", 100.0, 0.20),
    ]);

    let mut records = parse_range(&a, None, "A");
    records.extend(parse_range(&b, None, "B"));
    let snapshot = Snapshot::new(records);

    let filters = FilterSet::all_from(snapshot.records());
    let chart = comparative_series(snapshot.records(), &filters, "Cola");

    assert_eq!(chart.x_labels, vec!["2024-01", "2024-02"]);
    let series_a = chart.series.iter().find(|s| s.name == "A").unwrap();
    let series_b = chart.series.iter().find(|s| s.name == "B").unwrap();
    assert_eq!(series_a.points, vec![Some(0.10), None]);
    assert_eq!(series_b.points, vec![Some(0.20), Some(0.20)]);
}

#[test]
fn test_product_explorer_across_branches() {
    let snapshot = ingest();
    let filters = FilterSet::all_from(snapshot.records());

    let summaries = explore_products(snapshot.records(), &filters);
    let snacks = summaries.iter().find(|p| p.name == "Snacks").unwrap();

    assert_eq!(snacks.branch_count, 2);
    assert_eq!(snacks.branches, vec!["north", "south"]);
    assert_eq!(snacks.total_sales, 1300.0);
}

#[test]
fn test_snapshot_survives_json_handoff() -> Result<()> {
    let snapshot = ingest();
    let restored = Snapshot::from_json(&snapshot.to_json()?)?;
    assert_eq!(restored, snapshot);
    Ok(())
}

#[test]
fn test_pivot_is_idempotent_over_a_snapshot() {
    let snapshot = ingest();
    let filters = FilterSet::all_from(snapshot.records());

    let first = aggregate(
        snapshot.records(),
        &filters,
        Dimension::Branch,
        &[Dimension::Family],
        Operator::AverageMargin,
    );
    let second = aggregate(
        snapshot.records(),
        &filters,
        Dimension::Branch,
        &[Dimension::Family],
        Operator::AverageMargin,
    );
    assert_eq!(first, second);
}
