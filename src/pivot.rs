use crate::schema::{Dimension, FilterSet, Operator, SalesRecord};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Secondary detail shown when no breakdown dimensions are active.
pub const TOTAL_SENTINEL: &str = "Total";

/// Separator between the parts of a composite breakdown key.
const COMPOSITE_SEPARATOR: &str = " - ";

/// Categorical X axes render poorly beyond ~20 ticks.
const MAX_CATEGORY_TICKS: usize = 20;

/// Hard cap on plotted breakdown series to keep the legend legible.
const MAX_BREAKDOWN_SERIES: usize = 10;

/// One row of the ranked summary table. Disposable view artifact, recomputed
/// on every filter or grouping change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub label: String,
    pub secondary_detail: String,
    pub measure_value: f64,
    pub average_margin: f64,
    /// Which operator produced `measure_value`; display formatting is the
    /// caller's concern.
    pub operator: Operator,
    /// Fraction of the grand total. `None` when the operator is not a sum or
    /// the grand total is zero.
    pub share_of_total: Option<f64>,
}

/// A named chart series; a `None` point is an explicit gap marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartSeriesSet {
    pub x_labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PivotReport {
    pub rows: Vec<PivotRow>,
    pub chart: ChartSeriesSet,
}

/// One row of the product-explorer table: availability of a product across
/// the branch fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub branch_count: usize,
    pub branches: Vec<String>,
    pub total_sales: f64,
    pub average_margin: f64,
}

fn composite_key(record: &SalesRecord, breakdown: &[Dimension]) -> String {
    breakdown
        .iter()
        .map(|dim| dim.value_of(record))
        .collect::<Vec<_>>()
        .join(COMPOSITE_SEPARATOR)
}

fn measure(records: &[&SalesRecord], operator: Operator) -> f64 {
    match operator {
        Operator::Sum => records
            .iter()
            .map(|r| r.total_amount)
            .sum::<Decimal>()
            .to_f64()
            .unwrap_or(0.0),
        Operator::AverageMargin => mean_margin(records),
        Operator::Count => records.len() as f64,
    }
}

fn mean_margin(records: &[&SalesRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: Decimal = records.iter().map(|r| r.profit_margin).sum();
    (sum / Decimal::from(records.len())).to_f64().unwrap_or(0.0)
}

/// Computes the ranked summary table and the chart series for one
/// filter/group/operator selection. Pure and deterministic: identical inputs
/// always produce identical output, so callers may invoke it eagerly on
/// every filter change.
pub fn aggregate(
    records: &[SalesRecord],
    filters: &FilterSet,
    group: Dimension,
    breakdown: &[Dimension],
    operator: Operator,
) -> PivotReport {
    // No branch selection short-circuits to an empty report; the caller
    // decides how to present "nothing selected".
    if filters.branches.is_empty() {
        return PivotReport::default();
    }

    let filtered: Vec<&SalesRecord> = records.iter().filter(|r| filters.accepts(r)).collect();

    let grand_total: f64 = filtered
        .iter()
        .map(|r| r.total_amount)
        .sum::<Decimal>()
        .to_f64()
        .unwrap_or(0.0);

    // Group by (primary key, breakdown key). BTreeMap keeps the base order
    // deterministic before any ranking sort.
    let mut groups: BTreeMap<(String, String), Vec<&SalesRecord>> = BTreeMap::new();
    for record in &filtered {
        let label = group.value_of(record).to_string();
        let detail = if breakdown.is_empty() {
            TOTAL_SENTINEL.to_string()
        } else {
            composite_key(record, breakdown)
        };
        groups.entry((label, detail)).or_default().push(record);
    }

    let mut rows: Vec<PivotRow> = groups
        .iter()
        .map(|((label, detail), members)| {
            let value = measure(members, operator);
            let share = match operator {
                Operator::Sum if grand_total != 0.0 => Some(value / grand_total),
                _ => None,
            };
            PivotRow {
                label: label.clone(),
                secondary_detail: detail.clone(),
                measure_value: value,
                average_margin: mean_margin(members),
                operator,
                share_of_total: share,
            }
        })
        .collect();

    // Magnitude ranking by default; chronological order wins when grouping
    // by period, with magnitude only breaking ties.
    if group == Dimension::Period {
        rows.sort_by(|a, b| {
            a.label
                .cmp(&b.label)
                .then(b.measure_value.total_cmp(&a.measure_value))
        });
    } else {
        rows.sort_by(|a, b| b.measure_value.total_cmp(&a.measure_value));
    }

    let chart = build_chart(&filtered, group, breakdown, operator);

    PivotReport { rows, chart }
}

fn build_chart(
    filtered: &[&SalesRecord],
    group: Dimension,
    breakdown: &[Dimension],
    operator: Operator,
) -> ChartSeriesSet {
    // Per-tick buckets along the primary axis.
    let mut by_tick: BTreeMap<String, Vec<&SalesRecord>> = BTreeMap::new();
    for record in filtered {
        by_tick
            .entry(group.value_of(record).to_string())
            .or_default()
            .push(record);
    }

    let x_labels: Vec<String> = if group == Dimension::Period {
        // Time axes stay chronological and unbounded.
        by_tick.keys().cloned().collect()
    } else {
        let mut ranked: Vec<(&String, f64)> = by_tick
            .iter()
            .map(|(label, members)| (label, measure(members, operator)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(MAX_CATEGORY_TICKS)
            .map(|(label, _)| label.clone())
            .collect()
    };

    let mut series = Vec::new();

    if breakdown.is_empty() {
        let points: Vec<Option<f64>> = x_labels
            .iter()
            .map(|label| {
                let value = by_tick
                    .get(label)
                    .map(|members| measure(members, operator))
                    .unwrap_or(0.0);
                Some(value)
            })
            .collect();
        series.push(ChartSeries {
            name: TOTAL_SENTINEL.to_string(),
            points,
        });
    } else {
        let mut by_composite: BTreeMap<String, Vec<&SalesRecord>> = BTreeMap::new();
        for record in filtered {
            by_composite
                .entry(composite_key(record, breakdown))
                .or_default()
                .push(record);
        }

        let mut ranked: Vec<(&String, f64)> = by_composite
            .iter()
            .map(|(key, members)| (key, measure(members, operator)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (key, _) in ranked.into_iter().take(MAX_BREAKDOWN_SERIES) {
            let points: Vec<Option<f64>> = x_labels
                .iter()
                .map(|label| {
                    let members: Vec<&SalesRecord> = by_tick
                        .get(label)
                        .map(|ticked| {
                            ticked
                                .iter()
                                .filter(|r| composite_key(r, breakdown) == *key)
                                .copied()
                                .collect()
                        })
                        .unwrap_or_default();
                    // Zero, not a gap: a stacked/grouped chart needs a value
                    // at every tick.
                    Some(measure(&members, operator))
                })
                .collect();
            series.push(ChartSeries {
                name: key.clone(),
                points,
            });
        }
    }

    ChartSeriesSet { x_labels, series }
}

/// Product-explorer aggregation: ignores the active group dimension and
/// groups by trimmed item name, reporting which branches carry each product.
/// Only the branch and period filters apply.
pub fn explore_products(records: &[SalesRecord], filters: &FilterSet) -> Vec<ProductSummary> {
    let mut by_product: BTreeMap<String, Vec<&SalesRecord>> = BTreeMap::new();
    for record in records {
        if !filters.branches.contains(&record.branch) || !filters.periods.contains(&record.period)
        {
            continue;
        }
        by_product
            .entry(record.item_name.trim().to_string())
            .or_default()
            .push(record);
    }

    by_product
        .into_iter()
        .map(|(name, members)| {
            let branches: BTreeSet<String> =
                members.iter().map(|r| r.branch.clone()).collect();
            ProductSummary {
                name,
                branch_count: branches.len(),
                branches: branches.into_iter().collect(),
                total_sales: measure(&members, Operator::Sum),
                average_margin: mean_margin(&members),
            }
        })
        .collect()
}

/// Single-product comparative view: one series per branch over the filtered
/// periods, plotting the mean profit margin per month. A month with no sales
/// for a branch is an explicit gap, not a zero, so the chart does not draw a
/// flat line through missing months.
pub fn comparative_series(
    records: &[SalesRecord],
    filters: &FilterSet,
    product: &str,
) -> ChartSeriesSet {
    let x_labels: Vec<String> = {
        let mut periods: Vec<String> = filters.periods.iter().cloned().collect();
        periods.sort();
        periods
    };

    let matching: Vec<&SalesRecord> = records
        .iter()
        .filter(|r| r.item_name.trim() == product && filters.periods.contains(&r.period))
        .collect();

    let mut by_branch: BTreeMap<String, Vec<&SalesRecord>> = BTreeMap::new();
    for record in matching {
        by_branch
            .entry(record.branch.clone())
            .or_default()
            .push(record);
    }

    let series = by_branch
        .into_iter()
        .map(|(branch, members)| {
            let points: Vec<Option<f64>> = x_labels
                .iter()
                .map(|period| {
                    let month: Vec<&SalesRecord> = members
                        .iter()
                        .filter(|r| r.period == *period)
                        .copied()
                        .collect();
                    if month.is_empty() {
                        None
                    } else {
                        Some(mean_margin(&month))
                    }
                })
                .collect();
            ChartSeries {
                name: branch,
                points,
            }
        })
        .collect();

    ChartSeriesSet { x_labels, series }
}
