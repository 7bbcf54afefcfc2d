use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One ingested sales line. Immutable once produced by the parser; the
/// `branch` comes from the source file name, never from sheet content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub branch: String,
    /// Canonical `YYYY-MM` token, or the raw cell text when the date column
    /// held a label rather than a parseable date.
    pub period: String,
    /// Empty for layouts without an item-code column.
    pub item_code: String,
    pub item_name: String,
    pub supplier: String,
    pub family: String,
    pub total_amount: Decimal,
    /// Fractional ratio (0.25 for 25%). Defaults to zero when the sheet has
    /// no margin column or the cell does not parse.
    pub profit_margin: Decimal,
}

/// How rows in a sheet are shaped: one row per SKU, or one row per product
/// family with pre-aggregated figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessMode {
    Itemized,
    Category,
}

impl BusinessMode {
    /// Resolves the free-form UI hint once at the API boundary. `None` means
    /// "defer to item-code detection".
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.to_lowercase();
        if hint.contains("minimarket") {
            Some(BusinessMode::Itemized)
        } else if hint.contains("souvenir") || hint.contains("gift") {
            Some(BusinessMode::Category)
        } else {
            None
        }
    }
}

/// Grouping axes the pivot engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Period,
    Supplier,
    Family,
    Branch,
    ItemName,
}

impl Dimension {
    pub fn value_of<'a>(&self, record: &'a SalesRecord) -> &'a str {
        match self {
            Dimension::Period => &record.period,
            Dimension::Supplier => &record.supplier,
            Dimension::Family => &record.family,
            Dimension::Branch => &record.branch,
            Dimension::ItemName => &record.item_name,
        }
    }

    /// Maps a UI combo-box label onto a dimension, tolerating both the
    /// English and Spanish captions the reporting fleet uses.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("month") || label.contains("period") || label.contains("mes") {
            Some(Dimension::Period)
        } else if label.contains("supplier") || label.contains("proveedor") {
            Some(Dimension::Supplier)
        } else if label.contains("family") || label.contains("familia") {
            Some(Dimension::Family)
        } else if label.contains("branch") || label.contains("sucursal") {
            Some(Dimension::Branch)
        } else if label.contains("item") || label.contains("product") || label.contains("articulo")
        {
            Some(Dimension::ItemName)
        } else {
            None
        }
    }
}

/// Aggregation operators. `Sum` totals `total_amount`, `AverageMargin` takes
/// the mean of `profit_margin`, `Count` counts records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Sum,
    AverageMargin,
    Count,
}

impl Operator {
    /// Label resolution mirrors the selector combo box: anything that is not
    /// recognisably a sum or an average counts records.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("sum") || label.contains("suma") {
            Operator::Sum
        } else if label.contains("average") || label.contains("promedio") {
            Operator::AverageMargin
        } else {
            Operator::Count
        }
    }
}

/// Allowed-value sets per filterable dimension. A record passes only if all
/// four of its filterable fields are present in the corresponding set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub branches: HashSet<String>,
    pub periods: HashSet<String>,
    pub suppliers: HashSet<String>,
    pub families: HashSet<String>,
}

impl FilterSet {
    /// Everything selected, the state the filter checklists start in.
    pub fn all_from(records: &[SalesRecord]) -> Self {
        let mut filters = FilterSet::default();
        for record in records {
            filters.branches.insert(record.branch.clone());
            filters.periods.insert(record.period.clone());
            filters.suppliers.insert(record.supplier.clone());
            filters.families.insert(record.family.clone());
        }
        filters
    }

    pub fn accepts(&self, record: &SalesRecord) -> bool {
        self.branches.contains(&record.branch)
            && self.periods.contains(&record.period)
            && self.suppliers.contains(&record.supplier)
            && self.families.contains(&record.family)
    }
}

/// Distinct values of one dimension, for populating filter checklists.
/// Periods come back newest-first, everything else alphabetical.
pub fn distinct_values(records: &[SalesRecord], dimension: Dimension) -> Vec<String> {
    let values: std::collections::BTreeSet<String> = records
        .iter()
        .map(|r| dimension.value_of(r).to_string())
        .collect();
    let mut values: Vec<String> = values.into_iter().collect();
    if dimension == Dimension::Period {
        values.reverse();
    }
    values
}

/// Family choices narrowed to the currently selected suppliers and branches,
/// so the family checklist only offers combinations that exist.
pub fn families_for(
    records: &[SalesRecord],
    suppliers: &HashSet<String>,
    branches: &HashSet<String>,
) -> Vec<String> {
    let values: std::collections::BTreeSet<String> = records
        .iter()
        .filter(|r| suppliers.contains(&r.supplier) && branches.contains(&r.branch))
        .map(|r| r.family.clone())
        .collect();
    values.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(branch: &str, period: &str, supplier: &str, family: &str) -> SalesRecord {
        SalesRecord {
            branch: branch.to_string(),
            period: period.to_string(),
            item_code: String::new(),
            item_name: family.to_string(),
            supplier: supplier.to_string(),
            family: family.to_string(),
            total_amount: Decimal::from(100),
            profit_margin: "0.2".parse().unwrap(),
        }
    }

    #[test]
    fn test_mode_hint_resolution() {
        assert_eq!(
            BusinessMode::from_hint("Minimarket La Playa"),
            Some(BusinessMode::Itemized)
        );
        assert_eq!(
            BusinessMode::from_hint("Souvenir / Gift Shop"),
            Some(BusinessMode::Category)
        );
        assert_eq!(BusinessMode::from_hint("Restaurante"), None);
    }

    #[test]
    fn test_operator_label_fallback_is_count() {
        assert_eq!(Operator::from_label("Suma de Ventas"), Operator::Sum);
        assert_eq!(
            Operator::from_label("Promedio Margen"),
            Operator::AverageMargin
        );
        assert_eq!(Operator::from_label("Conteo"), Operator::Count);
    }

    #[test]
    fn test_dimension_labels() {
        assert_eq!(Dimension::from_label("Año Mes"), Some(Dimension::Period));
        assert_eq!(Dimension::from_label("Sucursal"), Some(Dimension::Branch));
        assert_eq!(Dimension::from_label("Otro"), None);
    }

    #[test]
    fn test_distinct_values_and_dependent_families() {
        let records = vec![
            record("north", "2024-01", "Acme", "Snacks"),
            record("south", "2024-02", "Bulk Co", "Drinks"),
        ];
        assert_eq!(
            distinct_values(&records, Dimension::Period),
            vec!["2024-02", "2024-01"]
        );
        assert_eq!(
            distinct_values(&records, Dimension::Branch),
            vec!["north", "south"]
        );

        let suppliers = HashSet::from(["Acme".to_string()]);
        let branches = HashSet::from(["north".to_string(), "south".to_string()]);
        assert_eq!(families_for(&records, &suppliers, &branches), vec!["Snacks"]);
    }

    #[test]
    fn test_filter_set_accepts_requires_every_dimension() {
        let records = vec![
            record("north", "2024-01", "Acme", "Snacks"),
            record("south", "2024-02", "Bulk Co", "Drinks"),
        ];
        let filters = FilterSet::all_from(&records);
        assert!(filters.accepts(&records[0]));
        assert!(filters.accepts(&records[1]));

        let mut narrowed = filters.clone();
        narrowed.suppliers.remove("Bulk Co");
        assert!(narrowed.accepts(&records[0]));
        assert!(!narrowed.accepts(&records[1]));
    }
}
