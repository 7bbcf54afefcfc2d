//! # Sales Pivot
//!
//! A library for ingesting a folder of per-branch retail spreadsheets
//! (inconsistent layouts and years) into a unified record stream, then
//! computing ad-hoc pivot aggregations for interactive reporting.
//!
//! ## Core Concepts
//!
//! - **Fill-down parsing**: loosely structured sheets use merged-cell-style
//!   blank runs; blank date/supplier/family cells inherit the last non-blank
//!   value above them
//! - **Business modes**: *itemized* sheets carry one row per SKU, *category*
//!   sheets one row per product family
//! - **Snapshot**: the immutable record set produced by one ingestion run,
//!   replaced wholesale on re-ingestion and borrowed by every pivot call
//! - **Pivot reports**: grouping by any dimension with optional breakdown
//!   dimensions, sum/average/count operators, share-of-total and bounded
//!   top-N chart series
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_pivot::*;
//! use std::path::Path;
//!
//! let cancel = CancelToken::new();
//! let outcome = load_folder(Path::new("reports/2024"), None, &cancel)?;
//! let snapshot = Snapshot::new(outcome.records);
//!
//! let filters = FilterSet::all_from(snapshot.records());
//! let report = aggregate(
//!     snapshot.records(),
//!     &filters,
//!     Dimension::Family,
//!     &[Dimension::Branch],
//!     Operator::Sum,
//! );
//! ```
//!
//! The crate returns raw numeric values everywhere; currency and percentage
//! formatting belong to the presentation layer.

pub mod coerce;
pub mod error;
pub mod loader;
pub mod parser;
pub mod pivot;
pub mod schema;

pub use coerce::{cell_to_decimal, text_to_decimal};
pub use error::{Result, SalesPivotError};
pub use loader::{load_folder, CancelToken, LoadOutcome};
pub use parser::{parse_file, parse_range};
pub use pivot::{
    aggregate, comparative_series, explore_products, ChartSeries, ChartSeriesSet, PivotReport,
    PivotRow, ProductSummary, TOTAL_SENTINEL,
};
pub use schema::*;

use serde::{Deserialize, Serialize};

/// The record set of one completed ingestion run. Built once, never mutated;
/// re-ingestion replaces the whole snapshot, so a pivot call borrowing an old
/// snapshot never observes a half-written batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    records: Vec<SalesRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes the snapshot for handoff to an embedding UI process.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<LoadOutcome> for Snapshot {
    fn from(outcome: LoadOutcome) -> Self {
        Self::new(outcome.records)
    }
}
