use crate::coerce::cell_to_decimal;
use crate::error::{Result, SalesPivotError};
use crate::schema::{BusinessMode, SalesRecord};
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use std::path::Path;

/// How many leading populated rows are scanned for a header before giving up.
const HEADER_SCAN_ROWS: usize = 20;

/// Placeholder for itemized rows whose description cell is blank.
const NO_NAME_SENTINEL: &str = "(no name)";

/// Fill-down default for sheets that never populate supplier or family.
const GENERAL_SENTINEL: &str = "General";

/// The seven column roles a header cell can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Date,
    ItemCode,
    Description,
    Supplier,
    Family,
    Total,
    Margin,
}

enum Keyword {
    Exact(&'static str),
    Contains(&'static str),
}

impl Keyword {
    fn matches(&self, text: &str) -> bool {
        match self {
            Keyword::Exact(word) => text == *word,
            Keyword::Contains(word) => text.contains(word),
        }
    }
}

/// Keyword-to-role rule table, in priority order. A header cell is assigned
/// the role of the first rule it matches, so a cell containing both "total"
/// and "utility" resolves to whichever role appears first here. Both English
/// and Spanish captions are listed since the branch fleet mixes them.
const ROLE_RULES: &[(Keyword, ColumnRole)] = &[
    (Keyword::Contains("año"), ColumnRole::Date),
    (Keyword::Contains("year"), ColumnRole::Date),
    (Keyword::Exact("mes"), ColumnRole::Date),
    (Keyword::Exact("month"), ColumnRole::Date),
    (Keyword::Exact("artículo"), ColumnRole::ItemCode),
    (Keyword::Exact("articulo"), ColumnRole::ItemCode),
    (Keyword::Exact("item"), ColumnRole::ItemCode),
    (Keyword::Exact("sku"), ColumnRole::ItemCode),
    (Keyword::Contains("desc"), ColumnRole::Description),
    (Keyword::Contains("nombre"), ColumnRole::Description),
    (Keyword::Contains("name"), ColumnRole::Description),
    (Keyword::Contains("proveedor"), ColumnRole::Supplier),
    (Keyword::Contains("supplier"), ColumnRole::Supplier),
    (Keyword::Contains("familia"), ColumnRole::Family),
    (Keyword::Contains("family"), ColumnRole::Family),
    (Keyword::Exact("total"), ColumnRole::Total),
    (Keyword::Exact("total venta"), ColumnRole::Total),
    (Keyword::Exact("total sale"), ColumnRole::Total),
    (Keyword::Contains("utilidad"), ColumnRole::Margin),
    (Keyword::Contains("utility"), ColumnRole::Margin),
    (Keyword::Contains("profit"), ColumnRole::Margin),
    (Keyword::Contains("%"), ColumnRole::Margin),
];

/// Resolved column index per role, accumulated over the header scan.
#[derive(Debug, Default, Clone)]
struct ColumnMap {
    date: Option<usize>,
    item_code: Option<usize>,
    description: Option<usize>,
    supplier: Option<usize>,
    family: Option<usize>,
    total: Option<usize>,
    margin: Option<usize>,
}

impl ColumnMap {
    fn assign(&mut self, role: ColumnRole, col: usize) {
        let slot = match role {
            ColumnRole::Date => &mut self.date,
            ColumnRole::ItemCode => &mut self.item_code,
            ColumnRole::Description => &mut self.description,
            ColumnRole::Supplier => &mut self.supplier,
            ColumnRole::Family => &mut self.family,
            ColumnRole::Total => &mut self.total,
            ColumnRole::Margin => &mut self.margin,
        };
        *slot = Some(col);
    }

    /// A header is only credible once it locates the totals column plus at
    /// least one of the fill-down category columns.
    fn is_complete(&self) -> bool {
        self.total.is_some() && (self.family.is_some() || self.supplier.is_some())
    }
}

fn classify_header_cell(text: &str) -> Option<ColumnRole> {
    ROLE_RULES
        .iter()
        .find(|(keyword, _)| keyword.matches(text))
        .map(|(_, role)| *role)
}

fn row_is_populated(row: &[Data]) -> bool {
    row.iter().any(|cell| !matches!(cell, Data::Empty))
}

fn cell_text(row: &[Data], col: Option<usize>) -> Option<String> {
    let cell = row.get(col?)?;
    if matches!(cell, Data::Empty) {
        return None;
    }
    let text = cell.to_string();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Renders a date-column cell as a carried period token: real dates become
/// canonical `YYYY-MM`, textual year-month variants are normalized onto the
/// same form, anything else keeps its literal text.
fn period_token(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::DateTime(dt) => Some(
            dt.as_datetime()
                .map(|d| d.format("%Y-%m").to_string())
                .unwrap_or_else(|| cell.to_string()),
        ),
        other => {
            let text = other.to_string();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(normalize_period(trimmed))
            }
        }
    }
}

/// Round-trips a textual `YYYY-MM` token through a real date so variants
/// with an unpadded month ("2024-5") land in the same bucket as "2024-05".
/// Labels that are not year-month tokens pass through untouched.
fn normalize_period(text: &str) -> String {
    NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d")
        .map(|date| date.format("%Y-%m").to_string())
        .unwrap_or_else(|_| text.to_string())
}

/// A period that still carries the date-column header keyword is a label the
/// fill-down picked up above the data region, never a real month.
fn looks_like_header_label(period: &str) -> bool {
    let lower = period.to_lowercase();
    lower.contains("año") || lower.contains("year")
}

/// Scans the leading populated rows for a header. Role matches accumulate
/// across rows (some sheets split their captions over two rows); the first
/// row after which the map is complete wins.
fn detect_header(range: &Range<Data>) -> Option<(usize, ColumnMap)> {
    let mut columns = ColumnMap::default();
    let mut scanned = 0;

    for (row_idx, row) in range.rows().enumerate() {
        if !row_is_populated(row) {
            continue;
        }
        scanned += 1;
        if scanned > HEADER_SCAN_ROWS {
            break;
        }

        for (col, cell) in row.iter().enumerate() {
            if matches!(cell, Data::Empty) {
                continue;
            }
            let text = cell.to_string().to_lowercase().trim().to_string();
            if text.is_empty() {
                continue;
            }
            if let Some(role) = classify_header_cell(&text) {
                columns.assign(role, col);
            }
        }

        if columns.is_complete() {
            return Some((row_idx, columns));
        }
    }

    None
}

/// Parses one sheet into typed sales records. A sheet with no recognizable
/// header yields zero records, not an error; individual bad rows are skipped.
pub fn parse_range(
    range: &Range<Data>,
    mode_hint: Option<BusinessMode>,
    branch: &str,
) -> Vec<SalesRecord> {
    let mut records = Vec::new();

    let (header_row, columns) = match detect_header(range) {
        Some(found) => found,
        None => {
            debug!("no header row found for branch {branch}, skipping sheet");
            return records;
        }
    };

    // Completeness of the header guarantees a totals column.
    let total_col = match columns.total {
        Some(col) => col,
        None => return records,
    };

    let mode = mode_hint.unwrap_or(if columns.item_code.is_some() {
        BusinessMode::Itemized
    } else {
        BusinessMode::Category
    });

    let mut period = String::new();
    let mut supplier = GENERAL_SENTINEL.to_string();
    let mut family = GENERAL_SENTINEL.to_string();

    for row in range.rows().skip(header_row + 1) {
        // Fill-down: blank cells inherit the last carried value.
        if let Some(col) = columns.date {
            if let Some(token) = row.get(col).and_then(period_token) {
                period = token;
            }
        }
        if let Some(text) = cell_text(row, columns.supplier) {
            if !text.to_lowercase().contains("total") {
                supplier = text;
            }
        }
        if let Some(text) = cell_text(row, columns.family) {
            family = text;
        }

        // Row admission.
        match mode {
            BusinessMode::Itemized => {
                if columns.item_code.is_some() && cell_text(row, columns.item_code).is_none() {
                    continue;
                }
            }
            BusinessMode::Category => {
                if columns.family.is_some() && cell_text(row, columns.family).is_none() {
                    continue;
                }
                if let Some(text) = cell_text(row, columns.supplier) {
                    if text.to_lowercase().contains("total") {
                        continue;
                    }
                }
            }
        }

        let total_amount = match row.get(total_col).and_then(cell_to_decimal) {
            Some(amount) if !amount.is_zero() => amount,
            _ => continue,
        };

        let profit_margin = columns
            .margin
            .and_then(|col| row.get(col))
            .and_then(cell_to_decimal)
            .unwrap_or(Decimal::ZERO);

        let item_name = match mode {
            BusinessMode::Itemized => cell_text(row, columns.description)
                .unwrap_or_else(|| NO_NAME_SENTINEL.to_string()),
            BusinessMode::Category => family.clone(),
        };

        if period.is_empty() || looks_like_header_label(&period) {
            continue;
        }

        records.push(SalesRecord {
            branch: branch.to_string(),
            period: period.clone(),
            item_code: cell_text(row, columns.item_code).unwrap_or_default(),
            item_name,
            supplier: supplier.clone(),
            family: family.clone(),
            total_amount,
            profit_margin,
        });
    }

    debug!("parsed {} records for branch {branch}", records.len());
    records
}

/// Opens a workbook and parses its first sheet. The branch name comes from
/// the file stem; file-level failures surface as errors for the loader to
/// collect.
pub fn parse_file(path: &Path, mode_hint: Option<BusinessMode>) -> Result<Vec<SalesRecord>> {
    let file_label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let branch = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_label.clone());

    let mut workbook = open_workbook_auto(path).map_err(|source| SalesPivotError::Spreadsheet {
        file: file_label.clone(),
        source,
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SalesPivotError::EmptyWorkbook(file_label.clone()))?
        .map_err(|source| SalesPivotError::Spreadsheet {
            file: file_label,
            source,
        })?;

    Ok(parse_range(&range, mode_hint, &branch))
}
