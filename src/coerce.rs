use calamine::Data;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Symbols stripped before textual parsing: percent, dollar and colón signs.
const STRIPPED_GLYPHS: [char; 3] = ['%', '$', '₡'];

/// Locale-tolerant numeric read of a single cell. Numeric cells pass through
/// directly; text cells go through [`text_to_decimal`]. Everything else
/// (dates, booleans, errors, blanks) is not a number.
pub fn cell_to_decimal(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Float(value) => Decimal::try_from(*value).ok(),
        Data::Int(value) => Some(Decimal::from(*value)),
        Data::String(text) => text_to_decimal(text),
        _ => None,
    }
}

/// Parses currency/percentage-formatted text. The invariant (dot-decimal)
/// convention is tried before the regional (comma-decimal) one so that plain
/// numeric exports are never misread through a grouping separator.
pub fn text_to_decimal(text: &str) -> Option<Decimal> {
    let stripped: String = text
        .chars()
        .filter(|c| !STRIPPED_GLYPHS.contains(c))
        .collect();
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return None;
    }

    parse_with_separators(stripped, '.', ',')
        .or_else(|| parse_with_separators(stripped, ',', '.'))
}

/// One convention attempt. A grouping character (or a second decimal mark)
/// appearing after the decimal separator invalidates the attempt, which is
/// what pushes `1.234,56` off the invariant path and onto the regional one.
fn parse_with_separators(text: &str, decimal: char, group: char) -> Option<Decimal> {
    if let Some(pos) = text.find(decimal) {
        let fraction = &text[pos + decimal.len_utf8()..];
        if fraction.contains(decimal) || fraction.contains(group) {
            return None;
        }
    }

    let normalized: String = text
        .chars()
        .filter(|&c| c != group)
        .map(|c| if c == decimal { '.' } else { c })
        .collect();

    Decimal::from_str(&normalized).ok()
}
