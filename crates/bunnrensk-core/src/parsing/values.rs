use rust_decimal::Decimal;
use std::str::FromStr;

/// Markers labs use for "analysed, nothing found".
const NOT_DETECTED: &[&str] = &[
    "n.d.",
    "n.d",
    "nd",
    "ikke påvist",
    "not detected",
    "-",
    "i.p.",
];

/// A raw lab-report value cell after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedValue {
    /// Empty cell.
    Missing,
    Measured(Decimal),
    /// "<0.5": below the limit of quantification.
    BelowLimit(Decimal),
    NotDetected,
    /// Non-empty but not a number; carries the raw text.
    Unparseable(String),
}

impl ParsedValue {
    /// (value, below_limit, loq) with not-detected reported as zero.
    pub fn triple(&self) -> (Option<Decimal>, bool, Option<Decimal>) {
        match self {
            ParsedValue::Missing | ParsedValue::Unparseable(_) => (None, false, None),
            ParsedValue::Measured(v) => (Some(*v), false, None),
            ParsedValue::BelowLimit(l) => (Some(*l), true, Some(*l)),
            ParsedValue::NotDetected => (Some(Decimal::ZERO), true, None),
        }
    }
}

/// Parse a value cell from a lab report.
///
/// Handles formats like:
/// - "68" -> Measured(68)
/// - "12,3" -> Measured(12.3) (Norwegian decimal comma)
/// - "1 234,5" -> Measured(1234.5) (space as thousands separator)
/// - "< 0,030" or "&lt;0.030" -> BelowLimit(0.030)
/// - "n.d.", "ikke påvist" -> NotDetected
/// - "51.9 mg/kg" -> Measured(51.9) (trailing unit text ignored)
/// - "1.2E-05" -> Measured(0.000012)
pub fn parse_value(raw: &str) -> ParsedValue {
    let s = raw.trim();
    if s.is_empty() {
        return ParsedValue::Missing;
    }

    if let Some(rest) = s.strip_prefix('<').or_else(|| s.strip_prefix("&lt;")) {
        return match parse_number(rest) {
            Some(limit) => ParsedValue::BelowLimit(limit),
            None => ParsedValue::Unparseable(s.to_string()),
        };
    }

    let lower = s.to_lowercase();
    if NOT_DETECTED.contains(&lower.as_str()) {
        return ParsedValue::NotDetected;
    }

    match parse_number(s) {
        Some(v) => ParsedValue::Measured(v),
        None => ParsedValue::Unparseable(s.to_string()),
    }
}

/// Parse a plain number (no "<"), e.g. an uncertainty cell.
pub fn parse_number(s: &str) -> Option<Decimal> {
    let compact: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{202f}')
        .collect();

    // "1.234,5" vs "1,234.5" cannot be told apart.
    if compact.contains('.') && compact.contains(',') {
        return None;
    }
    let normalized = compact.replace(',', ".");
    let numeric = numeric_prefix(&normalized);
    if numeric.is_empty() {
        return None;
    }

    if numeric.contains(['e', 'E']) {
        Decimal::from_scientific(numeric).ok()
    } else {
        Decimal::from_str(numeric).ok()
    }
}

/// Leading sign, digits, one decimal point and an optional exponent.
fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if !s[digits_start..end].bytes().any(|b| b.is_ascii_digit()) {
        return "";
    }

    // Exponent only when followed by digits: "5e-3" but not "5ell".
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = bytes[exp_end..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    // A second decimal point ("1.2.3") makes the whole value suspect.
    if bytes.get(end) == Some(&b'.') {
        return "";
    }
    &s[..end]
}
