use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use rust_decimal::Decimal;

use crate::error::BunnrenskError;
use crate::model::{AnalysisType, InputRow, Sample};
use crate::parsing::sample_name::{
    base_sample_name, infer_analysis_type, infer_location_type, infer_sample_type,
    parse_profile_range,
};
use crate::parsing::values::{parse_number, parse_value, ParsedValue};

/// Where things live in a wide results sheet: one row per sample, one column
/// per parameter. Row and column positions are 0-based.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    /// None reads the first sheet.
    pub sheet: Option<String>,
    pub header_row: u32,
    pub unit_row: Option<u32>,
    pub first_data_row: u32,
    /// Header of the column holding the sample name.
    pub sample_column: String,
    pub profile_start_column: Option<String>,
    pub profile_end_column: Option<String>,
    pub lab_reference_column: Option<String>,
    /// Rows with "x" in this column are withdrawn samples.
    pub withdrawn_column: Option<String>,
    /// Metadata headers that are not parameters.
    pub skip_columns: Vec<String>,
    /// Prepended to the cleaned sample name.
    pub sample_id_prefix: String,
    /// Forces one analysis type; otherwise it is read from the sample name.
    pub analysis_type: Option<AnalysisType>,
}

impl Default for SheetLayout {
    fn default() -> Self {
        SheetLayout {
            sheet: None,
            header_row: 3,
            unit_row: Some(2),
            first_data_row: 4,
            sample_column: "Prøvemerking".into(),
            profile_start_column: Some("Fra pel".into()),
            profile_end_column: Some("Til pel".into()),
            lab_reference_column: Some("Eurofins prøvenummer".into()),
            withdrawn_column: Some("Test/utgått".into()),
            skip_columns: vec!["Kommentar".into(), "Merknad".into()],
            sample_id_prefix: String::new(),
            analysis_type: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WideSheet {
    pub samples: Vec<Sample>,
    pub rows: Vec<InputRow>,
}

/// Read a wide results workbook into samples and raw input rows.
pub fn parse_wide_xlsx(bytes: &[u8], layout: &SheetLayout) -> Result<WideSheet, BunnrenskError> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(cursor)
        .map_err(|e| BunnrenskError::Workbook(format!("failed to open xlsx: {e}")))?;

    let sheet_name = match &layout.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| BunnrenskError::Workbook("workbook has no sheets".into()))?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| BunnrenskError::Workbook(format!("sheet '{sheet_name}' not found: {e}")))?;

    parse_wide_range(&range, layout)
}

/// Column role, resolved once from the header row.
#[derive(Debug)]
struct ParameterColumn {
    col: u32,
    label: String,
    unit: String,
}

pub fn parse_wide_range(range: &Range<Data>, layout: &SheetLayout) -> Result<WideSheet, BunnrenskError> {
    let Some((last_row, last_col)) = range.end() else {
        return Err(BunnrenskError::Workbook("sheet is empty".into()));
    };

    let header_of = |col: u32| {
        range
            .get_value((layout.header_row, col))
            .and_then(cell_as_string)
    };
    let find_column = |name: &str| -> Option<u32> {
        (0..=last_col).find(|c| header_of(*c).is_some_and(|h| h.eq_ignore_ascii_case(name)))
    };

    let sample_col = find_column(layout.sample_column.as_str()).ok_or_else(|| {
        BunnrenskError::Workbook(format!(
            "sample column '{}' not found in header row {}",
            layout.sample_column,
            layout.header_row + 1
        ))
    })?;
    let optional = |name: &Option<String>| name.as_deref().and_then(find_column);
    let start_col = optional(&layout.profile_start_column);
    let end_col = optional(&layout.profile_end_column);
    let lab_col = optional(&layout.lab_reference_column);
    let withdrawn_col = optional(&layout.withdrawn_column);

    let metadata: Vec<u32> = [Some(sample_col), start_col, end_col, lab_col, withdrawn_col]
        .into_iter()
        .flatten()
        .collect();
    let parameters: Vec<ParameterColumn> = (0..=last_col)
        .filter(|c| !metadata.contains(c))
        .filter_map(|col| {
            let label = header_of(col)?;
            if layout.skip_columns.iter().any(|s| s.eq_ignore_ascii_case(&label)) {
                return None;
            }
            let unit = layout
                .unit_row
                .and_then(|r| range.get_value((r, col)))
                .and_then(cell_as_string)
                .map(|u| strip_dry_matter_suffix(&u))
                .unwrap_or_default();
            Some(ParameterColumn { col, label, unit })
        })
        .collect();

    let mut sheet = WideSheet::default();
    for row in layout.first_data_row..=last_row {
        let Some(name) = range.get_value((row, sample_col)).and_then(cell_as_string) else {
            continue;
        };
        if name.eq_ignore_ascii_case(&layout.sample_column) {
            continue;
        }
        let withdrawn = withdrawn_col
            .and_then(|c| range.get_value((row, c)))
            .and_then(cell_as_string)
            .is_some_and(|v| v.eq_ignore_ascii_case("x"));
        if withdrawn {
            tracing::debug!(sample = %name, "withdrawn sample skipped");
            continue;
        }

        let name = clean_sample_name(&name);
        let base = base_sample_name(&name);
        let sample_id = format!("{}{}", layout.sample_id_prefix, base);
        let analysis_type = layout.analysis_type.unwrap_or_else(|| infer_analysis_type(&name));

        if !sheet.samples.iter().any(|s| s.sample_id == sample_id) {
            sheet
                .samples
                .push(sample_from_row(range, row, base, &sample_id, start_col, end_col, lab_col));
        }

        for param in &parameters {
            let Some(cell) = range.get_value((row, param.col)) else {
                continue;
            };
            if parse_cell(cell) == ParsedValue::Missing {
                continue;
            }
            let raw = cell_as_raw_value(cell).unwrap_or_default();
            sheet.rows.push(
                InputRow::new(&sample_id, &param.label, raw, &param.unit)
                    .with_analysis_type(analysis_type),
            );
        }
    }

    tracing::debug!(
        samples = sheet.samples.len(),
        rows = sheet.rows.len(),
        parameters = parameters.len(),
        "parsed wide sheet"
    );
    Ok(sheet)
}

fn sample_from_row(
    range: &Range<Data>,
    row: u32,
    name: &str,
    sample_id: &str,
    start_col: Option<u32>,
    end_col: Option<u32>,
    lab_col: Option<u32>,
) -> Sample {
    let decimal_at = |col: Option<u32>| -> Option<Decimal> {
        let cell = range.get_value((row, col?))?;
        match cell_as_f64(Some(cell)) {
            Some(f) => Some(f64_to_decimal(f)),
            None => cell_as_string(cell).and_then(|s| parse_number(&s)),
        }
    };

    let (name_start, name_end) = parse_profile_range(name);
    let mut sample = Sample::new(sample_id);
    sample.location_type = infer_location_type(name);
    sample.sample_type = infer_sample_type(name);
    sample.profile_start = decimal_at(start_col).or(name_start);
    sample.profile_end = decimal_at(end_col).or(name_end);
    sample.lab_reference = lab_col
        .and_then(|c| range.get_value((row, c)))
        .and_then(cell_as_string)
        .map(|s| clean_sample_name(&s));
    sample
}

/// Parse a workbook cell. Numeric cells are taken as measured values
/// without a round-trip through text.
pub fn parse_cell(cell: &Data) -> ParsedValue {
    match cell_as_f64(Some(cell)) {
        Some(f) => ParsedValue::Measured(f64_to_decimal(f)),
        None => match cell_as_string(cell) {
            Some(s) => parse_value(&s),
            None => ParsedValue::Missing,
        },
    }
}

/// Raw text for the input row: numbers in exact decimal form, text as-is.
fn cell_as_raw_value(cell: &Data) -> Option<String> {
    match cell_as_f64(Some(cell)) {
        Some(f) => Some(f64_to_decimal(f).to_string()),
        None => cell_as_string(cell),
    }
}

/// Merged cells carry newlines; underscores become dashes in sample ids.
fn clean_sample_name(s: &str) -> String {
    s.replace(['\n', '\r'], "").replace('_', "-").trim().to_string()
}

/// "mg/kg TS" -> "mg/kg".
fn strip_dry_matter_suffix(unit: &str) -> String {
    let unit = unit.trim();
    match unit.len().checked_sub(3) {
        Some(cut) if unit.is_char_boundary(cut) && unit[cut..].eq_ignore_ascii_case(" ts") => {
            unit[..cut].trim_end().to_string()
        }
        _ => unit.to_string(),
    }
}

fn cell_as_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::DateTime(dt) => Some(dt.to_string()),
        Data::Empty => None,
        _ => Some(format!("{cell}")),
    }
}

fn cell_as_f64(cell: Option<&Data>) -> Option<f64> {
    match cell? {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        _ => None,
    }
}

/// Convert f64 to Decimal through its shortest string form, so 0.0035_f64
/// stays 0.0035 instead of 0.00349999...
fn f64_to_decimal(f: f64) -> Decimal {
    let s = format!("{f}");
    s.parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::try_from(f).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocationType, SampleType};
    use rust_decimal_macros::dec;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    /// Rows 0-1 are titles, row 2 units, row 3 headers, data from row 4.
    fn sheet() -> Range<Data> {
        let mut r: Range<Data> = Range::new((0, 0), (7, 6));
        r.set_value((0, 0), s("Analyseresultater Hestnestunnelen"));
        r.set_value((2, 3), s("mg/kg TS"));
        r.set_value((2, 4), s("mg/kg TS"));
        r.set_value((2, 5), s("%"));
        for (c, h) in ["Prøvemerking", "Fra pel", "Til pel", "Arsen", "Bly", "Tørrstoff"]
            .iter()
            .enumerate()
        {
            r.set_value((3, c as u32), s(h));
        }

        r.set_value((4, 0), s("HL_1"));
        r.set_value((4, 1), Data::Float(9110.0));
        r.set_value((4, 2), Data::Float(9260.0));
        r.set_value((4, 3), Data::Float(51.9));
        r.set_value((4, 4), s("<2"));
        r.set_value((4, 5), Data::Float(78.1));

        // Repeated header inside the data block.
        r.set_value((5, 0), s("Prøvemerking"));

        r.set_value((6, 0), s("Grøft pel 8460\n"));
        r.set_value((6, 3), Data::Float(0.0035));

        r.set_value((7, 0), s("HL_1 kolonnetest"));
        r.set_value((7, 3), Data::Float(0.012));
        r
    }

    #[test]
    fn reads_samples_and_rows() {
        let layout = SheetLayout {
            sample_id_prefix: "p18-".into(),
            ..Default::default()
        };
        let wide = parse_wide_range(&sheet(), &layout).unwrap();

        assert_eq!(wide.samples.len(), 2);
        let first = &wide.samples[0];
        assert_eq!(first.sample_id, "p18-HL-1");
        assert_eq!(first.profile_start, Some(dec!(9110)));
        assert_eq!(first.profile_end, Some(dec!(9260)));
        assert_eq!(first.sample_type, SampleType::Bunnrensk);

        let groft = &wide.samples[1];
        assert_eq!(groft.sample_id, "p18-Grøft pel 8460");
        assert_eq!(groft.location_type, LocationType::Groft);
        assert_eq!(groft.profile_start, Some(dec!(8460)));

        // 3 + 1 + 1 non-empty parameter cells.
        assert_eq!(wide.rows.len(), 5);
        let arsen = &wide.rows[0];
        assert_eq!(arsen.raw_parameter, "Arsen");
        assert_eq!(arsen.raw_value, "51.9");
        assert_eq!(arsen.unit_label, "mg/kg");
        assert_eq!(wide.rows[1].raw_value, "<2");
        assert_eq!(wide.rows[2].unit_label, "%");
        assert_eq!(wide.rows[3].raw_value, "0.0035");
    }

    #[test]
    fn leaching_rows_attach_to_base_sample() {
        let wide = parse_wide_range(&sheet(), &SheetLayout::default()).unwrap();
        let column = wide.rows.last().unwrap();
        assert_eq!(column.sample_id, "HL-1");
        assert_eq!(column.analysis_type, AnalysisType::Kolonnetest);
    }

    #[test]
    fn withdrawn_samples_skipped() {
        let mut r = sheet();
        r.set_value((3, 6), s("Test/utgått"));
        r.set_value((4, 6), s("x"));
        let wide = parse_wide_range(&r, &SheetLayout::default()).unwrap();
        assert!(wide
            .rows
            .iter()
            .filter(|row| row.sample_id == "HL-1")
            .all(|row| row.analysis_type == AnalysisType::Kolonnetest));
        assert_eq!(wide.samples[0].sample_id, "Grøft pel 8460");
    }

    #[test]
    fn missing_sample_column_is_an_error() {
        let layout = SheetLayout {
            sample_column: "Sample".into(),
            ..Default::default()
        };
        assert!(parse_wide_range(&sheet(), &layout).is_err());
    }

    #[test]
    fn parse_cell_accepts_numbers_and_text() {
        assert_eq!(parse_cell(&Data::Float(12.3)), ParsedValue::Measured(dec!(12.3)));
        assert_eq!(parse_cell(&Data::Int(7)), ParsedValue::Measured(dec!(7)));
        assert_eq!(parse_cell(&s("< 0,5")), ParsedValue::BelowLimit(dec!(0.5)));
        assert_eq!(parse_cell(&Data::Empty), ParsedValue::Missing);
        assert_eq!(parse_cell(&s("   ")), ParsedValue::Missing);
    }

    #[test]
    fn dry_matter_suffix() {
        assert_eq!(strip_dry_matter_suffix("mg/kg TS"), "mg/kg");
        assert_eq!(strip_dry_matter_suffix("%"), "%");
        assert_eq!(strip_dry_matter_suffix("µg/kg ts"), "µg/kg");
    }

    #[test]
    fn f64_to_decimal_preserves_precision() {
        assert_eq!(f64_to_decimal(0.0035), dec!(0.0035));
        assert_eq!(f64_to_decimal(68.0), dec!(68));
        assert_eq!(f64_to_decimal(1.23), dec!(1.23));
    }
}
