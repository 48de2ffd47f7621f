//! ALS Laboratory Group Norway report text.
//!
//! A report holds one section per sample:
//!
//! ```text
//! Deresprøvenavn 1
//! Sediment
//! Labnummer N00812345
//! Analyse          Resultater   Usikkerhet (±)   Enhet      Metode
//! Arsen (As)       51.9         10.4             mg/kgTS    1
//! Bly (Pb)         <2                            mg/kgTS    1
//! ```
//!
//! Result lines become raw [`InputRow`]s; label normalization, value parsing
//! and unit conversion happen later in the pipeline.

use crate::error::BunnrenskError;
use crate::extraction::PageContent;
use crate::model::{AnalysisType, InputRow, Sample};
use crate::parsing::values::{parse_number, parse_value, ParsedValue};
use std::collections::HashMap;

/// Units ALS prints on result lines, compared with whitespace removed.
const ALS_UNITS: &[&str] = &[
    "mg/kgts", "mg/kg", "µg/kgts", "µg/kg", "μg/kgts", "μg/kg", "ug/kgts", "ug/kg", "mg/l",
    "µg/l", "μg/l", "ug/l", "%",
];

/// Maps the sample keys printed after "Deresprøvenavn" to project sample ids.
#[derive(Debug, Clone, Default)]
pub struct SampleKeyMap {
    ids: HashMap<String, String>,
    prefix: String,
}

impl SampleKeyMap {
    pub fn new(prefix: impl Into<String>) -> Self {
        SampleKeyMap {
            ids: HashMap::new(),
            prefix: prefix.into(),
        }
    }

    /// Fallback prefix derived from the project code, e.g.
    /// "09_moanetunnelen" -> "p09-MOA-".
    pub fn for_project(project_code: &str) -> Self {
        SampleKeyMap::new(default_id_prefix(project_code))
    }

    pub fn with_id(mut self, key: impl Into<String>, sample_id: impl Into<String>) -> Self {
        self.ids.insert(key.into(), sample_id.into());
        self
    }

    pub fn sample_id(&self, key: &str) -> String {
        self.ids
            .get(key)
            .cloned()
            .unwrap_or_else(|| format!("{}{}", self.prefix, key))
    }
}

pub fn default_id_prefix(project_code: &str) -> String {
    match project_code.split_once('_') {
        Some((number, name)) if !name.is_empty() => {
            let short: String = name.chars().take(3).collect();
            format!("p{}-{}-", number, short.to_uppercase())
        }
        _ => format!("p{}-", project_code),
    }
}

/// A line that looked like a result but could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub sample_id: String,
    pub line_text: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct AlsReport {
    /// One per distinct sample id, in report order.
    pub samples: Vec<Sample>,
    pub rows: Vec<InputRow>,
    pub skipped_lines: Vec<SkippedLine>,
}

/// Parse extracted pages of an ALS report.
pub fn parse_als_pages(
    pages: &[PageContent],
    keys: &SampleKeyMap,
    analysis_type: AnalysisType,
) -> Result<AlsReport, BunnrenskError> {
    let lines: Vec<&str> = pages
        .iter()
        .flat_map(|p| p.lines.iter().map(|s| s.as_str()))
        .collect();
    parse_als_lines(&lines, keys, analysis_type)
}

pub fn parse_als_text(
    text: &str,
    keys: &SampleKeyMap,
    analysis_type: AnalysisType,
) -> Result<AlsReport, BunnrenskError> {
    let lines: Vec<&str> = text.lines().collect();
    parse_als_lines(&lines, keys, analysis_type)
}

fn parse_als_lines(
    lines: &[&str],
    keys: &SampleKeyMap,
    analysis_type: AnalysisType,
) -> Result<AlsReport, BunnrenskError> {
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Err(BunnrenskError::ParseError("no text content found in PDF".into()));
    }

    let sections = split_into_sections(lines);
    if sections.is_empty() {
        return Err(BunnrenskError::ParseError(
            "no 'Deresprøvenavn' sample sections found; not an ALS report?".into(),
        ));
    }

    let mut report = AlsReport::default();
    for section in &sections {
        let sample_id = keys.sample_id(&section.key);
        parse_section(section, &sample_id, analysis_type, &mut report);

        match report.samples.iter_mut().find(|s| s.sample_id == sample_id) {
            Some(existing) => {
                if existing.lab_reference.is_none() {
                    existing.lab_reference = section.lab_reference.clone();
                }
            }
            None => {
                let mut sample = Sample::new(&sample_id);
                sample.lab_reference = section.lab_reference.clone();
                report.samples.push(sample);
            }
        }
    }

    tracing::debug!(
        samples = report.samples.len(),
        rows = report.rows.len(),
        skipped = report.skipped_lines.len(),
        "parsed ALS report"
    );
    Ok(report)
}

#[derive(Debug)]
struct Section<'a> {
    key: String,
    lab_reference: Option<String>,
    lines: Vec<&'a str>,
}

/// Split lines into sections, each starting at a "Deresprøvenavn <key>"
/// line. Lines before the first header (cover page) are dropped.
fn split_into_sections<'a>(lines: &[&'a str]) -> Vec<Section<'a>> {
    let mut sections: Vec<Section<'a>> = Vec::new();

    for &line in lines {
        if let Some(key) = sample_key(line) {
            sections.push(Section {
                key,
                lab_reference: None,
                lines: Vec::new(),
            });
            continue;
        }
        let Some(current) = sections.last_mut() else {
            continue;
        };
        if current.lab_reference.is_none() {
            if let Some(lab) = value_after(line, &["labnummer"]) {
                current.lab_reference = Some(lab);
                continue;
            }
        }
        current.lines.push(line);
    }

    sections
}

fn sample_key(line: &str) -> Option<String> {
    value_after(line, &["deresprøvenavn"]).or_else(|| value_after(line, &["deres", "prøvenavn"]))
}

/// First word after the given label words, limited to word characters.
fn value_after(line: &str, label: &[&str]) -> Option<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let start = tokens.windows(label.len()).position(|w| {
        w.iter()
            .zip(label)
            .all(|(t, l)| t.trim_end_matches(':').to_lowercase() == *l)
    })?;
    let value: String = tokens
        .get(start + label.len())?
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!value.is_empty()).then_some(value)
}

fn parse_section(
    section: &Section<'_>,
    sample_id: &str,
    analysis_type: AnalysisType,
    report: &mut AlsReport,
) {
    for raw in &section.lines {
        let line = strip_footnotes(raw);
        let line = line.trim();
        if line.len() < 3 {
            continue;
        }

        match parse_result_line(line) {
            LineParse::Result(parsed) => {
                let mut row = InputRow::new(sample_id, parsed.label, parsed.value, parsed.unit)
                    .with_analysis_type(analysis_type);
                if let Some(u) = parsed.uncertainty {
                    row = row.with_uncertainty(u);
                }
                report.rows.push(row);
            }
            LineParse::Unreadable(reason) => {
                tracing::debug!(sample_id, line, reason, "skipped ALS line");
                report.skipped_lines.push(SkippedLine {
                    sample_id: sample_id.to_string(),
                    line_text: line.to_string(),
                    reason: reason.to_string(),
                });
            }
            LineParse::NotAResult => {}
        }
    }
}

#[derive(Debug, PartialEq)]
struct ParsedLine {
    label: String,
    value: String,
    uncertainty: Option<String>,
    unit: String,
}

#[derive(Debug, PartialEq)]
enum LineParse {
    Result(ParsedLine),
    /// Has a unit column but the rest does not fit.
    Unreadable(&'static str),
    NotAResult,
}

/// Read `<label> <value> [<uncertainty>] <unit> ...`.
///
/// Layout text keeps columns apart with runs of spaces; text that lost its
/// layout falls back to single-space tokens.
fn parse_result_line(line: &str) -> LineParse {
    let segments = split_by_whitespace_gaps(line);
    if segments.len() < 2 {
        return parse_tokens(line);
    }
    match parse_columns(&segments) {
        LineParse::NotAResult => parse_tokens(line),
        parsed => parsed,
    }
}

fn parse_columns(segments: &[&str]) -> LineParse {
    let Some(unit_idx) = segments.iter().skip(1).position(|s| is_unit(s)).map(|i| i + 1) else {
        return LineParse::NotAResult;
    };
    let label = segments[0].trim();
    if !looks_like_label(label) {
        return LineParse::NotAResult;
    }

    let (value, uncertainty) = match &segments[1..unit_idx] {
        [value] => (*value, None),
        [value, uncertainty] if parse_number(uncertainty).is_some() => (*value, Some(*uncertainty)),
        [] => return LineParse::Unreadable("no value before unit"),
        _ => return LineParse::Unreadable("unexpected columns before unit"),
    };
    if !is_value(value) {
        return LineParse::Unreadable("value is not a number");
    }

    LineParse::Result(ParsedLine {
        label: label.to_string(),
        value: value.trim().to_string(),
        uncertainty: uncertainty.map(|u| u.trim().to_string()),
        unit: als_unit(segments[unit_idx]),
    })
}

fn parse_tokens(line: &str) -> LineParse {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(unit_idx) = tokens.iter().position(|t| is_unit(t)) else {
        return LineParse::NotAResult;
    };
    // "mg/kg TS" split across two tokens.
    let unit = match tokens.get(unit_idx + 1) {
        Some(ts) if ts.eq_ignore_ascii_case("ts") => format!("{} {}", tokens[unit_idx], ts),
        _ => tokens[unit_idx].to_string(),
    };

    let before = &tokens[..unit_idx];
    let (mut value_idx, uncertainty) = match before {
        [.., v, u] if is_value(v) && parse_number(u).is_some() && !u.starts_with('<') => {
            (before.len() - 2, Some(u.to_string()))
        }
        [.., v] if is_value(v) || v.starts_with('<') => (before.len() - 1, None),
        _ => return LineParse::Unreadable("no value before unit"),
    };

    let mut value = before[value_idx].to_string();
    // "< 0.5" split across two tokens.
    if value_idx > 0 && before[value_idx - 1] == "<" {
        value_idx -= 1;
        value = format!("<{value}");
    }
    if !is_value(&value) {
        return LineParse::Unreadable("value is not a number");
    }

    let label = before[..value_idx].join(" ");
    if !looks_like_label(&label) {
        return LineParse::NotAResult;
    }

    LineParse::Result(ParsedLine {
        label,
        value,
        uncertainty,
        unit: als_unit(&unit),
    })
}

fn is_value(s: &str) -> bool {
    !matches!(
        parse_value(s),
        ParsedValue::Missing | ParsedValue::Unparseable(_)
    )
}

fn looks_like_label(label: &str) -> bool {
    label.chars().next().is_some_and(|c| c.is_alphabetic())
        && !is_header_word(&label.to_lowercase())
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

fn is_unit(s: &str) -> bool {
    ALS_UNITS.contains(&compact(s).as_str())
}

/// "mg/kgTS" -> "mg/kg TS" so the unit table sees one spelling.
fn als_unit(s: &str) -> String {
    let c = compact(s);
    match c.strip_suffix("ts") {
        Some(base) => format!("{base} TS"),
        None => c,
    }
}

/// Remove the footnote artifacts ALS text extraction leaves behind: "^" and
/// the "aulev" marker, which is often broken up by spaces ("a ulev").
fn strip_footnotes(line: &str) -> String {
    let chars: Vec<char> = line.chars().filter(|c| *c != '^').collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match match_aulev(&chars[i..]) {
            Some(len) => i += len,
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }
    out
}

fn match_aulev(chars: &[char]) -> Option<usize> {
    let mut i = 0;
    for (n, expected) in "aulev".chars().enumerate() {
        if n > 0 {
            while chars.get(i).is_some_and(|c| *c == ' ') {
                i += 1;
            }
        }
        if chars.get(i) != Some(&expected) {
            return None;
        }
        i += 1;
    }
    Some(i)
}

/// Split a line by gaps of 2+ whitespace characters.
fn split_by_whitespace_gaps(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = None;
    let mut space_count = 0;

    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            space_count += 1;
            if space_count == 2 {
                if let Some(s) = start {
                    // The first gap character is one byte only for ASCII space.
                    let end = line[..i].trim_end().len();
                    segments.push(&line[s..end]);
                    start = None;
                }
            }
        } else {
            if start.is_none() {
                start = Some(i);
            }
            space_count = 0;
        }
    }

    if let Some(s) = start {
        segments.push(line[s..].trim_end());
    }

    segments
}

fn is_header_word(s: &str) -> bool {
    matches!(
        s,
        "analyse"
            | "parameter"
            | "resultater"
            | "resultat"
            | "usikkerhet"
            | "enhet"
            | "metode"
            | "utført"
            | "sign"
            | "side"
            | "rapport"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SampleKeyMap {
        SampleKeyMap::for_project("09_moanetunnelen").with_id("1", "p09-MOA-001")
    }

    #[test]
    fn default_prefix_from_project_code() {
        assert_eq!(default_id_prefix("09_moanetunnelen"), "p09-MOA-");
        assert_eq!(default_id_prefix("17"), "p17-");
    }

    #[test]
    fn key_map_falls_back_to_prefix() {
        let k = keys();
        assert_eq!(k.sample_id("1"), "p09-MOA-001");
        assert_eq!(k.sample_id("T4"), "p09-MOA-T4");
    }

    #[test]
    fn split_by_gaps() {
        let segments = split_by_whitespace_gaps("Arsen (As)     51.9   10.4    mg/kgTS  1");
        assert_eq!(segments, vec!["Arsen (As)", "51.9", "10.4", "mg/kgTS", "1"]);
    }

    #[test]
    fn column_line_with_uncertainty() {
        let parsed = parse_result_line("Arsen (As)     51.9   10.4    mg/kgTS  1  ANJO");
        assert_eq!(
            parsed,
            LineParse::Result(ParsedLine {
                label: "Arsen (As)".into(),
                value: "51.9".into(),
                uncertainty: Some("10.4".into()),
                unit: "mg/kg TS".into(),
            })
        );
    }

    #[test]
    fn column_line_below_limit() {
        let LineParse::Result(p) = parse_result_line("Kvikksølv (Hg)    < 0.20     mg/kg TS") else {
            panic!("expected a result");
        };
        assert_eq!(p.value, "< 0.20");
        assert_eq!(p.uncertainty, None);
        assert_eq!(p.unit, "mg/kg TS");
    }

    #[test]
    fn collapsed_line_falls_back_to_tokens() {
        let LineParse::Result(p) = parse_result_line("Sum PAH-16 1.3 0.3 mg/kgTS") else {
            panic!("expected a result");
        };
        assert_eq!(p.label, "Sum PAH-16");
        assert_eq!(p.value, "1.3");
        assert_eq!(p.uncertainty.as_deref(), Some("0.3"));
    }

    #[test]
    fn collapsed_line_with_split_below_marker() {
        let LineParse::Result(p) = parse_result_line("Benso(a)pyren < 0.010 mg/kg TS") else {
            panic!("expected a result");
        };
        assert_eq!(p.label, "Benso(a)pyren");
        assert_eq!(p.value, "<0.010");
        assert_eq!(p.unit, "mg/kg TS");
    }

    #[test]
    fn header_and_prose_are_not_results() {
        assert_eq!(
            parse_result_line("Analyse     Resultater     Usikkerhet (±)     Enhet"),
            LineParse::NotAResult
        );
        assert_eq!(parse_result_line("Sediment"), LineParse::NotAResult);
    }

    #[test]
    fn garbage_value_is_reported() {
        assert_eq!(
            parse_result_line("Arsen (As)     se vedlegg     mg/kgTS"),
            LineParse::Unreadable("value is not a number")
        );
    }

    #[test]
    fn footnotes_removed() {
        assert_eq!(strip_footnotes("Bly (Pb)^aulev   12"), "Bly (Pb)   12");
        assert_eq!(strip_footnotes("Bly (Pb) a ulev  12"), "Bly (Pb)   12");
        assert_eq!(strip_footnotes("Kaulevalla"), "Kalla");
        assert_eq!(strip_footnotes("Arsen"), "Arsen");
    }

    #[test]
    fn sections_split_on_sample_name() {
        let text = "\
ALS Laboratory Group Norway AS
Deresprøvenavn 1
Sediment
Labnummer N00812345
Analyse          Resultater   Usikkerhet (±)   Enhet
Arsen (As)       51.9         10.4             mg/kgTS
Bly (Pb)^aulev   12           2.4              mg/kgTS
Deresprøvenavn 2
Labnummer N00812346
Arsen (As)       <0.5                          mg/kgTS
Tørrstoff        78.1         4.0              %
";
        let report = parse_als_text(text, &keys(), AnalysisType::Totalanalyse).unwrap();

        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.samples[0].sample_id, "p09-MOA-001");
        assert_eq!(report.samples[0].lab_reference.as_deref(), Some("N00812345"));
        assert_eq!(report.samples[1].sample_id, "p09-MOA-2");

        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.rows[1].raw_parameter, "Bly (Pb)");
        assert_eq!(report.rows[1].raw_uncertainty.as_deref(), Some("2.4"));
        assert_eq!(report.rows[2].sample_id, "p09-MOA-2");
        assert_eq!(report.rows[2].raw_value, "<0.5");
        assert_eq!(report.rows[3].unit_label, "%");
        assert!(report.skipped_lines.is_empty());
    }

    #[test]
    fn spaced_header_variant_and_analysis_type() {
        let text = "Deres prøvenavn T1\nArsen (As)   0.12   mg/l";
        let report = parse_als_text(text, &keys(), AnalysisType::Kolonnetest).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].sample_id, "p09-MOA-T1");
        assert_eq!(report.rows[0].analysis_type, AnalysisType::Kolonnetest);
    }

    #[test]
    fn repeated_section_keeps_one_sample() {
        let text = "Deresprøvenavn 1\nArsen (As)   5   mg/kgTS\nDeresprøvenavn 1\nLabnummer N1\nBly (Pb)   7   mg/kgTS";
        let report = parse_als_text(text, &keys(), AnalysisType::Totalanalyse).unwrap();
        assert_eq!(report.samples.len(), 1);
        assert_eq!(report.samples[0].lab_reference.as_deref(), Some("N1"));
        assert_eq!(report.rows.len(), 2);
    }

    #[test]
    fn not_an_als_report() {
        let err = parse_als_text("Eurofins Environment Testing\nArsen 5 mg/kg", &keys(), AnalysisType::Totalanalyse)
            .unwrap_err();
        assert!(err.to_string().contains("Deresprøvenavn"));
    }

    #[test]
    fn empty_text_rejected() {
        assert!(parse_als_text("   \n", &keys(), AnalysisType::Totalanalyse).is_err());
    }
}
