//! Persisted tables: results, classifications, decisions and samples as CSV,
//! plus the delimited input formats.
//!
//! Files are UTF-8 with a byte-order mark so Excel opens them correctly, and
//! booleans are written `True`/`False` like the existing aggregation files.

use crate::classify::colour::tier_from_argb;
use crate::classify::{Classification, Tier};
use crate::error::BunnrenskError;
use crate::model::{AnalysisType, InputRow, LocationType, Measurement, Sample, SampleType};
use crate::parsing::values::parse_number;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

const BOM: &str = "\u{feff}";

/// One row of the results table. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub sample_id: String,
    pub parameter: String,
    pub parameter_raw: String,
    pub value: Decimal,
    pub unit: String,
    pub uncertainty: Option<Decimal>,
    #[serde(serialize_with = "title_case_bool", deserialize_with = "loose_bool")]
    pub below_limit: bool,
    pub loq: Option<Decimal>,
    pub analysis_type: AnalysisType,
}

impl ResultRow {
    pub fn new(
        sample_id: &str,
        parameter: &str,
        parameter_raw: &str,
        measurement: Measurement,
        unit: &str,
        uncertainty: Option<Decimal>,
        analysis_type: AnalysisType,
    ) -> Self {
        ResultRow {
            sample_id: sample_id.to_string(),
            parameter: parameter.to_string(),
            parameter_raw: parameter_raw.to_string(),
            value: measurement.numeric(),
            unit: unit.to_string(),
            uncertainty,
            below_limit: measurement.is_below_limit(),
            loq: measurement.loq(),
            analysis_type,
        }
    }

    /// Rebuild the measurement from the flat columns, rejecting rows that
    /// break the below-limit invariant.
    pub fn measurement(&self) -> Result<Measurement, BunnrenskError> {
        let violation = |reason: String| BunnrenskError::Integrity {
            sample_id: self.sample_id.clone(),
            reason: format!("{}: {}", self.parameter, reason),
        };
        match (self.below_limit, self.loq) {
            (false, None) => Ok(Measurement::Measured(self.value)),
            (false, Some(loq)) => Err(violation(format!(
                "loq {} present on a result that is not below limit",
                loq
            ))),
            (true, Some(loq)) if loq == self.value => Ok(Measurement::BelowLimit(loq)),
            (true, Some(loq)) => Err(violation(format!(
                "below-limit value {} differs from loq {}",
                self.value, loq
            ))),
            (true, None) if self.value.is_zero() => Ok(Measurement::NotDetected),
            (true, None) => Err(violation(format!(
                "below-limit value {} has no stored limit",
                self.value
            ))),
        }
    }
}

/// One row of the classification table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRow {
    pub sample_id: String,
    pub tilstandsklasse: Option<Tier>,
    /// Sorted codes joined with ", ".
    pub limiting_parameters: String,
    pub classification_basis: String,
}

impl From<&Classification> for ClassificationRow {
    fn from(c: &Classification) -> Self {
        ClassificationRow {
            sample_id: c.sample_id.clone(),
            tilstandsklasse: c.tier,
            limiting_parameters: c
                .limiting_parameters
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            classification_basis: c.classification_basis.clone(),
        }
    }
}

fn title_case_bool<S: Serializer>(b: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(if *b { "True" } else { "False" })
}

fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(d)?;
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "ja" | "x" => Ok(true),
        "false" | "0" | "nei" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("not a boolean: '{other}'"))),
    }
}

/// Write rows as CSV with a header row, prefixed by a UTF-8 BOM.
pub fn write_csv<T: Serialize, W: Write>(mut writer: W, rows: &[T]) -> Result<(), BunnrenskError> {
    writer.write_all(BOM.as_bytes())?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_csv_file<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), BunnrenskError> {
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), rows)?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "wrote table");
    Ok(())
}

/// Read a whole CSV source, dropping a leading BOM.
fn read_to_string_without_bom<R: Read>(mut reader: R) -> Result<String, BunnrenskError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    Ok(match content.strip_prefix(BOM) {
        Some(rest) => rest.to_string(),
        None => content,
    })
}

#[derive(Debug, Deserialize)]
struct RawInputRow {
    sample_id: String,
    parameter_raw: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    analysis_type: Option<String>,
    #[serde(default)]
    uncertainty: Option<String>,
}

/// Read input rows: `sample_id,parameter_raw,value,unit,analysis_type[,uncertainty]`.
pub fn read_input_rows<R: Read>(reader: R) -> Result<Vec<InputRow>, BunnrenskError> {
    let content = read_to_string_without_bom(reader)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in csv_reader.deserialize::<RawInputRow>().enumerate() {
        let raw = record?;
        let analysis_label = raw.analysis_type.unwrap_or_default();
        let analysis_type = AnalysisType::from_str_loose(&analysis_label).ok_or_else(|| {
            BunnrenskError::ParseError(format!(
                "input row {}: unknown analysis type '{}'",
                i + 1,
                analysis_label
            ))
        })?;
        let mut row = InputRow::new(
            raw.sample_id.trim(),
            raw.parameter_raw,
            raw.value.unwrap_or_default(),
            raw.unit.unwrap_or_default(),
        )
        .with_analysis_type(analysis_type);
        if let Some(u) = raw.uncertainty.filter(|u| !u.trim().is_empty()) {
            row = row.with_uncertainty(u);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Read a results table written by [`write_csv`]. Rows are taken as stored;
/// the below-limit invariant is checked when they are classified.
pub fn read_results<R: Read>(reader: R) -> Result<Vec<ResultRow>, BunnrenskError> {
    let content = read_to_string_without_bom(reader)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let rows = csv_reader
        .deserialize::<ResultRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RawSample {
    sample_id: String,
    #[serde(default)]
    project_code: Option<String>,
    #[serde(default)]
    sample_date: Option<String>,
    #[serde(default)]
    location_type: Option<String>,
    #[serde(default)]
    profile_start: Option<String>,
    #[serde(default)]
    profile_end: Option<String>,
    #[serde(default)]
    tunnel_name: Option<String>,
    #[serde(default)]
    sample_type: Option<String>,
    #[serde(default)]
    lab_reference: Option<String>,
    #[serde(default)]
    sampler: Option<String>,
    #[serde(default)]
    remark: Option<String>,
}

/// Read a samples table in the same column layout it is written in.
pub fn read_samples<R: Read>(reader: R) -> Result<Vec<Sample>, BunnrenskError> {
    let content = read_to_string_without_bom(reader)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut samples = Vec::new();
    for (i, record) in csv_reader.deserialize::<RawSample>().enumerate() {
        let raw = record?;
        let bad = |column: &str, value: &str| {
            BunnrenskError::ParseError(format!(
                "sample row {}: invalid {} '{}'",
                i + 1,
                column,
                value
            ))
        };

        let location = raw.location_type.unwrap_or_default();
        let sample_type = raw.sample_type.unwrap_or_default();
        let profile = |v: Option<String>, column: &str| -> Result<Option<Decimal>, BunnrenskError> {
            match v.filter(|s| !s.is_empty()) {
                Some(s) => parse_number(&s).map(Some).ok_or_else(|| bad(column, &s)),
                None => Ok(None),
            }
        };

        samples.push(Sample {
            sample_id: raw.sample_id,
            project_code: non_empty(raw.project_code),
            sample_date: non_empty(raw.sample_date),
            location_type: LocationType::from_str_loose(&location)
                .ok_or_else(|| bad("location_type", &location))?,
            profile_start: profile(raw.profile_start, "profile_start")?,
            profile_end: profile(raw.profile_end, "profile_end")?,
            tunnel_name: non_empty(raw.tunnel_name),
            sample_type: SampleType::from_str_loose(&sample_type)
                .ok_or_else(|| bad("sample_type", &sample_type))?,
            lab_reference: non_empty(raw.lab_reference),
            sampler: non_empty(raw.sampler),
            remark: non_empty(raw.remark),
        });
    }
    Ok(samples)
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct RawReportedTier {
    sample_id: String,
    #[serde(default)]
    argb: Option<String>,
    #[serde(default)]
    tilstandsklasse: Option<String>,
}

/// Tiers reported by the consultant, either as a fill colour (`argb`) or a
/// plain number (`tilstandsklasse`). Unknown colours are skipped with a
/// warning.
pub fn read_reported_tiers<R: Read>(reader: R) -> Result<BTreeMap<String, Tier>, BunnrenskError> {
    let content = read_to_string_without_bom(reader)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut tiers = BTreeMap::new();
    for record in csv_reader.deserialize::<RawReportedTier>() {
        let raw = record?;
        let from_number = raw
            .tilstandsklasse
            .as_deref()
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Tier::from_number);
        let from_colour = raw.argb.as_deref().and_then(tier_from_argb);
        match from_number.or(from_colour) {
            Some(tier) => {
                tiers.insert(raw.sample_id, tier);
            }
            None => {
                tracing::warn!(sample_id = %raw.sample_id, argb = ?raw.argb, "no tier in colour row");
            }
        }
    }
    Ok(tiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn result(m: Measurement) -> ResultRow {
        ResultRow::new("S1", "As", "Arsen (As)", m, "mg/kg", None, AnalysisType::Totalanalyse)
    }

    #[test]
    fn result_columns_and_booleans() {
        let mut out = Vec::new();
        write_csv(&mut out, &[result(Measurement::BelowLimit(dec!(0.5)))]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let text = text.strip_prefix(BOM).expect("BOM written");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("sample_id,parameter,parameter_raw,value,unit,uncertainty,below_limit,loq,analysis_type")
        );
        assert_eq!(
            lines.next(),
            Some("S1,As,Arsen (As),0.5,mg/kg,,True,0.5,totalanalyse")
        );
    }

    #[test]
    fn classification_row_joins_sorted_codes() {
        let c = Classification {
            sample_id: "S1".into(),
            tier: Some(Tier::Four),
            limiting_parameters: BTreeSet::from(["Pb".to_string(), "As".to_string()]),
            classification_basis: "TA-2553/2009".into(),
        };
        let mut out = Vec::new();
        write_csv(&mut out, &[ClassificationRow::from(&c)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("S1,4,\"As, Pb\",TA-2553/2009"));
    }

    #[test]
    fn undetermined_tier_is_empty_column() {
        let row = ClassificationRow {
            sample_id: "S2".into(),
            tilstandsklasse: None,
            limiting_parameters: String::new(),
            classification_basis: "TA-2553/2009".into(),
        };
        let mut out = Vec::new();
        write_csv(&mut out, &[row]).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("S2,,,TA-2553/2009"));
    }

    #[test]
    fn measurement_round_trips_through_flat_row() {
        for m in [
            Measurement::Measured(dec!(51.9)),
            Measurement::BelowLimit(dec!(0.5)),
            Measurement::NotDetected,
        ] {
            assert_eq!(result(m).measurement().unwrap(), m);
        }
    }

    #[test]
    fn integrity_violations_detected() {
        let mut row = result(Measurement::Measured(dec!(3)));
        row.below_limit = true;
        assert!(matches!(row.measurement(), Err(BunnrenskError::Integrity { .. })));

        let mut row = result(Measurement::BelowLimit(dec!(0.5)));
        row.loq = Some(dec!(0.2));
        assert!(row.measurement().is_err());

        let mut row = result(Measurement::Measured(dec!(3)));
        row.loq = Some(dec!(3));
        assert!(row.measurement().is_err());
    }

    #[test]
    fn results_table_reads_back() {
        let rows = vec![
            result(Measurement::Measured(dec!(51.9))),
            result(Measurement::BelowLimit(dec!(0.5))),
            result(Measurement::NotDetected),
        ];
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();
        assert_eq!(read_results(out.as_slice()).unwrap(), rows);
    }

    #[test]
    fn read_input_rows_with_bom_and_optional_columns() {
        let csv = "\u{feff}sample_id,parameter_raw,value,unit,analysis_type\n\
                   S1,Arsen,\"12,3\",mg/kg TS,totalanalyse\n\
                   S1,Bly,<2,mg/kg TS,\n\
                   S2 ,Arsen,0.01,mg/l,Kolonnetest\n";
        let rows = read_input_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].raw_value, "12,3");
        assert_eq!(rows[1].analysis_type, AnalysisType::Totalanalyse);
        assert_eq!(rows[2].sample_id, "S2");
        assert_eq!(rows[2].analysis_type, AnalysisType::Kolonnetest);
        assert_eq!(rows[2].raw_uncertainty, None);
    }

    #[test]
    fn read_input_rows_rejects_unknown_analysis_type() {
        let csv = "sample_id,parameter_raw,value,unit,analysis_type\nS1,Arsen,1,mg/kg,xrf\n";
        let err = read_input_rows(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("xrf"));
    }

    #[test]
    fn samples_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let mut sample = Sample::new("p09-MOA-001");
        sample.location_type = LocationType::Groft;
        sample.profile_start = Some(dec!(9110));
        sample.sample_type = SampleType::Blandprove;
        write_csv_file(&path, &[sample.clone()]).unwrap();

        let read = read_samples(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(read, vec![sample]);
    }

    #[test]
    fn samples_header_order() {
        let mut out = Vec::new();
        write_csv(&mut out, &[Sample::new("S1")]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(
            "\u{feff}sample_id,project_code,sample_date,location_type,profile_start,profile_end,\
             tunnel_name,sample_type,lab_reference,sampler,remark\n"
        ));
    }

    #[test]
    fn reported_tiers_from_colour_or_number() {
        let csv = "sample_id,argb,tilstandsklasse\nS1,FF92D050,\nS2,,4\nS3,FF123456,\n";
        let tiers = read_reported_tiers(csv.as_bytes()).unwrap();
        assert_eq!(tiers.get("S1"), Some(&Tier::Two));
        assert_eq!(tiers.get("S2"), Some(&Tier::Four));
        assert!(!tiers.contains_key("S3"));
    }
}
