use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One reported concentration. Below-limit results carry the limit they were
/// reported against, so a below-limit result without a limit cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measurement {
    Measured(Decimal),
    BelowLimit(Decimal),
    NotDetected,
}

impl Measurement {
    /// Value used for classification: the measurement, the limit, or zero.
    pub fn numeric(&self) -> Decimal {
        match self {
            Measurement::Measured(v) => *v,
            Measurement::BelowLimit(limit) => *limit,
            Measurement::NotDetected => Decimal::ZERO,
        }
    }

    pub fn is_below_limit(&self) -> bool {
        !matches!(self, Measurement::Measured(_))
    }

    pub fn loq(&self) -> Option<Decimal> {
        match self {
            Measurement::BelowLimit(limit) => Some(*limit),
            _ => None,
        }
    }

    /// Apply a unit conversion factor to the value and the limit. None when
    /// the scaled number does not fit in a `Decimal`.
    pub fn scaled(&self, factor: Decimal) -> Option<Measurement> {
        let scale = |v: &Decimal| v.checked_mul(factor).map(|s| s.normalize());
        Some(match self {
            Measurement::Measured(v) => Measurement::Measured(scale(v)?),
            Measurement::BelowLimit(l) => Measurement::BelowLimit(scale(l)?),
            Measurement::NotDetected => Measurement::NotDetected,
        })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Measured(v) => write!(f, "{v}"),
            Measurement::BelowLimit(v) => write!(f, "< {v}"),
            Measurement::NotDetected => write!(f, "n.d."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Matrix {
    Solid,
    Liquid,
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matrix::Solid => write!(f, "solid"),
            Matrix::Liquid => write!(f, "liquid"),
        }
    }
}

impl Matrix {
    pub fn from_str_loose(s: &str) -> Option<Matrix> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "solid" | "fast" | "faststoff" | "jord" | "sediment" => Some(Matrix::Solid),
            "liquid" | "væske" | "vann" | "eluat" | "water" => Some(Matrix::Liquid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    #[default]
    Totalanalyse,
    Ristetest,
    Kolonnetest,
    Kornfordeling,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Totalanalyse => "totalanalyse",
            AnalysisType::Ristetest => "ristetest",
            AnalysisType::Kolonnetest => "kolonnetest",
            AnalysisType::Kornfordeling => "kornfordeling",
        }
    }

    /// Matrix assumed when the unit label does not reveal it. Column tests
    /// report eluate concentrations; shake tests report leached mass per kg.
    pub fn default_matrix(&self) -> Matrix {
        match self {
            AnalysisType::Kolonnetest => Matrix::Liquid,
            _ => Matrix::Solid,
        }
    }

    pub fn from_str_loose(s: &str) -> Option<AnalysisType> {
        let lower = s.trim().to_lowercase();
        if lower.is_empty() || lower.contains("total") {
            Some(AnalysisType::Totalanalyse)
        } else if lower.contains("riste") || lower.contains("shake") {
            Some(AnalysisType::Ristetest)
        } else if lower.contains("kolonne") || lower.contains("column") {
            Some(AnalysisType::Kolonnetest)
        } else if lower.contains("korn") || lower.contains("grain") {
            Some(AnalysisType::Kornfordeling)
        } else {
            None
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationType {
    #[serde(rename = "vegbane")]
    Vegbane,
    #[serde(rename = "grøft")]
    Groft,
    #[serde(rename = "pumpesump")]
    Pumpesump,
    #[default]
    #[serde(rename = "ukjent")]
    Ukjent,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Vegbane => "vegbane",
            LocationType::Groft => "grøft",
            LocationType::Pumpesump => "pumpesump",
            LocationType::Ukjent => "ukjent",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<LocationType> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "vegbane" | "kjørebane" => Some(LocationType::Vegbane),
            "grøft" | "groft" => Some(LocationType::Groft),
            "pumpesump" => Some(LocationType::Pumpesump),
            "" | "ukjent" => Some(LocationType::Ukjent),
            _ => None,
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    #[default]
    #[serde(rename = "bunnrensk")]
    Bunnrensk,
    #[serde(rename = "blandprøve", alias = "blandeprøve")]
    Blandprove,
    #[serde(rename = "blandprøve bunnrensk")]
    BlandproveBunnrensk,
    #[serde(rename = "tunnelstein")]
    Tunnelstein,
    #[serde(rename = "sprengstein")]
    Sprengstein,
    #[serde(rename = "sediment")]
    Sediment,
    #[serde(rename = "vann")]
    Vann,
    #[serde(rename = "referanse")]
    Referanse,
}

impl SampleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::Bunnrensk => "bunnrensk",
            SampleType::Blandprove => "blandprøve",
            SampleType::BlandproveBunnrensk => "blandprøve bunnrensk",
            SampleType::Tunnelstein => "tunnelstein",
            SampleType::Sprengstein => "sprengstein",
            SampleType::Sediment => "sediment",
            SampleType::Vann => "vann",
            SampleType::Referanse => "referanse",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<SampleType> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "" | "bunnrensk" => Some(SampleType::Bunnrensk),
            "blandprøve" | "blandeprøve" => Some(SampleType::Blandprove),
            "blandprøve bunnrensk" | "blandeprøve bunnrensk" => Some(SampleType::BlandproveBunnrensk),
            "tunnelstein" => Some(SampleType::Tunnelstein),
            "sprengstein" => Some(SampleType::Sprengstein),
            "sediment" => Some(SampleType::Sediment),
            "vann" => Some(SampleType::Vann),
            "referanse" => Some(SampleType::Referanse),
            _ => None,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disposition of the excavated material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    #[serde(rename = "gjenbruk")]
    Gjenbruk,
    #[serde(rename = "deponi")]
    Deponi,
    #[serde(rename = "supplerende prøvetaking")]
    SupplerendeProvetaking,
    #[serde(rename = "ukjent")]
    Ukjent,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Gjenbruk => "gjenbruk",
            Disposition::Deponi => "deponi",
            Disposition::SupplerendeProvetaking => "supplerende prøvetaking",
            Disposition::Ukjent => "ukjent",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical or composite specimen. Serialized field order is the column
/// order of the samples table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_id: String,
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub sample_date: Option<String>,
    #[serde(default)]
    pub location_type: LocationType,
    #[serde(default)]
    pub profile_start: Option<Decimal>,
    #[serde(default)]
    pub profile_end: Option<Decimal>,
    #[serde(default)]
    pub tunnel_name: Option<String>,
    #[serde(default)]
    pub sample_type: SampleType,
    #[serde(default)]
    pub lab_reference: Option<String>,
    #[serde(default)]
    pub sampler: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl Sample {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Sample {
            sample_id: sample_id.into(),
            ..Default::default()
        }
    }
}

/// One raw row as it came off a lab report, before any normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    pub sample_id: String,
    #[serde(rename = "parameter_raw")]
    pub raw_parameter: String,
    #[serde(rename = "value")]
    pub raw_value: String,
    #[serde(rename = "unit", default)]
    pub unit_label: String,
    #[serde(default)]
    pub analysis_type: AnalysisType,
    #[serde(rename = "uncertainty", default)]
    pub raw_uncertainty: Option<String>,
}

impl InputRow {
    pub fn new(
        sample_id: impl Into<String>,
        raw_parameter: impl Into<String>,
        raw_value: impl Into<String>,
        unit_label: impl Into<String>,
    ) -> Self {
        InputRow {
            sample_id: sample_id.into(),
            raw_parameter: raw_parameter.into(),
            raw_value: raw_value.into(),
            unit_label: unit_label.into(),
            analysis_type: AnalysisType::Totalanalyse,
            raw_uncertainty: None,
        }
    }

    pub fn with_analysis_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = analysis_type;
        self
    }

    pub fn with_uncertainty(mut self, raw: impl Into<String>) -> Self {
        self.raw_uncertainty = Some(raw.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn below_limit_reports_its_limit() {
        let m = Measurement::BelowLimit(dec!(0.5));
        assert!(m.is_below_limit());
        assert_eq!(m.loq(), Some(dec!(0.5)));
        assert_eq!(m.numeric(), dec!(0.5));
    }

    #[test]
    fn not_detected_is_below_limit_without_loq() {
        let m = Measurement::NotDetected;
        assert!(m.is_below_limit());
        assert_eq!(m.loq(), None);
        assert_eq!(m.numeric(), Decimal::ZERO);
    }

    #[test]
    fn scaled_converts_limit_too() {
        let m = Measurement::BelowLimit(dec!(20)).scaled(dec!(0.001));
        assert_eq!(m, Some(Measurement::BelowLimit(dec!(0.02))));
    }

    #[test]
    fn scaling_past_decimal_range_is_none() {
        assert_eq!(Measurement::Measured(Decimal::MAX).scaled(dec!(1000)), None);
        assert_eq!(Measurement::BelowLimit(Decimal::MAX).scaled(dec!(1000)), None);
        assert_eq!(
            Measurement::NotDetected.scaled(dec!(1000)),
            Some(Measurement::NotDetected)
        );
    }

    #[test]
    fn analysis_type_loose() {
        assert_eq!(
            AnalysisType::from_str_loose("Kolonnetest"),
            Some(AnalysisType::Kolonnetest)
        );
        assert_eq!(AnalysisType::from_str_loose(""), Some(AnalysisType::Totalanalyse));
        assert_eq!(AnalysisType::from_str_loose("xrf"), None);
    }

    #[test]
    fn leaching_defaults_to_liquid() {
        assert_eq!(AnalysisType::Kolonnetest.default_matrix(), Matrix::Liquid);
        assert_eq!(AnalysisType::Ristetest.default_matrix(), Matrix::Solid);
        assert_eq!(AnalysisType::Totalanalyse.default_matrix(), Matrix::Solid);
    }

    #[test]
    fn sample_type_accepts_blandeprove_spelling() {
        let t: SampleType = serde_json::from_str("\"blandeprøve\"").unwrap();
        assert_eq!(t, SampleType::Blandprove);
        assert_eq!(t.to_string(), "blandprøve");
    }

    #[test]
    fn loose_sample_metadata() {
        assert_eq!(LocationType::from_str_loose(" Grøft "), Some(LocationType::Groft));
        assert_eq!(LocationType::from_str_loose(""), Some(LocationType::Ukjent));
        assert_eq!(SampleType::from_str_loose("Blandeprøve"), Some(SampleType::Blandprove));
        assert_eq!(SampleType::from_str_loose("stein"), None);
    }

    #[test]
    fn disposition_labels() {
        assert_eq!(Disposition::SupplerendeProvetaking.to_string(), "supplerende prøvetaking");
        assert_eq!(
            serde_json::to_string(&Disposition::Gjenbruk).unwrap(),
            "\"gjenbruk\""
        );
    }
}
