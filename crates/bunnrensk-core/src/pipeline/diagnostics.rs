use crate::classify::Tier;
use crate::extraction::als::SkippedLine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The record was dropped because it breaks a structural rule.
    Critical,
    /// The record was skipped or kept with an assumption someone should check.
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnresolvedParameter,
    PlaceholderSkipped,
    UnparseableValue,
    /// Parsed, but too large to survive unit conversion.
    ValueOutOfRange,
    MissingValue,
    UnknownUnit,
    OrphanResult,
    DuplicateResult,
    TierMismatch,
    IntegrityViolation,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::OrphanResult | DiagnosticKind::IntegrityViolation => Severity::Critical,
            DiagnosticKind::UnresolvedParameter
            | DiagnosticKind::UnparseableValue
            | DiagnosticKind::ValueOutOfRange
            | DiagnosticKind::UnknownUnit
            | DiagnosticKind::DuplicateResult
            | DiagnosticKind::TierMismatch => Severity::Important,
            DiagnosticKind::PlaceholderSkipped | DiagnosticKind::MissingValue => Severity::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedParameter => "unresolved_parameter",
            DiagnosticKind::PlaceholderSkipped => "placeholder_skipped",
            DiagnosticKind::UnparseableValue => "unparseable_value",
            DiagnosticKind::ValueOutOfRange => "value_out_of_range",
            DiagnosticKind::MissingValue => "missing_value",
            DiagnosticKind::UnknownUnit => "unknown_unit",
            DiagnosticKind::OrphanResult => "orphan_result",
            DiagnosticKind::DuplicateResult => "duplicate_result",
            DiagnosticKind::TierMismatch => "tier_mismatch",
            DiagnosticKind::IntegrityViolation => "integrity_violation",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row-level problem found during a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// 0-based index into the input rows, when the problem belongs to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: kind.severity(),
            row: None,
            sample_id: None,
            message: message.into(),
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn for_sample(mut self, sample_id: impl Into<String>) -> Self {
        self.sample_id = Some(sample_id.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(row) = self.row {
            write!(f, " row {}", row + 1)?;
        }
        if let Some(sample_id) = &self.sample_id {
            write!(f, " {}", sample_id)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A report line the ALS adapter recognized as a result but could not read.
impl From<SkippedLine> for Diagnostic {
    fn from(line: SkippedLine) -> Self {
        Diagnostic::new(
            DiagnosticKind::UnparseableValue,
            format!("{}: '{}'", line.reason, line.line_text.trim()),
        )
        .for_sample(line.sample_id)
    }
}

/// Counts for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub input_rows: usize,
    pub results: usize,
    pub samples: usize,
    /// Samples with a tier (computed or colour-coded).
    pub classified_samples: usize,
    pub samples_per_tier: BTreeMap<Tier, usize>,
    pub diagnostics: BTreeMap<DiagnosticKind, usize>,
}

impl BatchSummary {
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.get(&kind).copied().unwrap_or(0)
    }

    pub fn critical(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|(k, _)| k.severity() == Severity::Critical)
            .map(|(_, n)| n)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_kind() {
        let d = Diagnostic::new(DiagnosticKind::OrphanResult, "no such sample");
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(
            Diagnostic::new(DiagnosticKind::PlaceholderSkipped, "").severity,
            Severity::Info
        );
    }

    #[test]
    fn display_is_one_line() {
        let d = Diagnostic::new(DiagnosticKind::UnknownUnit, "unit 'mmol/kg' not in table")
            .at_row(4)
            .for_sample("S1");
        assert_eq!(d.to_string(), "[unknown_unit] row 5 S1: unit 'mmol/kg' not in table");
    }

    #[test]
    fn summary_counts() {
        let mut s = BatchSummary::default();
        s.diagnostics.insert(DiagnosticKind::OrphanResult, 2);
        s.diagnostics.insert(DiagnosticKind::IntegrityViolation, 1);
        s.diagnostics.insert(DiagnosticKind::UnknownUnit, 5);
        assert_eq!(s.critical(), 3);
        assert_eq!(s.count(DiagnosticKind::UnknownUnit), 5);
        assert_eq!(s.count(DiagnosticKind::TierMismatch), 0);
    }

    #[test]
    fn skipped_report_line_is_unparseable() {
        let d = Diagnostic::from(SkippedLine {
            sample_id: "p09-MOA-1".into(),
            line_text: "  Arsen (As)   x,x   mg/kg TS ".into(),
            reason: "value not readable".into(),
        });
        assert_eq!(d.kind, DiagnosticKind::UnparseableValue);
        assert_eq!(d.sample_id.as_deref(), Some("p09-MOA-1"));
        assert_eq!(d.message, "value not readable: 'Arsen (As)   x,x   mg/kg TS'");
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DiagnosticKind::DuplicateResult).unwrap(),
            "\"duplicate_result\""
        );
    }
}
