//! Batch pipeline: normalize, parse, convert, classify, aggregate and decide
//! over one project's input rows.
//!
//! A run never stops on a bad row. Every row that cannot be turned into a
//! result becomes a [`Diagnostic`], and the run returns whatever it could
//! produce together with a [`BatchSummary`].

pub mod diagnostics;

pub use diagnostics::{BatchSummary, Diagnostic, DiagnosticKind, Severity};

use crate::classify::colour::{reconcile, Reconciled};
use crate::classify::disposition::decide;
use crate::classify::{
    classify_measurement, classify_sample, Classification, Decision, DispositionPolicy,
    ParameterClassification, ReuseAtTierOne, Tier,
};
use crate::config::{NotDetectedPolicy, PipelineConfig};
use crate::error::BunnrenskError;
use crate::model::{AnalysisType, InputRow, Measurement, Sample};
use crate::parsing::sample_name::{
    infer_location_type, infer_sample_type, parse_profile_range,
};
use crate::parsing::{parse_value, Normalizer, ParsedValue, Resolution};
use crate::records::{ClassificationRow, ResultRow};
use crate::reference::{builtin, load_thresholds, ThresholdTable};
use crate::units::{UnitClass, UnitConverter};
use rust_decimal::Decimal;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

/// Everything one run works on.
#[derive(Debug, Clone, Default)]
pub struct BatchInput {
    /// Known samples. When absent, samples are derived from the distinct
    /// sample ids of the rows and no row can be an orphan.
    pub samples: Option<Vec<Sample>>,
    pub rows: Vec<InputRow>,
    /// Tiers reported in the source (colour-coded cells), keyed by sample id.
    pub reported_tiers: BTreeMap<String, Tier>,
}

impl BatchInput {
    pub fn from_rows(rows: Vec<InputRow>) -> Self {
        BatchInput {
            rows,
            ..Default::default()
        }
    }

    pub fn with_samples(mut self, samples: Vec<Sample>) -> Self {
        self.samples = Some(samples);
        self
    }

    pub fn with_reported_tiers(mut self, tiers: BTreeMap<String, Tier>) -> Self {
        self.reported_tiers = tiers;
        self
    }
}

/// The four output tables plus per-parameter detail and diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutput {
    pub samples: Vec<Sample>,
    pub results: Vec<ResultRow>,
    /// Per-parameter classifications of the total-content results, by sample.
    pub details: BTreeMap<String, Vec<ParameterClassification>>,
    pub classifications: Vec<Classification>,
    pub decisions: Vec<Decision>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: BatchSummary,
}

impl BatchOutput {
    pub fn classification_rows(&self) -> Vec<ClassificationRow> {
        self.classifications.iter().map(ClassificationRow::from).collect()
    }

    pub fn classification(&self, sample_id: &str) -> Option<&Classification> {
        self.classifications.iter().find(|c| c.sample_id == sample_id)
    }

    pub fn decision(&self, sample_id: &str) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.sample_id == sample_id)
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Add diagnostics raised outside the run, e.g. by an ingestion adapter.
    pub fn extend_diagnostics(&mut self, extra: impl IntoIterator<Item = Diagnostic>) {
        for d in extra {
            *self.summary.diagnostics.entry(d.kind).or_default() += 1;
            self.diagnostics.push(d);
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
    units: &'static UnitConverter,
    thresholds: Cow<'static, ThresholdTable>,
    policy: Box<dyn DispositionPolicy>,
}

impl Pipeline {
    /// Build a pipeline from config: the alias overlays it names and either
    /// its custom threshold table or the embedded one.
    pub fn new(config: PipelineConfig) -> Result<Self, BunnrenskError> {
        let normalizer = Normalizer::builtin(&config.overlays)?;
        let thresholds = match &config.thresholds {
            Some(path) => Cow::Owned(load_thresholds(path)?),
            None => Cow::Borrowed(builtin::thresholds()),
        };
        tracing::debug!(
            overlays = ?config.overlays,
            thresholds = thresholds.name(),
            "pipeline ready"
        );
        Ok(Pipeline {
            config,
            normalizer,
            units: UnitConverter::builtin(),
            thresholds,
            policy: Box::new(ReuseAtTierOne),
        })
    }

    pub fn with_policy(mut self, policy: Box<dyn DispositionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_thresholds(mut self, table: ThresholdTable) -> Self {
        self.thresholds = Cow::Owned(table);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Basis string stamped on every classification.
    pub fn basis(&self) -> &str {
        self.config
            .classification_basis
            .as_deref()
            .unwrap_or(self.thresholds.basis())
    }

    /// Run the full pipeline over raw input rows.
    pub fn run(&self, input: &BatchInput) -> BatchOutput {
        let mut diagnostics = Vec::new();
        let samples = match &input.samples {
            Some(samples) => samples.iter().cloned().map(|s| self.with_defaults(s)).collect(),
            None => self.derive_samples(input.rows.iter().map(|r| r.sample_id.as_str())),
        };
        let known: HashSet<&str> = samples.iter().map(|s| s.sample_id.as_str()).collect();

        let mut results = Vec::with_capacity(input.rows.len());
        for (index, row) in input.rows.iter().enumerate() {
            if let Some(result) = self.process_row(index, row, &known, &mut diagnostics) {
                results.push((index, result));
            }
        }
        report_duplicates(&results, &mut diagnostics);

        self.finish(samples, results, &input.reported_tiers, input.rows.len(), diagnostics)
    }

    /// Classify a results table that was already normalized, e.g. one read
    /// back from disk. Rows that break the below-limit invariant or point at
    /// an unknown sample are dropped and reported.
    pub fn reclassify(
        &self,
        samples: Option<Vec<Sample>>,
        results: Vec<ResultRow>,
        reported_tiers: &BTreeMap<String, Tier>,
    ) -> BatchOutput {
        let mut diagnostics = Vec::new();
        let input_rows = results.len();
        let samples = match samples {
            Some(samples) => samples.into_iter().map(|s| self.with_defaults(s)).collect(),
            None => self.derive_samples(results.iter().map(|r| r.sample_id.as_str())),
        };
        let known: HashSet<&str> = samples.iter().map(|s| s.sample_id.as_str()).collect();

        let mut kept = Vec::with_capacity(results.len());
        for (index, row) in results.into_iter().enumerate() {
            if !known.contains(row.sample_id.as_str()) {
                diagnostics.push(orphan(index, &row.sample_id));
                continue;
            }
            kept.push((index, row));
        }
        report_duplicates(&kept, &mut diagnostics);

        self.finish(samples, kept, reported_tiers, input_rows, diagnostics)
    }

    fn process_row(
        &self,
        index: usize,
        row: &InputRow,
        known: &HashSet<&str>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<ResultRow> {
        let sample_id = row.sample_id.trim();
        if !known.contains(sample_id) {
            diagnostics.push(orphan(index, sample_id));
            return None;
        }
        let report = |kind: DiagnosticKind, message: String| {
            Diagnostic::new(kind, message).at_row(index).for_sample(sample_id)
        };

        let code = match self.normalizer.normalize(&row.raw_parameter) {
            Resolution::Resolved(code) => code,
            Resolution::Placeholder => {
                diagnostics.push(report(
                    DiagnosticKind::PlaceholderSkipped,
                    format!("'{}' is a placeholder column", row.raw_parameter),
                ));
                return None;
            }
            Resolution::Unresolved(u) => {
                diagnostics.push(report(
                    DiagnosticKind::UnresolvedParameter,
                    format!("'{}' not in alias table (tried: {})", u.label, u.tried.join(" | ")),
                ));
                return None;
            }
        };

        let measurement = match parse_value(&row.raw_value) {
            ParsedValue::Measured(v) => Measurement::Measured(v),
            ParsedValue::BelowLimit(limit) => Measurement::BelowLimit(limit),
            ParsedValue::NotDetected => match self.config.not_detected {
                NotDetectedPolicy::Zero => Measurement::NotDetected,
                NotDetectedPolicy::Missing => {
                    diagnostics.push(report(
                        DiagnosticKind::MissingValue,
                        format!("{}: '{}' not detected, no value kept", code, row.raw_value.trim()),
                    ));
                    return None;
                }
            },
            ParsedValue::Missing => {
                diagnostics.push(report(
                    DiagnosticKind::MissingValue,
                    format!("{}: empty value", code),
                ));
                return None;
            }
            ParsedValue::Unparseable(raw) => {
                diagnostics.push(report(
                    DiagnosticKind::UnparseableValue,
                    format!("{}: cannot read '{}' as a number", code, raw),
                ));
                return None;
            }
        };

        let unit_label = row.unit_label.trim();
        let (factor, unit) = match self.units.unit_class(unit_label) {
            UnitClass::Passthrough => (Decimal::ONE, unit_label.to_string()),
            UnitClass::Solid | UnitClass::Liquid | UnitClass::Unknown => {
                let matrix = self
                    .units
                    .matrix_for(unit_label, row.analysis_type.default_matrix());
                let Some(conversion) = self.units.to_canonical(Decimal::ONE, unit_label, matrix)
                else {
                    diagnostics.push(report(
                        DiagnosticKind::ValueOutOfRange,
                        format!("{}: factor for unit '{}' out of range", code, unit_label),
                    ));
                    return None;
                };
                if !conversion.known {
                    let message = if unit_label.is_empty() {
                        format!("{}: no unit given, value kept as reported", code)
                    } else {
                        format!("{}: unit '{}' not in unit table, value kept as reported", code, unit_label)
                    };
                    diagnostics.push(report(DiagnosticKind::UnknownUnit, message));
                }
                (conversion.factor, conversion.unit)
            }
        };

        let Some(scaled) = measurement.scaled(factor) else {
            diagnostics.push(report(
                DiagnosticKind::ValueOutOfRange,
                format!(
                    "{}: '{}' {} does not fit after conversion to {}",
                    code,
                    row.raw_value.trim(),
                    unit_label,
                    unit
                ),
            ));
            return None;
        };

        // An uncertainty that cannot be scaled is dropped; the result stays.
        let uncertainty = match row.raw_uncertainty.as_deref().map(|raw| (raw, parse_value(raw))) {
            None => None,
            Some((_, ParsedValue::Measured(u))) => match u.abs().checked_mul(factor) {
                Some(scaled_u) => Some(scaled_u.normalize()),
                None => {
                    diagnostics.push(report(
                        DiagnosticKind::ValueOutOfRange,
                        format!("{}: uncertainty '{}' out of range, dropped", code, u),
                    ));
                    None
                }
            },
            Some((raw, _)) => {
                tracing::debug!(sample_id, uncertainty = raw, "uncertainty not numeric, dropped");
                None
            }
        };

        Some(ResultRow::new(
            sample_id,
            &code,
            row.raw_parameter.trim(),
            scaled,
            &unit,
            uncertainty,
            row.analysis_type,
        ))
    }

    /// Only total-content results in a solid (or unrecognized) unit are
    /// compared against the limits.
    fn is_classifiable(&self, result: &ResultRow) -> bool {
        result.analysis_type == AnalysisType::Totalanalyse
            && matches!(
                self.units.unit_class(&result.unit),
                UnitClass::Solid | UnitClass::Unknown
            )
    }

    fn finish(
        &self,
        samples: Vec<Sample>,
        results: Vec<(usize, ResultRow)>,
        reported_tiers: &BTreeMap<String, Tier>,
        input_rows: usize,
        mut diagnostics: Vec<Diagnostic>,
    ) -> BatchOutput {
        let mut details: BTreeMap<String, Vec<ParameterClassification>> = BTreeMap::new();
        let mut kept = Vec::with_capacity(results.len());

        for (index, result) in results {
            let measurement = match result.measurement() {
                Ok(m) => m,
                Err(e) => {
                    diagnostics.push(
                        Diagnostic::new(DiagnosticKind::IntegrityViolation, e.to_string())
                            .at_row(index)
                            .for_sample(result.sample_id.as_str()),
                    );
                    continue;
                }
            };
            if self.is_classifiable(&result) {
                let classified = classify_measurement(
                    &result.parameter,
                    &result.parameter_raw,
                    measurement,
                    &self.thresholds,
                );
                details
                    .entry(result.sample_id.clone())
                    .or_default()
                    .push(classified);
            }
            kept.push(result);
        }

        let basis = self.basis();
        let mut classifications = Vec::with_capacity(samples.len());
        let mut decisions = Vec::with_capacity(samples.len());
        for sample in &samples {
            let id = sample.sample_id.as_str();
            let per_parameter = details.get(id).map(Vec::as_slice).unwrap_or_default();
            let mut classification = classify_sample(id, per_parameter, basis);
            let reconciled = reconcile(classification.tier, reported_tiers.get(id).copied());

            let mut colour_note = None;
            match reconciled {
                Reconciled::Mismatch { computed, reported } => {
                    tracing::warn!(sample_id = id, %computed, %reported, "reported tier disagrees with computed tier");
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::TierMismatch,
                            format!("computed tier {} but source reports tier {}", computed, reported),
                        )
                        .for_sample(id),
                    );
                }
                Reconciled::FromColour(tier) => {
                    tracing::debug!(sample_id = id, %tier, "tier taken from colour coding");
                    classification.tier = Some(tier);
                    colour_note = Some("Tilstandsklasse fra fargekode i kildefil");
                }
                Reconciled::Computed(_) | Reconciled::Neither => {}
            }

            let mut decision = decide(self.policy.as_ref(), &classification);
            if let Some(note) = colour_note {
                decision.notes = note.to_string();
            }
            classifications.push(classification);
            decisions.push(decision);
        }

        let summary = summarize(input_rows, &kept, &samples, &classifications, &diagnostics);
        tracing::info!(
            input_rows,
            results = summary.results,
            samples = summary.samples,
            classified = summary.classified_samples,
            diagnostics = diagnostics.len(),
            "batch done"
        );

        BatchOutput {
            samples,
            results: kept,
            details,
            classifications,
            decisions,
            diagnostics,
            summary,
        }
    }

    /// One sample per distinct non-empty id, in order of first appearance,
    /// with metadata read off the id and the config defaults.
    fn derive_samples<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Vec<Sample> {
        let mut seen = HashSet::new();
        let mut samples = Vec::new();
        for id in ids.map(str::trim).filter(|id| !id.is_empty()) {
            if !seen.insert(id) {
                continue;
            }
            let (profile_start, profile_end) = parse_profile_range(id);
            let sample = Sample {
                location_type: infer_location_type(id),
                sample_type: infer_sample_type(id),
                profile_start,
                profile_end,
                ..Sample::new(id)
            };
            samples.push(self.with_defaults(sample));
        }
        samples
    }

    fn with_defaults(&self, mut sample: Sample) -> Sample {
        if sample.project_code.is_none() {
            sample.project_code = self.config.project_code.clone();
        }
        if sample.tunnel_name.is_none() {
            sample.tunnel_name = self.config.tunnel_name.clone();
        }
        if sample.sampler.is_none() {
            sample.sampler = self.config.sampler.clone();
        }
        sample
    }
}

fn orphan(index: usize, sample_id: &str) -> Diagnostic {
    let message = if sample_id.is_empty() {
        "row has no sample id".to_string()
    } else {
        format!("result refers to unknown sample '{}'", sample_id)
    };
    Diagnostic::new(DiagnosticKind::OrphanResult, message)
        .at_row(index)
        .for_sample(sample_id)
}

/// Same (sample, parameter, analysis type) reported more than once. All rows
/// are kept; the later ones are flagged at their input row.
fn report_duplicates(results: &[(usize, ResultRow)], diagnostics: &mut Vec<Diagnostic>) {
    let mut seen: HashSet<(&str, &str, AnalysisType)> = HashSet::new();
    for (index, r) in results {
        if !seen.insert((r.sample_id.as_str(), r.parameter.as_str(), r.analysis_type)) {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateResult,
                    format!("{} ({}) reported more than once", r.parameter, r.analysis_type),
                )
                .at_row(*index)
                .for_sample(r.sample_id.as_str()),
            );
        }
    }
}

fn summarize(
    input_rows: usize,
    results: &[ResultRow],
    samples: &[Sample],
    classifications: &[Classification],
    diagnostics: &[Diagnostic],
) -> BatchSummary {
    let mut summary = BatchSummary {
        input_rows,
        results: results.len(),
        samples: samples.len(),
        ..Default::default()
    };
    for tier in classifications.iter().filter_map(|c| c.tier) {
        summary.classified_samples += 1;
        *summary.samples_per_tier.entry(tier).or_default() += 1;
    }
    for d in diagnostics {
        *summary.diagnostics.entry(d.kind).or_default() += 1;
    }
    summary
}
