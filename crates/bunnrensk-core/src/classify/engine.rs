use crate::classify::outcome::{Classification, ParameterClassification, Tier, TierOutcome};
use crate::model::Measurement;
use crate::reference::schema::ThresholdDef;
use crate::reference::ThresholdTable;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Tier of one concentration (canonical unit) for a canonical parameter code.
///
/// The first tier whose upper bound is >= the value wins. A value above the
/// tier 4 bound is tier 5. A value above the highest defined bound below
/// tier 4 cannot be placed and is undetermined, as is any code the table
/// does not cover.
pub fn classify(code: &str, value: Decimal, table: &ThresholdTable) -> TierOutcome {
    match table.get(code) {
        Some(def) => classify_against(def, value),
        None => TierOutcome::Undetermined,
    }
}

fn classify_against(def: &ThresholdDef, value: Decimal) -> TierOutcome {
    for tier in [Tier::One, Tier::Two, Tier::Three, Tier::Four] {
        match def.limit(tier) {
            Some(limit) if value <= limit => return TierOutcome::Tier(tier),
            Some(_) => continue,
            None => return TierOutcome::Undetermined,
        }
    }
    TierOutcome::Tier(Tier::Five)
}

/// Classify one measurement and explain the outcome.
pub fn classify_measurement(
    code: &str,
    raw_label: &str,
    measurement: Measurement,
    table: &ThresholdTable,
) -> ParameterClassification {
    let value = measurement.numeric();
    let shown = match measurement {
        Measurement::Measured(v) => format!("{} {}", v, table.unit()),
        Measurement::BelowLimit(l) => format!("< {} {}", l, table.unit()),
        Measurement::NotDetected => format!("n.d. (0 {})", table.unit()),
    };

    let Some(def) = table.get(code) else {
        return ParameterClassification {
            parameter: code.to_string(),
            parameter_raw: raw_label.to_string(),
            measurement,
            compared_value: value,
            outcome: TierOutcome::Undetermined,
            exceeded_limit: None,
            reason: format!(
                "{}: {} has no limits in {} -> undetermined",
                raw_label,
                code,
                table.name()
            ),
        };
    };

    let outcome = classify_against(def, value);
    let (exceeded_limit, reason) = match outcome {
        TierOutcome::Tier(Tier::One) => (
            None,
            format!(
                "{}: {} <= {} (tier 1) -> tier 1",
                raw_label,
                shown,
                def.normverdi()
            ),
        ),
        TierOutcome::Tier(Tier::Five) => {
            let prev = def.limit(Tier::Four);
            (
                prev,
                format!(
                    "{}: {} > {} (tier 4) -> tier 5",
                    raw_label,
                    shown,
                    prev.unwrap_or_default()
                ),
            )
        }
        TierOutcome::Tier(tier) => {
            let prev = Tier::from_number(tier.number() - 1).and_then(|t| def.limit(t));
            let upper = def.limit(tier).unwrap_or_default();
            (
                prev,
                format!(
                    "{}: {} > {} (tier {}) but <= {} (tier {}) -> tier {}",
                    raw_label,
                    shown,
                    prev.unwrap_or_default(),
                    tier.number() - 1,
                    upper,
                    tier,
                    tier
                ),
            )
        }
        TierOutcome::Undetermined => {
            let highest = def.limits.last().copied().unwrap_or_default();
            (
                Some(highest),
                format!(
                    "{}: {} > {} (tier {}), no higher limit defined -> undetermined",
                    raw_label,
                    shown,
                    highest,
                    def.limits.len()
                ),
            )
        }
    };

    ParameterClassification {
        parameter: code.to_string(),
        parameter_raw: raw_label.to_string(),
        measurement,
        compared_value: value,
        outcome,
        exceeded_limit,
        reason,
    }
}

/// Worst tier across one sample's results and the parameters at that tier.
///
/// Starts at tier 1 with no limiting parameters. A strictly higher tier
/// replaces the limiting set; an equal tier above 1 joins it. Undetermined
/// results never participate and tier 1 never limits.
pub fn aggregate<I, S>(results: I) -> (Tier, BTreeSet<String>)
where
    I: IntoIterator<Item = (S, TierOutcome)>,
    S: AsRef<str>,
{
    let mut worst = Tier::One;
    let mut limiting = BTreeSet::new();

    for (code, outcome) in results {
        let Some(tier) = outcome.tier() else {
            continue;
        };
        if tier > worst {
            worst = tier;
            limiting.clear();
            limiting.insert(code.as_ref().to_string());
        } else if tier == worst && tier > Tier::One {
            limiting.insert(code.as_ref().to_string());
        }
    }

    (worst, limiting)
}

/// Sample-level classification. The tier is None when no result had a
/// determined tier, so an empty or fully undetermined sample is never
/// reported as clean.
pub fn classify_sample(
    sample_id: &str,
    results: &[ParameterClassification],
    basis: &str,
) -> Classification {
    let determined = results.iter().any(|r| r.outcome.tier().is_some());
    let (tier, limiting_parameters) = if determined {
        let (tier, limiting) =
            aggregate(results.iter().map(|r| (r.parameter.as_str(), r.outcome)));
        (Some(tier), limiting)
    } else {
        (None, BTreeSet::new())
    };

    Classification {
        sample_id: sample_id.to_string(),
        tier,
        limiting_parameters,
        classification_basis: basis.to_string(),
    }
}

impl Classification {
    /// Human-readable explanation of the overall tier.
    pub fn reason(&self) -> String {
        match self.tier {
            None => "No total-content result could be classified".to_string(),
            Some(Tier::One) => "All classified parameters within normverdi (tier 1)".to_string(),
            Some(tier) => {
                let limiting: Vec<&str> =
                    self.limiting_parameters.iter().map(|s| s.as_str()).collect();
                if limiting.len() == 1 {
                    format!("Determined by {} (tier {})", limiting[0], tier)
                } else {
                    format!(
                        "Determined by {} parameters at tier {}: {}",
                        limiting.len(),
                        tier,
                        limiting.join(", ")
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::builtin::thresholds;
    use crate::reference::parse_thresholds_str;
    use rust_decimal_macros::dec;

    fn tier(n: u8) -> TierOutcome {
        TierOutcome::Tier(Tier::from_number(n).unwrap())
    }

    #[test]
    fn arsenic_tiers() {
        let t = thresholds();
        assert_eq!(classify("As", dec!(5), t), tier(1));
        assert_eq!(classify("As", dec!(8), t), tier(1));
        assert_eq!(classify("As", dec!(8.01), t), tier(2));
        assert_eq!(classify("As", dec!(51.9), t), tier(4));
        assert_eq!(classify("As", dec!(600), t), tier(4));
        assert_eq!(classify("As", dec!(1500), t), tier(5));
    }

    #[test]
    fn normverdi_only_above_limit_is_undetermined() {
        let t = thresholds();
        assert_eq!(classify("Toluen", dec!(100), t), TierOutcome::Undetermined);
        assert_eq!(classify("Toluen", dec!(0.3), t), tier(1));
    }

    #[test]
    fn unknown_code_is_undetermined() {
        assert_eq!(
            classify("DryMatter", dec!(85), thresholds()),
            TierOutcome::Undetermined
        );
    }

    #[test]
    fn partial_coverage_stops_at_highest_defined_limit() {
        let t = parse_thresholds_str(
            r#"{
                "name": "T", "basis": "T", "version": "1", "unit": "mg/kg",
                "thresholds": [ { "code": "X", "name": "X", "limits": ["1", "2"] } ]
            }"#,
        )
        .unwrap();
        assert_eq!(classify("X", dec!(1.5), &t), tier(2));
        assert_eq!(classify("X", dec!(3), &t), TierOutcome::Undetermined);
    }

    #[test]
    fn four_limits_still_reach_tier_five() {
        let t = parse_thresholds_str(
            r#"{
                "name": "T", "basis": "T", "version": "1", "unit": "mg/kg",
                "thresholds": [ { "code": "X", "name": "X", "limits": ["1", "2", "3", "4"] } ]
            }"#,
        )
        .unwrap();
        assert_eq!(classify("X", dec!(4.5), &t), tier(5));
    }

    #[test]
    fn aggregate_picks_worst_and_limiting() {
        let (worst, limiting) = aggregate([
            ("As", tier(4)),
            ("Cu", tier(3)),
            ("Hg", TierOutcome::Undetermined),
        ]);
        assert_eq!(worst, Tier::Four);
        assert_eq!(limiting, BTreeSet::from(["As".to_string()]));
    }

    #[test]
    fn aggregate_all_tier_one_has_no_limiting() {
        let (worst, limiting) = aggregate([("Cu", tier(1)), ("Zn", tier(1))]);
        assert_eq!(worst, Tier::One);
        assert!(limiting.is_empty());
    }

    #[test]
    fn aggregate_ties_join_limiting_set() {
        let (worst, limiting) = aggregate([("Zn", tier(2)), ("Pb", tier(3)), ("As", tier(3))]);
        assert_eq!(worst, Tier::Three);
        assert_eq!(
            limiting.into_iter().collect::<Vec<_>>(),
            vec!["As".to_string(), "Pb".to_string()]
        );
    }

    #[test]
    fn aggregate_empty_floors_at_tier_one() {
        let (worst, limiting) = aggregate(Vec::<(&str, TierOutcome)>::new());
        assert_eq!(worst, Tier::One);
        assert!(limiting.is_empty());
    }

    #[test]
    fn below_limit_is_classified_at_its_limit() {
        let c = classify_measurement(
            "Hg",
            "Hg (Kvikksølv)",
            Measurement::BelowLimit(dec!(1.5)),
            thresholds(),
        );
        assert_eq!(c.outcome, tier(2));
        assert_eq!(c.exceeded_limit, Some(dec!(1)));
        assert!(c.reason.contains("< 1.5"));
    }

    #[test]
    fn reason_for_tier_five_names_tier_four_limit() {
        let c = classify_measurement("As", "Arsen", Measurement::Measured(dec!(1500)), thresholds());
        assert_eq!(c.outcome, tier(5));
        assert_eq!(c.exceeded_limit, Some(dec!(600)));
        assert!(c.reason.contains("> 600"));
    }

    #[test]
    fn reason_for_code_without_limits() {
        let c = classify_measurement("TOC", "TOC", Measurement::Measured(dec!(2)), thresholds());
        assert_eq!(c.outcome, TierOutcome::Undetermined);
        assert!(c.reason.contains("no limits"));
    }

    #[test]
    fn sample_without_determined_tier_has_no_tier() {
        let results = vec![classify_measurement(
            "Toluen",
            "Toluen",
            Measurement::Measured(dec!(100)),
            thresholds(),
        )];
        let c = classify_sample("S1", &results, "TA-2553/2009");
        assert_eq!(c.tier, None);
        assert!(c.limiting_parameters.is_empty());
    }

    #[test]
    fn sample_classification_reason() {
        let results = vec![
            classify_measurement("As", "Arsen", Measurement::Measured(dec!(51.9)), thresholds()),
            classify_measurement("Cu", "Kobber", Measurement::Measured(dec!(150)), thresholds()),
        ];
        let c = classify_sample("S1", &results, "TA-2553/2009");
        assert_eq!(c.tier, Some(Tier::Four));
        assert_eq!(c.reason(), "Determined by As (tier 4)");
    }
}
