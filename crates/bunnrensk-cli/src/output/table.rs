use bunnrensk_core::classify::{ParameterClassification, Tier, TierOutcome};
use bunnrensk_core::pipeline::{BatchOutput, Severity};

pub fn print(result: &BatchOutput, show_all: bool, verbose: bool) {
    let multi_sample = result.classifications.len() > 1;

    for (i, classification) in result.classifications.iter().enumerate() {
        let id = classification.sample_id.as_str();
        if multi_sample {
            if i > 0 {
                println!();
            }
            println!("--- Sample: {} ---\n", id);
        }

        let details: &[ParameterClassification] =
            result.details.get(id).map(Vec::as_slice).unwrap_or_default();
        let computed = details.iter().any(|d| d.outcome.tier().is_some());

        match classification.tier {
            Some(tier) if !computed => {
                println!("  Overall: tier {} (reported in source, no classified results)", tier)
            }
            Some(tier) => println!("  Overall: tier {} ({})", tier, classification.reason()),
            None => println!("  Overall: undetermined ({})", classification.reason()),
        }
        if let Some(decision) = result.decision(id) {
            println!("  Decision: {}\n", decision.decision);
        }

        if verbose || show_all {
            let width = details
                .iter()
                .map(|d| d.parameter_raw.chars().count())
                .max()
                .unwrap_or(10);
            for d in details {
                println!(
                    "  {:<width$}  {} mg/kg  -> {}",
                    d.parameter_raw,
                    d.measurement,
                    outcome_label(d.outcome),
                    width = width
                );
                if verbose {
                    println!("    {}", d.reason);
                }
            }
            if !details.is_empty() {
                println!();
            }
        } else if let Some(tier) = classification.tier.filter(|t| *t > Tier::One) {
            let limiting: Vec<_> = details
                .iter()
                .filter(|d| d.outcome == TierOutcome::Tier(tier))
                .collect();
            if !limiting.is_empty() {
                println!("  Limiting parameters:");
                for d in limiting {
                    let limit_info = match d.exceeded_limit {
                        Some(limit) => format!("{} > {} mg/kg", d.measurement, limit),
                        None => format!("{} mg/kg", d.measurement),
                    };
                    println!("    {} -> tier {}  ({})", d.parameter_raw, tier, limit_info);
                }
                println!();
            }
        }
    }

    print_diagnostics(result, verbose);
}

fn outcome_label(outcome: TierOutcome) -> String {
    match outcome {
        TierOutcome::Tier(t) => format!("tier {}", t),
        TierOutcome::Undetermined => "undetermined".to_string(),
    }
}

fn print_diagnostics(result: &BatchOutput, verbose: bool) {
    let summary = &result.summary;
    println!(
        "{} input row(s), {} result(s), {} sample(s), {} classified",
        summary.input_rows, summary.results, summary.samples, summary.classified_samples
    );
    if summary.diagnostics.is_empty() {
        return;
    }

    println!("\nDiagnostics:");
    for (kind, count) in &summary.diagnostics {
        println!("  {:<22} {}", kind.as_str(), count);
    }

    // Critical ones are always listed; the rest only on request.
    let listed: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity == Severity::Critical)
        .collect();
    if !listed.is_empty() {
        println!();
        for d in listed {
            println!("  {}", d);
        }
    }
}
