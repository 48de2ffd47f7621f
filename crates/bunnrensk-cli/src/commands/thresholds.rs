use bunnrensk_core::classify::Tier;
use bunnrensk_core::error::BunnrenskError;
use bunnrensk_core::parsing::{normalize, Resolution};
use bunnrensk_core::reference::{builtin, load_thresholds, ThresholdTable};
use std::path::Path;

pub fn list() -> Result<(), BunnrenskError> {
    let table = builtin::thresholds();
    println!("{} (version {}, basis {})\n", table.name(), table.version(), table.basis());

    for tier in Tier::ALL {
        if let Some(desc) = table.tier_description(tier) {
            println!("  Tier {}  {}", tier, desc);
        }
    }
    println!();

    print_limits(table);
    Ok(())
}

pub fn explain(parameter: &str) -> Result<(), BunnrenskError> {
    let table = builtin::thresholds();
    let code = match normalize(parameter) {
        Resolution::Resolved(code) => code,
        _ => parameter.trim().to_string(),
    };

    let Some(def) = table.get(&code) else {
        println!("{} has no limits in {}; its results are undetermined.", code, table.name());
        return Ok(());
    };

    println!("{} ({})\n", def.name, def.code);
    if def.code != code {
        println!("  {} shares the limits of {}.\n", code, def.code);
    }

    let mut lower = None;
    for tier in Tier::ALL {
        let upper = def.limit(tier);
        let range = match (lower, upper) {
            (Some(l), _) if tier == Tier::Five => format!("> {}", l),
            (None, Some(u)) => format!("<= {}", u),
            (Some(l), Some(u)) => format!("> {} and <= {}", l, u),
            (Some(l), None) => {
                println!("  above {} {}: undetermined (no higher limit)", l, table.unit());
                break;
            }
            (None, None) => break,
        };
        let desc = table.tier_description(tier).unwrap_or("");
        println!("  Tier {}  {:<24} {}  {}", tier, range, table.unit(), desc);
        if upper.is_none() {
            break;
        }
        lower = upper;
    }

    if !def.also_applies_to.is_empty() {
        println!("\n  Also applies to: {}", def.also_applies_to.join(", "));
    }
    if let Some(note) = &def.note {
        println!("  Note: {}", note);
    }
    println!();
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), BunnrenskError> {
    let table = load_thresholds(file)?;

    println!(
        "Threshold table '{}' (v{}, basis {}) is valid.",
        table.name(),
        table.version(),
        table.basis()
    );
    println!("  Parameters: {}", table.entries().len());

    let partial: Vec<&str> = table
        .entries()
        .iter()
        .filter(|d| d.limits.len() < 4)
        .map(|d| d.code.as_str())
        .collect();
    if !partial.is_empty() {
        println!("\nParameters without limits up to tier 4 (values above them are undetermined):");
        for code in partial {
            println!("  - {}", code);
        }
    }
    Ok(())
}

fn print_limits(table: &ThresholdTable) {
    let max_code = table
        .entries()
        .iter()
        .map(|d| d.code.chars().count())
        .max()
        .unwrap_or(10);

    print!("  {:<width$}", "Parameter", width = max_code + 2);
    for tier in Tier::ALL {
        print!("  {:<10}", format!("Tier {}", tier));
    }
    println!();
    println!("  {}", "-".repeat(max_code + 2 + Tier::ALL.len() * 12));

    for def in table.entries() {
        print!("  {:<width$}", def.code, width = max_code + 2);
        for tier in Tier::ALL {
            match def.limit(tier) {
                Some(limit) => print!("  {:<10}", limit.to_string()),
                None => print!("  {:<10}", "-"),
            }
        }
        println!();
    }
    println!("\n  Limits are upper bounds in {}.", table.unit());
}
