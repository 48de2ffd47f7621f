pub mod builtin;
pub mod schema;
pub mod thresholds;

use crate::error::BunnrenskError;
use schema::{AliasTableDef, ThresholdTableDef, UnitTableDef};
use std::collections::HashSet;
use std::path::Path;
pub use thresholds::ThresholdTable;

/// Load a threshold table from a JSON file.
pub fn load_thresholds(path: &Path) -> Result<ThresholdTable, BunnrenskError> {
    let content = std::fs::read_to_string(path).map_err(|e| BunnrenskError::ReferenceLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_thresholds(&content, path)
}

/// Parse a threshold table from a JSON string.
pub fn parse_thresholds(json: &str, source: &Path) -> Result<ThresholdTable, BunnrenskError> {
    let def: ThresholdTableDef =
        serde_json::from_str(json).map_err(|e| BunnrenskError::ReferenceLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    ThresholdTable::from_def(def)
}

/// Parse a threshold table from a JSON string (no file path context).
pub fn parse_thresholds_str(json: &str) -> Result<ThresholdTable, BunnrenskError> {
    let def: ThresholdTableDef = serde_json::from_str(json)?;
    ThresholdTable::from_def(def)
}

/// Validate that a threshold table is well-formed.
pub fn validate_thresholds(def: &ThresholdTableDef) -> Result<(), BunnrenskError> {
    if def.basis.trim().is_empty() {
        return Err(BunnrenskError::ReferenceInvalid(
            "classification basis must not be empty".into(),
        ));
    }

    if def.thresholds.is_empty() {
        return Err(BunnrenskError::ReferenceInvalid(
            "thresholds must not be empty".into(),
        ));
    }

    let mut seen = HashSet::new();
    for entry in &def.thresholds {
        if entry.code.trim().is_empty() {
            return Err(BunnrenskError::ReferenceInvalid(
                "parameter code must not be empty".into(),
            ));
        }

        if entry.limits.is_empty() {
            return Err(BunnrenskError::ReferenceInvalid(format!(
                "parameter '{}' has no tier 1 limit",
                entry.code
            )));
        }

        if entry.limits.len() > 5 {
            return Err(BunnrenskError::ReferenceInvalid(format!(
                "parameter '{}' has {} limits (at most 5 tiers)",
                entry.code,
                entry.limits.len()
            )));
        }

        if entry.limits.iter().any(|l| l.is_sign_negative()) {
            return Err(BunnrenskError::ReferenceInvalid(format!(
                "parameter '{}' has a negative limit",
                entry.code
            )));
        }

        if let Some(pair) = entry.limits.windows(2).find(|w| w[1] < w[0]) {
            return Err(BunnrenskError::ReferenceInvalid(format!(
                "parameter '{}' limits decrease ({} then {})",
                entry.code, pair[0], pair[1]
            )));
        }

        for code in std::iter::once(&entry.code).chain(entry.also_applies_to.iter()) {
            if !seen.insert(code.as_str()) {
                return Err(BunnrenskError::ReferenceInvalid(format!(
                    "parameter '{}' appears more than once",
                    code
                )));
            }
        }
    }

    for key in def.tiers.keys() {
        if !matches!(key.as_str(), "1" | "2" | "3" | "4" | "5") {
            return Err(BunnrenskError::ReferenceInvalid(format!(
                "tier description key '{}' is not a tier number",
                key
            )));
        }
    }

    Ok(())
}

/// Validate that an alias table is well-formed. Keys must already be in
/// lookup form (trimmed, lowercase), otherwise they can never match.
pub fn validate_aliases(def: &AliasTableDef) -> Result<(), BunnrenskError> {
    if def.base.is_empty() {
        return Err(BunnrenskError::ReferenceInvalid(
            "base alias map must not be empty".into(),
        ));
    }

    let maps = std::iter::once(("base", &def.base))
        .chain(def.overlays.iter().map(|(name, m)| (name.as_str(), m)));
    for (name, map) in maps {
        for (label, code) in map {
            if *label != lookup_key(label) {
                return Err(BunnrenskError::ReferenceInvalid(format!(
                    "alias '{}' in '{}' is not trimmed lowercase",
                    label, name
                )));
            }
            if code.trim().is_empty() {
                return Err(BunnrenskError::ReferenceInvalid(format!(
                    "alias '{}' in '{}' maps to an empty code",
                    label, name
                )));
            }
        }
    }

    for placeholder in &def.placeholders {
        if *placeholder != lookup_key(placeholder) {
            return Err(BunnrenskError::ReferenceInvalid(format!(
                "placeholder '{}' is not trimmed lowercase",
                placeholder
            )));
        }
    }

    Ok(())
}

/// Validate a unit table: canonical units carry factor 1, all factors positive.
pub fn validate_units(def: &UnitTableDef) -> Result<(), BunnrenskError> {
    for (matrix, units) in [("solid", &def.solid), ("liquid", &def.liquid)] {
        let canonical = lookup_key(&units.canonical);
        match units.factors.get(&canonical) {
            Some(f) if *f == rust_decimal::Decimal::ONE => {}
            _ => {
                return Err(BunnrenskError::ReferenceInvalid(format!(
                    "{} canonical unit '{}' must have factor 1",
                    matrix, units.canonical
                )));
            }
        }
        for (unit, factor) in &units.factors {
            if *unit != lookup_key(unit) {
                return Err(BunnrenskError::ReferenceInvalid(format!(
                    "{} unit '{}' is not trimmed lowercase",
                    matrix, unit
                )));
            }
            if factor.is_sign_negative() || factor.is_zero() {
                return Err(BunnrenskError::ReferenceInvalid(format!(
                    "{} unit '{}' has non-positive factor {}",
                    matrix, unit, factor
                )));
            }
        }
    }
    Ok(())
}

/// Lookup form shared by every reference table: lowercase, trimmed, inner
/// whitespace runs collapsed to one space.
pub(crate) fn lookup_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
