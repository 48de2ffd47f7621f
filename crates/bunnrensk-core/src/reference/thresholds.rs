use crate::classify::Tier;
use crate::error::BunnrenskError;
use crate::reference::schema::{ThresholdDef, ThresholdTableDef};
use crate::reference::validate_thresholds;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A validated threshold table indexed by canonical parameter code.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    def: ThresholdTableDef,
    index: HashMap<String, usize>,
}

impl ThresholdTable {
    pub fn from_def(def: ThresholdTableDef) -> Result<Self, BunnrenskError> {
        validate_thresholds(&def)?;
        let mut index = HashMap::new();
        for (i, entry) in def.thresholds.iter().enumerate() {
            index.insert(entry.code.clone(), i);
            for alias in &entry.also_applies_to {
                index.insert(alias.clone(), i);
            }
        }
        Ok(ThresholdTable { def, index })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn basis(&self) -> &str {
        &self.def.basis
    }

    pub fn version(&self) -> &str {
        &self.def.version
    }

    pub fn unit(&self) -> &str {
        &self.def.unit
    }

    pub fn entries(&self) -> &[ThresholdDef] {
        &self.def.thresholds
    }

    pub fn def(&self) -> &ThresholdTableDef {
        &self.def
    }

    /// Look up the limits that apply to a canonical parameter code.
    pub fn get(&self, code: &str) -> Option<&ThresholdDef> {
        self.index.get(code).map(|&i| &self.def.thresholds[i])
    }

    pub fn tier_description(&self, tier: Tier) -> Option<&str> {
        self.def
            .tiers
            .get(&tier.number().to_string())
            .map(|s| s.as_str())
    }
}

impl ThresholdDef {
    /// Upper bound of `tier`, if the table defines it for this parameter.
    pub fn limit(&self, tier: Tier) -> Option<Decimal> {
        self.limits.get(tier.index()).copied()
    }

    /// The normverdi (tier 1 upper bound).
    pub fn normverdi(&self) -> Decimal {
        self.limits.first().copied().unwrap_or_default()
    }

    /// True when only the normverdi is defined.
    pub fn normverdi_only(&self) -> bool {
        self.limits.len() == 1
    }
}
