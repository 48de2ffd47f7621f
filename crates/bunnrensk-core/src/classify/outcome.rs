use crate::model::{Disposition, Measurement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Tilstandsklasse 1 (background) through 5 (worst).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::One, Tier::Two, Tier::Three, Tier::Four, Tier::Five];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Tier> {
        match n {
            1 => Some(Tier::One),
            2 => Some(Tier::Two),
            3 => Some(Tier::Three),
            4 => Some(Tier::Four),
            5 => Some(Tier::Five),
            _ => None,
        }
    }

    /// Position of this tier's upper bound in a limits list.
    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }
}

impl From<Tier> for u8 {
    fn from(t: Tier) -> u8 {
        t.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Tier::from_number(n).ok_or_else(|| format!("tier must be 1-5, got {n}"))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Result of comparing one concentration against its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierOutcome {
    Tier(Tier),
    /// No limit covers the value, or the parameter has no limits at all.
    Undetermined,
}

impl TierOutcome {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            TierOutcome::Tier(t) => Some(*t),
            TierOutcome::Undetermined => None,
        }
    }
}

impl fmt::Display for TierOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierOutcome::Tier(t) => write!(f, "{t}"),
            TierOutcome::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Classification of a single total-content result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterClassification {
    /// Canonical parameter code.
    pub parameter: String,
    /// Label as it appeared in the report.
    pub parameter_raw: String,
    pub measurement: Measurement,
    /// Value compared against the limits (canonical unit).
    pub compared_value: Decimal,
    pub outcome: TierOutcome,
    /// Boundary that was exceeded to reach this tier, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceeded_limit: Option<Decimal>,
    /// Human-readable explanation.
    pub reason: String,
}

/// Sample-level classification: worst tier and the parameters that set it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub sample_id: String,
    /// None when no total-content result had a determined tier.
    pub tier: Option<Tier>,
    pub limiting_parameters: BTreeSet<String>,
    pub classification_basis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub sample_id: String,
    pub decision: Disposition,
    pub decision_remarks: String,
    pub destination: String,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering() {
        assert!(Tier::Five > Tier::Four);
        assert_eq!(Tier::ALL.iter().max(), Some(&Tier::Five));
    }

    #[test]
    fn tier_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Tier::Three).unwrap(), "3");
        let t: Tier = serde_json::from_str("4").unwrap();
        assert_eq!(t, Tier::Four);
        assert!(serde_json::from_str::<Tier>("6").is_err());
    }

    #[test]
    fn outcome_tier_accessor() {
        assert_eq!(TierOutcome::Tier(Tier::Two).tier(), Some(Tier::Two));
        assert_eq!(TierOutcome::Undetermined.tier(), None);
    }
}
