use crate::classify::outcome::{Classification, Decision, Tier};
use crate::model::Disposition;

/// Maps a sample's overall tier to a disposition decision.
pub trait DispositionPolicy: Send + Sync {
    fn decide(&self, tier: Option<Tier>) -> Disposition;

    /// Free-text note stored with the decision.
    fn notes(&self, tier: Option<Tier>) -> String {
        match tier {
            Some(_) => "Autogenerert basert på tilstandsklasse".to_string(),
            None => "Tilstandsklasse ikke satt".to_string(),
        }
    }

    /// Name shown in diagnostics and CLI output.
    fn name(&self) -> &str;
}

/// Tier 1 material is reused; anything above goes to landfill.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReuseAtTierOne;

impl DispositionPolicy for ReuseAtTierOne {
    fn decide(&self, tier: Option<Tier>) -> Disposition {
        match tier {
            Some(Tier::One) => Disposition::Gjenbruk,
            Some(_) => Disposition::Deponi,
            None => Disposition::Ukjent,
        }
    }

    fn name(&self) -> &str {
        "reuse-at-tier-1"
    }
}

/// Build the decision record for a classified sample.
pub fn decide(policy: &dyn DispositionPolicy, classification: &Classification) -> Decision {
    Decision {
        sample_id: classification.sample_id.clone(),
        decision: policy.decide(classification.tier),
        decision_remarks: String::new(),
        destination: String::new(),
        notes: policy.notes(classification.tier),
    }
}
