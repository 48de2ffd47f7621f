pub mod colour;
pub mod disposition;
pub mod engine;
pub mod outcome;

pub use disposition::{DispositionPolicy, ReuseAtTierOne};
pub use engine::{aggregate, classify, classify_measurement, classify_sample};
pub use outcome::{Classification, Decision, ParameterClassification, Tier, TierOutcome};
