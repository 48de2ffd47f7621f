pub mod lookup;
pub mod run;
pub mod thresholds;
