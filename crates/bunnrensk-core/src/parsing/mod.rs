pub mod normalize;
pub mod sample_name;
pub mod values;

pub use normalize::{normalize, Normalizer, Resolution, UnresolvedLabel};
pub use values::{parse_number, parse_value, ParsedValue};
