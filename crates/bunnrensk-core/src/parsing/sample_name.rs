//! Metadata carried in free-text sample names such as
//! "Blandeprøve pel 9260-9110" or "BRMØ1 kolonnetest".

use crate::model::{AnalysisType, LocationType, SampleType};
use rust_decimal::Decimal;

const ANALYSIS_SUFFIXES: &[&str] = &[" kolonnetest", " ristetest"];

/// Chainage (pel) range from a sample name, smallest first.
///
/// Every run of 4-5 digits counts as a profile number. One number gives a
/// start only; two or more give (min, max).
pub fn parse_profile_range(name: &str) -> (Option<Decimal>, Option<Decimal>) {
    let mut numbers = profile_numbers(name);
    numbers.sort();
    match numbers.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), None),
        [first, .., last] => (Some(*first), Some(*last)),
    }
}

fn profile_numbers(name: &str) -> Vec<Decimal> {
    let mut out = Vec::new();
    let mut run = String::new();
    for c in name.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            run.push(c);
            continue;
        }
        // Long runs split into 5-digit chunks while 4+ digits remain.
        let mut rest = run.as_str();
        while rest.len() >= 4 {
            let take = rest.len().min(5);
            if let Ok(n) = rest[..take].parse::<u32>() {
                out.push(Decimal::from(n));
            }
            rest = &rest[take..];
        }
        run.clear();
    }
    out
}

pub fn infer_location_type(name: &str) -> LocationType {
    let lower = name.to_lowercase();
    if lower.contains("grøft") {
        LocationType::Groft
    } else if lower.contains("pumpesump") {
        LocationType::Pumpesump
    } else {
        LocationType::Vegbane
    }
}

pub fn infer_sample_type(name: &str) -> SampleType {
    if name.to_lowercase().contains("blandeprøve") {
        SampleType::Blandprove
    } else {
        SampleType::Bunnrensk
    }
}

/// Analysis type encoded in the name: "BRMØ1 ristetest" is a shake test.
pub fn infer_analysis_type(name: &str) -> AnalysisType {
    let lower = name.to_lowercase();
    if lower.contains("kolonnetest") {
        AnalysisType::Kolonnetest
    } else if lower.contains("ristetest") {
        AnalysisType::Ristetest
    } else {
        AnalysisType::Totalanalyse
    }
}

/// Name without its analysis-type suffix, so leaching results attach to the
/// same sample as the total analysis.
pub fn base_sample_name(name: &str) -> &str {
    for suffix in ANALYSIS_SUFFIXES {
        let Some(cut) = name.len().checked_sub(suffix.len()) else {
            continue;
        };
        if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(suffix) {
            return &name[..cut];
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn profile_range_is_sorted() {
        assert_eq!(
            parse_profile_range("Blandeprøve pel 9260-9110"),
            (Some(dec!(9110)), Some(dec!(9260)))
        );
    }

    #[test]
    fn single_profile() {
        assert_eq!(parse_profile_range("Bunnrenskprøve pel. 9810"), (Some(dec!(9810)), None));
        assert_eq!(parse_profile_range("Bunnrensk 8760"), (Some(dec!(8760)), None));
    }

    #[test]
    fn prefixed_profiles() {
        assert_eq!(
            parse_profile_range("P8460 - P8520"),
            (Some(dec!(8460)), Some(dec!(8520)))
        );
    }

    #[test]
    fn short_numbers_are_not_profiles() {
        assert_eq!(parse_profile_range("Bunnrensk Høviktoppen a 0,5m"), (None, None));
        assert_eq!(parse_profile_range("BRMØ1"), (None, None));
        assert_eq!(parse_profile_range(""), (None, None));
    }

    #[test]
    fn location_type_from_name() {
        assert_eq!(infer_location_type("Grøftekant pel 9100"), LocationType::Groft);
        assert_eq!(infer_location_type("Pumpesump nord"), LocationType::Pumpesump);
        assert_eq!(infer_location_type("BRMØ1"), LocationType::Vegbane);
    }

    #[test]
    fn sample_type_from_name() {
        assert_eq!(infer_sample_type("Blandeprøve pel 9260-9110"), SampleType::Blandprove);
        assert_eq!(infer_sample_type("Bunnrensk 8760"), SampleType::Bunnrensk);
    }

    #[test]
    fn analysis_suffixes() {
        assert_eq!(infer_analysis_type("BRMØ1 kolonnetest"), AnalysisType::Kolonnetest);
        assert_eq!(infer_analysis_type("BRMØ1 Ristetest"), AnalysisType::Ristetest);
        assert_eq!(infer_analysis_type("BRMØ1"), AnalysisType::Totalanalyse);
    }

    #[test]
    fn base_name_strips_suffix_only() {
        assert_eq!(base_sample_name("BRMØ1 kolonnetest"), "BRMØ1");
        assert_eq!(base_sample_name("BRMØ1 Ristetest"), "BRMØ1");
        assert_eq!(base_sample_name("Bunnrensk 8760"), "Bunnrensk 8760");
    }
}
