use crate::reference::schema::{AliasTableDef, ThresholdTableDef, UnitTableDef};
use crate::reference::{validate_aliases, validate_units, ThresholdTable};
use std::sync::LazyLock;

const TA_2553_2009_JSON: &str = include_str!("../../../../reference/ta-2553-2009.json");
const PARAMETER_ALIASES_JSON: &str = include_str!("../../../../reference/parameter-aliases.json");
const UNITS_JSON: &str = include_str!("../../../../reference/units.json");

static THRESHOLDS: LazyLock<ThresholdTable> = LazyLock::new(|| {
    let def: ThresholdTableDef =
        serde_json::from_str(TA_2553_2009_JSON).expect("embedded ta-2553-2009.json is valid");
    ThresholdTable::from_def(def).expect("embedded ta-2553-2009.json passes validation")
});

static ALIASES: LazyLock<AliasTableDef> = LazyLock::new(|| {
    let def: AliasTableDef = serde_json::from_str(PARAMETER_ALIASES_JSON)
        .expect("embedded parameter-aliases.json is valid");
    validate_aliases(&def).expect("embedded parameter-aliases.json passes validation");
    def
});

static UNITS: LazyLock<UnitTableDef> = LazyLock::new(|| {
    let def: UnitTableDef = serde_json::from_str(UNITS_JSON).expect("embedded units.json is valid");
    validate_units(&def).expect("embedded units.json passes validation");
    def
});

/// The TA-2553/2009 tilstandsklasse table for contaminated ground.
pub fn thresholds() -> &'static ThresholdTable {
    &THRESHOLDS
}

/// Base alias map plus lab overlays.
pub fn aliases() -> &'static AliasTableDef {
    &ALIASES
}

/// Unit conversion factors per matrix.
pub fn units() -> &'static UnitTableDef {
    &UNITS
}

/// Names of the lab overlays shipped with the alias table.
pub fn overlay_names() -> Vec<&'static str> {
    ALIASES.overlays.keys().map(|k| k.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Tier;
    use rust_decimal_macros::dec;

    #[test]
    fn threshold_table_loads() {
        let t = thresholds();
        assert_eq!(t.basis(), "TA-2553/2009");
        assert_eq!(t.unit(), "mg/kg");
        assert!(t.entries().len() > 50);
    }

    #[test]
    fn arsenic_limits() {
        let as_ = thresholds().get("As").unwrap();
        assert_eq!(as_.limits, vec![dec!(8), dec!(20), dec!(50), dec!(600), dec!(1000)]);
    }

    #[test]
    fn toluene_has_only_normverdi() {
        let toluen = thresholds().get("Toluen").unwrap();
        assert!(toluen.normverdi_only());
        assert_eq!(toluen.normverdi(), dec!(0.3));
    }

    #[test]
    fn thc_fractions_share_aliphatic_limits() {
        let thc = thresholds().get("THC C12-C35").unwrap();
        assert_eq!(thc.code, "Alifater C12-C35");
        assert_eq!(thc.limit(Tier::Three), Some(dec!(600)));
    }

    #[test]
    fn every_threshold_code_is_reachable_from_base_aliases() {
        let targets: std::collections::HashSet<&str> =
            aliases().base.values().map(|s| s.as_str()).collect();
        for entry in thresholds().entries() {
            assert!(
                targets.contains(entry.code.as_str()),
                "no alias resolves to '{}'",
                entry.code
            );
        }
    }

    #[test]
    fn ships_als_and_eurofins_overlays() {
        assert_eq!(overlay_names(), vec!["als", "eurofins"]);
    }

    #[test]
    fn units_load() {
        let u = units();
        assert_eq!(u.solid.canonical, "mg/kg");
        assert_eq!(u.liquid.canonical, "mg/l");
        assert_eq!(u.solid.factors["µg/kg"], dec!(0.001));
    }
}
