use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A regulatory threshold table: ordered tier boundaries per parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdTableDef {
    pub name: String,
    /// Written to the classification_basis column of every classification.
    pub basis: String,
    pub version: String,
    /// Unit every boundary is expressed in.
    pub unit: String,
    /// Tier number ("1".."5") -> description.
    #[serde(default)]
    pub tiers: BTreeMap<String, String>,
    pub thresholds: Vec<ThresholdDef>,
}

/// Upper bounds of tier 1, 2, ... for one parameter. Tiers past the end of
/// `limits` are undefined, so coverage is always contiguous from tier 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdDef {
    pub code: String,
    pub name: String,
    /// Decimal strings, e.g. ["8", "20", "50", "600", "1000"].
    pub limits: Vec<Decimal>,
    /// Other canonical codes measured against the same limits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_applies_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Raw label -> canonical code, split into a shared base and per-lab overlays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasTableDef {
    pub version: String,
    /// Spreadsheet artifacts that mean "skip this row".
    #[serde(default)]
    pub placeholders: Vec<String>,
    pub base: BTreeMap<String, String>,
    #[serde(default)]
    pub overlays: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTableDef {
    pub solid: MatrixUnitsDef,
    pub liquid: MatrixUnitsDef,
    /// Non-concentration units that are carried through unconverted.
    #[serde(default)]
    pub passthrough: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixUnitsDef {
    pub canonical: String,
    /// Unit label -> factor to the canonical unit.
    pub factors: BTreeMap<String, Decimal>,
}
