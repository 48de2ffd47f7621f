use crate::model::Matrix;
use crate::reference::builtin;
use crate::reference::lookup_key;
use crate::reference::schema::UnitTableDef;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// What kind of quantity a unit label denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitClass {
    Solid,
    Liquid,
    /// Dry matter, conductivity, temperature and other non-concentrations.
    Passthrough,
    Unknown,
}

/// A converted value. `known` is false when a unit was missing from the
/// table and the identity factor was used instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub value: Decimal,
    pub unit: String,
    pub factor: Decimal,
    pub known: bool,
}

#[derive(Debug, Clone)]
struct MatrixUnits {
    canonical: String,
    factors: HashMap<String, Decimal>,
}

impl MatrixUnits {
    fn factor(&self, unit: &str) -> Option<Decimal> {
        self.factors.get(&lookup_key(unit)).copied()
    }
}

/// Converts concentrations between unit labels via per-matrix factors to a
/// canonical unit (mg/kg for solids, mg/l for liquids).
#[derive(Debug, Clone)]
pub struct UnitConverter {
    solid: MatrixUnits,
    liquid: MatrixUnits,
    passthrough: HashSet<String>,
}

static BUILTIN: LazyLock<UnitConverter> = LazyLock::new(|| UnitConverter::new(builtin::units()));

impl UnitConverter {
    pub fn new(def: &UnitTableDef) -> Self {
        let build = |units: &crate::reference::schema::MatrixUnitsDef| MatrixUnits {
            canonical: units.canonical.clone(),
            factors: units
                .factors
                .iter()
                .map(|(k, v)| (lookup_key(k), *v))
                .collect(),
        };
        UnitConverter {
            solid: build(&def.solid),
            liquid: build(&def.liquid),
            passthrough: def.passthrough.iter().map(|u| lookup_key(u)).collect(),
        }
    }

    /// Converter over the embedded unit table.
    pub fn builtin() -> &'static UnitConverter {
        &BUILTIN
    }

    fn matrix(&self, matrix: Matrix) -> &MatrixUnits {
        match matrix {
            Matrix::Solid => &self.solid,
            Matrix::Liquid => &self.liquid,
        }
    }

    pub fn canonical(&self, matrix: Matrix) -> &str {
        &self.matrix(matrix).canonical
    }

    /// Factor from `unit` to the canonical unit of `matrix`.
    pub fn factor(&self, unit: &str, matrix: Matrix) -> Option<Decimal> {
        self.matrix(matrix).factor(unit)
    }

    pub fn unit_class(&self, unit: &str) -> UnitClass {
        let key = lookup_key(unit);
        if self.solid.factors.contains_key(&key) {
            UnitClass::Solid
        } else if self.liquid.factors.contains_key(&key) {
            UnitClass::Liquid
        } else if self.passthrough.contains(&key) {
            UnitClass::Passthrough
        } else {
            UnitClass::Unknown
        }
    }

    /// Matrix a unit belongs to, or `fallback` when the label does not say.
    pub fn matrix_for(&self, unit: &str, fallback: Matrix) -> Matrix {
        match self.unit_class(unit) {
            UnitClass::Solid => Matrix::Solid,
            UnitClass::Liquid => Matrix::Liquid,
            UnitClass::Passthrough | UnitClass::Unknown => fallback,
        }
    }

    /// `value * factor(from) / factor(to)` within one matrix. `to` defaults to
    /// the canonical unit. Unknown units count as factor 1 and are logged.
    ///
    /// Returns None when the converted value does not fit in a `Decimal`.
    pub fn convert(
        &self,
        value: Decimal,
        from: &str,
        to: Option<&str>,
        matrix: Matrix,
    ) -> Option<Conversion> {
        let units = self.matrix(matrix);
        let to_label = to.unwrap_or(&units.canonical);

        let from_factor = units.factor(from);
        let to_factor = units.factor(to_label);
        if from_factor.is_none() {
            tracing::warn!(unit = from, %matrix, "unknown unit, using factor 1");
        }
        if to_factor.is_none() {
            tracing::warn!(unit = to_label, %matrix, "unknown target unit, using factor 1");
        }

        let factor = from_factor
            .unwrap_or(Decimal::ONE)
            .checked_div(to_factor.unwrap_or(Decimal::ONE))?;
        let unit = if from_factor.is_some() {
            to_label.trim().to_string()
        } else {
            from.trim().to_string()
        };

        Some(Conversion {
            value: value.checked_mul(factor)?.normalize(),
            unit,
            factor,
            known: from_factor.is_some() && to_factor.is_some(),
        })
    }

    /// Convert to the canonical unit of `matrix`.
    pub fn to_canonical(&self, value: Decimal, from: &str, matrix: Matrix) -> Option<Conversion> {
        self.convert(value, from, None, matrix)
    }
}

/// Convert with the embedded unit table.
pub fn convert(value: Decimal, from: &str, to: Option<&str>, matrix: Matrix) -> Option<Conversion> {
    UnitConverter::builtin().convert(value, from, to, matrix)
}
