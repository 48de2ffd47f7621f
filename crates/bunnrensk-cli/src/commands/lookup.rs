use bunnrensk_core::error::BunnrenskError;
use bunnrensk_core::model::Matrix;
use bunnrensk_core::parsing::{parse_number, parse_value, Normalizer, ParsedValue, Resolution};
use bunnrensk_core::reference::builtin;
use bunnrensk_core::units::UnitConverter;

pub fn normalize(labels: &[String], overlays: &[String]) -> Result<(), BunnrenskError> {
    let normalizer = if overlays.is_empty() {
        Normalizer::builtin(&builtin::overlay_names())?
    } else {
        Normalizer::builtin(overlays)?
    };

    let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(10);
    for label in labels {
        let shown = match normalizer.normalize(label) {
            Resolution::Resolved(code) => code,
            Resolution::Placeholder => "(placeholder, row skipped)".to_string(),
            Resolution::Unresolved(u) => format!("unresolved (tried: {})", u.tried.join(" | ")),
        };
        println!("  {:<width$}  -> {}", label, shown, width = width);
    }
    Ok(())
}

pub fn parse_values(values: &[String]) -> Result<(), BunnrenskError> {
    let width = values.iter().map(|v| v.chars().count()).max().unwrap_or(10);
    for raw in values {
        let parsed = parse_value(raw);
        let (value, below_limit, loq) = parsed.triple();
        let kind = match &parsed {
            ParsedValue::Missing => "missing",
            ParsedValue::Measured(_) => "measured",
            ParsedValue::BelowLimit(_) => "below limit",
            ParsedValue::NotDetected => "not detected",
            ParsedValue::Unparseable(_) => "unparseable",
        };
        println!(
            "  {:<width$}  -> value={} below_limit={} loq={}  ({})",
            format!("{:?}", raw),
            value.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            below_limit,
            loq.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            kind,
            width = width + 2
        );
    }
    Ok(())
}

pub fn convert(value: &str, from: &str, to: Option<&str>, matrix: Matrix) -> Result<(), BunnrenskError> {
    let number = parse_number(value)
        .ok_or_else(|| BunnrenskError::ParseError(format!("'{}' is not a number", value)))?;

    let units = UnitConverter::builtin();
    let matrix = units.matrix_for(from, matrix);
    let conversion = units.convert(number, from, to, matrix).ok_or_else(|| {
        BunnrenskError::ParseError(format!("{} {} is out of range after conversion", number, from.trim()))
    })?;

    println!("{} {} = {} {}", number, from.trim(), conversion.value, conversion.unit);
    if !conversion.known {
        eprintln!("  warning: unit not in the {} unit table, factor 1 used", matrix);
    }
    Ok(())
}
