//! Tiers encoded as cell fill colours in consultants' spreadsheets.
//!
//! A colour-coded tier is only ever a cross-check. The computed tier wins
//! whenever one exists.

use crate::classify::outcome::Tier;

/// Decode an ARGB fill colour (e.g. "FF92D050") to a tier.
pub fn tier_from_argb(argb: &str) -> Option<Tier> {
    let code = argb.trim().trim_start_matches('#').to_uppercase();
    // Six-digit RGB gets an opaque alpha.
    let code = if code.len() == 6 {
        format!("FF{code}")
    } else {
        code
    };
    match code.as_str() {
        "FF00B0F0" => Some(Tier::One),
        "FF92D050" => Some(Tier::Two),
        "FFFFFF00" => Some(Tier::Three),
        "FFFFC000" => Some(Tier::Four),
        "FFFF0000" | "FFEF3A3F" => Some(Tier::Five),
        _ => None,
    }
}

/// Outcome of comparing a computed tier with a colour-coded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Both agree, or only the computed tier exists.
    Computed(Tier),
    /// No computed tier; the colour-coded tier is used.
    FromColour(Tier),
    /// Both exist and disagree; the computed tier is kept.
    Mismatch { computed: Tier, reported: Tier },
    Neither,
}

impl Reconciled {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Reconciled::Computed(t) | Reconciled::FromColour(t) => Some(*t),
            Reconciled::Mismatch { computed, .. } => Some(*computed),
            Reconciled::Neither => None,
        }
    }
}

pub fn reconcile(computed: Option<Tier>, reported: Option<Tier>) -> Reconciled {
    match (computed, reported) {
        (Some(c), Some(r)) if c != r => Reconciled::Mismatch {
            computed: c,
            reported: r,
        },
        (Some(c), _) => Reconciled::Computed(c),
        (None, Some(r)) => Reconciled::FromColour(r),
        (None, None) => Reconciled::Neither,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_palette() {
        assert_eq!(tier_from_argb("FF00B0F0"), Some(Tier::One));
        assert_eq!(tier_from_argb("FF92D050"), Some(Tier::Two));
        assert_eq!(tier_from_argb("FFFFFF00"), Some(Tier::Three));
        assert_eq!(tier_from_argb("FFFFC000"), Some(Tier::Four));
        assert_eq!(tier_from_argb("FFFF0000"), Some(Tier::Five));
        assert_eq!(tier_from_argb("FFEF3A3F"), Some(Tier::Five));
    }

    #[test]
    fn accepts_rgb_and_lowercase() {
        assert_eq!(tier_from_argb("#92d050"), Some(Tier::Two));
    }

    #[test]
    fn unknown_colour_is_none() {
        assert_eq!(tier_from_argb("FF4472C4"), None);
        assert_eq!(tier_from_argb(""), None);
    }

    #[test]
    fn computed_tier_wins_on_mismatch() {
        let r = reconcile(Some(Tier::Four), Some(Tier::Two));
        assert_eq!(
            r,
            Reconciled::Mismatch {
                computed: Tier::Four,
                reported: Tier::Two
            }
        );
        assert_eq!(r.tier(), Some(Tier::Four));
    }

    #[test]
    fn colour_fills_gap_only() {
        assert_eq!(reconcile(None, Some(Tier::Three)).tier(), Some(Tier::Three));
        assert_eq!(reconcile(Some(Tier::One), None), Reconciled::Computed(Tier::One));
        assert_eq!(reconcile(None, None).tier(), None);
    }
}
