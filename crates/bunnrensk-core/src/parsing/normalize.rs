use crate::error::BunnrenskError;
use crate::reference::builtin;
use crate::reference::lookup_key;
use crate::reference::schema::AliasTableDef;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Outcome of mapping a raw parameter label to a canonical code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    /// A spreadsheet artifact such as an unnamed column. Skip the row.
    Placeholder,
    Unresolved(UnresolvedLabel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedLabel {
    pub label: String,
    /// Lookup forms tried, in order.
    pub tried: Vec<String>,
}

impl Resolution {
    pub fn code(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(code) => Some(code),
            _ => None,
        }
    }

    /// Strict form for callers that cannot proceed without a code.
    pub fn into_code(self, raw: &str) -> Result<String, BunnrenskError> {
        match self {
            Resolution::Resolved(code) => Ok(code),
            Resolution::Placeholder => Err(BunnrenskError::PlaceholderLabel(raw.to_string())),
            Resolution::Unresolved(u) => Err(BunnrenskError::UnresolvedParameter {
                label: u.label,
                tried: u.tried.join(" | "),
            }),
        }
    }
}

/// Layered alias lookup over the base table plus selected lab overlays.
#[derive(Debug, Clone)]
pub struct Normalizer {
    aliases: HashMap<String, String>,
    placeholders: HashSet<String>,
    overlays: Vec<String>,
}

impl Normalizer {
    /// Build from an alias table. Overlays are applied in order on top of the
    /// base, so a later overlay overrides both the base and earlier overlays.
    pub fn new<S: AsRef<str>>(def: &AliasTableDef, overlays: &[S]) -> Result<Self, BunnrenskError> {
        let mut aliases: HashMap<String, String> = def
            .base
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut applied = Vec::with_capacity(overlays.len());
        for name in overlays {
            let name = name.as_ref();
            let overlay = def
                .overlays
                .get(name)
                .ok_or_else(|| BunnrenskError::UnknownOverlay(name.to_string()))?;
            for (k, v) in overlay {
                aliases.insert(k.clone(), v.clone());
            }
            applied.push(name.to_string());
        }

        Ok(Normalizer {
            aliases,
            placeholders: def.placeholders.iter().cloned().collect(),
            overlays: applied,
        })
    }

    /// Embedded alias table with the given overlays.
    pub fn builtin<S: AsRef<str>>(overlays: &[S]) -> Result<Self, BunnrenskError> {
        Normalizer::new(builtin::aliases(), overlays)
    }

    pub fn overlays(&self) -> &[String] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Map a raw label to a canonical code.
    ///
    /// Tries, in order: the label itself (trimmed, lowercase), the label with
    /// trailing footnote markers (`*`, `^`) removed, and that form with a
    /// trailing parenthetical annotation removed. Never guesses.
    pub fn normalize(&self, raw: &str) -> Resolution {
        let clean = lookup_key(raw);

        if self.placeholders.contains(&clean) {
            tracing::debug!(label = raw, "placeholder column skipped");
            return Resolution::Placeholder;
        }

        let stripped = strip_markers(&clean);
        let without_note = strip_trailing_parenthetical(&stripped);
        let forms = [Some(clean), Some(stripped), without_note];

        let mut tried: Vec<String> = Vec::with_capacity(3);
        for form in forms.into_iter().flatten() {
            if form.is_empty() || tried.contains(&form) {
                continue;
            }
            if let Some(code) = self.aliases.get(&form) {
                return Resolution::Resolved(code.clone());
            }
            tried.push(form);
        }

        tracing::warn!(label = raw, tried = ?tried, "unresolved parameter label");
        Resolution::Unresolved(UnresolvedLabel {
            label: raw.to_string(),
            tried,
        })
    }
}

/// Remove trailing footnote markers.
fn strip_markers(s: &str) -> String {
    s.trim_end_matches(['*', '^']).trim_end().to_string()
}

/// Remove the last balanced parenthetical group if the string ends with it:
/// "benzo(a)pyren (sum)" -> "benzo(a)pyren", "arsen (as)" -> "arsen".
fn strip_trailing_parenthetical(s: &str) -> Option<String> {
    if !s.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in s.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let head = s[..i].trim_end();
                    return (!head.is_empty()).then(|| head.to_string());
                }
            }
            _ => {}
        }
    }
    None
}

static DEFAULT_NORMALIZER: LazyLock<Normalizer> = LazyLock::new(|| {
    Normalizer::builtin(&builtin::overlay_names()).expect("embedded overlays are present")
});

/// Normalize with the embedded alias table and every shipped overlay.
pub fn normalize(raw: &str) -> Resolution {
    DEFAULT_NORMALIZER.normalize(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(code: &str) -> Resolution {
        Resolution::Resolved(code.to_string())
    }

    #[test]
    fn exact_match_is_case_and_space_insensitive() {
        assert_eq!(normalize("Arsen"), resolved("As"));
        assert_eq!(normalize("  ARSEN  "), resolved("As"));
        assert_eq!(normalize("Sum  PAH-16"), resolved("PAH16"));
    }

    #[test]
    fn footnote_markers_do_not_change_code() {
        assert_eq!(normalize("Kvikksølv^"), resolved("Hg"));
        assert_eq!(normalize("Kvikksølv*"), resolved("Hg"));
        assert_eq!(normalize("Kvikksølv*^"), resolved("Hg"));
    }

    #[test]
    fn trailing_parenthetical_is_stripped() {
        assert_eq!(normalize("Arsen (As)"), resolved("As"));
        assert_eq!(normalize("Benzo(a)pyren (sum)"), resolved("BaP"));
    }

    #[test]
    fn inner_parentheses_are_kept() {
        assert_eq!(normalize("Indeno(1,2,3-cd)pyren"), resolved("Indeno(1,2,3-cd)pyren"));
        assert_eq!(normalize("Cr(VI)"), resolved("Cr_VI"));
    }

    #[test]
    fn thc_and_aliphatic_fractions() {
        assert_eq!(normalize("Fraksjon >C12-C35"), resolved("THC C12-C35"));
        assert_eq!(normalize("Alifater >C8-C10"), resolved("Alifater C8-C10"));
        assert_eq!(normalize("Sum alifater >C12-C35 (M1)"), resolved("Alifater C12-C35"));
    }

    #[test]
    fn xylene_isomers_stay_distinct() {
        assert_eq!(normalize("Xylener"), resolved("Xylen"));
        assert_eq!(normalize("m,p-Xylen"), resolved("Xylen_mp"));
        assert_eq!(normalize("o-Xylen"), resolved("Xylen_o"));
    }

    #[test]
    fn placeholder_is_not_an_error() {
        assert_eq!(normalize("Kolonne1"), Resolution::Placeholder);
    }

    #[test]
    fn unknown_label_reports_forms_tried() {
        match normalize("Foobarium (Fb)*") {
            Resolution::Unresolved(u) => {
                assert_eq!(u.label, "Foobarium (Fb)*");
                assert_eq!(
                    u.tried,
                    vec!["foobarium (fb)*", "foobarium (fb)", "foobarium"]
                );
            }
            other => panic!("expected unresolved, got {other:?}"),
        }
    }

    #[test]
    fn strict_callers_get_an_error() {
        assert!(normalize("Foobarium").into_code("Foobarium").is_err());
        assert_eq!(normalize("Bly").into_code("Bly").unwrap(), "Pb");
    }

    #[test]
    fn overlay_only_labels_need_their_overlay() {
        let base_only = Normalizer::builtin::<&str>(&[]).unwrap();
        assert!(matches!(
            base_only.normalize("Monoklorbensen"),
            Resolution::Unresolved(_)
        ));
        let als = Normalizer::builtin(&["als"]).unwrap();
        assert_eq!(als.normalize("Monoklorbensen"), resolved("Monoklorbenzen"));
    }

    #[test]
    fn unknown_overlay_rejected() {
        assert!(Normalizer::builtin(&["alcontrol"]).is_err());
    }

    #[test]
    fn every_alias_key_resolves_to_its_code() {
        let def = builtin::aliases();
        let n = Normalizer::builtin::<&str>(&[]).unwrap();
        for (label, code) in &def.base {
            assert_eq!(n.normalize(label), resolved(code), "label '{label}'");
            assert_eq!(n.normalize(&format!("  {}  ", label.to_uppercase())), resolved(code));
            assert_eq!(n.normalize(&format!("{label}^")), resolved(code), "label '{label}^'");
            assert_eq!(n.normalize(&format!("{label}*")), resolved(code), "label '{label}*'");
        }
    }

    #[test]
    fn strip_trailing_parenthetical_edge_cases() {
        assert_eq!(strip_trailing_parenthetical("(sum)"), None);
        assert_eq!(strip_trailing_parenthetical("abc"), None);
        assert_eq!(strip_trailing_parenthetical("a b)"), None);
        assert_eq!(
            strip_trailing_parenthetical("olje (sum (m1))"),
            Some("olje".to_string())
        );
    }
}
