//! Address assembly shared by the reverse-geocoding providers.
//!
//! Providers hand over raw fields in priority order; [`AddressParts`] drops
//! blanks, removes case-insensitive duplicates (keeping the first spelling
//! seen) and joins the survivors with `", "`.

use serde_json::Value;

/// Name fragments that mark a feature as a point of interest.
///
/// Matched as substrings of the lowercased feature name.
pub const POI_KEYWORDS: &[&str] = &[
    "hospital",
    "unimed",
    "escola",
    "posto",
    "clinica",
    "santa casa",
    "pronto",
    "upa",
    "centro",
    "instituto",
    "faculdade",
    "universidade",
    "igreja",
    "shopping",
    "mercado",
    "farmácia",
];

/// Macro-region names some providers report in the state field.
///
/// These are too broad to help a driver and are left out of the address.
pub const REGIONAL_STATE_VALUES: &[&str] = &[
    "Southeast",
    "South",
    "Northeast",
    "North",
    "Central-West",
    "Sudeste",
    "Sul",
    "Nordeste",
    "Norte",
    "Centro-Oeste",
];

/// Returns true if the state value names a macro-region rather than a state.
pub fn is_regional_state(state: &str) -> bool {
    REGIONAL_STATE_VALUES.contains(&state)
}

/// Returns true if the lowercased name contains any POI keyword.
pub fn name_has_poi_keyword(name: &str) -> bool {
    let lowered = name.to_lowercase();
    POI_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Ordered, de-duplicated list of address fragments.
#[derive(Debug, Default, Clone)]
pub struct AddressParts {
    parts: Vec<String>,
}

impl AddressParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment; `None` and empty strings are ignored.
    pub fn push(&mut self, part: Option<&str>) -> &mut Self {
        if let Some(part) = part.filter(|p| !p.is_empty()) {
            self.parts.push(part.to_string());
        }
        self
    }

    /// Raw fragments in insertion order, duplicates included.
    pub fn raw(&self) -> &[String] {
        &self.parts
    }

    /// Fragments with case-insensitive duplicates removed.
    ///
    /// Comparison trims and lowercases; the first original spelling wins.
    pub fn unique(&self) -> Vec<&str> {
        let mut seen: Vec<String> = Vec::with_capacity(self.parts.len());
        let mut unique = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let normalized = part.trim().to_lowercase();
            if !seen.contains(&normalized) {
                seen.push(normalized);
                unique.push(part.as_str());
            }
        }
        unique
    }

    /// Joins at most `max_parts` unique fragments, or `None` if there are none.
    pub fn build(&self, max_parts: usize) -> Option<String> {
        let unique = self.unique();
        if unique.is_empty() {
            return None;
        }
        Some(
            unique
                .into_iter()
                .take(max_parts)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// First non-empty value among the candidates.
pub fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find(|s| !s.is_empty())
}

/// Loose presence test for tag values that may arrive as any JSON type.
///
/// `null`, `false`, `0` and `""` count as absent.
pub fn tag_present(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Tag value as text, if it is a non-empty string.
pub fn tag_text(value: &Option<Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dedup_is_case_insensitive_and_keeps_first_spelling() {
        let mut parts = AddressParts::new();
        parts
            .push(Some("Rua A"))
            .push(Some("rua a"))
            .push(Some("Centro"));

        assert_eq!(parts.build(5).as_deref(), Some("Rua A, Centro"));
    }

    #[test]
    fn test_dedup_ignores_surrounding_whitespace() {
        let mut parts = AddressParts::new();
        parts.push(Some("Centro")).push(Some(" centro "));
        assert_eq!(parts.unique(), vec!["Centro"]);
    }

    #[test]
    fn test_build_caps_parts() {
        let mut parts = AddressParts::new();
        for p in ["a", "b", "c", "d", "e", "f"] {
            parts.push(Some(p));
        }
        assert_eq!(parts.build(4).as_deref(), Some("a, b, c, d"));
        assert_eq!(parts.build(5).as_deref(), Some("a, b, c, d, e"));
    }

    #[test]
    fn test_build_empty_is_none() {
        let mut parts = AddressParts::new();
        parts.push(None).push(Some(""));
        assert!(parts.raw().is_empty());
        assert_eq!(parts.build(5), None);
    }

    #[test]
    fn test_poi_keywords() {
        assert!(name_has_poi_keyword("Hospital Municipal"));
        assert!(name_has_poi_keyword("SANTA CASA de Misericórdia"));
        assert!(name_has_poi_keyword("Farmácia Popular"));
        assert!(!name_has_poi_keyword("Rua Paulino Botelho"));
    }

    #[test]
    fn test_regional_states() {
        assert!(is_regional_state("Sudeste"));
        assert!(is_regional_state("Southeast"));
        assert!(!is_regional_state("São Paulo"));
        assert!(!is_regional_state("SP"));
    }

    #[test]
    fn test_first_present_skips_empty() {
        let a = Some(String::new());
        let b = None;
        let c = Some("Jardim".to_string());
        assert_eq!(first_present(&[&a, &b, &c]), Some("Jardim"));
        assert_eq!(first_present(&[&a, &b]), None);
    }

    #[test]
    fn test_tag_presence() {
        assert!(tag_present(&Some(json!("hospital"))));
        assert!(tag_present(&Some(json!({"type": "hospital"}))));
        assert!(!tag_present(&Some(json!(""))));
        assert!(!tag_present(&Some(json!(null))));
        assert!(!tag_present(&Some(json!(false))));
        assert!(!tag_present(&None));

        assert_eq!(tag_text(&Some(json!("yes"))), Some("yes"));
        assert_eq!(tag_text(&Some(json!(1))), None);
    }
}
