//! English to Portuguese translation of routing instructions.
//!
//! Only texts starting with one of the known verbs are translated. The
//! replacement table is applied in order on the lowercased text, whole words
//! only, and the first letter of the result is capitalized.

use std::sync::OnceLock;

use regex::Regex;

/// Ordered replacement table. Earlier entries win (`onto` before `on`).
const TRANSLATIONS: &[(&str, &str)] = &[
    ("drive", "siga"),
    ("turn", "vire"),
    ("left", "à esquerda"),
    ("right", "à direita"),
    ("northwest", "noroeste"),
    ("northeast", "nordeste"),
    ("southwest", "sudoeste"),
    ("southeast", "sudeste"),
    ("north", "norte"),
    ("south", "sul"),
    ("east", "leste"),
    ("west", "oeste"),
    ("onto", "para"),
    ("continue", "continue"),
    ("straight", "em frente"),
    ("on", "na"),
    ("at", "na"),
    ("roundabout", "rotatória"),
    ("exit", "saída"),
    ("keep", "mantenha"),
    ("go", "vá"),
    ("head", "siga"),
    ("take", "pegue"),
    ("merge", "incorpore"),
    ("follow", "siga"),
    ("destination", "destino"),
    ("will be", "estará"),
    ("arrive", "chegue"),
];

fn translatable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(drive|turn|head|go|take|continue)").expect("static regex is valid")
    })
}

fn word_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        TRANSLATIONS
            .iter()
            .map(|(en, pt)| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(en));
                (
                    Regex::new(&pattern).expect("translation table entries are valid"),
                    *pt,
                )
            })
            .collect()
    })
}

/// True if the instruction starts with a verb we translate.
pub fn is_translatable(text: &str) -> bool {
    translatable_pattern().is_match(text)
}

/// Translates `text` word by word and capitalizes the first letter.
pub fn translate(text: &str) -> String {
    let mut translated = text.to_lowercase();
    for (pattern, replacement) in word_patterns() {
        if pattern.is_match(&translated) {
            translated = pattern
                .replace_all(&translated, regex::NoExpand(replacement))
                .into_owned();
        }
    }
    capitalize_first(&translated)
}

/// Translates when [`is_translatable`], otherwise returns the text unchanged.
pub fn localize(text: &str) -> String {
    if !text.is_empty() && is_translatable(text) {
        translate(text)
    } else {
        text.to_string()
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_turn() {
        assert_eq!(
            translate("Turn left onto Rua Episcopal"),
            "Vire à esquerda para rua episcopal"
        );
    }

    #[test]
    fn test_onto_wins_over_on() {
        assert_eq!(translate("Continue onto SP-310"), "Continue para sp-310");
        assert_eq!(translate("Drive on Avenida São Carlos"), "Siga na avenida são carlos");
    }

    #[test]
    fn test_compass_directions() {
        assert_eq!(translate("Head northwest"), "Siga noroeste");
        assert_eq!(translate("Head south"), "Siga sul");
    }

    #[test]
    fn test_multi_word_phrase() {
        assert_eq!(
            translate("Go straight, destination will be on the right"),
            "Vá em frente, destino estará na the à direita"
        );
    }

    #[test]
    fn test_localize_only_known_verbs() {
        assert_eq!(localize("Turn right"), "Vire à direita");
        assert_eq!(localize("You have arrived"), "You have arrived");
        assert_eq!(localize("Vire à direita"), "Vire à direita");
        assert_eq!(localize(""), "");
    }

    #[test]
    fn test_words_inside_other_words_untouched() {
        // "on" inside "station" and "at" inside "state" are not whole words.
        assert_eq!(translate("Take station state"), "Pegue station state");
    }
}
