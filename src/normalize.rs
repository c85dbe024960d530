// 🔤 Identifier Normalizer - accent/case/punctuation-insensitive keys
//
// The WELCOME and IDOCS exports disagree on casing, accenting and stray
// control characters (a literal '\r' glued to the end of an id is common
// in the upstream dumps). Cross-source matching is exact equality AFTER
// this normalization - nothing fuzzier.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize an identifier for cross-source comparison.
///
/// Decomposes to NFD, drops combining marks (accents), drops every
/// character that is not an ASCII letter, then uppercases what is left.
/// Total and idempotent: any input produces a value, empty input produces
/// an empty string.
///
/// ```
/// use dealerview::normalize_id;
///
/// assert_eq!(normalize_id("Société Générale"), "SOCIETEGENERALE");
/// assert_eq!(normalize_id("jean.dupont\r"), "JEANDUPONT");
/// ```
pub fn normalize_id(raw: &str) -> String {
    raw.nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Same as [`normalize_id`] for a possibly absent value.
///
/// Absent is treated as empty: `normalize_opt(None) == ""`.
pub fn normalize_opt(raw: Option<&str>) -> String {
    raw.map(normalize_id).unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accent_and_case_insensitive() {
        assert_eq!(normalize_id("Société"), "SOCIETE");
        assert_eq!(normalize_id("SOCIETE"), "SOCIETE");
        assert_eq!(normalize_id("société"), normalize_id("SOCIÉTÉ"));
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_id("Jérôme Dûpont-Lefèbvre");
        let twice = normalize_id(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "JEROMEDUPONTLEFEBVRE");
    }

    #[test]
    fn test_empty_and_absent() {
        assert_eq!(normalize_id(""), "");
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize_opt(Some("")), "");
        assert_eq!(normalize_opt(Some("abc")), "ABC");
    }

    #[test]
    fn test_non_letters_dropped() {
        // Digits, punctuation and control characters all go away.
        assert_eq!(normalize_id("jean.dupont@ext"), "JEANDUPONTEXT");
        assert_eq!(normalize_id("du pont 42\r"), "DUPONT");
        assert_eq!(normalize_id("12137\r"), "");
    }

    #[test]
    fn test_stray_carriage_return_matches_clean_id() {
        // The exact failure mode seen in the upstream dumps.
        assert_eq!(normalize_id("mmartin\r"), normalize_id("MMARTIN"));
    }
}
