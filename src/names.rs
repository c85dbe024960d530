// 🏷️ Composite Name Parser & Classifier - tagged dealer names per source
//
// con_nom stores, per principal, ONE string that carries every known
// trade name for that dealer, each segment tagged by origin:
//
//     "WELCOME: Garage Du Centre; IDOCS: Garage du Centre SAS"
//
// This module splits that string back into per-source name lists and
// classifies each distinct name as common to both systems or exclusive
// to one of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// SOURCE SYSTEMS
// ============================================================================

/// The two upstream identity systems being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceSystem {
    Welcome,
    Idocs,
}

impl SourceSystem {
    /// Tag used in composite name strings and in report labels.
    pub fn name(&self) -> &'static str {
        match self {
            SourceSystem::Welcome => "WELCOME",
            SourceSystem::Idocs => "IDOCS",
        }
    }

    /// One-letter code used in classified display lines ("W: ...").
    pub fn code(&self) -> &'static str {
        match self {
            SourceSystem::Welcome => "W",
            SourceSystem::Idocs => "I",
        }
    }

    /// Recognize a segment tag, ignoring case and surrounding whitespace.
    pub fn from_tag(tag: &str) -> Option<SourceSystem> {
        match tag.trim().to_uppercase().as_str() {
            "WELCOME" => Some(SourceSystem::Welcome),
            "IDOCS" => Some(SourceSystem::Idocs),
            _ => None,
        }
    }

    pub fn all() -> [SourceSystem; 2] {
        [SourceSystem::Welcome, SourceSystem::Idocs]
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// SEGMENT PARSING
// ============================================================================

/// Split a composite string into `(source, content)` pairs.
///
/// Segments are ';'-separated; each segment is "TAG: content". Segments
/// without a colon, with an unknown tag, or with empty content after
/// trimming are silently dropped - upstream strings are messy and a bad
/// segment must never poison the rest.
fn segments(composite: &str) -> impl Iterator<Item = (SourceSystem, &str)> + '_ {
    composite.split(';').filter_map(|seg| {
        let (tag, content) = seg.split_once(':')?;
        let source = SourceSystem::from_tag(tag)?;
        let content = content.trim();
        if content.is_empty() {
            None
        } else {
            Some((source, content))
        }
    })
}

/// Extract, in encounter order, every name tagged with `source`.
///
/// Duplicates are preserved: two "WELCOME: X" segments yield two entries.
/// Deduplication is the classifier's job, not the parser's.
pub fn parse_names(composite: &str, source: SourceSystem) -> Vec<String> {
    segments(composite)
        .filter(|(s, _)| *s == source)
        .map(|(_, content)| content.to_string())
        .collect()
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Per-source partition of the distinct names found in one composite string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameClassification {
    /// Names present under both tags (exact string equality).
    pub common: Vec<String>,
    /// Names present only under the WELCOME tag.
    pub only_welcome: Vec<String>,
    /// Names present only under the IDOCS tag.
    pub only_idocs: Vec<String>,
}

impl NameClassification {
    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && self.only_welcome.is_empty() && self.only_idocs.is_empty()
    }

    /// Total number of distinct names across the three groups.
    pub fn count(&self) -> usize {
        self.common.len() + self.only_welcome.len() + self.only_idocs.len()
    }

    /// First name in display order, used as the dealer's headline name.
    pub fn display_name(&self) -> Option<&str> {
        self.display_order().next()
    }

    fn display_order(&self) -> impl Iterator<Item = &str> {
        self.common
            .iter()
            .chain(&self.only_welcome)
            .chain(&self.only_idocs)
            .map(String::as_str)
    }

    /// Render the partition as labelled lines, common names first:
    /// "W + I: name", then "W: name", then "I: name". Each group keeps
    /// its sorted order.
    pub fn display_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.count());
        for name in &self.common {
            lines.push(format!(
                "{} + {}: {}",
                SourceSystem::Welcome.code(),
                SourceSystem::Idocs.code(),
                name
            ));
        }
        for name in &self.only_welcome {
            lines.push(format!("{}: {}", SourceSystem::Welcome.code(), name));
        }
        for name in &self.only_idocs {
            lines.push(format!("{}: {}", SourceSystem::Idocs.code(), name));
        }
        lines
    }

    /// Rebuild a composite string carrying the same information: common
    /// names are emitted under both tags, exclusive names under theirs.
    /// `classify_names(c.to_composite())` always equals `c`.
    pub fn to_composite(&self) -> String {
        let mut parts = Vec::new();
        for name in self.common.iter().chain(&self.only_welcome) {
            parts.push(format!("{}: {}", SourceSystem::Welcome.name(), name));
        }
        for name in self.common.iter().chain(&self.only_idocs) {
            parts.push(format!("{}: {}", SourceSystem::Idocs.name(), name));
        }
        parts.join(" ; ")
    }
}

/// Classify every distinct name in a composite string by source coverage.
///
/// Matching between the two sources is EXACT string equality on the
/// trimmed content - "Garage Dupont" and "GARAGE DUPONT" are two
/// different names and will land in their respective exclusive groups.
/// Each output group is sorted and duplicate-free.
pub fn classify_names(composite: &str) -> NameClassification {
    let mut welcome: BTreeSet<&str> = BTreeSet::new();
    let mut idocs: BTreeSet<&str> = BTreeSet::new();

    for (source, content) in segments(composite) {
        match source {
            SourceSystem::Welcome => welcome.insert(content),
            SourceSystem::Idocs => idocs.insert(content),
        };
    }

    NameClassification {
        common: welcome
            .intersection(&idocs)
            .map(|s| s.to_string())
            .collect(),
        only_welcome: welcome
            .difference(&idocs)
            .map(|s| s.to_string())
            .collect(),
        only_idocs: idocs
            .difference(&welcome)
            .map(|s| s.to_string())
            .collect(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_basic() {
        let composite = "WELCOME: Garage Nord; IDOCS: Garage Sud; WELCOME: Annexe";
        assert_eq!(
            parse_names(composite, SourceSystem::Welcome),
            vec!["Garage Nord", "Annexe"]
        );
        assert_eq!(parse_names(composite, SourceSystem::Idocs), vec!["Garage Sud"]);
    }

    #[test]
    fn test_parse_names_drops_untagged_segments() {
        // "Foo;Bar" is one IDOCS segment ("Foo") plus one segment with no
        // colon at all ("Bar"), which is dropped.
        assert_eq!(
            parse_names("IDOCS: Foo;Bar", SourceSystem::Welcome),
            Vec::<String>::new()
        );
        assert_eq!(parse_names("IDOCS: Foo;Bar", SourceSystem::Idocs), vec!["Foo"]);
    }

    #[test]
    fn test_parse_names_tag_is_case_insensitive() {
        let composite = "welcome: Spl Littoral ;  Idocs :Marine Est";
        assert_eq!(
            parse_names(composite, SourceSystem::Welcome),
            vec!["Spl Littoral"]
        );
        assert_eq!(parse_names(composite, SourceSystem::Idocs), vec!["Marine Est"]);
    }

    #[test]
    fn test_parse_names_skips_empty_content_and_unknown_tags() {
        let composite = "WELCOME: ; IDOCS: Ok; LEGACY: Nope; :NoTag";
        assert_eq!(parse_names(composite, SourceSystem::Welcome), Vec::<String>::new());
        assert_eq!(parse_names(composite, SourceSystem::Idocs), vec!["Ok"]);
    }

    #[test]
    fn test_parse_names_keeps_duplicates() {
        let composite = "WELCOME: X; WELCOME: X";
        assert_eq!(parse_names(composite, SourceSystem::Welcome), vec!["X", "X"]);
    }

    #[test]
    fn test_classify_common_name() {
        let c = classify_names("WELCOME: ABC; IDOCS: ABC");
        assert_eq!(c.common, vec!["ABC"]);
        assert!(c.only_welcome.is_empty());
        assert!(c.only_idocs.is_empty());
        assert_eq!(c.display_lines(), vec!["W + I: ABC"]);
    }

    #[test]
    fn test_classify_groups_are_sorted() {
        let c = classify_names("WELCOME: XYZ; IDOCS: QRS; WELCOME: ABC");
        assert_eq!(c.only_welcome, vec!["ABC", "XYZ"]);
        assert_eq!(c.only_idocs, vec!["QRS"]);
        assert_eq!(c.display_lines(), vec!["W: ABC", "W: XYZ", "I: QRS"]);
    }

    #[test]
    fn test_classify_is_exact_match_only() {
        // Case differs -> not common.
        let c = classify_names("WELCOME: Garage Dupont; IDOCS: GARAGE DUPONT");
        assert!(c.common.is_empty());
        assert_eq!(c.only_welcome, vec!["Garage Dupont"]);
        assert_eq!(c.only_idocs, vec!["GARAGE DUPONT"]);
    }

    #[test]
    fn test_classify_deduplicates_within_source() {
        let c = classify_names("WELCOME: X; WELCOME: X; IDOCS: X");
        assert_eq!(c.common, vec!["X"]);
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_classify_empty_input() {
        let c = classify_names("");
        assert!(c.is_empty());
        assert_eq!(c.count(), 0);
        assert!(c.display_name().is_none());
        assert!(c.display_lines().is_empty());
    }

    #[test]
    fn test_display_name_prefers_common() {
        let c = classify_names("WELCOME: Solo; IDOCS: Both; WELCOME: Both");
        assert_eq!(c.display_name(), Some("Both"));
    }

    #[test]
    fn test_composite_round_trip() {
        let original = classify_names(
            "WELCOME: Garage Nord; IDOCS: Garage Nord; WELCOME: Annexe Ouest; IDOCS: Dépôt Sud",
        );
        let rebuilt = classify_names(&original.to_composite());
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_source_tag_round_trip() {
        for source in SourceSystem::all() {
            assert_eq!(SourceSystem::from_tag(source.name()), Some(source));
        }
        assert_eq!(SourceSystem::from_tag(" idocs "), Some(SourceSystem::Idocs));
        assert_eq!(SourceSystem::from_tag("SAP"), None);
    }
}
