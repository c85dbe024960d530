// 🔗 IWU Aggregation - collapse one-row-per-credential into one-row-per-person
//
// The detail exports carry one row per (person, IWU credential). The same
// person therefore shows up N times, and a person with no credential shows
// up with an empty or sentinel IWU. Reports want exactly one row per raw
// identity with the credential set folded into it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel the upstream systems write when a user has no IWU credential.
pub const NO_IWU: &str = "NONE";

/// One raw row from a user detail export: identity plus at most one IWU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    #[serde(rename = "id_cree")]
    pub user_id: String,
    #[serde(rename = "nom", default)]
    pub last_name: String,
    #[serde(rename = "prenom", default)]
    pub first_name: String,
    #[serde(rename = "iwu_id", default)]
    pub iwu_id: Option<String>,
}

/// One person (grouped by the RAW identity triple) with every distinct
/// usable IWU credential attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedUser {
    pub user_id: String,
    pub last_name: String,
    pub first_name: String,
    /// Sorted, deduplicated, with empty and sentinel values removed.
    /// Empty means the person has no usable credential at all.
    pub iwu_ids: Vec<String>,
}

impl AggregatedUser {
    pub fn has_iwu(&self) -> bool {
        !self.iwu_ids.is_empty()
    }

    /// "111;222" style display, or the sentinel when nothing survived.
    pub fn iwu_display(&self) -> String {
        if self.iwu_ids.is_empty() {
            NO_IWU.to_string()
        } else {
            self.iwu_ids.join(";")
        }
    }
}

/// Group rows by the exact `(user_id, last_name, first_name)` triple and
/// fold the IWU column of each group into a sorted distinct set, dropping
/// empty and sentinel values.
///
/// Grouping is on RAW values on purpose: two spellings of the same person
/// stay separate here and are only brought together later by normalized-id
/// matching. Output order follows the group key.
pub fn aggregate_users(rows: &[UserRow]) -> Vec<AggregatedUser> {
    let mut groups: BTreeMap<(&str, &str, &str), BTreeSet<&str>> = BTreeMap::new();

    for row in rows {
        let key = (
            row.user_id.as_str(),
            row.last_name.as_str(),
            row.first_name.as_str(),
        );
        let iwus = groups.entry(key).or_default();
        if let Some(iwu) = row.iwu_id.as_deref() {
            if !iwu.is_empty() && iwu != NO_IWU {
                iwus.insert(iwu);
            }
        }
    }

    groups
        .into_iter()
        .map(|((user_id, last_name, first_name), iwus)| AggregatedUser {
            user_id: user_id.to_string(),
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            iwu_ids: iwus.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user_id: &str, nom: &str, prenom: &str, iwu: Option<&str>) -> UserRow {
        UserRow {
            user_id: user_id.to_string(),
            last_name: nom.to_string(),
            first_name: prenom.to_string(),
            iwu_id: iwu.map(str::to_string),
        }
    }

    #[test]
    fn test_multiple_iwus_are_sorted_and_joined() {
        let rows = vec![
            row("jdupont", "Dupont", "Jean", Some("222")),
            row("jdupont", "Dupont", "Jean", Some("111")),
        ];
        let agg = aggregate_users(&rows);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].iwu_ids, vec!["111", "222"]);
        assert_eq!(agg[0].iwu_display(), "111;222");
        assert!(agg[0].has_iwu());
    }

    #[test]
    fn test_sentinel_and_empty_values_fold_to_none() {
        let rows = vec![
            row("jdupont", "Dupont", "Jean", Some("NONE")),
            row("jdupont", "Dupont", "Jean", Some("")),
            row("jdupont", "Dupont", "Jean", None),
        ];
        let agg = aggregate_users(&rows);
        assert_eq!(agg.len(), 1);
        assert!(agg[0].iwu_ids.is_empty());
        assert_eq!(agg[0].iwu_display(), "NONE");
        assert!(!agg[0].has_iwu());
    }

    #[test]
    fn test_sentinel_dropped_when_real_iwu_present() {
        let rows = vec![
            row("jdupont", "Dupont", "Jean", Some("NONE")),
            row("jdupont", "Dupont", "Jean", Some("333")),
        ];
        let agg = aggregate_users(&rows);
        assert_eq!(agg[0].iwu_display(), "333");
    }

    #[test]
    fn test_duplicate_iwu_collapses() {
        let rows = vec![
            row("jdupont", "Dupont", "Jean", Some("111")),
            row("jdupont", "Dupont", "Jean", Some("111")),
        ];
        assert_eq!(aggregate_users(&rows)[0].iwu_ids, vec!["111"]);
    }

    #[test]
    fn test_grouping_is_on_raw_triple() {
        // Same person, two spellings: stays as two groups at this stage.
        let rows = vec![
            row("jdupont", "Dupont", "Jean", Some("111")),
            row("JDUPONT", "Dupont", "Jean", Some("111")),
            row("jdupont", "DUPONT", "Jean", Some("222")),
        ];
        let agg = aggregate_users(&rows);
        assert_eq!(agg.len(), 3);
    }

    #[test]
    fn test_output_ordered_by_group_key() {
        let rows = vec![
            row("zz", "Zidane", "Z", None),
            row("aa", "Arnoux", "A", Some("1")),
            row("mm", "Martin", "M", None),
        ];
        let agg = aggregate_users(&rows);
        let ids: Vec<&str> = agg.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, vec!["aa", "mm", "zz"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_users(&[]).is_empty());
    }
}
