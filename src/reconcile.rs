// ⚖️ Membership Reconciliation - which ids live in which system
//
// Everything here runs on NORMALIZED ids (see normalize.rs). The exact
// set algebra: only_welcome = W − I, only_idocs = I − W, both = W ∩ I.
// The three sets partition W ∪ I, so the count identities
// total_welcome = only_welcome + both and total_idocs = only_idocs + both
// hold by construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::aggregate::AggregatedUser;
use crate::normalize::normalize_id;

/// Status attached to a user row whose normalized id exists in the other
/// source. Doubles as the CSS class that highlights matched rows.
pub const STATUS_BOTH: &str = "both";

// ============================================================================
// MEMBERSHIP SETS
// ============================================================================

/// Partition of the normalized-id universe of two sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub only_welcome: BTreeSet<String>,
    pub only_idocs: BTreeSet<String>,
    pub both: BTreeSet<String>,
}

impl Membership {
    pub fn counts(&self) -> MembershipCounts {
        MembershipCounts {
            only_welcome: self.only_welcome.len(),
            only_idocs: self.only_idocs.len(),
            both: self.both.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipCounts {
    pub only_welcome: usize,
    pub only_idocs: usize,
    pub both: usize,
}

impl MembershipCounts {
    pub fn total_welcome(&self) -> usize {
        self.only_welcome + self.both
    }

    pub fn total_idocs(&self) -> usize {
        self.only_idocs + self.both
    }
}

/// Split two normalized-id sets into exclusive and shared membership.
pub fn classify_membership(
    welcome: &BTreeSet<String>,
    idocs: &BTreeSet<String>,
) -> Membership {
    Membership {
        only_welcome: welcome.difference(idocs).cloned().collect(),
        only_idocs: idocs.difference(welcome).cloned().collect(),
        both: welcome.intersection(idocs).cloned().collect(),
    }
}

// ============================================================================
// PER-DEALER USER COMPARISON
// ============================================================================

/// One aggregated user annotated with its cross-source match status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserComparisonRow {
    pub user_id: String,
    pub last_name: String,
    pub first_name: String,
    pub iwu_ids: Vec<String>,
    pub iwu_display: String,
    pub normalized_id: String,
    /// [`STATUS_BOTH`] when the normalized id exists in the other source,
    /// empty otherwise.
    pub status: String,
}

/// Headline numbers for one dealer's user population.
///
/// Totals count DISTINCT normalized ids, not rows: the same person listed
/// twice under accent variants counts once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerUserStats {
    pub total_welcome: usize,
    pub total_idocs: usize,
    pub only_welcome: usize,
    pub only_idocs: usize,
    pub in_both: usize,
    /// Distinct normalized ids with no usable IWU credential, per source.
    pub welcome_no_iwu: usize,
    pub idocs_no_iwu: usize,
}

/// Two annotated user lists plus their headline stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserComparison {
    pub welcome: Vec<UserComparisonRow>,
    pub idocs: Vec<UserComparisonRow>,
    pub stats: DealerUserStats,
}

/// Annotate both aggregated user lists with match status and compute the
/// dealer-level stats in one pass.
pub fn compare_users(
    welcome: Vec<AggregatedUser>,
    idocs: Vec<AggregatedUser>,
) -> UserComparison {
    let welcome_ids = id_set(&welcome);
    let idocs_ids = id_set(&idocs);
    let membership = classify_membership(&welcome_ids, &idocs_ids);
    let counts = membership.counts();

    let stats = DealerUserStats {
        total_welcome: counts.total_welcome(),
        total_idocs: counts.total_idocs(),
        only_welcome: counts.only_welcome,
        only_idocs: counts.only_idocs,
        in_both: counts.both,
        welcome_no_iwu: no_iwu_count(&welcome),
        idocs_no_iwu: no_iwu_count(&idocs),
    };

    UserComparison {
        welcome: annotate(welcome, &idocs_ids),
        idocs: annotate(idocs, &welcome_ids),
        stats,
    }
}

fn id_set(users: &[AggregatedUser]) -> BTreeSet<String> {
    users
        .iter()
        .map(|u| normalize_id(&u.user_id))
        .filter(|id| !id.is_empty())
        .collect()
}

fn no_iwu_count(users: &[AggregatedUser]) -> usize {
    users
        .iter()
        .filter(|u| !u.has_iwu())
        .map(|u| normalize_id(&u.user_id))
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>()
        .len()
}

fn annotate(users: Vec<AggregatedUser>, other: &BTreeSet<String>) -> Vec<UserComparisonRow> {
    users
        .into_iter()
        .map(|u| {
            let normalized_id = normalize_id(&u.user_id);
            let status = if !normalized_id.is_empty() && other.contains(&normalized_id) {
                STATUS_BOTH.to_string()
            } else {
                String::new()
            };
            UserComparisonRow {
                iwu_display: u.iwu_display(),
                user_id: u.user_id,
                last_name: u.last_name,
                first_name: u.first_name,
                iwu_ids: u.iwu_ids,
                normalized_id,
                status,
            }
        })
        .collect()
}

// ============================================================================
// SEARCH FILTERING
// ============================================================================

/// Case-insensitive substring match over a key and a list of names.
///
/// Used to filter dealer listings AFTER classification: filtering changes
/// what is shown, never what is counted.
pub fn matches_search(term: &str, key: &str, names: &[String]) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    key.to_lowercase().contains(&term)
        || names.iter().any(|n| n.to_lowercase().contains(&term))
}

// ============================================================================
// TESTS
// ============================================================================
