// 📊 Report Builders - the read side of the reconciliation store
//
// Four reports, one per screen: the dealer dashboard, the per-dealer user
// comparison, the per-user cross-source report and the user search. Each
// builder pulls rows through db.rs, runs the matching pipeline
// (normalize -> aggregate -> reconcile) and returns a serializable value;
// rendering is someone else's problem.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::aggregate::{aggregate_users, NO_IWU};
use crate::db;
use crate::names::{classify_names, parse_names, SourceSystem};
use crate::normalize::normalize_id;
use crate::reconcile::{compare_users, matches_search, UserComparison};

// ============================================================================
// DEALER DASHBOARD
// ============================================================================

/// One dealer in a per-source dashboard list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealerSummary {
    pub principal: String,
    /// First of `names`, the dealer's headline name in this source.
    pub display_name: String,
    /// Names tagged with this source in the composite string.
    pub names: Vec<String>,
    pub user_count: i64,
    pub in_both: bool,
}

/// Headline numbers shown above the dashboard lists. Always computed over
/// the FULL principal universe: search and match filters change what is
/// listed, never what is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users_welcome: i64,
    pub total_users_idocs: i64,
    pub total_dealers_welcome: usize,
    pub total_dealers_idocs: usize,
    pub only_welcome: usize,
    pub only_idocs: usize,
    pub both: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardFilter {
    /// Case-insensitive substring over principal code and names.
    pub search: String,
    /// Keep only dealers present in both sources.
    pub matches_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealerDashboard {
    pub welcome: Vec<DealerSummary>,
    pub idocs: Vec<DealerSummary>,
    pub stats: DashboardStats,
}

pub fn build_dealer_dashboard(
    conn: &Connection,
    filter: &DashboardFilter,
) -> Result<DealerDashboard> {
    let welcome_principals = db::distinct_principals(conn, SourceSystem::Welcome)?;
    let idocs_principals = db::distinct_principals(conn, SourceSystem::Idocs)?;
    let name_map = db::composite_names(conn)?;
    let welcome_counts = db::user_counts_by_principal(conn, SourceSystem::Welcome)?;
    let idocs_counts = db::user_counts_by_principal(conn, SourceSystem::Idocs)?;

    let welcome_set: HashSet<&str> = welcome_principals.iter().map(String::as_str).collect();
    let idocs_set: HashSet<&str> = idocs_principals.iter().map(String::as_str).collect();

    let build_side = |principals: &[String],
                      source: SourceSystem,
                      other: &HashSet<&str>,
                      counts: &HashMap<String, i64>|
     -> Vec<DealerSummary> {
        let mut dealers = Vec::new();
        for principal in principals {
            let in_both = other.contains(principal.as_str());
            if filter.matches_only && !in_both {
                continue;
            }

            let composite = name_map.get(principal).map(String::as_str).unwrap_or("");
            let names = parse_names(composite, source);
            // A dealer with no name in this source has nothing to show here.
            if names.is_empty() {
                continue;
            }
            if !matches_search(&filter.search, principal, &names) {
                continue;
            }

            dealers.push(DealerSummary {
                principal: principal.clone(),
                display_name: names[0].clone(),
                names,
                user_count: counts.get(principal).copied().unwrap_or(0),
                in_both,
            });
        }
        dealers
    };

    let welcome = build_side(
        &welcome_principals,
        SourceSystem::Welcome,
        &idocs_set,
        &welcome_counts,
    );
    let idocs = build_side(
        &idocs_principals,
        SourceSystem::Idocs,
        &welcome_set,
        &idocs_counts,
    );

    let both = welcome_set.intersection(&idocs_set).count();
    let stats = DashboardStats {
        total_users_welcome: db::distinct_user_count(conn, SourceSystem::Welcome)?,
        total_users_idocs: db::distinct_user_count(conn, SourceSystem::Idocs)?,
        total_dealers_welcome: welcome_principals.len(),
        total_dealers_idocs: idocs_principals.len(),
        only_welcome: welcome_principals.len() - both,
        only_idocs: idocs_principals.len() - both,
        both,
    };

    Ok(DealerDashboard {
        welcome,
        idocs,
        stats,
    })
}

// ============================================================================
// PER-DEALER COMPARISON
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealerComparison {
    pub principal: String,
    /// Trade name from the raw dealer hierarchy, the code itself when the
    /// hierarchy knows nothing.
    pub principal_name: String,
    pub welcome_names: Vec<String>,
    pub idocs_names: Vec<String>,
    pub users: UserComparison,
}

pub fn build_dealer_comparison(conn: &Connection, principal: &str) -> Result<DealerComparison> {
    let composite = db::composite_name_for(conn, principal)?.unwrap_or_default();
    let principal_name = db::principal_display_name(conn, principal)?
        .unwrap_or_else(|| principal.to_string());

    let welcome_rows = db::users_for_principal(conn, SourceSystem::Welcome, principal)?;
    let idocs_rows = db::users_for_principal(conn, SourceSystem::Idocs, principal)?;
    let users = compare_users(aggregate_users(&welcome_rows), aggregate_users(&idocs_rows));

    Ok(DealerComparison {
        principal: principal.to_string(),
        principal_name,
        welcome_names: parse_names(&composite, SourceSystem::Welcome),
        idocs_names: parse_names(&composite, SourceSystem::Idocs),
        users,
    })
}

// ============================================================================
// PER-USER REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPair {
    pub last_name: String,
    pub first_name: String,
}

/// One dealer an account belongs to, with its names classified by source
/// coverage ("W + I: ...", "W: ...", "I: ...").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealerNames {
    pub principal: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRow {
    pub brand: String,
    pub profile_type: String,
}

/// Another account holding one of the subject's IWU credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateUser {
    pub user_id: String,
    pub last_name: String,
    pub first_name: String,
    pub iwu_id: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDelta {
    pub welcome: usize,
    pub idocs: usize,
    /// welcome minus idocs; negative when IDOCS carries more.
    pub delta: i64,
}

impl SourceDelta {
    fn new(welcome: usize, idocs: usize) -> Self {
        SourceDelta {
            welcome,
            idocs,
            delta: welcome as i64 - idocs as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub identities: SourceDelta,
    pub dealers: SourceDelta,
    pub iwu_ids: SourceDelta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReport {
    pub user_id: String,
    pub welcome_identities: Vec<IdentityPair>,
    pub idocs_identities: Vec<IdentityPair>,
    /// Raw credential values as stored, deduplicated in encounter order.
    /// Sentinel entries are kept here and only dropped from the counts.
    pub welcome_iwu: Vec<String>,
    pub idocs_iwu: Vec<String>,
    pub welcome_dealers: Vec<DealerNames>,
    pub idocs_dealers: Vec<DealerNames>,
    pub idocs_roles: Vec<RoleRow>,
    pub duplicates: Vec<DuplicateUser>,
    pub stats: UserStats,
}

fn dedup_identities(details: &[db::UserDetailRow]) -> Vec<IdentityPair> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for row in details {
        let pair = IdentityPair {
            last_name: row.last_name.clone(),
            first_name: row.first_name.clone(),
        };
        if seen.insert((row.last_name.clone(), row.first_name.clone())) {
            pairs.push(pair);
        }
    }
    pairs
}

fn dedup_iwus(details: &[db::UserDetailRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut iwus = Vec::new();
    for row in details {
        if let Some(iwu) = row.iwu_id.as_deref() {
            if seen.insert(iwu.to_string()) {
                iwus.push(iwu.to_string());
            }
        }
    }
    iwus
}

fn usable_iwu_count(iwus: &[String]) -> usize {
    iwus.iter().filter(|i| !i.is_empty() && *i != NO_IWU).count()
}

fn dealer_names_for(
    conn: &Connection,
    source: SourceSystem,
    user_id: &str,
) -> Result<Vec<DealerNames>> {
    let mut dealers = Vec::new();
    for principal in db::principals_for_user(conn, source, user_id)? {
        let composite = db::composite_name_for(conn, &principal)?.unwrap_or_default();
        dealers.push(DealerNames {
            names: classify_names(&composite).display_lines(),
            principal,
        });
    }
    Ok(dealers)
}

pub fn build_user_report(conn: &Connection, user_id: &str) -> Result<UserReport> {
    let subject_norm = normalize_id(user_id);

    let welcome_details = db::user_details_for(conn, SourceSystem::Welcome, user_id)?;
    let idocs_details = db::user_details_for(conn, SourceSystem::Idocs, user_id)?;

    let welcome_identities = dedup_identities(&welcome_details);
    let idocs_identities = dedup_identities(&idocs_details);
    let welcome_iwu = dedup_iwus(&welcome_details);
    let idocs_iwu = dedup_iwus(&idocs_details);

    let welcome_dealers = dealer_names_for(conn, SourceSystem::Welcome, user_id)?;
    let idocs_dealers = dealer_names_for(conn, SourceSystem::Idocs, user_id)?;

    let mut role_seen = HashSet::new();
    let mut idocs_roles = Vec::new();
    for row in &idocs_details {
        let brand = row.brand.clone().unwrap_or_default();
        let profile_type = row.profile_type.clone().unwrap_or_default();
        if brand.is_empty() && profile_type.is_empty() {
            continue;
        }
        if role_seen.insert((brand.clone(), profile_type.clone())) {
            idocs_roles.push(RoleRow {
                brand,
                profile_type,
            });
        }
    }

    // ==========================================================================
    // IWU duplicate detection: other accounts sharing a credential
    // ==========================================================================
    let shared_iwus: Vec<String> = welcome_iwu
        .iter()
        .chain(&idocs_iwu)
        .filter(|i| !i.is_empty() && i.as_str() != NO_IWU)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut duplicates: Vec<DuplicateUser> = Vec::new();
    for source in SourceSystem::all() {
        for row in db::users_sharing_iwu(conn, source, &shared_iwus, user_id)? {
            // Accent variants of the subject slip past the SQL exclusion.
            if normalize_id(&row.user_id) == subject_norm {
                continue;
            }
            if duplicates.iter().any(|d| d.user_id == row.user_id) {
                continue;
            }
            duplicates.push(DuplicateUser {
                user_id: row.user_id,
                last_name: row.last_name,
                first_name: row.first_name,
                iwu_id: row.iwu_id.unwrap_or_default(),
                source: source.name().to_string(),
            });
        }
    }

    let stats = UserStats {
        identities: SourceDelta::new(welcome_identities.len(), idocs_identities.len()),
        dealers: SourceDelta::new(welcome_dealers.len(), idocs_dealers.len()),
        iwu_ids: SourceDelta::new(usable_iwu_count(&welcome_iwu), usable_iwu_count(&idocs_iwu)),
    };

    Ok(UserReport {
        user_id: user_id.to_string(),
        welcome_identities,
        idocs_identities,
        welcome_iwu,
        idocs_iwu,
        welcome_dealers,
        idocs_dealers,
        idocs_roles,
        duplicates,
        stats,
    })
}

// ============================================================================
// USER SEARCH
// ============================================================================

/// One search hit, grouped across sources by raw account id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSearchHit {
    pub user_id: String,
    pub last_name: String,
    pub first_name: String,
    /// Empty when the account has no usable credential.
    pub iwu_id: String,
    /// "IDOCS", "WELCOME" or "IDOCS + WELCOME".
    pub sources: String,
}

/// Substring search over both detail tables, grouped by account id in
/// first-seen order. Terms shorter than two characters return nothing
/// rather than sweeping the whole directory.
pub fn search_users(conn: &Connection, term: &str) -> Result<Vec<UserSearchHit>> {
    let term = term.trim();
    if term.chars().count() < 2 {
        return Ok(Vec::new());
    }
    let pattern = format!("%{}%", term);

    struct Grouped {
        hit: UserSearchHit,
        sources: BTreeSet<&'static str>,
    }

    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Grouped> = HashMap::new();

    for source in SourceSystem::all() {
        for row in db::search_user_details(conn, source, &pattern)? {
            let entry = grouped.entry(row.user_id.clone()).or_insert_with(|| {
                order.push(row.user_id.clone());
                let iwu = row.iwu_id.as_deref().unwrap_or("");
                Grouped {
                    hit: UserSearchHit {
                        user_id: row.user_id.clone(),
                        last_name: row.last_name.clone(),
                        first_name: row.first_name.clone(),
                        iwu_id: if iwu.is_empty() || iwu == NO_IWU {
                            String::new()
                        } else {
                            iwu.to_string()
                        },
                        sources: String::new(),
                    },
                    sources: BTreeSet::new(),
                }
            });
            entry.sources.insert(source.name());
        }
    }

    let hits = order
        .into_iter()
        .filter_map(|id| grouped.remove(&id))
        .map(|mut g| {
            g.hit.sources = g.sources.into_iter().collect::<Vec<_>>().join(" + ");
            g.hit
        })
        .collect();

    Ok(hits)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        insert_dealer_links, insert_dealer_names, insert_user_details, insert_users,
        setup_database, DealerLinkRow, DealerNameRow, UserBaseRow, UserDetailRow,
    };
    use crate::reconcile::STATUS_BOTH;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn base_row(user_id: &str, nom: &str, prenom: &str, principal: &str) -> UserBaseRow {
        UserBaseRow {
            user_id: user_id.to_string(),
            last_name: nom.to_string(),
            first_name: prenom.to_string(),
            principal: Some(principal.to_string()),
        }
    }

    fn detail_row(user_id: &str, nom: &str, prenom: &str, iwu: Option<&str>) -> UserDetailRow {
        UserDetailRow {
            user_id: user_id.to_string(),
            last_name: nom.to_string(),
            first_name: prenom.to_string(),
            iwu_id: iwu.map(str::to_string),
            brand: None,
            profile_type: None,
        }
    }

    fn name_row(principal: &str, composite: &str) -> DealerNameRow {
        DealerNameRow {
            principal: principal.to_string(),
            composite_name: composite.to_string(),
        }
    }

    fn seed_dashboard(conn: &Connection) {
        insert_users(
            conn,
            SourceSystem::Welcome,
            &[
                base_row("alice", "Arnoux", "Alice", "12137"),
                base_row("bob", "Blanc", "Bob", "12137"),
                base_row("carol", "Caron", "Carol", "30000"),
            ],
        )
        .unwrap();
        insert_users(
            conn,
            SourceSystem::Idocs,
            &[
                base_row("alice", "Arnoux", "Alice", "12137"),
                base_row("dave", "Dst", "Dave", "20001"),
            ],
        )
        .unwrap();
        insert_dealer_names(
            conn,
            &[
                name_row("12137", "IDOCS: Garage Nord ; WELCOME: Garage Nord"),
                name_row("20001", "IDOCS: Garage Sud"),
                // 30000 has no con_nom row at all.
            ],
        )
        .unwrap();
    }

    #[test]
    fn test_dashboard_lists_and_stats() {
        let conn = test_conn();
        seed_dashboard(&conn);

        let dash = build_dealer_dashboard(&conn, &DashboardFilter::default()).unwrap();

        // 30000 has no WELCOME-tagged name, so it is listed nowhere, but it
        // still counts in the stats.
        assert_eq!(dash.welcome.len(), 1);
        assert_eq!(dash.welcome[0].principal, "12137");
        assert_eq!(dash.welcome[0].user_count, 2);
        assert!(dash.welcome[0].in_both);
        assert_eq!(dash.welcome[0].display_name, "Garage Nord");

        let idocs_principals: Vec<&str> =
            dash.idocs.iter().map(|d| d.principal.as_str()).collect();
        assert_eq!(idocs_principals, vec!["12137", "20001"]);
        assert!(!dash.idocs[1].in_both);

        assert_eq!(
            dash.stats,
            DashboardStats {
                total_users_welcome: 3,
                total_users_idocs: 2,
                total_dealers_welcome: 2,
                total_dealers_idocs: 2,
                only_welcome: 1,
                only_idocs: 1,
                both: 1,
            }
        );
    }

    #[test]
    fn test_dashboard_filters_change_lists_not_stats() {
        let conn = test_conn();
        seed_dashboard(&conn);

        let unfiltered = build_dealer_dashboard(&conn, &DashboardFilter::default()).unwrap();

        let searched = build_dealer_dashboard(
            &conn,
            &DashboardFilter {
                search: "sud".to_string(),
                matches_only: false,
            },
        )
        .unwrap();
        assert!(searched.welcome.is_empty());
        assert_eq!(searched.idocs.len(), 1);
        assert_eq!(searched.idocs[0].principal, "20001");
        assert_eq!(searched.stats, unfiltered.stats);

        let matches_only = build_dealer_dashboard(
            &conn,
            &DashboardFilter {
                search: String::new(),
                matches_only: true,
            },
        )
        .unwrap();
        assert_eq!(matches_only.idocs.len(), 1);
        assert_eq!(matches_only.idocs[0].principal, "12137");
        assert_eq!(matches_only.stats, unfiltered.stats);
    }

    #[test]
    fn test_dealer_comparison_matches_across_spellings() {
        let conn = test_conn();
        insert_users(
            &conn,
            SourceSystem::Welcome,
            &[
                base_row("jdupont", "Dupont", "Jean", "12137"),
                base_row("seul", "Seul", "S", "12137"),
            ],
        )
        .unwrap();
        insert_users(
            &conn,
            SourceSystem::Idocs,
            &[base_row("JDUPONT", "Dupont", "Jean", "12137")],
        )
        .unwrap();
        insert_user_details(
            &conn,
            SourceSystem::Welcome,
            &[
                detail_row("jdupont", "Dupont", "Jean", Some("222")),
                detail_row("jdupont", "Dupont", "Jean", Some("111")),
            ],
        )
        .unwrap();
        insert_dealer_names(
            &conn,
            &[name_row("12137", "IDOCS: Garage Nord ; WELCOME: Garage Nord")],
        )
        .unwrap();

        let cmp = build_dealer_comparison(&conn, "12137").unwrap();

        assert_eq!(cmp.welcome_names, vec!["Garage Nord"]);
        assert_eq!(cmp.idocs_names, vec!["Garage Nord"]);
        // No idocs_con rows: the code is its own display name.
        assert_eq!(cmp.principal_name, "12137");

        let jdupont = cmp
            .users
            .welcome
            .iter()
            .find(|u| u.user_id == "jdupont")
            .unwrap();
        assert_eq!(jdupont.iwu_display, "111;222");
        assert_eq!(jdupont.status, STATUS_BOTH);
        assert_eq!(cmp.users.idocs[0].status, STATUS_BOTH);

        assert_eq!(cmp.users.stats.total_welcome, 2);
        assert_eq!(cmp.users.stats.total_idocs, 1);
        assert_eq!(cmp.users.stats.in_both, 1);
        assert_eq!(cmp.users.stats.only_welcome, 1);
        assert_eq!(cmp.users.stats.only_idocs, 0);
        // seul has no detail row, jdupont has credentials.
        assert_eq!(cmp.users.stats.welcome_no_iwu, 1);
        assert_eq!(cmp.users.stats.idocs_no_iwu, 1);
    }

    #[test]
    fn test_dealer_comparison_idocs_only_dealer() {
        let conn = test_conn();
        insert_users(
            &conn,
            SourceSystem::Idocs,
            &[
                base_row("u1", "Un", "U", "40000"),
                base_row("u2", "Deux", "D", "40000"),
            ],
        )
        .unwrap();
        insert_dealer_names(&conn, &[name_row("40000", "IDOCS: Garage Dupont")]).unwrap();
        insert_dealer_links(
            &conn,
            &[DealerLinkRow {
                principal: "40000".to_string(),
                dealer: "40000".to_string(),
                name: "Garage Dupont".to_string(),
            }],
        )
        .unwrap();

        let cmp = build_dealer_comparison(&conn, "40000").unwrap();

        assert_eq!(cmp.principal_name, "Garage Dupont");
        assert!(cmp.welcome_names.is_empty());
        assert_eq!(cmp.idocs_names, vec!["Garage Dupont"]);
        assert!(cmp.users.welcome.is_empty());
        assert_eq!(cmp.users.idocs.len(), 2);
        assert!(cmp.users.idocs.iter().all(|u| u.status.is_empty()));
        assert_eq!(cmp.users.stats.total_welcome, 0);
        assert_eq!(cmp.users.stats.total_idocs, 2);
        assert_eq!(cmp.users.stats.only_idocs, 2);
        assert_eq!(cmp.users.stats.in_both, 0);
    }

    #[test]
    fn test_user_report() {
        let conn = test_conn();
        insert_users(
            &conn,
            SourceSystem::Welcome,
            &[base_row("jdupont", "Dupont", "Jean", "12137")],
        )
        .unwrap();
        insert_users(
            &conn,
            SourceSystem::Idocs,
            &[
                base_row("JDUPONT", "Dupont", "Jean", "12137"),
                base_row("JDUPONT", "Dupont", "Jean", "20001"),
            ],
        )
        .unwrap();
        insert_user_details(
            &conn,
            SourceSystem::Welcome,
            &[
                detail_row("jdupont", "Dupont", "Jean", Some("111")),
                detail_row("jdupont", "DUPONT", "Jean", Some("111")),
                // Same credential on another account: a duplicate to report.
                detail_row("autre", "Autre", "A", Some("111")),
            ],
        )
        .unwrap();
        insert_user_details(
            &conn,
            SourceSystem::Idocs,
            &[UserDetailRow {
                user_id: "JDUPONT".to_string(),
                last_name: "Dupont".to_string(),
                first_name: "Jean".to_string(),
                iwu_id: Some("NONE".to_string()),
                brand: Some("IVECO".to_string()),
                profile_type: Some("VENDEUR".to_string()),
            }],
        )
        .unwrap();
        insert_dealer_names(
            &conn,
            &[
                name_row("12137", "IDOCS: Garage Nord ; WELCOME: Garage Nord"),
                name_row("20001", "IDOCS: Garage Sud"),
            ],
        )
        .unwrap();

        let report = build_user_report(&conn, "jdupont").unwrap();

        // Two spellings of the last name survive identity dedup.
        assert_eq!(report.welcome_identities.len(), 2);
        assert_eq!(report.idocs_identities.len(), 1);

        assert_eq!(report.welcome_iwu, vec!["111"]);
        assert_eq!(report.idocs_iwu, vec!["NONE"]);

        assert_eq!(report.welcome_dealers.len(), 1);
        assert_eq!(report.welcome_dealers[0].principal, "12137");
        assert_eq!(
            report.welcome_dealers[0].names,
            vec!["W + I: Garage Nord"]
        );
        let idocs_principals: Vec<&str> = report
            .idocs_dealers
            .iter()
            .map(|d| d.principal.as_str())
            .collect();
        assert_eq!(idocs_principals, vec!["12137", "20001"]);
        assert_eq!(report.idocs_dealers[1].names, vec!["I: Garage Sud"]);

        assert_eq!(report.idocs_roles.len(), 1);
        assert_eq!(report.idocs_roles[0].brand, "IVECO");

        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].user_id, "autre");
        assert_eq!(report.duplicates[0].source, "WELCOME");

        assert_eq!(report.stats.identities.delta, 1);
        assert_eq!(report.stats.dealers.welcome, 1);
        assert_eq!(report.stats.dealers.idocs, 2);
        assert_eq!(report.stats.dealers.delta, -1);
        // The IDOCS side only has the sentinel, so it counts zero.
        assert_eq!(report.stats.iwu_ids.welcome, 1);
        assert_eq!(report.stats.iwu_ids.idocs, 0);
        assert_eq!(report.stats.iwu_ids.delta, 1);
    }

    #[test]
    fn test_user_report_duplicate_skips_subject_spellings() {
        let conn = test_conn();
        insert_user_details(
            &conn,
            SourceSystem::Welcome,
            &[
                detail_row("jdupont", "Dupont", "Jean", Some("111")),
                // Accent variant of the subject shares the credential but is
                // the same person, not a duplicate.
                detail_row("jdupónt", "Dupont", "Jean", Some("111")),
            ],
        )
        .unwrap();

        let report = build_user_report(&conn, "jdupont").unwrap();
        assert!(report.duplicates.is_empty());
    }

    #[test]
    fn test_search_users_groups_by_account() {
        let conn = test_conn();
        insert_user_details(
            &conn,
            SourceSystem::Welcome,
            &[detail_row("jdupont", "Dupont", "Jean", Some("111"))],
        )
        .unwrap();
        insert_user_details(
            &conn,
            SourceSystem::Idocs,
            &[
                detail_row("jdupont", "Dupont", "Jean", Some("111")),
                detail_row("mdupontel", "Dupontel", "Marie", Some("NONE")),
            ],
        )
        .unwrap();

        let hits = search_users(&conn, "dupont").unwrap();
        assert_eq!(hits.len(), 2);

        let jdupont = hits.iter().find(|h| h.user_id == "jdupont").unwrap();
        assert_eq!(jdupont.sources, "IDOCS + WELCOME");
        assert_eq!(jdupont.iwu_id, "111");

        let marie = hits.iter().find(|h| h.user_id == "mdupontel").unwrap();
        assert_eq!(marie.sources, "IDOCS");
        // Sentinel credential renders as empty.
        assert_eq!(marie.iwu_id, "");
    }

    #[test]
    fn test_search_users_short_term_returns_nothing() {
        let conn = test_conn();
        insert_user_details(
            &conn,
            SourceSystem::Welcome,
            &[detail_row("jdupont", "Dupont", "Jean", Some("111"))],
        )
        .unwrap();

        assert!(search_users(&conn, "d").unwrap().is_empty());
        assert!(search_users(&conn, "  d  ").unwrap().is_empty());
        assert!(search_users(&conn, "").unwrap().is_empty());
        assert_eq!(search_users(&conn, "du").unwrap().len(), 1);
    }
}
