// ✅ Hygiene Checks - import sanity for the reconciliation store
//
// Runs a fixed battery of checks over the imported tables and reports
// everything that would distort matching: stray control characters that
// break exact-id joins, unassigned accounts that fall out of the dealer
// views, and the volume of sentinel credentials.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::names::SourceSystem;

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Corrupts identity matching until cleaned
    Warning,  // Rows silently excluded from reports
    Info,     // Expected sentinels worth keeping an eye on
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIssue {
    pub severity: Severity,
    pub table: String,
    pub column: String,
    pub rows: i64,
    pub issue: String,
    pub recommendation: String,
}

// ============================================================================
// HYGIENE REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HygieneReport {
    pub checks_run: usize,
    pub issues: Vec<DataIssue>,
}

impl HygieneReport {
    pub fn summary(&self) -> String {
        format!(
            "{} checks: {} issues ({} critical, {} warnings)",
            self.checks_run,
            self.issues.len(),
            self.count(Severity::Critical),
            self.count(Severity::Warning),
        )
    }

    pub fn has_critical_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

// ============================================================================
// CHECK BATTERY
// ============================================================================

pub fn run_checks(conn: &Connection) -> Result<HygieneReport> {
    let mut checks_run = 0;
    let mut issues = Vec::new();

    // Rule 1: no carriage returns in any imported text column. A stray '\r'
    // makes "12137\r" a different dealer than "12137".
    for (table, column) in db::cleanable_columns() {
        checks_run += 1;
        let rows = db::count_column_matching(conn, table, column, "%\r%")?;
        if rows > 0 {
            issues.push(DataIssue {
                severity: Severity::Critical,
                table: table.to_string(),
                column: column.to_string(),
                rows,
                issue: format!("{} rows contain a carriage return", rows),
                recommendation: "Run the backup command, its cleanup pass strips them"
                    .to_string(),
            });
        }
    }

    // Rule 2: every account row carries an id.
    for table in ["sso", "idocs_user", "sso_user_detail", "idocs_user_detail"] {
        checks_run += 1;
        let rows = db::count_column_empty(conn, table, "id_cree")?;
        if rows > 0 {
            issues.push(DataIssue {
                severity: Severity::Warning,
                table: table.to_string(),
                column: "id_cree".to_string(),
                rows,
                issue: format!("{} rows have no account id", rows),
                recommendation: "Fix the export upstream, these rows cannot be matched"
                    .to_string(),
            });
        }
    }

    // Rule 3: accounts without a principal never appear in the dealer views.
    for source in SourceSystem::all() {
        checks_run += 1;
        let table = db::user_table(source);
        let rows = db::count_column_empty(conn, table, "sap_princ")?;
        if rows > 0 {
            issues.push(DataIssue {
                severity: Severity::Warning,
                table: table.to_string(),
                column: "sap_princ".to_string(),
                rows,
                issue: format!("{} accounts are not assigned to a dealer", rows),
                recommendation: "Assign a principal upstream or accept the gap".to_string(),
            });
        }
    }

    // Rule 4: volume of sentinel and missing credentials, per source.
    for source in SourceSystem::all() {
        let table = db::detail_table(source);

        checks_run += 1;
        let sentinel = db::count_column_matching(conn, table, "iwu_id", "NONE")?;
        if sentinel > 0 {
            issues.push(DataIssue {
                severity: Severity::Info,
                table: table.to_string(),
                column: "iwu_id".to_string(),
                rows: sentinel,
                issue: format!("{} rows carry the NONE credential sentinel", sentinel),
                recommendation: "Nothing to do, sentinels are excluded from matching"
                    .to_string(),
            });
        }

        checks_run += 1;
        let empty = db::count_column_empty(conn, table, "iwu_id")?;
        if empty > 0 {
            issues.push(DataIssue {
                severity: Severity::Info,
                table: table.to_string(),
                column: "iwu_id".to_string(),
                rows: empty,
                issue: format!("{} rows have no credential at all", empty),
                recommendation: "Nothing to do, empty credentials are excluded from matching"
                    .to_string(),
            });
        }
    }

    Ok(HygieneReport { checks_run, issues })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        clean_carriage_returns, insert_user_details, insert_users, setup_database, UserBaseRow,
        UserDetailRow,
    };

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn base_row(user_id: &str, principal: Option<&str>) -> UserBaseRow {
        UserBaseRow {
            user_id: user_id.to_string(),
            last_name: "Dupont".to_string(),
            first_name: "Jean".to_string(),
            principal: principal.map(str::to_string),
        }
    }

    #[test]
    fn test_clean_store_passes() {
        let conn = test_conn();
        insert_users(
            &conn,
            SourceSystem::Welcome,
            &[base_row("jdupont", Some("12137"))],
        )
        .unwrap();

        let report = run_checks(&conn).unwrap();
        println!("✅ {}", report.summary());

        assert!(report.is_clean());
        assert!(!report.has_critical_issues());
        assert!(report.checks_run > 0);
    }

    #[test]
    fn test_carriage_return_is_critical_until_cleaned() {
        let conn = test_conn();
        insert_users(
            &conn,
            SourceSystem::Welcome,
            &[base_row("jdupont\r", Some("12137\r"))],
        )
        .unwrap();

        let report = run_checks(&conn).unwrap();
        assert!(report.has_critical_issues());
        assert!(report
            .issues
            .iter()
            .any(|i| i.table == "sso" && i.column == "id_cree"));
        assert!(report
            .issues
            .iter()
            .any(|i| i.table == "sso" && i.column == "sap_princ"));

        clean_carriage_returns(&conn).unwrap();

        let report = run_checks(&conn).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_unassigned_account_is_warning() {
        let conn = test_conn();
        insert_users(&conn, SourceSystem::Idocs, &[base_row("jdupont", None)]).unwrap();

        let report = run_checks(&conn).unwrap();
        assert!(!report.has_critical_issues());
        assert!(report.issues.iter().any(|i| {
            i.severity == Severity::Warning
                && i.table == "idocs_user"
                && i.column == "sap_princ"
        }));
    }

    #[test]
    fn test_sentinel_credentials_are_info() {
        let conn = test_conn();
        insert_user_details(
            &conn,
            SourceSystem::Welcome,
            &[
                UserDetailRow {
                    user_id: "jdupont".to_string(),
                    last_name: "Dupont".to_string(),
                    first_name: "Jean".to_string(),
                    iwu_id: Some("NONE".to_string()),
                    brand: None,
                    profile_type: None,
                },
                UserDetailRow {
                    user_id: "mmartin".to_string(),
                    last_name: "Martin".to_string(),
                    first_name: "Marie".to_string(),
                    iwu_id: None,
                    brand: None,
                    profile_type: None,
                },
            ],
        )
        .unwrap();

        let report = run_checks(&conn).unwrap();
        println!("✅ {}", report.summary());

        assert!(!report.has_critical_issues());
        let infos: Vec<&DataIssue> = report
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Info)
            .collect();
        assert_eq!(infos.len(), 2);
        assert!(infos.iter().all(|i| i.table == "sso_user_detail"));
        assert!(infos.iter().all(|i| i.rows == 1));
    }
}
