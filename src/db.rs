// 🗄️ SQLite Store - upstream tables, audit trail, backup & cleanup
//
// One table per upstream export, loaded as-is: matching and reconciliation
// happen in Rust, never in SQL. Every insert carries a row hash so that
// re-importing the same file is a no-op. All SQL values go through bound
// parameters; table and column names only ever come from the whitelists
// defined here.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;

use crate::aggregate::UserRow;
use crate::names::SourceSystem;

// ============================================================================
// TABLE WHITELISTS
// ============================================================================

/// Data tables, in backup order. The events table is local audit state and
/// is deliberately not part of backups.
pub const TABLES: &[&str] = &[
    "sso",
    "idocs_user",
    "sso_user_detail",
    "idocs_user_detail",
    "con_nom",
    "idocs_con",
];

/// Exportable columns per table, also the targets of the '\r' cleanup.
const TABLE_COLUMNS: &[(&str, &[&str])] = &[
    ("sso", &["id_cree", "nom", "prenom", "sap_princ"]),
    ("idocs_user", &["id_cree", "nom", "prenom", "sap_princ"]),
    ("sso_user_detail", &["id_cree", "nom", "prenom", "iwu_id"]),
    (
        "idocs_user_detail",
        &["id_cree", "nom", "prenom", "iwu_id", "marque", "typeprofil"],
    ),
    ("con_nom", &["sap_princ", "sap_nom"]),
    ("idocs_con", &["sap_princ", "sap_dealer", "sap_nom"]),
];

fn columns_of(table: &str) -> Result<&'static [&'static str]> {
    TABLE_COLUMNS
        .iter()
        .find(|(t, _)| *t == table)
        .map(|(_, cols)| *cols)
        .with_context(|| format!("Unknown table: {}", table))
}

/// Base user table (one row per account, carries the dealer assignment).
pub fn user_table(source: SourceSystem) -> &'static str {
    match source {
        SourceSystem::Welcome => "sso",
        SourceSystem::Idocs => "idocs_user",
    }
}

/// Detail table (one row per account × IWU credential).
pub fn detail_table(source: SourceSystem) -> &'static str {
    match source {
        SourceSystem::Welcome => "sso_user_detail",
        SourceSystem::Idocs => "idocs_user_detail",
    }
}

// ============================================================================
// ROW TYPES
// ============================================================================

/// Row of sso / idocs_user: account plus dealer assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBaseRow {
    #[serde(rename = "id_cree")]
    pub user_id: String,

    #[serde(rename = "nom", default)]
    pub last_name: String,

    #[serde(rename = "prenom", default)]
    pub first_name: String,

    #[serde(rename = "sap_princ", default)]
    pub principal: Option<String>,
}

/// Row of sso_user_detail / idocs_user_detail: account plus one credential.
/// Brand and profile type only exist on the IDOCS side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetailRow {
    #[serde(rename = "id_cree")]
    pub user_id: String,

    #[serde(rename = "nom", default)]
    pub last_name: String,

    #[serde(rename = "prenom", default)]
    pub first_name: String,

    #[serde(rename = "iwu_id", default)]
    pub iwu_id: Option<String>,

    #[serde(rename = "marque", default)]
    pub brand: Option<String>,

    #[serde(rename = "typeprofil", default)]
    pub profile_type: Option<String>,
}

/// Row of con_nom: one composite tagged-name string per principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerNameRow {
    #[serde(rename = "sap_princ")]
    pub principal: String,

    #[serde(rename = "sap_nom", default)]
    pub composite_name: String,
}

/// Row of idocs_con: raw dealer hierarchy (principal, site, trade name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerLinkRow {
    #[serde(rename = "sap_princ", default)]
    pub principal: String,

    #[serde(rename = "sap_dealer", default)]
    pub dealer: String,

    #[serde(rename = "sap_nom", default)]
    pub name: String,
}

/// Outcome of one idempotent bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Rows affected by the '\r' cleanup, per column.
#[derive(Debug, Clone, Serialize)]
pub struct CleanStat {
    pub table: String,
    pub column: String,
    pub rows: usize,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    for source_table in ["sso", "idocs_user"] {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    row_hash TEXT UNIQUE NOT NULL,
                    id_cree TEXT NOT NULL,
                    nom TEXT NOT NULL DEFAULT '',
                    prenom TEXT NOT NULL DEFAULT '',
                    sap_princ TEXT,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )",
                source_table
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sso_user_detail (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_hash TEXT UNIQUE NOT NULL,
            id_cree TEXT NOT NULL,
            nom TEXT NOT NULL DEFAULT '',
            prenom TEXT NOT NULL DEFAULT '',
            iwu_id TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS idocs_user_detail (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_hash TEXT UNIQUE NOT NULL,
            id_cree TEXT NOT NULL,
            nom TEXT NOT NULL DEFAULT '',
            prenom TEXT NOT NULL DEFAULT '',
            iwu_id TEXT,
            marque TEXT,
            typeprofil TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS con_nom (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_hash TEXT UNIQUE NOT NULL,
            sap_princ TEXT NOT NULL,
            sap_nom TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS idocs_con (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_hash TEXT UNIQUE NOT NULL,
            sap_princ TEXT NOT NULL DEFAULT '',
            sap_dealer TEXT NOT NULL DEFAULT '',
            sap_nom TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_sso_princ ON sso(sap_princ)",
        "CREATE INDEX IF NOT EXISTS idx_sso_id ON sso(id_cree)",
        "CREATE INDEX IF NOT EXISTS idx_idocs_user_princ ON idocs_user(sap_princ)",
        "CREATE INDEX IF NOT EXISTS idx_idocs_user_id ON idocs_user(id_cree)",
        "CREATE INDEX IF NOT EXISTS idx_sso_detail_id ON sso_user_detail(id_cree)",
        "CREATE INDEX IF NOT EXISTS idx_sso_detail_iwu ON sso_user_detail(iwu_id)",
        "CREATE INDEX IF NOT EXISTS idx_idocs_detail_id ON idocs_user_detail(id_cree)",
        "CREATE INDEX IF NOT EXISTS idx_idocs_detail_iwu ON idocs_user_detail(iwu_id)",
        "CREATE INDEX IF NOT EXISTS idx_con_nom_princ ON con_nom(sap_princ)",
        "CREATE INDEX IF NOT EXISTS idx_idocs_con_dealer ON idocs_con(sap_dealer)",
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
    ];
    for sql in indexes {
        conn.execute(sql, [])?;
    }

    Ok(())
}

// ============================================================================
// IDEMPOTENT INSERTS
// ============================================================================

fn row_hash(table: &str, fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table);
    for field in fields {
        hasher.update([0x1f]);
        hasher.update(field);
    }
    format!("{:x}", hasher.finalize())
}

/// Run one parameterized insert, counting UNIQUE collisions as skips.
fn insert_hashed(
    conn: &Connection,
    sql: &str,
    row_params: &[&dyn rusqlite::ToSql],
    stats: &mut InsertStats,
) -> Result<()> {
    match conn.execute(sql, row_params) {
        Ok(_) => stats.inserted += 1,
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            stats.skipped += 1;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn log_import(conn: &Connection, table: &str, stats: InsertStats) -> Result<()> {
    let event = Event::new(
        "rows_imported",
        "table",
        table,
        serde_json::json!({
            "inserted": stats.inserted,
            "skipped": stats.skipped,
        }),
        "csv_import",
    );
    insert_event(conn, &event)
}

pub fn insert_users(
    conn: &Connection,
    source: SourceSystem,
    rows: &[UserBaseRow],
) -> Result<InsertStats> {
    let table = user_table(source);
    let sql = format!(
        "INSERT INTO {} (row_hash, id_cree, nom, prenom, sap_princ)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        table
    );

    let mut stats = InsertStats::default();
    for row in rows {
        let principal = row.principal.as_deref().unwrap_or("");
        let hash = row_hash(
            table,
            &[&row.user_id, &row.last_name, &row.first_name, principal],
        );
        insert_hashed(
            conn,
            &sql,
            params![hash, row.user_id, row.last_name, row.first_name, row.principal],
            &mut stats,
        )?;
    }

    log_import(conn, table, stats)?;
    Ok(stats)
}

pub fn insert_user_details(
    conn: &Connection,
    source: SourceSystem,
    rows: &[UserDetailRow],
) -> Result<InsertStats> {
    let table = detail_table(source);
    let sql = match source {
        SourceSystem::Welcome => format!(
            "INSERT INTO {} (row_hash, id_cree, nom, prenom, iwu_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            table
        ),
        SourceSystem::Idocs => format!(
            "INSERT INTO {} (row_hash, id_cree, nom, prenom, iwu_id, marque, typeprofil)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            table
        ),
    };

    let mut stats = InsertStats::default();
    for row in rows {
        let hash = row_hash(
            table,
            &[
                &row.user_id,
                &row.last_name,
                &row.first_name,
                row.iwu_id.as_deref().unwrap_or(""),
                row.brand.as_deref().unwrap_or(""),
                row.profile_type.as_deref().unwrap_or(""),
            ],
        );
        match source {
            SourceSystem::Welcome => insert_hashed(
                conn,
                &sql,
                params![hash, row.user_id, row.last_name, row.first_name, row.iwu_id],
                &mut stats,
            )?,
            SourceSystem::Idocs => insert_hashed(
                conn,
                &sql,
                params![
                    hash,
                    row.user_id,
                    row.last_name,
                    row.first_name,
                    row.iwu_id,
                    row.brand,
                    row.profile_type
                ],
                &mut stats,
            )?,
        }
    }

    log_import(conn, table, stats)?;
    Ok(stats)
}

pub fn insert_dealer_names(conn: &Connection, rows: &[DealerNameRow]) -> Result<InsertStats> {
    let mut stats = InsertStats::default();
    for row in rows {
        let hash = row_hash("con_nom", &[&row.principal, &row.composite_name]);
        insert_hashed(
            conn,
            "INSERT INTO con_nom (row_hash, sap_princ, sap_nom) VALUES (?1, ?2, ?3)",
            params![hash, row.principal, row.composite_name],
            &mut stats,
        )?;
    }

    log_import(conn, "con_nom", stats)?;
    Ok(stats)
}

pub fn insert_dealer_links(conn: &Connection, rows: &[DealerLinkRow]) -> Result<InsertStats> {
    let mut stats = InsertStats::default();
    for row in rows {
        let hash = row_hash("idocs_con", &[&row.principal, &row.dealer, &row.name]);
        insert_hashed(
            conn,
            "INSERT INTO idocs_con (row_hash, sap_princ, sap_dealer, sap_nom)
             VALUES (?1, ?2, ?3, ?4)",
            params![hash, row.principal, row.dealer, row.name],
            &mut stats,
        )?;
    }

    log_import(conn, "idocs_con", stats)?;
    Ok(stats)
}

// ============================================================================
// LOOKUP HELPERS
// ============================================================================

/// Case/space fold used by the SQL side of user-id prefilters.
///
/// ASCII-only uppercasing, to stay byte-for-byte consistent with SQLite's
/// UPPER(). The authoritative match is still normalize_id in Rust; this
/// fold only widens what a targeted query can reach.
pub fn fold_for_lookup(id: &str) -> String {
    id.replace(' ', "").to_ascii_uppercase()
}

/// Distinct dealer assignments present in one source's base table.
pub fn distinct_principals(conn: &Connection, source: SourceSystem) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT sap_princ FROM {}
         WHERE sap_princ IS NOT NULL AND sap_princ != ''
         ORDER BY sap_princ",
        user_table(source)
    ))?;

    let principals = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(principals)
}

/// Distinct account count per dealer for one source.
pub fn user_counts_by_principal(
    conn: &Connection,
    source: SourceSystem,
) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT sap_princ, COUNT(DISTINCT id_cree) FROM {}
         WHERE sap_princ IS NOT NULL AND sap_princ != ''
         GROUP BY sap_princ",
        user_table(source)
    ))?;

    let mut counts = HashMap::new();
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (principal, count) = row?;
        counts.insert(principal, count);
    }

    Ok(counts)
}

/// Distinct account count for one source, over accounts that have a
/// dealer assignment (unassigned rows are invisible to the dashboard).
pub fn distinct_user_count(conn: &Connection, source: SourceSystem) -> Result<i64> {
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(DISTINCT id_cree) FROM {}
             WHERE sap_princ IS NOT NULL AND sap_princ != ''",
            user_table(source)
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Composite tagged-name string per principal. When con_nom carries several
/// rows for one principal, the earliest inserted row wins.
pub fn composite_names(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT sap_princ, sap_nom FROM con_nom ORDER BY id")?;

    let mut names = HashMap::new();
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (principal, composite) = row?;
        names.entry(principal).or_insert(composite);
    }

    Ok(names)
}

pub fn composite_name_for(conn: &Connection, principal: &str) -> Result<Option<String>> {
    let mut stmt =
        conn.prepare("SELECT sap_nom FROM con_nom WHERE sap_princ = ?1 ORDER BY id LIMIT 1")?;
    let mut rows = stmt.query_map(params![principal], |row| row.get::<_, String>(0))?;
    match rows.next() {
        Some(name) => Ok(Some(name?)),
        None => Ok(None),
    }
}

/// Headline trade name from the raw dealer hierarchy, keyed by site code.
pub fn principal_display_name(conn: &Connection, principal: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT sap_nom FROM idocs_con
         WHERE sap_dealer = ?1 AND sap_nom != ''
         ORDER BY id LIMIT 1",
    )?;
    let mut rows = stmt.query_map(params![principal], |row| row.get::<_, String>(0))?;
    match rows.next() {
        Some(name) => Ok(Some(name?)),
        None => Ok(None),
    }
}

// ============================================================================
// USER QUERIES
// ============================================================================

/// All accounts assigned to one dealer, one row per (account, credential).
/// Detail rows attach by exact id_cree equality; accounts with no detail
/// row come back with a NULL credential.
pub fn users_for_principal(
    conn: &Connection,
    source: SourceSystem,
    principal: &str,
) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT u.id_cree, u.nom, u.prenom, d.iwu_id
         FROM {} u
         LEFT JOIN {} d ON u.id_cree = d.id_cree
         WHERE u.sap_princ = ?1
         ORDER BY u.nom, u.prenom, u.id_cree",
        user_table(source),
        detail_table(source)
    ))?;

    let users = stmt
        .query_map(params![principal], |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                last_name: row.get(1)?,
                first_name: row.get(2)?,
                iwu_id: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

/// Detail rows for one account, matched on the raw id OR its lookup fold.
/// Accent variants that only normalize_id can unify are out of reach of a
/// targeted query; callers that care re-check with normalize_id.
pub fn user_details_for(
    conn: &Connection,
    source: SourceSystem,
    user_id: &str,
) -> Result<Vec<UserDetailRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id_cree, nom, prenom, iwu_id{} FROM {}
         WHERE id_cree = ?1 OR UPPER(REPLACE(id_cree, ' ', '')) = ?2
         ORDER BY id",
        match source {
            SourceSystem::Welcome => "",
            SourceSystem::Idocs => ", marque, typeprofil",
        },
        detail_table(source)
    ))?;

    let folded = fold_for_lookup(user_id);
    let details = match source {
        SourceSystem::Welcome => stmt
            .query_map(params![user_id, folded], |row| {
                Ok(UserDetailRow {
                    user_id: row.get(0)?,
                    last_name: row.get(1)?,
                    first_name: row.get(2)?,
                    iwu_id: row.get(3)?,
                    brand: None,
                    profile_type: None,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?,
        SourceSystem::Idocs => stmt
            .query_map(params![user_id, folded], |row| {
                Ok(UserDetailRow {
                    user_id: row.get(0)?,
                    last_name: row.get(1)?,
                    first_name: row.get(2)?,
                    iwu_id: row.get(3)?,
                    brand: row.get(4)?,
                    profile_type: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(details)
}

/// Distinct dealers one account is assigned to in one source's base table.
pub fn principals_for_user(
    conn: &Connection,
    source: SourceSystem,
    user_id: &str,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT sap_princ FROM {}
         WHERE (id_cree = ?1 OR UPPER(REPLACE(id_cree, ' ', '')) = ?2)
           AND sap_princ IS NOT NULL AND sap_princ != ''
         ORDER BY sap_princ",
        user_table(source)
    ))?;

    let principals = stmt
        .query_map(params![user_id, fold_for_lookup(user_id)], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(principals)
}

/// One entry in the account directory (union of both detail tables).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub last_name: String,
    pub first_name: String,
}

pub fn user_directory(conn: &Connection) -> Result<Vec<UserIdentity>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT id_cree, nom, prenom FROM sso_user_detail
         UNION
         SELECT DISTINCT id_cree, nom, prenom FROM idocs_user_detail
         ORDER BY nom, prenom, id_cree",
    )?;

    let users = stmt
        .query_map([], |row| {
            Ok(UserIdentity {
                user_id: row.get(0)?,
                last_name: row.get(1)?,
                first_name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

/// Other accounts holding any of the given IWU credentials. The subject is
/// excluded by raw id and by lookup fold; callers still drop rows whose
/// normalized id equals the subject's.
pub fn users_sharing_iwu(
    conn: &Connection,
    source: SourceSystem,
    iwu_ids: &[String],
    exclude_user_id: &str,
) -> Result<Vec<UserDetailRow>> {
    if iwu_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; iwu_ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT id_cree, nom, prenom, iwu_id FROM {}
         WHERE iwu_id IN ({})
           AND id_cree != ?
           AND UPPER(REPLACE(id_cree, ' ', '')) != ?",
        detail_table(source),
        placeholders
    ))?;

    let folded = fold_for_lookup(exclude_user_id);
    let bound = iwu_ids
        .iter()
        .map(String::as_str)
        .chain([exclude_user_id, folded.as_str()]);

    let rows = stmt
        .query_map(params_from_iter(bound), |row| {
            Ok(UserDetailRow {
                user_id: row.get(0)?,
                last_name: row.get(1)?,
                first_name: row.get(2)?,
                iwu_id: row.get(3)?,
                brand: None,
                profile_type: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Substring search over name, first name and credential in one source's
/// detail table. `pattern` is a ready-made LIKE pattern ("%term%").
pub fn search_user_details(
    conn: &Connection,
    source: SourceSystem,
    pattern: &str,
) -> Result<Vec<UserDetailRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT id_cree, nom, prenom, iwu_id FROM {}
         WHERE nom LIKE ?1 OR prenom LIKE ?1 OR iwu_id LIKE ?1
         ORDER BY nom, prenom
         LIMIT 100",
        detail_table(source)
    ))?;

    let rows = stmt
        .query_map(params![pattern], |row| {
            Ok(UserDetailRow {
                user_id: row.get(0)?,
                last_name: row.get(1)?,
                first_name: row.get(2)?,
                iwu_id: row.get(3)?,
                brand: None,
                profile_type: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// BACKUP & CLEANUP
// ============================================================================

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    if !TABLES.contains(&table) {
        bail!("Unknown table: {}", table);
    }
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// Dump one table to CSV (header + data columns, no surrogate ids).
/// Returns the number of rows written.
pub fn export_table_csv(conn: &Connection, table: &str, out: impl Write) -> Result<usize> {
    let columns = columns_of(table)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY id",
        columns.join(", "),
        table
    ))?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(columns)?;

    let mut written = 0;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let value: Option<String> = row.get(idx)?;
            record.push(value.unwrap_or_default());
        }
        writer.write_record(&record)?;
        written += 1;
    }
    writer.flush()?;

    Ok(written)
}

/// Strip stray '\r' characters from every whitelisted text column.
/// Returns one entry per column that actually had dirty rows.
pub fn clean_carriage_returns(conn: &Connection) -> Result<Vec<CleanStat>> {
    let mut stats = Vec::new();

    for (table, columns) in TABLE_COLUMNS {
        for column in *columns {
            let affected = conn.execute(
                &format!(
                    "UPDATE {} SET {} = REPLACE({}, ?1, '') WHERE {} LIKE ?2",
                    table, column, column, column
                ),
                params!["\r", "%\r%"],
            )?;
            if affected > 0 {
                stats.push(CleanStat {
                    table: table.to_string(),
                    column: column.to_string(),
                    rows: affected,
                });
            }
        }
    }

    Ok(stats)
}

/// Every (table, column) pair covered by the cleanup and hygiene sweeps.
pub fn cleanable_columns() -> impl Iterator<Item = (&'static str, &'static str)> {
    TABLE_COLUMNS
        .iter()
        .flat_map(|(table, columns)| columns.iter().map(move |column| (*table, *column)))
}

/// Count rows of one column matching a LIKE pattern. Used by the hygiene
/// checks; table and column must be whitelisted.
pub fn count_column_matching(
    conn: &Connection,
    table: &str,
    column: &str,
    pattern: &str,
) -> Result<i64> {
    let columns = columns_of(table)?;
    if !columns.contains(&column) {
        bail!("Unknown column {} on table {}", column, table);
    }

    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {} LIKE ?1", table, column),
        params![pattern],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Count rows where one whitelisted column is NULL or empty.
pub fn count_column_empty(conn: &Connection, table: &str, column: &str) -> Result<i64> {
    let columns = columns_of(table)?;
    if !columns.contains(&column) {
        bail!("Unknown column {} on table {}", column, table);
    }

    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL OR {} = ''",
            table, column, column
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Audit trail entry: every import and cleanup leaves one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================
