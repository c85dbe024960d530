// 📥 CSV Ingestion - upstream exports in, composite dealer names out
//
// Upstream files arrive in two flavours: plain comma CSV (table backups)
// and Excel-derived semicolon CSV with a UTF-8 BOM (dealer exports). The
// loaders here accept both and hand rows to db.rs untouched; the only
// transformation that happens at ingest time is building the con_nom
// composite strings from the raw dealer exports.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::db::{DealerLinkRow, DealerNameRow, UserBaseRow, UserDetailRow};
use crate::names::SourceSystem;

// ============================================================================
// LOADERS
// ============================================================================

fn sniff_delimiter(text: &str) -> u8 {
    // Semicolon files always carry it in the header line.
    if text.lines().next().unwrap_or("").contains(';') {
        b';'
    } else {
        b','
    }
}

fn parse_csv<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: T = result.context("Failed to deserialize CSV row")?;
        rows.push(row);
    }
    Ok(rows)
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_csv(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load a base user export (sso / idocs_user backup).
pub fn load_user_rows(path: &Path) -> Result<Vec<UserBaseRow>> {
    read_csv(path)
}

/// Load a detail export (sso_user_detail / idocs_user_detail backup).
pub fn load_user_details(path: &Path) -> Result<Vec<UserDetailRow>> {
    read_csv(path)
}

/// Load a ready-made composite-name file (con_nom backup or a file
/// produced by [`write_dealer_names_csv`]).
pub fn load_dealer_names(path: &Path) -> Result<Vec<DealerNameRow>> {
    read_csv(path)
}

/// Load a raw dealer export (principal / site / trade name).
pub fn load_dealer_links(path: &Path) -> Result<Vec<DealerLinkRow>> {
    read_csv(path)
}

// ============================================================================
// SAP CODE CLEANUP
// ============================================================================

/// Scrub one SAP code as exported through Excel: strips whitespace, maps
/// the literal "nan" to empty, drops the ".0" tail that float-typed code
/// columns grow on export.
pub fn clean_sap(raw: &str) -> String {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("nan") {
        return String::new();
    }
    s.strip_suffix(".0").unwrap_or(s).to_string()
}

// ============================================================================
// COMPOSITE NAME BUILDING
// ============================================================================

fn clean_links(rows: &[DealerLinkRow]) -> Vec<DealerLinkRow> {
    rows.iter()
        .map(|row| DealerLinkRow {
            principal: clean_sap(&row.principal),
            dealer: clean_sap(&row.dealer),
            name: row.name.trim().to_string(),
        })
        .collect()
}

/// Names one source knows for `principal`, tagged and deduplicated in
/// encounter order. Rows where the site IS the principal are preferred;
/// satellite-site names are only used when no such row exists.
fn tagged_names(rows: &[DealerLinkRow], principal: &str, source: SourceSystem) -> Vec<String> {
    let matching: Vec<&DealerLinkRow> =
        rows.iter().filter(|r| r.principal == principal).collect();
    let strict: Vec<&DealerLinkRow> = matching
        .iter()
        .copied()
        .filter(|r| r.dealer == principal)
        .collect();
    let pool = if strict.is_empty() { &matching } else { &strict };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut names = Vec::new();
    for row in pool {
        let name = row.name.as_str();
        if name.is_empty() || name.eq_ignore_ascii_case("nan") {
            continue;
        }
        if seen.insert(name) {
            names.push(format!("{}: {}", source.name(), name));
        }
    }
    names
}

/// Merge the two raw dealer exports into one con_nom row per principal.
///
/// The principal universe is the union of both exports; output is sorted
/// by principal. IDOCS segments come first in each composite string. A
/// principal whose names were all empty still gets a row, with an empty
/// composite.
pub fn build_composite_names(
    idocs: &[DealerLinkRow],
    welcome: &[DealerLinkRow],
) -> Vec<DealerNameRow> {
    let idocs = clean_links(idocs);
    let welcome = clean_links(welcome);

    let principals: BTreeSet<&str> = idocs
        .iter()
        .chain(&welcome)
        .map(|r| r.principal.as_str())
        .filter(|p| !p.is_empty())
        .collect();

    principals
        .into_iter()
        .map(|principal| {
            let mut parts = tagged_names(&idocs, principal, SourceSystem::Idocs);
            parts.extend(tagged_names(&welcome, principal, SourceSystem::Welcome));
            DealerNameRow {
                principal: principal.to_string(),
                composite_name: parts.join(" ; "),
            }
        })
        .collect()
}

/// Write composite names as semicolon CSV with a UTF-8 BOM, the shape the
/// downstream Excel users expect.
pub fn write_dealer_names_csv(rows: &[DealerNameRow], mut out: impl Write) -> Result<()> {
    out.write_all(b"\xef\xbb\xbf")?;

    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(out);
    writer.write_record(["sap_princ", "sap_nom"])?;
    for row in rows {
        writer.write_record([&row.principal, &row.composite_name])?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
