use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::Connection;
use std::env;
use std::fs;
use std::fs::File;
use std::path::Path;

use dealerview::{
    build_composite_names, build_dealer_comparison, clean_carriage_returns, count_rows,
    export_table_csv, insert_dealer_links, insert_dealer_names, insert_user_details,
    insert_users, load_dealer_links, load_dealer_names, load_user_details, load_user_rows,
    run_checks, setup_database, write_dealer_names_csv, Severity, SourceSystem, TABLES,
};

const DEFAULT_DB: &str = "dealerview.db";
const DEFAULT_NAMES_OUT: &str = "con_nom.csv";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") if args.len() >= 3 => {
            run_import(Path::new(&args[2]), arg_or(&args, 3, DEFAULT_DB))?;
        }
        Some("names") if args.len() >= 4 => {
            run_names(
                Path::new(&args[2]),
                Path::new(&args[3]),
                arg_or(&args, 4, DEFAULT_NAMES_OUT),
                arg_or(&args, 5, DEFAULT_DB),
            )?;
        }
        Some("backup") => run_backup(arg_or(&args, 2, DEFAULT_DB))?,
        Some("check") => run_check(arg_or(&args, 2, DEFAULT_DB))?,
        Some("report") if args.len() >= 3 => {
            run_report(&args[2], arg_or(&args, 3, DEFAULT_DB))?;
        }
        _ => print_usage(),
    }

    Ok(())
}

fn arg_or<'a>(args: &'a [String], index: usize, default: &'a str) -> &'a str {
    args.get(index).map(String::as_str).unwrap_or(default)
}

fn print_usage() {
    println!("Dealerview - WELCOME / IDOCS reconciliation");
    println!();
    println!("Usage: dealerview <command> [args]");
    println!();
    println!("Commands:");
    println!("  import <data_dir> [db]      Load upstream CSV exports into SQLite");
    println!("  names <idocs.csv> <welcome.csv> [out.csv] [db]");
    println!("                              Build composite dealer names (con_nom)");
    println!("  backup [db]                 Export all tables, then strip stray \\r");
    println!("  check [db]                  Scan the store for data hygiene issues");
    println!("  report <sap_princ> [db]     Print a dealer comparison");
    println!();
    println!("Default database: {}", DEFAULT_DB);
}

/// Open an existing store, refusing to silently create an empty one.
fn open_store(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        eprintln!("❌ Database not found: {}", db_path);
        eprintln!("   Run: dealerview import <data_dir>");
        eprintln!("   to load the upstream exports first.");
        std::process::exit(1);
    }
    Connection::open(db_path).with_context(|| format!("Failed to open {}", db_path))
}

// ============================================================================
// IMPORT
// ============================================================================

fn run_import(data_dir: &Path, db_path: &str) -> Result<()> {
    println!("📥 Dealerview Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !data_dir.is_dir() {
        eprintln!("❌ Not a directory: {}", data_dir.display());
        std::process::exit(1);
    }

    println!("\n🔧 Setting up database {}...", db_path);
    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    println!("\n💾 Importing tables from {}...", data_dir.display());
    let mut inserted = 0;
    let mut skipped = 0;

    for table in TABLES {
        let path = data_dir.join(format!("{}.csv", table));
        if !path.exists() {
            println!("⚠️  {}.csv not found, skipped", table);
            continue;
        }

        let stats = match *table {
            "sso" => insert_users(&conn, SourceSystem::Welcome, &load_user_rows(&path)?)?,
            "idocs_user" => insert_users(&conn, SourceSystem::Idocs, &load_user_rows(&path)?)?,
            "sso_user_detail" => {
                insert_user_details(&conn, SourceSystem::Welcome, &load_user_details(&path)?)?
            }
            "idocs_user_detail" => {
                insert_user_details(&conn, SourceSystem::Idocs, &load_user_details(&path)?)?
            }
            "con_nom" => insert_dealer_names(&conn, &load_dealer_names(&path)?)?,
            "idocs_con" => insert_dealer_links(&conn, &load_dealer_links(&path)?)?,
            _ => unreachable!(),
        };
        println!(
            "✓ {}: {} inserted, {} duplicates skipped",
            table, stats.inserted, stats.skipped
        );
        inserted += stats.inserted;
        skipped += stats.skipped;
    }

    println!("\n🔍 Verifying database...");
    for table in TABLES {
        println!("✓ {}: {} rows", table, count_rows(&conn, table)?);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete: {} rows inserted, {} duplicates", inserted, skipped);

    Ok(())
}

// ============================================================================
// COMPOSITE NAMES
// ============================================================================

fn run_names(idocs_csv: &Path, welcome_csv: &Path, out_path: &str, db_path: &str) -> Result<()> {
    println!("🏷️  Dealer Name Builder - IDOCS + WELCOME → con_nom");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading dealer exports...");
    let idocs = load_dealer_links(idocs_csv)?;
    println!("✓ Loaded {} IDOCS rows", idocs.len());
    let welcome = load_dealer_links(welcome_csv)?;
    println!("✓ Loaded {} WELCOME rows", welcome.len());

    println!("\n🔗 Merging names per principal...");
    let rows = build_composite_names(&idocs, &welcome);
    println!("✓ {} principals across both sources", rows.len());

    let out = File::create(out_path).with_context(|| format!("Failed to create {}", out_path))?;
    write_dealer_names_csv(&rows, out)?;
    println!("✓ Wrote {}", out_path);

    println!("\n💾 Loading into {}...", db_path);
    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    let stats = insert_dealer_names(&conn, &rows)?;
    println!(
        "✓ con_nom: {} inserted, {} duplicates skipped",
        stats.inserted, stats.skipped
    );

    println!("\n✅ Done");
    Ok(())
}

// ============================================================================
// BACKUP & CLEANUP
// ============================================================================

fn run_backup(db_path: &str) -> Result<()> {
    println!("🗄️  Dealerview Backup - SQLite → timestamped CSV");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_store(db_path)?;

    let backup_dir = Local::now().format("backup_%Y%m%d_%H%M").to_string();
    fs::create_dir_all(&backup_dir)
        .with_context(|| format!("Failed to create {}", backup_dir))?;
    println!("\n📂 Exporting into {}/...", backup_dir);

    for table in TABLES {
        let path = Path::new(&backup_dir).join(format!("{}.csv", table));
        let out = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let rows = export_table_csv(&conn, table, out)?;
        println!("✓ {}: {} rows", table, rows);
    }

    println!("\n🧹 Stripping stray carriage returns...");
    let cleaned = clean_carriage_returns(&conn)?;
    if cleaned.is_empty() {
        println!("✓ No stray carriage returns found");
    } else {
        for stat in &cleaned {
            println!("✓ {}.{}: {} rows cleaned", stat.table, stat.column, stat.rows);
        }
    }

    println!("\n🔍 Verifying database...");
    for table in TABLES {
        println!("✓ {}: {} rows", table, count_rows(&conn, table)?);
    }

    println!("\n✅ Backup complete in {}/", backup_dir);
    Ok(())
}

// ============================================================================
// HYGIENE CHECK
// ============================================================================

fn run_check(db_path: &str) -> Result<()> {
    println!("✅ Dealerview Check - data hygiene scan");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_store(db_path)?;
    let report = run_checks(&conn)?;

    println!("\n{}", report.summary());
    for issue in &report.issues {
        let label = match issue.severity {
            Severity::Critical => "CRIT",
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("  [{}] {}.{}: {}", label, issue.table, issue.column, issue.issue);
        println!("         → {}", issue.recommendation);
    }

    if report.is_clean() {
        println!("\n🎉 Store is clean");
    } else if report.has_critical_issues() {
        println!("\n❌ Critical issues found, run `dealerview backup` to clean");
        std::process::exit(1);
    }

    Ok(())
}

// ============================================================================
// DEALER REPORT
// ============================================================================

fn run_report(principal: &str, db_path: &str) -> Result<()> {
    let conn = open_store(db_path)?;
    let cmp = build_dealer_comparison(&conn, principal)?;

    println!("🔎 Dealer {} - {}", cmp.principal, cmp.principal_name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("WELCOME names: {}", join_or_dash(&cmp.welcome_names));
    println!("IDOCS names:   {}", join_or_dash(&cmp.idocs_names));

    for (label, rows) in [("WELCOME", &cmp.users.welcome), ("IDOCS", &cmp.users.idocs)] {
        println!("\n{} users ({}):", label, rows.len());
        for user in rows {
            println!(
                "  {:<20} {} {} [{}]{}",
                user.user_id,
                user.last_name,
                user.first_name,
                user.iwu_display,
                if user.status.is_empty() {
                    String::new()
                } else {
                    format!("  ← {}", user.status)
                }
            );
        }
    }

    let stats = &cmp.users.stats;
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✓ {} WELCOME / {} IDOCS | in both: {} | only WELCOME: {} | only IDOCS: {}",
        stats.total_welcome, stats.total_idocs, stats.in_both, stats.only_welcome, stats.only_idocs
    );
    println!(
        "✓ Without IWU: {} WELCOME, {} IDOCS",
        stats.welcome_no_iwu, stats.idocs_no_iwu
    );

    Ok(())
}

fn join_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(" / ")
    }
}
