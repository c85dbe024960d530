// Dealerview - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod aggregate;
pub mod check;
pub mod db;
pub mod ingest;
pub mod names;
pub mod normalize;
pub mod reconcile;
pub mod report;

// Re-export commonly used types
pub use aggregate::{aggregate_users, AggregatedUser, UserRow, NO_IWU};
pub use check::{run_checks, DataIssue, HygieneReport, Severity};
pub use db::{
    clean_carriage_returns, count_rows, export_table_csv, get_events_for_entity,
    insert_dealer_links, insert_dealer_names, insert_event, insert_user_details, insert_users,
    setup_database, CleanStat, Event, InsertStats, TABLES,
};
pub use ingest::{
    build_composite_names, load_dealer_links, load_dealer_names, load_user_details,
    load_user_rows, write_dealer_names_csv,
};
pub use names::{classify_names, parse_names, NameClassification, SourceSystem};
pub use normalize::normalize_id;
pub use reconcile::{
    classify_membership, compare_users, DealerUserStats, Membership, MembershipCounts,
    UserComparison, UserComparisonRow, STATUS_BOTH,
};
pub use report::{
    build_dealer_comparison, build_dealer_dashboard, build_user_report, search_users,
    DashboardFilter, DealerComparison, DealerDashboard, DealerSummary, UserReport, UserSearchHit,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
