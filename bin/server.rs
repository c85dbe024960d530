// Dealerview - Web Server
// REST API with Axum over the reconciliation store

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use dealerview::{
    build_dealer_comparison, build_dealer_dashboard, build_user_report, db, search_users,
    DashboardFilter, SourceSystem,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<serde_json::Value> {
    fn fail(error: &anyhow::Error) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.to_string()),
        }
    }
}

/// Store errors surface as 500 with the message in the envelope, so an
/// empty result and a failed query are distinguishable to the client.
fn respond<T: Serialize>(context: &str, result: anyhow::Result<T>) -> axum::response::Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => {
            eprintln!("Error {}: {}", context, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(&e)),
            )
                .into_response()
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

#[derive(Deserialize)]
struct DashboardQuery {
    search: Option<String>,
    matches_only: Option<bool>,
}

/// GET /api/dashboard - Per-source dealer lists plus global stats
async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();
    let filter = DashboardFilter {
        search: params.search.unwrap_or_default(),
        matches_only: params.matches_only.unwrap_or(false),
    };
    respond("building dashboard", build_dealer_dashboard(&conn, &filter))
}

#[derive(Serialize)]
struct PrincipalsResponse {
    welcome: Vec<String>,
    idocs: Vec<String>,
}

/// GET /api/principals - Distinct dealer codes per source
async fn get_principals(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();
    let result = db::distinct_principals(&conn, SourceSystem::Welcome).and_then(|welcome| {
        let idocs = db::distinct_principals(&conn, SourceSystem::Idocs)?;
        Ok(PrincipalsResponse { welcome, idocs })
    });
    respond("listing principals", result)
}

/// GET /api/dealers/:principal - Cross-source comparison for one dealer
async fn get_dealer(
    State(state): State<AppState>,
    Path(principal): Path<String>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();
    respond(
        "building dealer comparison",
        build_dealer_comparison(&conn, &principal),
    )
}

/// GET /api/users - Account directory (union of both sources)
async fn get_users(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();
    respond("listing users", db::user_directory(&conn))
}

#[derive(Deserialize)]
struct UserReportQuery {
    id: String,
}

/// GET /api/users/report?id= - Cross-source report for one account
async fn get_user_report(
    State(state): State<AppState>,
    Query(params): Query<UserReportQuery>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();
    respond("building user report", build_user_report(&conn, &params.id))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

/// GET /api/users/search?q= - Substring search over both detail tables
async fn get_user_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();
    let term = params.q.unwrap_or_default();
    respond("searching users", search_users(&conn, &term))
}

/// GET / - Serve dashboard page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /dealers - Serve dealer comparison page
async fn serve_dealers() -> impl IntoResponse {
    Html(include_str!("../web/dealers.html"))
}

/// GET /users - Serve user report page
async fn serve_users() -> impl IntoResponse {
    Html(include_str!("../web/users.html"))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Dealerview - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Open database
    let db_path = std::env::var("DEALERVIEW_DB").unwrap_or_else(|_| "dealerview.db".to_string());

    if !std::path::Path::new(&db_path).exists() {
        eprintln!("❌ Database not found at {}", db_path);
        eprintln!("   Run: dealerview import <data_dir>");
        eprintln!("   to load the upstream exports first.");
        std::process::exit(1);
    }

    let conn = Connection::open(&db_path).expect("Failed to open database");
    println!("✓ Database opened: {}", db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/principals", get(get_principals))
        .route("/dealers/:principal", get(get_dealer))
        .route("/users", get(get_users))
        .route("/users/report", get(get_user_report))
        .route("/users/search", get(get_user_search))
        .with_state(state.clone());

    // Build main router
    let app = Router::new()
        .route("/", get(serve_index))
        .route("/dealers", get(serve_dealers))
        .route("/users", get(serve_users))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(CorsLayer::permissive());

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   API: http://localhost:3000/api/dashboard");
    println!("   UI:  http://localhost:3000");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
