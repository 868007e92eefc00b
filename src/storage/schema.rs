//! Idempotent schema creation plus the one additive migration.

use log::info;
use sqlx::{Pool, Row, Sqlite};

use crate::error_handling::types::StorageError;

const CREATE_OWNERS: &str = "CREATE TABLE IF NOT EXISTS owners (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    password_hash TEXT NOT NULL
);";

const CREATE_PROCESSES: &str = "CREATE TABLE IF NOT EXISTS processes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    risk_label TEXT NOT NULL,
    owner_block TEXT NOT NULL,
    department TEXT NOT NULL,
    rating REAL NOT NULL,
    owner_id INTEGER REFERENCES owners(id)
);";

const CREATE_THREATS: &str = "CREATE TABLE IF NOT EXISTS threats (
    id INTEGER PRIMARY KEY,
    type TEXT NOT NULL,
    scenario TEXT NOT NULL,
    integral_risk_level TEXT NOT NULL,
    highest_risk_level TEXT NOT NULL,
    process_sid TEXT NOT NULL REFERENCES processes(sid)
);";

const CREATE_RATINGS: &str = "CREATE TABLE IF NOT EXISTS integral_threat_ratings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_sid TEXT NOT NULL,
    threat_type TEXT NOT NULL,
    threat_scenario TEXT NOT NULL,
    threat_rating TEXT NOT NULL,
    color TEXT NOT NULL
);";

const CREATE_RISK_DETAILS: &str = "CREATE TABLE IF NOT EXISTS risk_details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_sid TEXT NOT NULL,
    threat_type TEXT NOT NULL,
    threat_scenario TEXT NOT NULL,
    impact_type TEXT NOT NULL,
    risk_impact TEXT NOT NULL,
    risk_assessment TEXT NOT NULL,
    risk_label TEXT NOT NULL,
    risk_assessment_explanation TEXT NOT NULL,
    high_risk_count TEXT NOT NULL,
    total_risk_count TEXT NOT NULL,
    process_threat_rating TEXT NOT NULL,
    as_reserved_in_rcod TEXT NOT NULL,
    rto_hours TEXT NOT NULL,
    mtpd TEXT NOT NULL,
    tr TEXT NOT NULL,
    threat_id INTEGER NOT NULL REFERENCES threats(id)
);";

const CREATE_DETAILED_REPORTS: &str = "CREATE TABLE IF NOT EXISTS detailed_risk_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process TEXT NOT NULL,
    process_sid TEXT NOT NULL,
    threat_type TEXT NOT NULL,
    threat_scenario TEXT NOT NULL,
    impact_type TEXT NOT NULL,
    risk_subcategory TEXT NOT NULL,
    risk_group TEXT NOT NULL,
    risk_subgroup TEXT NOT NULL,
    integral_risk TEXT NOT NULL,
    operational_risk TEXT NOT NULL,
    reputational_risk TEXT NOT NULL,
    regulatory_risk TEXT NOT NULL,
    financial_risk TEXT NOT NULL,
    impact_assessment TEXT NOT NULL,
    probability_assessment TEXT NOT NULL,
    control_assessment TEXT NOT NULL,
    risk_level TEXT NOT NULL,
    rto_hours TEXT NOT NULL,
    mtpd TEXT NOT NULL,
    tr TEXT NOT NULL,
    risk_assessment_explanation TEXT NOT NULL,
    threat_id INTEGER NOT NULL REFERENCES threats(id)
);";

/// Creates all tables if missing and applies the additive column migration.
pub async fn init(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    for statement in [
        CREATE_OWNERS,
        CREATE_PROCESSES,
        CREATE_THREATS,
        CREATE_RATINGS,
        CREATE_RISK_DETAILS,
        CREATE_DETAILED_REPORTS,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    add_reserved_column_if_missing(pool).await
}

/// Older databases predate the `as_reserved_in_rcod` column on
/// detailed_risk_reports. Adds it when absent, checked via PRAGMA.
async fn add_reserved_column_if_missing(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    let rows = sqlx::query("PRAGMA table_info(detailed_risk_reports);")
        .fetch_all(pool)
        .await?;
    let exists = rows.iter().any(|row| {
        row.try_get::<String, _>("name")
            .map(|name| name == "as_reserved_in_rcod")
            .unwrap_or(false)
    });
    if !exists {
        info!("Adding column as_reserved_in_rcod to detailed_risk_reports");
        sqlx::query(
            "ALTER TABLE detailed_risk_reports ADD COLUMN as_reserved_in_rcod TEXT NOT NULL DEFAULT '';",
        )
        .execute(pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
    }
    Ok(())
}
