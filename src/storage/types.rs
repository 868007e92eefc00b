//! Row types mapped to the SQLite tables.
//!
//! Content-bearing tables (processes, threats, ratings, detail rows) are
//! rebuilt wholesale by each import; the `New*` structs are the insert
//! payloads the importer produces. Threat ids are pre-assigned by the
//! importer so detail rows can reference them inside one transaction.

use serde::Serialize;

/// A report owner (API user). Password hash stays internal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Owner {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
}

/// A business process identified by its external SID.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Process {
    pub id: i64,
    pub sid: String,
    pub name: String,
    pub risk_label: String,
    pub owner_block: String,
    pub department: String,
    pub rating: f64,
    pub owner_id: Option<i64>,
}

/// A (type, scenario) threat pair attached to one process by SID.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Threat {
    pub id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub threat_type: String,
    pub scenario: String,
    pub integral_risk_level: String,
    pub highest_risk_level: String,
    pub process_sid: String,
}

/// One integral rating row per input row, with a derived display color.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IntegralThreatRating {
    pub id: i64,
    pub process_sid: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub threat_rating: String,
    pub color: String,
}

/// Granular risk attributes per (process, threat), one row per detailed
/// report row that resolved to a threat.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RiskDetail {
    pub id: i64,
    pub process_sid: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub impact_type: String,
    pub risk_impact: String,
    pub risk_assessment: String,
    pub risk_label: String,
    pub risk_assessment_explanation: String,
    pub high_risk_count: String,
    pub total_risk_count: String,
    pub process_threat_rating: String,
    pub as_reserved_in_rcod: String,
    pub rto_hours: String,
    pub mtpd: String,
    pub tr: String,
    pub threat_id: i64,
}

/// Wide fact row from the detailed risk calculation report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DetailedRiskReport {
    pub id: i64,
    pub process: String,
    pub process_sid: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub impact_type: String,
    pub risk_subcategory: String,
    pub risk_group: String,
    pub risk_subgroup: String,
    pub integral_risk: String,
    pub operational_risk: String,
    pub reputational_risk: String,
    pub regulatory_risk: String,
    pub financial_risk: String,
    pub impact_assessment: String,
    pub probability_assessment: String,
    pub control_assessment: String,
    pub risk_level: String,
    pub rto_hours: String,
    pub mtpd: String,
    pub tr: String,
    pub risk_assessment_explanation: String,
    pub as_reserved_in_rcod: String,
    pub threat_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProcess {
    pub sid: String,
    pub name: String,
    pub risk_label: String,
    pub owner_block: String,
    pub department: String,
    pub rating: f64,
}

/// Threat insert payload with an importer-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewThreat {
    pub id: i64,
    pub threat_type: String,
    pub scenario: String,
    pub integral_risk_level: String,
    pub highest_risk_level: String,
    pub process_sid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub process_sid: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub threat_rating: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRiskDetail {
    pub process_sid: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub impact_type: String,
    pub risk_impact: String,
    pub risk_assessment: String,
    pub risk_label: String,
    pub risk_assessment_explanation: String,
    pub high_risk_count: String,
    pub total_risk_count: String,
    pub process_threat_rating: String,
    pub as_reserved_in_rcod: String,
    pub rto_hours: String,
    pub mtpd: String,
    pub tr: String,
    pub threat_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDetailedReport {
    pub process: String,
    pub process_sid: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub impact_type: String,
    pub risk_subcategory: String,
    pub risk_group: String,
    pub risk_subgroup: String,
    pub integral_risk: String,
    pub operational_risk: String,
    pub reputational_risk: String,
    pub regulatory_risk: String,
    pub financial_risk: String,
    pub impact_assessment: String,
    pub probability_assessment: String,
    pub control_assessment: String,
    pub risk_level: String,
    pub rto_hours: String,
    pub mtpd: String,
    pub tr: String,
    pub risk_assessment_explanation: String,
    pub as_reserved_in_rcod: String,
    pub threat_id: i64,
}

/// Full replacement payload for one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub processes: Vec<NewProcess>,
    pub threats: Vec<NewThreat>,
    pub ratings: Vec<NewRating>,
    pub risk_details: Vec<NewRiskDetail>,
    pub detailed_reports: Vec<NewDetailedReport>,
}

/// Per-table row counts, used by the `check` subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatchCounts {
    pub processes: i64,
    pub threats: i64,
    pub ratings: i64,
    pub risk_details: i64,
    pub detailed_reports: i64,
}
