//! Three-pass construction of the replacement batch from the two reports.
//!
//! Pass 1 indexes supplementary integral fields by join key. Pass 2 creates
//! processes (first SID occurrence wins), threats (first key occurrence
//! wins) and one rating row per input row. Pass 3 joins detailed rows to
//! the threats from pass 2 and drops rows whose key was never seen.

use std::collections::{HashMap, HashSet};

use log::{info, warn};

use crate::configuration::config::Config;
use crate::error_handling::types::ImportError;
use crate::import::rows::{
    color_for_rating, normalize_reserved_flag, parse_rating, DetailedRow, IntegralRow,
    RESERVED_UNKNOWN,
};
use crate::import::workbook::{load_detailed_rows, load_integral_rows};
use crate::storage::store::RiskStore;
use crate::storage::types::{
    ImportBatch, NewDetailedReport, NewProcess, NewRating, NewRiskDetail, NewThreat,
};

/// Supplementary integral-report fields consulted while building detail rows.
#[derive(Debug, Clone, Default)]
struct Supplement {
    high_risk_count: String,
    total_risk_count: String,
    process_threat_rating: String,
    reserved_flag: String,
}

/// Outcome counters for one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub processes: usize,
    pub threats: usize,
    pub ratings: usize,
    pub detail_pairs: usize,
    pub dropped_detail_rows: usize,
    pub defaulted_ratings: usize,
}

/// Builds the full replacement batch from in-memory report rows.
pub fn build_batch(integral: &[IntegralRow], detailed: &[DetailedRow]) -> (ImportBatch, ImportStats) {
    let mut batch = ImportBatch::default();
    let mut stats = ImportStats::default();

    // Pass 1: supplementary lookup, keyed like the threat join.
    let mut supplements: HashMap<(String, String, String), Supplement> = HashMap::new();
    for row in integral {
        supplements.insert(
            row.key(),
            Supplement {
                high_risk_count: row.high_risk_count.clone(),
                total_risk_count: row.total_risk_count.clone(),
                process_threat_rating: row.process_threat_rating.clone(),
                reserved_flag: row.reserved_flag(),
            },
        );
    }

    // Pass 2: processes, threats, ratings.
    let mut seen_processes: HashSet<String> = HashSet::new();
    let mut threat_ids: HashMap<(String, String, String), i64> = HashMap::new();
    for row in integral {
        if row.process_sid.is_empty() {
            continue;
        }

        if !seen_processes.contains(&row.process_sid) {
            let (rating, defaulted) = parse_rating(&row.process_sid, &row.rating);
            if defaulted {
                stats.defaulted_ratings += 1;
            }
            batch.processes.push(NewProcess {
                sid: row.process_sid.clone(),
                name: row.process_name.clone(),
                risk_label: row.risk_label.clone(),
                owner_block: row.owner_block.clone(),
                department: row.department.clone(),
                rating,
            });
            seen_processes.insert(row.process_sid.clone());
        }

        let key = row.key();
        if !threat_ids.contains_key(&key) {
            let id = threat_ids.len() as i64 + 1;
            batch.threats.push(NewThreat {
                id,
                threat_type: row.threat_type.clone(),
                scenario: row.threat_scenario.clone(),
                integral_risk_level: row.integral_risk_level.clone(),
                highest_risk_level: row.highest_risk_level.clone(),
                process_sid: row.process_sid.clone(),
            });
            threat_ids.insert(key, id);
        }

        batch.ratings.push(NewRating {
            process_sid: row.process_sid.clone(),
            threat_type: row.threat_type.clone(),
            threat_scenario: row.threat_scenario.clone(),
            threat_rating: row.integral_risk_level.clone(),
            color: color_for_rating(&row.integral_risk_level).to_string(),
        });
    }

    // Pass 3: detail rows joined to the threats created above.
    for row in detailed {
        if row.process_sid.is_empty() {
            continue;
        }
        let key = row.key();
        let Some(&threat_id) = threat_ids.get(&key) else {
            warn!(
                "Detailed row for ({}, {:?}, {:?}) has no threat in the integral report, dropped",
                row.process_sid, row.threat_type, row.threat_scenario
            );
            stats.dropped_detail_rows += 1;
            continue;
        };

        let supplement = supplements.get(&key).cloned().unwrap_or_default();
        let mut reserved_flag = normalize_reserved_flag(&row.as_reserved);
        if reserved_flag == RESERVED_UNKNOWN && !supplement.reserved_flag.is_empty() {
            // The integral report sometimes knows the reservation state when
            // the detailed report cell is blank.
            reserved_flag = supplement.reserved_flag.clone();
        }

        batch.detailed_reports.push(NewDetailedReport {
            process: row.process_name.clone(),
            process_sid: row.process_sid.clone(),
            threat_type: row.threat_type.clone(),
            threat_scenario: row.threat_scenario.clone(),
            impact_type: row.impact_type.clone(),
            risk_subcategory: row.risk_subcategory.clone(),
            risk_group: row.risk_group.clone(),
            risk_subgroup: row.risk_subgroup.clone(),
            integral_risk: row.assessment_result.clone(),
            operational_risk: row.threat_rating.clone(),
            reputational_risk: row.reputational_risk.clone(),
            regulatory_risk: row.regulatory_risk.clone(),
            financial_risk: row.financial_risk.clone(),
            impact_assessment: row.risk_impact.clone(),
            probability_assessment: row.probability_assessment.clone(),
            control_assessment: row.control_assessment.clone(),
            risk_level: row.risk_label.clone(),
            rto_hours: row.rto_hours.clone(),
            mtpd: row.mtpd.clone(),
            tr: row.tr.clone(),
            risk_assessment_explanation: row.explanation.clone(),
            as_reserved_in_rcod: reserved_flag.clone(),
            threat_id,
        });

        batch.risk_details.push(NewRiskDetail {
            process_sid: row.process_sid.clone(),
            threat_type: row.threat_type.clone(),
            threat_scenario: row.threat_scenario.clone(),
            impact_type: row.impact_type.clone(),
            risk_impact: row.risk_impact.clone(),
            risk_assessment: row.assessment_result.clone(),
            risk_label: row.risk_label.clone(),
            risk_assessment_explanation: row.explanation.clone(),
            high_risk_count: supplement.high_risk_count,
            total_risk_count: supplement.total_risk_count,
            process_threat_rating: supplement.process_threat_rating,
            as_reserved_in_rcod: reserved_flag,
            rto_hours: row.rto_hours.clone(),
            mtpd: row.mtpd.clone(),
            tr: row.tr.clone(),
            threat_id,
        });
        stats.detail_pairs += 1;
    }

    stats.processes = batch.processes.len();
    stats.threats = batch.threats.len();
    stats.ratings = batch.ratings.len();
    (batch, stats)
}

/// Reads both workbooks and replaces the report tables in one transaction.
pub async fn run_import(store: &RiskStore, config: &Config) -> Result<ImportStats, ImportError> {
    let integral = load_integral_rows(&config.integral_report)?;
    let detailed = load_detailed_rows(&config.detailed_report)?;
    info!(
        "Read {} integral rows and {} detailed rows",
        integral.len(),
        detailed.len()
    );

    let (batch, stats) = build_batch(&integral, &detailed);
    store.replace_report_data(&batch).await?;

    info!(
        "Imported {} processes, {} threats, {} ratings, {} detail pairs ({} detailed rows dropped)",
        stats.processes, stats.threats, stats.ratings, stats.detail_pairs, stats.dropped_detail_rows
    );
    if stats.defaulted_ratings > 0 {
        warn!("{} process rating cells were unparseable and defaulted to 0", stats.defaulted_ratings);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integral_row(sid: &str, threat_type: &str, scenario: &str) -> IntegralRow {
        IntegralRow {
            process_sid: sid.into(),
            process_name: format!("Process {}", sid),
            risk_label: "1/4".into(),
            owner_block: "Operations".into(),
            department: "Back office".into(),
            rating: "4.5".into(),
            threat_type: threat_type.into(),
            threat_scenario: scenario.into(),
            integral_risk_level: "Высокий риск".into(),
            highest_risk_level: "Высокий риск".into(),
            high_risk_count: "1".into(),
            total_risk_count: "4".into(),
            process_threat_rating: "Высокий".into(),
            as_reserved: "В плане".into(),
            as_reserved_comment: String::new(),
        }
    }

    fn detailed_row(sid: &str, threat_type: &str, scenario: &str) -> DetailedRow {
        DetailedRow {
            process_sid: sid.into(),
            process_name: format!("Process {}", sid),
            threat_type: threat_type.into(),
            threat_scenario: scenario.into(),
            impact_type: "Прямое".into(),
            assessment_result: "Высокий риск".into(),
            threat_rating: "Высокий".into(),
            risk_impact: "Остановка процесса".into(),
            risk_label: "Высокий".into(),
            rto_hours: "4".into(),
            mtpd: "8".into(),
            tr: "2".into(),
            explanation: "Автопояснение".into(),
            as_reserved: String::new(),
            ..DetailedRow::default()
        }
    }

    #[test]
    fn test_first_occurrence_wins_for_processes() {
        let mut second = integral_row("P1", "Тип А", "Сценарий 1");
        second.process_name = "Renamed later".into();
        second.threat_scenario = "Сценарий 2".into();
        let integral = vec![integral_row("P1", "Тип А", "Сценарий 1"), second];

        let (batch, stats) = build_batch(&integral, &[]);
        assert_eq!(stats.processes, 1);
        assert_eq!(batch.processes[0].name, "Process P1");
        // Two distinct keys, two threats; one rating per input row.
        assert_eq!(stats.threats, 2);
        assert_eq!(stats.ratings, 2);
    }

    #[test]
    fn test_threat_dedup_is_case_insensitive() {
        let mut shouting = integral_row("P1", "ТИП А", "СЦЕНАРИЙ 1");
        shouting.integral_risk_level = "Критический риск".into();
        let integral = vec![integral_row("P1", "Тип а", "Сценарий 1"), shouting];

        let (batch, stats) = build_batch(&integral, &[]);
        assert_eq!(stats.threats, 1);
        // The first occurrence fixed the threat fields.
        assert_eq!(batch.threats[0].threat_type, "Тип а");
        // Both rows still produced ratings, each with its own color.
        assert_eq!(batch.ratings[0].color, "#ffc107");
        assert_eq!(batch.ratings[1].color, "#dc3545");
    }

    #[test]
    fn test_empty_sid_rows_skipped() {
        let integral = vec![integral_row("", "Тип А", "Сценарий 1")];
        let (batch, stats) = build_batch(&integral, &[]);
        assert_eq!(stats.processes, 0);
        assert_eq!(stats.threats, 0);
        assert!(batch.ratings.is_empty());
    }

    #[test]
    fn test_detail_rows_require_known_threat() {
        let integral = vec![integral_row("P1", "Тип А", "Сценарий 1")];
        let detailed = vec![
            detailed_row("P1", "тип а", "сценарий 1"),
            detailed_row("P1", "Тип Б", "Сценарий 9"),
            detailed_row("", "Тип А", "Сценарий 1"),
        ];

        let (batch, stats) = build_batch(&integral, &detailed);
        assert_eq!(stats.detail_pairs, 1);
        assert_eq!(stats.dropped_detail_rows, 1);
        assert_eq!(batch.risk_details.len(), 1);
        assert_eq!(batch.detailed_reports.len(), 1);
        assert_eq!(batch.risk_details[0].threat_id, batch.threats[0].id);
    }

    #[test]
    fn test_detail_rows_carry_supplement_fields() {
        let integral = vec![integral_row("P1", "Тип А", "Сценарий 1")];
        let detailed = vec![detailed_row("P1", "Тип А", "Сценарий 1")];

        let (batch, _) = build_batch(&integral, &detailed);
        let detail = &batch.risk_details[0];
        assert_eq!(detail.high_risk_count, "1");
        assert_eq!(detail.total_risk_count, "4");
        assert_eq!(detail.process_threat_rating, "Высокий");
        // Blank detailed cell falls back to the integral report's flag.
        assert_eq!(detail.as_reserved_in_rcod, "да");
        assert_eq!(batch.detailed_reports[0].as_reserved_in_rcod, "да");
    }

    #[test]
    fn test_detail_row_own_reserved_flag_wins() {
        let integral = vec![integral_row("P1", "Тип А", "Сценарий 1")];
        let mut row = detailed_row("P1", "Тип А", "Сценарий 1");
        row.as_reserved = "Не в плане".into();

        let (batch, _) = build_batch(&integral, &[row]);
        assert_eq!(batch.risk_details[0].as_reserved_in_rcod, "нет");
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let integral = vec![
            integral_row("P1", "Тип А", "Сценарий 1"),
            integral_row("P2", "Тип А", "Сценарий 1"),
        ];
        let detailed = vec![detailed_row("P1", "Тип А", "Сценарий 1")];

        let (_, first) = build_batch(&integral, &detailed);
        let (_, second) = build_batch(&integral, &detailed);
        assert_eq!(first, second);
    }
}
