use std::path::Path;
use std::str::FromStr;

use log::{error, info};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::error_handling::types::StorageError;
use crate::storage::schema;
use crate::storage::types::{
    DetailedRiskReport, ImportBatch, ImportBatchCounts, IntegralThreatRating, Owner, Process,
    RiskDetail, Threat,
};

/// SQLite-backed store for the risk reporting data.
///
/// One instance is created at startup and shared behind an `Arc`; every
/// query borrows a pooled connection for its own duration only.
pub struct RiskStore {
    pool: Pool<Sqlite>,
}

impl RiskStore {
    /// Opens (or creates) the database file and brings the schema up to date.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            }
        }
        let opts = SqliteConnectOptions::from_str("sqlite://")
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
            .filename(path_ref)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| {
                error!("Failed to open database {}: {}", path_ref.display(), e);
                StorageError::ConnectionFailed(e.to_string())
            })?;
        schema::init(&pool).await?;
        info!("Database ready at {}", path_ref.display());
        Ok(Self { pool })
    }

    // ----- owners -----

    pub async fn owner_by_username(&self, username: &str) -> Result<Option<Owner>, StorageError> {
        let owner = sqlx::query_as::<_, Owner>(
            "SELECT id, username, full_name, password_hash FROM owners WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    pub async fn owners(&self) -> Result<Vec<Owner>, StorageError> {
        let owners = sqlx::query_as::<_, Owner>(
            "SELECT id, username, full_name, password_hash FROM owners ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(owners)
    }

    pub async fn insert_owner(
        &self,
        username: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO owners (username, full_name, password_hash) VALUES (?1, ?2, ?3)")
            .bind(username)
            .bind(full_name)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ----- processes -----

    pub async fn processes_all(&self) -> Result<Vec<Process>, StorageError> {
        let processes = sqlx::query_as::<_, Process>(
            "SELECT id, sid, name, risk_label, owner_block, department, rating, owner_id
             FROM processes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(processes)
    }

    pub async fn processes_for_owner(&self, owner_id: i64) -> Result<Vec<Process>, StorageError> {
        let processes = sqlx::query_as::<_, Process>(
            "SELECT id, sid, name, risk_label, owner_block, department, rating, owner_id
             FROM processes WHERE owner_id = ?1 ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(processes)
    }

    /// Looks up a process by SID scoped to one owner. A process owned by
    /// someone else resolves to `None`, indistinguishable from a missing SID.
    pub async fn process_owned(
        &self,
        sid: &str,
        owner_id: i64,
    ) -> Result<Option<Process>, StorageError> {
        let process = sqlx::query_as::<_, Process>(
            "SELECT id, sid, name, risk_label, owner_block, department, rating, owner_id
             FROM processes WHERE sid = ?1 AND owner_id = ?2",
        )
        .bind(sid)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(process)
    }

    pub async fn set_process_owner(
        &self,
        process_id: i64,
        owner_id: i64,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE processes SET owner_id = ?1 WHERE id = ?2")
            .bind(owner_id)
            .bind(process_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn sample_process(&self) -> Result<Option<Process>, StorageError> {
        let process = sqlx::query_as::<_, Process>(
            "SELECT id, sid, name, risk_label, owner_block, department, rating, owner_id
             FROM processes ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(process)
    }

    // ----- threats & ratings -----

    pub async fn threats_for_process(&self, sid: &str) -> Result<Vec<Threat>, StorageError> {
        let threats = sqlx::query_as::<_, Threat>(
            "SELECT id, type, scenario, integral_risk_level, highest_risk_level, process_sid
             FROM threats WHERE process_sid = ?1 ORDER BY id",
        )
        .bind(sid)
        .fetch_all(&self.pool)
        .await?;
        Ok(threats)
    }

    pub async fn ratings_for_process(
        &self,
        sid: &str,
    ) -> Result<Vec<IntegralThreatRating>, StorageError> {
        let ratings = sqlx::query_as::<_, IntegralThreatRating>(
            "SELECT id, process_sid, threat_type, threat_scenario, threat_rating, color
             FROM integral_threat_ratings WHERE process_sid = ?1 ORDER BY id",
        )
        .bind(sid)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    // ----- detail rows -----

    pub async fn risk_details_filtered(
        &self,
        sid: &str,
        threat_type: Option<&str>,
        threat_scenario: Option<&str>,
    ) -> Result<Vec<RiskDetail>, StorageError> {
        let mut sql = String::from(
            "SELECT id, process_sid, threat_type, threat_scenario, impact_type, risk_impact,
                    risk_assessment, risk_label, risk_assessment_explanation, high_risk_count,
                    total_risk_count, process_threat_rating, as_reserved_in_rcod, rto_hours,
                    mtpd, tr, threat_id
             FROM risk_details WHERE process_sid = ?",
        );
        let mut binds: Vec<String> = vec![sid.to_string()];
        if let Some(t) = threat_type {
            sql.push_str(" AND threat_type = ?");
            binds.push(t.to_string());
        }
        if let Some(s) = threat_scenario {
            sql.push_str(" AND threat_scenario = ?");
            binds.push(s.to_string());
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query_as::<_, RiskDetail>(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn detailed_reports_filtered(
        &self,
        sid: &str,
        threat_type: Option<&str>,
        threat_scenario: Option<&str>,
    ) -> Result<Vec<DetailedRiskReport>, StorageError> {
        let mut sql = String::from(
            "SELECT id, process, process_sid, threat_type, threat_scenario, impact_type,
                    risk_subcategory, risk_group, risk_subgroup, integral_risk, operational_risk,
                    reputational_risk, regulatory_risk, financial_risk, impact_assessment,
                    probability_assessment, control_assessment, risk_level, rto_hours, mtpd, tr,
                    risk_assessment_explanation, as_reserved_in_rcod, threat_id
             FROM detailed_risk_reports WHERE process_sid = ?",
        );
        let mut binds: Vec<String> = vec![sid.to_string()];
        if let Some(t) = threat_type {
            sql.push_str(" AND threat_type = ?");
            binds.push(t.to_string());
        }
        if let Some(s) = threat_scenario {
            sql.push_str(" AND threat_scenario = ?");
            binds.push(s.to_string());
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query_as::<_, DetailedRiskReport>(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    // ----- import -----

    /// Replaces all report-derived tables with the batch contents.
    ///
    /// Deletes and inserts run in one transaction: a failure anywhere rolls
    /// everything back and the pre-import data survives intact.
    pub async fn replace_report_data(&self, batch: &ImportBatch) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        for table in [
            "risk_details",
            "detailed_risk_reports",
            "integral_threat_ratings",
            "threats",
            "processes",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for process in &batch.processes {
            sqlx::query(
                "INSERT INTO processes (sid, name, risk_label, owner_block, department, rating)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&process.sid)
            .bind(&process.name)
            .bind(&process.risk_label)
            .bind(&process.owner_block)
            .bind(&process.department)
            .bind(process.rating)
            .execute(&mut *tx)
            .await?;
        }

        for threat in &batch.threats {
            sqlx::query(
                "INSERT INTO threats (id, type, scenario, integral_risk_level, highest_risk_level, process_sid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(threat.id)
            .bind(&threat.threat_type)
            .bind(&threat.scenario)
            .bind(&threat.integral_risk_level)
            .bind(&threat.highest_risk_level)
            .bind(&threat.process_sid)
            .execute(&mut *tx)
            .await?;
        }

        for rating in &batch.ratings {
            sqlx::query(
                "INSERT INTO integral_threat_ratings (process_sid, threat_type, threat_scenario, threat_rating, color)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&rating.process_sid)
            .bind(&rating.threat_type)
            .bind(&rating.threat_scenario)
            .bind(&rating.threat_rating)
            .bind(&rating.color)
            .execute(&mut *tx)
            .await?;
        }

        for detail in &batch.risk_details {
            sqlx::query(
                "INSERT INTO risk_details (process_sid, threat_type, threat_scenario, impact_type,
                    risk_impact, risk_assessment, risk_label, risk_assessment_explanation,
                    high_risk_count, total_risk_count, process_threat_rating, as_reserved_in_rcod,
                    rto_hours, mtpd, tr, threat_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )
            .bind(&detail.process_sid)
            .bind(&detail.threat_type)
            .bind(&detail.threat_scenario)
            .bind(&detail.impact_type)
            .bind(&detail.risk_impact)
            .bind(&detail.risk_assessment)
            .bind(&detail.risk_label)
            .bind(&detail.risk_assessment_explanation)
            .bind(&detail.high_risk_count)
            .bind(&detail.total_risk_count)
            .bind(&detail.process_threat_rating)
            .bind(&detail.as_reserved_in_rcod)
            .bind(&detail.rto_hours)
            .bind(&detail.mtpd)
            .bind(&detail.tr)
            .bind(detail.threat_id)
            .execute(&mut *tx)
            .await?;
        }

        for report in &batch.detailed_reports {
            sqlx::query(
                "INSERT INTO detailed_risk_reports (process, process_sid, threat_type,
                    threat_scenario, impact_type, risk_subcategory, risk_group, risk_subgroup,
                    integral_risk, operational_risk, reputational_risk, regulatory_risk,
                    financial_risk, impact_assessment, probability_assessment, control_assessment,
                    risk_level, rto_hours, mtpd, tr, risk_assessment_explanation,
                    as_reserved_in_rcod, threat_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                         ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
            )
            .bind(&report.process)
            .bind(&report.process_sid)
            .bind(&report.threat_type)
            .bind(&report.threat_scenario)
            .bind(&report.impact_type)
            .bind(&report.risk_subcategory)
            .bind(&report.risk_group)
            .bind(&report.risk_subgroup)
            .bind(&report.integral_risk)
            .bind(&report.operational_risk)
            .bind(&report.reputational_risk)
            .bind(&report.regulatory_risk)
            .bind(&report.financial_risk)
            .bind(&report.impact_assessment)
            .bind(&report.probability_assessment)
            .bind(&report.control_assessment)
            .bind(&report.risk_level)
            .bind(&report.rto_hours)
            .bind(&report.mtpd)
            .bind(&report.tr)
            .bind(&report.risk_assessment_explanation)
            .bind(&report.as_reserved_in_rcod)
            .bind(report.threat_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ----- maintenance -----

    pub async fn table_counts(&self) -> Result<ImportBatchCounts, StorageError> {
        Ok(ImportBatchCounts {
            processes: self.count("processes").await?,
            threats: self.count("threats").await?,
            ratings: self.count("integral_threat_ratings").await?,
            risk_details: self.count("risk_details").await?,
            detailed_reports: self.count("detailed_risk_reports").await?,
        })
    }

    async fn count(&self, table: &str) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
