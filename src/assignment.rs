//! Seed and maintenance utilities: owner seeding, random process
//! assignment and the row-count check. These run as subcommands against an
//! injected store handle.

use log::{info, warn};
use rand::seq::IndexedRandom;

use crate::auth::passwords::hash_password;
use crate::error_handling::types::{AssignmentError, StorageError};
use crate::storage::store::RiskStore;

/// Test owner roster, mirroring the seed data the front-end expects.
const SEED_OWNERS: [(&str, &str, &str); 5] = [
    ("ivanov_ii", "Иванов Иван Иванович", "ivanov123"),
    ("petrov_pp", "Петров Петр Петрович", "petrov456"),
    ("sidorov_ss", "Сидоров Сергей Сергеевич", "sidorov789"),
    ("kozlov_kk", "Козлов Константин Константинович", "kozlov321"),
    ("smirnov_sm", "Смирнов Семен Михайлович", "smirnov654"),
];

/// Inserts the seed owners, skipping usernames that already exist.
/// Returns the number of owners created.
pub async fn seed_owners(store: &RiskStore) -> Result<usize, StorageError> {
    let mut created = 0;
    for (username, full_name, password) in SEED_OWNERS {
        if store.owner_by_username(username).await?.is_some() {
            info!("Owner {} already exists", username);
            continue;
        }
        store
            .insert_owner(username, full_name, &hash_password(password))
            .await?;
        info!("Added owner {} ({})", username, full_name);
        created += 1;
    }
    Ok(created)
}

/// Assigns every process to a uniformly random owner. No balance guarantee;
/// fails when either side is empty. Returns the number of assignments made.
pub async fn assign_random_owners(store: &RiskStore) -> Result<usize, AssignmentError> {
    let owners = store.owners().await?;
    if owners.is_empty() {
        return Err(AssignmentError::NoOwners);
    }
    let processes = store.processes_all().await?;
    if processes.is_empty() {
        return Err(AssignmentError::NoProcesses);
    }

    let mut rng = rand::rng();
    for process in &processes {
        let owner = owners
            .choose(&mut rng)
            .ok_or(AssignmentError::NoOwners)?;
        store.set_process_owner(process.id, owner.id).await?;
        info!("Process '{}' assigned to {}", process.name, owner.full_name);
    }
    Ok(processes.len())
}

/// Logs per-table row counts and one sample process.
pub async fn report_counts(store: &RiskStore) -> Result<(), StorageError> {
    let counts = store.table_counts().await?;
    info!("Processes: {}", counts.processes);
    info!("Threats: {}", counts.threats);
    info!("Integral ratings: {}", counts.ratings);
    info!("Risk details: {}", counts.risk_details);
    info!("Detailed reports: {}", counts.detailed_reports);

    match store.sample_process().await? {
        Some(process) => info!(
            "Sample process: sid={} name={:?} label={:?} block={:?} department={:?} rating={}",
            process.sid,
            process.name,
            process.risk_label,
            process.owner_block,
            process.department,
            process.rating
        ),
        None => warn!("No processes in the database, run an import first"),
    }
    Ok(())
}
