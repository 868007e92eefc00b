use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};

use riskboard::assignment;
use riskboard::auth::service::AuthService;
use riskboard::auth::tokens::TokenSigner;
use riskboard::configuration::config::Config;
use riskboard::import::importer::run_import;
use riskboard::storage::store::RiskStore;
use riskboard::web_interface::web_server::WebServer;

#[derive(Parser)]
#[command(name = "riskboard")]
#[command(version)]
#[command(about = "Risk reporting backend: spreadsheet import and owner-scoped query API")]
struct Args {
    /// Path of the TOML configuration file
    #[arg(long, default_value = "riskboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server (default)
    Serve,
    /// Import both report workbooks, replacing all report data
    Import,
    /// Insert the test owner roster
    SeedOwners,
    /// Assign every process to a random owner
    AssignOwners,
    /// Log per-table row counts and a sample process
    Check,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match Config::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = match RiskStore::open(&config.database_path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Unable to open the database: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let signer = TokenSigner::new(&config.token_secret, config.token_ttl_minutes);
            let auth = Arc::new(AuthService::new(store.clone(), signer));
            let server = WebServer::new(store, auth, Arc::new(config));
            if let Err(e) = server.start().await {
                error!("Server failed to start: {}", e);
                std::process::exit(1);
            }
        }
        Command::Import => match run_import(&store, &config).await {
            Ok(stats) => info!(
                "Import finished: {} processes, {} threats, {} ratings, {} detail pairs",
                stats.processes, stats.threats, stats.ratings, stats.detail_pairs
            ),
            Err(e) => {
                error!("Import failed, previous data kept: {}", e);
                std::process::exit(1);
            }
        },
        Command::SeedOwners => match assignment::seed_owners(&store).await {
            Ok(created) => info!("Seeded {} owners", created),
            Err(e) => {
                error!("Owner seeding failed: {}", e);
                std::process::exit(1);
            }
        },
        Command::AssignOwners => match assignment::assign_random_owners(&store).await {
            Ok(assigned) => info!("Assigned {} processes", assigned),
            Err(e) => {
                error!("Owner assignment failed: {}", e);
                std::process::exit(1);
            }
        },
        Command::Check => {
            if let Err(e) = assignment::report_counts(&store).await {
                error!("Check failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
