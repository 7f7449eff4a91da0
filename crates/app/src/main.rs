mod admin;
mod api;
mod dashboard;
mod problem;
mod router;
mod telemetry;
mod views;

use std::net::SocketAddr;

use chrono::Utc;
use tracing::info;

use shop_admin_core::seed::STANDARD;
use shop_admin_storage::{Database, SeedOutcome};
use shop_admin_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "storage", url = %config.database_url, "database ready");

    match database.seed_if_empty(&STANDARD, Utc::now()).await? {
        SeedOutcome::Seeded(counts) => {
            for (table, rows) in counts.per_table() {
                telemetry::record_seed_rows(table, rows);
            }
            info!(stage = "seed", rows = counts.total(), "sample data inserted");
        }
        SeedOutcome::Skipped { existing_rows } => {
            info!(stage = "seed", existing_rows, "store not empty, seeding skipped");
        }
    }

    let state = router::AppState::new(metrics, database);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
