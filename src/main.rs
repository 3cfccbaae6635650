use clap::Parser;
use search_coordinator::api;
use search_coordinator::config::Args;
use search_coordinator::coordinator::Coordinator;
use search_coordinator::registry::memory::MemoryStore;
use search_coordinator::registry::provision::provision_units;
use search_coordinator::registry::sqlite::SqliteStore;
use search_coordinator::registry::store::UnitStore;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("COORDINATOR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = args.coordinator_config();

    // 1. Store:
    let store: Arc<dyn UnitStore> = match &args.database {
        Some(path) => {
            tracing::info!("Opening SQLite store at {}", path.display());
            Arc::new(SqliteStore::open_with_busy_timeout(
                path,
                Duration::from_millis(args.busy_timeout_ms),
            )?)
        }
        None => {
            tracing::warn!("No --database given, state is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    // 2. Optional provisioning:
    if let Some(plan) = args.provision_plan() {
        tracing::info!("Provisioning {} units", plan.len());
        provision_units(store.as_ref(), plan)?;
    }

    // 3. Core:
    let coordinator = Arc::new(Coordinator::new(store, config.clone()));
    tracing::info!(
        "Lease duration {:?}, sequential probability {}, {} store attempts",
        config.lease_duration,
        config.selection.sequential_probability,
        config.retry.max_attempts
    );

    // 4. Spawn progress reporter:
    if args.stats_interval_secs > 0 {
        let stats_coordinator = coordinator.clone();
        let period = Duration::from_secs(args.stats_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;
                match stats_coordinator.progress().await {
                    Ok(progress) => tracing::info!(
                        "Progress: {} / {} completed, {} leased",
                        progress.completed,
                        progress.total,
                        progress.leased
                    ),
                    Err(e) => tracing::warn!("Progress unavailable: {}", e),
                }
            }
        });
    }

    // 5. Start HTTP server:
    let app = api::router(coordinator);

    tracing::info!("HTTP server listening on {}", args.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
