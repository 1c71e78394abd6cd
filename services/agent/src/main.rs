mod elastic;
mod lifecycle;
mod run;
mod sync;

use trailsync_config::{init_tracing, AppConfig};
use trailsync_db::audit::pg_repository::PgAuditRepository;
use trailsync_db::management::pg_repository::PgManagementRepository;

use crate::elastic::client::{ElasticClient, ElasticConfig};
use crate::run::{AgentRunner, RunSettings, TickOutcome};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().expect("configuration error (fail-fast)");
    init_tracing(&config.log_level);

    tracing::info!(service = "trailsync-agent", "starting");

    let elastic_config = match ElasticConfig::from_env() {
        Ok(config) => config,
        Err(e) => panic!("search engine configuration error (fail-fast): {e}"),
    };
    let settings = RunSettings::from_env().expect("agent configuration error (fail-fast)");
    tracing::debug!(
        worker_id = %settings.worker_id,
        sync_budget = settings.sync_budget,
        "settings resolved"
    );

    let pool = trailsync_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    let elastic = ElasticClient::new(elastic_config).expect("failed to build search client");
    let management = PgManagementRepository::new(pool.clone());
    let source = PgAuditRepository::new(pool.clone());

    let runner = AgentRunner::new(management, source, elastic, settings);

    match runner.tick().await {
        Ok(TickOutcome::Idle) => {
            tracing::info!("no workspace required service");
        }
        Ok(TickOutcome::Synced {
            workspace_id,
            indexed,
            checkpoint,
        }) => {
            tracing::info!(workspace_id, indexed, checkpoint, "sync run completed");
        }
        Ok(TickOutcome::Decommissioned { workspace_id }) => {
            tracing::info!(workspace_id, "workspace decommissioned");
        }
        Err(e) => {
            tracing::error!(error = %e, "agent run failed");
        }
    }

    tracing::info!(service = "trailsync-agent", "finished");
}
