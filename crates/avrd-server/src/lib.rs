//! Composition root for the AVRD control plane.
//!
//! Wires configuration, the SQLite pool, the Docker gateway, the PBX config
//! writer, and the orchestration services together, and exposes a small
//! status endpoint. The orchestration services themselves are the API a
//! CRUD layer consumes; no REST surface beyond `/health` lives here.

pub mod config;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use avrd_db::DbPool;
use avrd_orchestrator::{
    AgentService, NumberService, PhoneService, ProviderService, TrunkService,
};
use avrd_pbx::{AriClient, ConfigWriter};
use avrd_runtime::DockerGateway;

use config::Config;

/// Everything the status endpoint and a future CRUD layer need.
pub struct AppState {
    pub agents: AgentService<DockerGateway>,
    pub providers: ProviderService,
    pub numbers: NumberService<AriClient>,
    pub phones: PhoneService<AriClient>,
    pub trunks: TrunkService<AriClient>,
}

/// Errors that can occur while wiring the services together.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Runtime(#[from] avrd_runtime::RuntimeError),

    #[error(transparent)]
    Pbx(#[from] avrd_pbx::PbxError),
}

/// Constructs the full service graph from configuration and a pool.
pub fn build_state(config: &Config, pool: DbPool) -> Result<AppState, StartupError> {
    let runtime = Arc::new(DockerGateway::new(config.docker.runtime_config())?);
    let ari = AriClient::new(config.asterisk.ari_config())?;
    let writer = Arc::new(ConfigWriter::new(config.asterisk.paths(), ari));

    Ok(AppState {
        agents: AgentService::new(pool.clone(), runtime, config.orchestrator.clone()),
        providers: ProviderService::new(pool.clone()),
        numbers: NumberService::new(pool.clone(), writer.clone()),
        phones: PhoneService::new(pool.clone(), writer.clone()),
        trunks: TrunkService::new(pool.clone(), writer),
    })
}

/// Health/status handler.
///
/// Reports entity counts so monitoring can tell a live control plane from
/// one that lost its database.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let counts = (
        state.agents.list(),
        state.providers.list(),
        state.numbers.list(),
        state.phones.list(),
        state.trunks.list(),
    );

    match counts {
        (Ok(agents), Ok(providers), Ok(numbers), Ok(phones), Ok(trunks)) => Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "agents": agents.len(),
            "providers": providers.len(),
            "numbers": numbers.len(),
            "phones": phones.len(),
            "trunks": trunks.len(),
        })),
        _ => Json(json!({
            "status": "degraded",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    }
}

/// Builds the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
