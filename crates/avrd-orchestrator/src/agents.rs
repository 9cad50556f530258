//! Agent lifecycle: create, update, run, stop, remove.
//!
//! `run` and `stop` converge the container runtime onto the topology an
//! agent's mode implies. Both are idempotent: a re-run reconciles instead of
//! erroring (picking up provider changes without duplicating containers),
//! and a re-stop is a no-op. All lifecycle operations for one agent are
//! serialized by an in-process lock, closing the find-by-name-then-create
//! race a concurrent run pair would otherwise hit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{info, warn};

use avrd_db::{DbConn, DbPool};
use avrd_runtime::ContainerRuntime;
use avrd_store::{agents, providers, Agent, Provider, StoreError};
use avrd_types::{AgentMode, AgentStatus, ContainerRole, ProviderType};

use crate::config::OrchestratorConfig;
use crate::env::{base_env, provider_env};
use crate::naming;
use crate::OrchestratorError;

/// Inputs for creating an agent.
#[derive(Debug, Clone, Default)]
pub struct CreateAgentParams {
    pub name: String,
    /// Defaults to pipeline mode.
    pub mode: Option<AgentMode>,
    pub provider_asr_id: Option<String>,
    pub provider_llm_id: Option<String>,
    pub provider_tts_id: Option<String>,
    pub provider_sts_id: Option<String>,
}

/// Partial update of an agent.
///
/// Provider links use a double option: `None` leaves the link untouched,
/// `Some(None)` clears it, `Some(Some(id))` re-points it.
#[derive(Debug, Clone, Default)]
pub struct UpdateAgentParams {
    pub name: Option<String>,
    pub mode: Option<AgentMode>,
    pub provider_asr_id: Option<Option<String>>,
    pub provider_llm_id: Option<Option<String>>,
    pub provider_tts_id: Option<Option<String>>,
    pub provider_sts_id: Option<Option<String>>,
}

/// Hands out one async mutex per agent id so lifecycle operations for the
/// same agent serialize while different agents proceed in parallel.
#[derive(Default)]
struct LockRegistry {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    fn lock_for(&self, agent_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(agent_id.to_string()).or_default().clone()
    }

    fn forget(&self, agent_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(agent_id);
    }
}

/// Agent lifecycle service.
pub struct AgentService<R> {
    pool: DbPool,
    runtime: Arc<R>,
    config: OrchestratorConfig,
    locks: LockRegistry,
}

impl<R: ContainerRuntime> AgentService<R> {
    pub fn new(pool: DbPool, runtime: Arc<R>, config: OrchestratorConfig) -> Self {
        Self {
            pool,
            runtime,
            config,
            locks: LockRegistry::default(),
        }
    }

    fn conn(&self) -> Result<DbConn, OrchestratorError> {
        Ok(self.pool.get().map_err(StoreError::from)?)
    }

    /// Creates an agent in stopped state with freshly assigned ports.
    pub fn create(&self, params: CreateAgentParams) -> Result<Agent, OrchestratorError> {
        if params.name.trim().is_empty() {
            return Err(OrchestratorError::validation("agent name is required"));
        }

        let conn = self.conn()?;
        let mut agent = Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: params.name.trim().to_string(),
            status: AgentStatus::Stopped,
            mode: params.mode.unwrap_or_default(),
            port: Some(self.config.core_ports.draw()),
            http_port: Some(self.config.http_ports.draw()),
            provider_asr_id: resolve_provider(&conn, params.provider_asr_id)?,
            provider_llm_id: resolve_provider(&conn, params.provider_llm_id)?,
            provider_tts_id: resolve_provider(&conn, params.provider_tts_id)?,
            provider_sts_id: resolve_provider(&conn, params.provider_sts_id)?,
            created_at: String::new(),
        };

        assert_mode_requirements(&mut agent)?;
        agents::insert(&conn, &agent)?;
        Ok(agents::get(&conn, &agent.id)?)
    }

    /// Applies a partial update, re-enforcing the mode invariants before
    /// anything is persisted.
    pub fn update(&self, id: &str, params: UpdateAgentParams) -> Result<Agent, OrchestratorError> {
        let conn = self.conn()?;
        let mut agent = agents::get(&conn, id)?;

        if let Some(name) = params.name {
            if name.trim().is_empty() {
                return Err(OrchestratorError::validation("agent name is required"));
            }
            agent.name = name.trim().to_string();
        }
        if let Some(mode) = params.mode {
            agent.mode = mode;
        }

        // Rows created before the http port existed get one on first touch.
        if agent.http_port.is_none() {
            agent.http_port = Some(self.config.http_ports.draw());
        }

        if let Some(link) = params.provider_asr_id {
            agent.provider_asr_id = resolve_provider(&conn, link)?;
        }
        if let Some(link) = params.provider_llm_id {
            agent.provider_llm_id = resolve_provider(&conn, link)?;
        }
        if let Some(link) = params.provider_tts_id {
            agent.provider_tts_id = resolve_provider(&conn, link)?;
        }
        if let Some(link) = params.provider_sts_id {
            agent.provider_sts_id = resolve_provider(&conn, link)?;
        }

        assert_mode_requirements(&mut agent)?;
        agents::update(&conn, &agent)?;
        Ok(agents::get(&conn, id)?)
    }

    /// Retrieves one agent.
    pub fn get(&self, id: &str) -> Result<Agent, OrchestratorError> {
        let conn = self.conn()?;
        Ok(agents::get(&conn, id)?)
    }

    /// Lists all agents.
    pub fn list(&self) -> Result<Vec<Agent>, OrchestratorError> {
        let conn = self.conn()?;
        Ok(agents::list(&conn)?)
    }

    /// Brings the agent's container set up and marks it running.
    ///
    /// Provider containers start first so the core container, started last,
    /// can be handed their addresses. A failure mid-sequence aborts the
    /// remaining steps but leaves completed containers running; retrying
    /// converges because `ensure_running` is idempotent.
    pub async fn run(&self, id: &str, extra_env: &[String]) -> Result<Agent, OrchestratorError> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let conn = self.conn()?;
        let mut agent = agents::get(&conn, id)?;

        // Ports are assigned at creation; rows imported without them get
        // theirs on first run so the dial-plan has a stable target.
        if agent.port.is_none() || agent.http_port.is_none() {
            agent.port = agent.port.or_else(|| Some(self.config.core_ports.draw()));
            agent.http_port = agent
                .http_port
                .or_else(|| Some(self.config.http_ports.draw()));
            agents::update(&conn, &agent)?;
        }

        let selected = selected_providers(&conn, &agent)?;

        let extra = extra_env.iter().map(String::as_str);
        let base = base_env(&agent.id, &agent.name, extra);

        // Caller extras are for the provider stages; the core container gets
        // only its identity, the webhook, and the routing facts below.
        let mut core_env = base_env(&agent.id, &agent.name, []);
        if let Some(url) = &self.config.webhook_url {
            core_env.set("WEBHOOK_URL", url);
        }
        if let Some(secret) = &self.config.webhook_secret {
            core_env.set("WEBHOOK_SECRET", secret);
        }

        let binds = match &self.config.tools_dir {
            Some(dir) => vec![format!("{dir}:/usr/src/app/tools")],
            None => Vec::new(),
        };

        let mut started = 0usize;
        for (provider_type, provider) in &selected {
            let role = provider_type.role();
            let name = naming::container_name(&agent.id, role);
            let port = self.config.provider_ports.draw();

            let image = provider.config.image_ref().ok_or_else(|| {
                OrchestratorError::Provision {
                    role,
                    source: avrd_runtime::RuntimeError::MissingImage(provider.name.clone()),
                }
            })?;

            let env = provider_env(&base, provider, port, &self.config.ami_url);

            match provider_type {
                ProviderType::Sts => core_env.set("STS_URL", format!("ws://{name}:{port}")),
                other => core_env.set(
                    format!("{}_URL", other.role().as_str()),
                    format!("http://{name}:{port}"),
                ),
            }

            self.runtime
                .ensure_running(&name, image, env.into_lines(), binds.clone())
                .await
                .map_err(|source| OrchestratorError::Provision { role, source })?;
            info!(agent = %agent.id, container = %name, "provider container running");
            started += 1;
        }

        if started > 0 {
            let name = naming::core_container(&agent.id);
            if let Some(port) = agent.port {
                core_env.set("PORT", port.to_string());
            }
            if let Some(http_port) = agent.http_port {
                core_env.set("HTTP_PORT", http_port.to_string());
            }
            self.runtime
                .ensure_running(&name, &self.config.core_image, core_env.into_lines(), Vec::new())
                .await
                .map_err(|source| OrchestratorError::Provision {
                    role: ContainerRole::Core,
                    source,
                })?;
            info!(agent = %agent.id, container = %name, "core container running");
        }

        agents::set_status(&conn, &agent.id, AgentStatus::Running)?;
        agent.status = AgentStatus::Running;
        Ok(agent)
    }

    /// Tears the agent's container set down and marks it stopped.
    ///
    /// Teardown is best-effort: a missing container is a no-op and a
    /// runtime failure on one container does not keep the rest up.
    pub async fn stop(&self, id: &str) -> Result<Agent, OrchestratorError> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let conn = self.conn()?;
        let mut agent = agents::get(&conn, id)?;

        self.teardown(&agent).await;

        agents::set_status(&conn, &agent.id, AgentStatus::Stopped)?;
        agent.status = AgentStatus::Stopped;
        Ok(agent)
    }

    /// Tears the agent down and deletes its row.
    pub async fn remove(&self, id: &str) -> Result<(), OrchestratorError> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let conn = self.conn()?;
        let agent = agents::get(&conn, id)?;

        self.teardown(&agent).await;

        agents::delete(&conn, id)?;
        self.locks.forget(id);
        Ok(())
    }

    /// Stops and removes every container the agent's current mode implies.
    async fn teardown(&self, agent: &Agent) {
        for name in naming::expected_containers(&agent.id, agent.mode) {
            if let Err(e) = self.runtime.stop_and_remove(&name).await {
                warn!(container = %name, error = %e, "failed to stop container");
            }
        }
    }
}

/// Validates that a provider link points at an existing row, passing the id
/// through. `None` stays `None`.
fn resolve_provider(
    conn: &DbConn,
    id: Option<String>,
) -> Result<Option<String>, OrchestratorError> {
    match id {
        None => Ok(None),
        Some(id) => {
            providers::get(conn, &id)?;
            Ok(Some(id))
        }
    }
}

/// Loads the providers the agent's current mode selects, skipping links the
/// invariants already guarantee are present.
fn selected_providers(
    conn: &DbConn,
    agent: &Agent,
) -> Result<Vec<(ProviderType, Provider)>, OrchestratorError> {
    let links: Vec<(ProviderType, Option<&String>)> = match agent.mode {
        AgentMode::Sts => vec![(ProviderType::Sts, agent.provider_sts_id.as_ref())],
        AgentMode::Pipeline => vec![
            (ProviderType::Asr, agent.provider_asr_id.as_ref()),
            (ProviderType::Llm, agent.provider_llm_id.as_ref()),
            (ProviderType::Tts, agent.provider_tts_id.as_ref()),
        ],
    };

    let mut resolved = Vec::new();
    for (provider_type, id) in links {
        let Some(id) = id else { continue };
        resolved.push((provider_type, providers::get(conn, id)?));
    }
    Ok(resolved)
}

/// Enforces the mode/provider-set invariant, nulling the links the mode
/// does not own. Exactly one of the two provider sets is populated after
/// any successful create or update.
fn assert_mode_requirements(agent: &mut Agent) -> Result<(), OrchestratorError> {
    match agent.mode {
        AgentMode::Sts => {
            if agent.provider_sts_id.is_none() {
                return Err(OrchestratorError::validation(
                    "STS provider is required for STS mode",
                ));
            }
            agent.provider_asr_id = None;
            agent.provider_llm_id = None;
            agent.provider_tts_id = None;
        }
        AgentMode::Pipeline => {
            if agent.provider_asr_id.is_none()
                || agent.provider_llm_id.is_none()
                || agent.provider_tts_id.is_none()
            {
                return Err(OrchestratorError::validation(
                    "Providers ASR, LLM, and TTS are required for pipeline mode",
                ));
            }
            agent.provider_sts_id = None;
        }
    }
    Ok(())
}
