//! Docker implementation of the runtime gateway.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::models::{ContainerCreateBody, EndpointSettings, HostConfig, NetworkingConfig};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, InspectContainerOptions,
    ListContainersOptionsBuilder, LogsOptionsBuilder, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptionsBuilder,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::stream::StreamExt;
use futures_util::TryStreamExt;
use tracing::{debug, warn};

use avrd_types::{APP_LABEL_KEY, APP_LABEL_VALUE, TENANT_LABEL_KEY};

use crate::error::{is_missing, is_state_race};
use crate::{ContainerRuntime, RuntimeError};

/// Connection and labelling settings for the Docker gateway.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path to the Docker socket.
    pub socket_path: String,
    /// Timeout applied to every API call, in seconds.
    pub timeout_secs: u64,
    /// Docker network agent containers are attached to.
    pub network: String,
    /// Optional tenant label so multi-tenant deployments do not see each
    /// other's containers.
    pub tenant: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket_path: "/var/run/docker.sock".to_string(),
            timeout_secs: 120,
            network: avrd_types::CONTAINER_NETWORK.to_string(),
            tenant: None,
        }
    }
}

/// Summary of a container as reported by a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    /// Primary name without the leading slash.
    pub name: String,
    pub image: String,
    /// Human-readable state, e.g. `Up 2 minutes`.
    pub status: String,
    pub labels: HashMap<String, String>,
}

/// The subset of inspect data the control plane consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    pub image: String,
    pub running: bool,
}

/// Runtime gateway backed by the Docker Engine API.
pub struct DockerGateway {
    docker: Docker,
    config: RuntimeConfig,
}

impl DockerGateway {
    /// Connects to the Docker socket named in `config`.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_socket(
            &config.socket_path,
            config.timeout_secs,
            API_DEFAULT_VERSION,
        )
        .map_err(RuntimeError::Connect)?;
        Ok(Self { docker, config })
    }

    /// Labels stamped onto every container this control plane creates.
    fn labels_for(&self, name: &str) -> HashMap<String, String> {
        let mut labels = HashMap::from([
            (APP_LABEL_KEY.to_string(), APP_LABEL_VALUE.to_string()),
            ("agentName".to_string(), name.to_string()),
        ]);
        if let Some(tenant) = &self.config.tenant {
            labels.insert(TENANT_LABEL_KEY.to_string(), tenant.clone());
        }
        labels
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        debug!(image, "pulling image");
        let (from_image, tag) = match image.rsplit_once(':') {
            Some((img, tag)) => (img, tag),
            None => (image, "latest"),
        };
        self.docker
            .create_image(
                Some(
                    CreateImageOptionsBuilder::new()
                        .from_image(from_image)
                        .tag(tag)
                        .build(),
                ),
                None,
                None,
            )
            .try_collect::<Vec<_>>()
            .await?;
        debug!(image, "image pulled");
        Ok(())
    }

    /// Finds a container by its exact name. The daemon's name filter is a
    /// substring match, so the candidates are re-checked against `/<name>`.
    async fn find_by_name(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        let filters = HashMap::from([("name".to_string(), vec![name.to_string()])]);
        let candidates = self
            .docker
            .list_containers(Some(
                ListContainersOptionsBuilder::new()
                    .all(true)
                    .filters(&filters)
                    .build(),
            ))
            .await?;

        let slashed = format!("/{name}");
        for summary in candidates {
            let names = summary.names.clone().unwrap_or_default();
            if names.iter().any(|n| n == &slashed) {
                return Ok(Some(summary_to_info(summary)));
            }
        }
        Ok(None)
    }

    /// Inspects a container by id or name.
    pub async fn inspect(&self, id: &str) -> Result<ContainerDetails, RuntimeError> {
        let details = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| {
                if is_missing(&e) {
                    RuntimeError::NotFound(id.to_string())
                } else {
                    RuntimeError::Api(e)
                }
            })?;

        let image = details
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default();
        Ok(ContainerDetails {
            id: details.id.unwrap_or_else(|| id.to_string()),
            image,
            running: details
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false),
        })
    }

    /// Lists every container owned by this control plane: the fixed
    /// application label, narrowed by the tenant label when configured.
    pub async fn list_labelled(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let mut label_filters = vec![format!("{APP_LABEL_KEY}={APP_LABEL_VALUE}")];
        if let Some(tenant) = &self.config.tenant {
            label_filters.push(format!("{TENANT_LABEL_KEY}={tenant}"));
        }
        let filters = HashMap::from([("label".to_string(), label_filters)]);

        let summaries = self
            .docker
            .list_containers(Some(
                ListContainersOptionsBuilder::new()
                    .all(true)
                    .filters(&filters)
                    .build(),
            ))
            .await?;
        Ok(summaries.into_iter().map(summary_to_info).collect())
    }

    /// Lists the containers whose name embeds the given agent id.
    pub async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let filters = HashMap::from([("name".to_string(), vec![agent_id.to_string()])]);
        let summaries = self
            .docker
            .list_containers(Some(
                ListContainersOptionsBuilder::new()
                    .all(true)
                    .filters(&filters)
                    .build(),
            ))
            .await?;
        Ok(summaries.into_iter().map(summary_to_info).collect())
    }

    /// Returns the last `tail` log lines of a container, stdout and stderr
    /// interleaved, with timestamps.
    pub async fn logs(&self, id: &str, tail: u32) -> Result<String, RuntimeError> {
        let mut stream = self.docker.logs(
            id,
            Some(
                LogsOptionsBuilder::new()
                    .stdout(true)
                    .stderr(true)
                    .tail(&tail.to_string())
                    .timestamps(true)
                    .build(),
            ),
        );

        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if is_missing(&e) {
                    RuntimeError::NotFound(id.to_string())
                } else {
                    RuntimeError::Api(e)
                }
            })?;
            out.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }
        Ok(out)
    }

    /// Starts a container by id, pulling its image first so a restart after
    /// an image update picks up the new version.
    pub async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let details = self.inspect(id).await?;
        if !details.image.is_empty() {
            self.pull_image(&details.image).await?;
        }
        if !details.running {
            self.docker
                .start_container(id, None::<StartContainerOptions>)
                .await?;
            debug!(id, "started container");
        }
        Ok(())
    }

    /// Stops a container by id if it is running.
    pub async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        let details = self.inspect(id).await?;
        if details.running {
            self.docker
                .stop_container(id, None::<StopContainerOptions>)
                .await?;
            debug!(id, "stopped container");
        }
        Ok(())
    }

    /// Re-pulls a container's image and restarts it.
    ///
    /// Stop/start races with the daemon (already stopped, already running)
    /// are tolerated; only real API failures propagate.
    pub async fn pull_and_restart(&self, id: &str) -> Result<(), RuntimeError> {
        let details = self.inspect(id).await?;
        if details.image.is_empty() {
            return Err(RuntimeError::MissingImage(id.to_string()));
        }

        self.pull_image(&details.image).await?;

        if details.running {
            match self
                .docker
                .stop_container(id, None::<StopContainerOptions>)
                .await
            {
                Ok(()) => {
                    let mut wait = self.docker.wait_container(
                        id,
                        Some(
                            WaitContainerOptionsBuilder::new()
                                .condition("not-running")
                                .build(),
                        ),
                    );
                    // Drain the single wait response; an error here means the
                    // container already reached the target state.
                    if let Some(result) = wait.next().await {
                        if let Err(e) = result {
                            if !is_state_race(&e) && !is_missing(&e) {
                                return Err(RuntimeError::Api(e));
                            }
                        }
                    }
                }
                Err(e) if is_state_race(&e) => {
                    debug!(id, "container already stopped while refreshing image");
                }
                Err(e) => return Err(RuntimeError::Api(e)),
            }
        }

        match self
            .docker
            .start_container(id, None::<StartContainerOptions>)
            .await
        {
            Ok(()) => {}
            Err(e) if is_state_race(&e) => {
                debug!(id, "container already running after refresh request");
            }
            Err(e) => return Err(RuntimeError::Api(e)),
        }
        debug!(id, "pulled image and restarted container");
        Ok(())
    }
}

fn summary_to_info(summary: bollard::models::ContainerSummary) -> ContainerInfo {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    ContainerInfo {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerGateway {
    async fn ensure_running(
        &self,
        name: &str,
        image: &str,
        env: Vec<String>,
        binds: Vec<String>,
    ) -> Result<String, RuntimeError> {
        self.pull_image(image).await?;

        if let Some(existing) = self.find_by_name(name).await? {
            let details = self.inspect(&existing.id).await?;
            if !details.running {
                self.docker
                    .start_container(&existing.id, None::<StartContainerOptions>)
                    .await?;
                debug!(name, "started existing container");
            }
            return Ok(existing.id);
        }

        let endpoints = HashMap::from([(self.config.network.clone(), EndpointSettings::default())]);
        let body = ContainerCreateBody {
            image: Some(image.to_string()),
            env: Some(env),
            labels: Some(self.labels_for(name)),
            networking_config: Some(NetworkingConfig {
                endpoints_config: Some(endpoints),
            }),
            host_config: Some(HostConfig {
                binds: if binds.is_empty() { None } else { Some(binds) },
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptionsBuilder::new().name(name).build()),
                body,
            )
            .await?;
        self.docker
            .start_container(&created.id, None::<StartContainerOptions>)
            .await?;
        debug!(name, "created and started container");
        Ok(created.id)
    }

    async fn stop_and_remove(&self, name: &str) -> Result<(), RuntimeError> {
        let Some(existing) = self.find_by_name(name).await? else {
            warn!(name, "container not found");
            return Ok(());
        };

        let details = self.inspect(&existing.id).await?;
        if details.running {
            match self
                .docker
                .stop_container(&existing.id, None::<StopContainerOptions>)
                .await
            {
                Ok(()) => {}
                Err(e) if is_state_race(&e) || is_missing(&e) => {}
                Err(e) => return Err(RuntimeError::Api(e)),
            }
        }

        match self
            .docker
            .remove_container(&existing.id, None::<RemoveContainerOptions>)
            .await
        {
            Ok(()) => {
                debug!(name, "stopped and removed container");
                Ok(())
            }
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(RuntimeError::Api(e)),
        }
    }
}
