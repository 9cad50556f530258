//! Container Runtime Gateway for the AVRD control plane.
//!
//! A thin, idempotent operation set over the Docker API: pull, ensure a
//! named container is running, stop-and-remove, inspect, list by label,
//! logs, pull-and-restart. No business logic lives here — the orchestrator
//! decides *what* to run; this crate only makes the runtime match.
//!
//! The [`ContainerRuntime`] trait is the seam the orchestrator depends on,
//! so orchestration logic is testable without a Docker daemon.

mod error;
mod gateway;

pub use error::RuntimeError;
pub use gateway::{ContainerDetails, ContainerInfo, DockerGateway, RuntimeConfig};

use async_trait::async_trait;

/// The operations the orchestrator needs from a container runtime.
///
/// Both operations are idempotent: `ensure_running` converges a named
/// container onto "exists and is started", and `stop_and_remove` treats an
/// absent container as already gone.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pulls `image`, then starts the container called `name`, creating it
    /// first if necessary. Returns the container id.
    ///
    /// An already-running container is left untouched; a present-but-stopped
    /// one is started; an absent one is created with the given environment
    /// and bind mounts and then started.
    async fn ensure_running(
        &self,
        name: &str,
        image: &str,
        env: Vec<String>,
        binds: Vec<String>,
    ) -> Result<String, RuntimeError>;

    /// Stops and removes the container called `name`. An absent container
    /// is a no-op, not an error.
    async fn stop_and_remove(&self, name: &str) -> Result<(), RuntimeError>;
}
