//! Caller-facing error taxonomy.

use avrd_runtime::RuntimeError;
use avrd_store::StoreError;
use avrd_types::ContainerRole;

/// Errors surfaced by the orchestration services.
///
/// `Validation`, `NotFound`, and `Conflict` are rejected before any side
/// effect. `Provision` names the role whose container failed; containers
/// already started by the same call are left running, so a retry converges
/// instead of destroying work.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The request violates an invariant; nothing was written.
    #[error("{0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// A uniqueness rule was violated; nothing was written.
    #[error("{0}")]
    Conflict(String),

    /// A container could not be provisioned.
    #[error("failed to provision {role} container: {source}")]
    Provision {
        role: ContainerRole,
        #[source]
        source: RuntimeError,
    },

    /// The PBX config write failed.
    #[error(transparent)]
    Pbx(#[from] avrd_pbx::PbxError),

    /// A store failure that is not a missing row.
    #[error(transparent)]
    Store(StoreError),
}

impl OrchestratorError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// True when the error is a missing entity rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Store(other),
        }
    }
}
