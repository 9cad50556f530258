//! Provider CRUD with uniqueness enforcement.

use avrd_db::{DbConn, DbPool};
use avrd_store::{providers, Provider, StoreError};
use avrd_types::{ProviderConfig, ProviderType};

use crate::OrchestratorError;

/// Inputs for creating a provider.
#[derive(Debug, Clone)]
pub struct CreateProviderParams {
    pub name: String,
    pub provider_type: ProviderType,
    pub config: ProviderConfig,
}

/// Partial update of a provider.
#[derive(Debug, Clone, Default)]
pub struct UpdateProviderParams {
    pub name: Option<String>,
    pub provider_type: Option<ProviderType>,
    pub config: Option<ProviderConfig>,
}

/// Provider CRUD service.
pub struct ProviderService {
    pool: DbPool,
}

impl ProviderService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<DbConn, OrchestratorError> {
        Ok(self.pool.get().map_err(StoreError::from)?)
    }

    /// Creates a provider. Names are globally unique.
    pub fn create(&self, params: CreateProviderParams) -> Result<Provider, OrchestratorError> {
        if params.name.trim().is_empty() {
            return Err(OrchestratorError::validation("provider name is required"));
        }

        let conn = self.conn()?;
        if providers::find_by_name(&conn, params.name.trim())?.is_some() {
            return Err(OrchestratorError::conflict("Provider name already exists"));
        }

        let provider = Provider {
            id: uuid::Uuid::new_v4().to_string(),
            name: params.name.trim().to_string(),
            provider_type: params.provider_type,
            config: params.config,
            created_at: String::new(),
        };
        providers::insert(&conn, &provider)?;
        Ok(providers::get(&conn, &provider.id)?)
    }

    /// Applies a partial update, re-checking name uniqueness when the name
    /// changes.
    pub fn update(
        &self,
        id: &str,
        params: UpdateProviderParams,
    ) -> Result<Provider, OrchestratorError> {
        let conn = self.conn()?;
        let mut provider = providers::get(&conn, id)?;

        if let Some(name) = params.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(OrchestratorError::validation("provider name is required"));
            }
            if name != provider.name && providers::find_by_name(&conn, &name)?.is_some() {
                return Err(OrchestratorError::conflict("Provider name already exists"));
            }
            provider.name = name;
        }
        if let Some(provider_type) = params.provider_type {
            provider.provider_type = provider_type;
        }
        if let Some(config) = params.config {
            provider.config = config;
        }

        providers::update(&conn, &provider)?;
        Ok(providers::get(&conn, id)?)
    }

    /// Retrieves one provider.
    pub fn get(&self, id: &str) -> Result<Provider, OrchestratorError> {
        let conn = self.conn()?;
        Ok(providers::get(&conn, id)?)
    }

    /// Lists all providers.
    pub fn list(&self) -> Result<Vec<Provider>, OrchestratorError> {
        let conn = self.conn()?;
        Ok(providers::list(&conn)?)
    }

    /// Deletes a provider.
    ///
    /// The surrounding system is expected to prevent deleting a provider a
    /// running agent still references; the store keeps the foreign keys
    /// honest either way.
    pub fn delete(&self, id: &str) -> Result<(), OrchestratorError> {
        let conn = self.conn()?;
        Ok(providers::delete(&conn, id)?)
    }
}
