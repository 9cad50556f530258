//! Telephony provisioning: numbers, phones, trunks.
//!
//! Each service persists its row first and then writes the matching PBX
//! config block. On create, a failed config write rolls the fresh row back
//! so the database never points at routing that does not exist; on remove,
//! the row is deleted first and the block cleanup is best-effort.

use std::sync::Arc;

use avrd_db::{DbConn, DbPool};
use avrd_pbx::{ConfigWriter, NumberEntry, PhoneEntry, ReloadModule, TrunkEntry};
use avrd_store::{agents, numbers, phones, trunks, Phone, PhoneNumber, StoreError, Trunk};

use crate::OrchestratorError;

fn number_entry(number: &PhoneNumber, agent: &avrd_store::Agent) -> NumberEntry {
    NumberEntry {
        id: number.id.clone(),
        value: number.value.clone(),
        agent_id: agent.id.clone(),
        agent_label: agent.name.clone(),
        port: agent.port.unwrap_or_default(),
    }
}

/// Inbound number provisioning.
pub struct NumberService<R> {
    pool: DbPool,
    writer: Arc<ConfigWriter<R>>,
}

impl<R: ReloadModule> NumberService<R> {
    pub fn new(pool: DbPool, writer: Arc<ConfigWriter<R>>) -> Self {
        Self { pool, writer }
    }

    fn conn(&self) -> Result<DbConn, OrchestratorError> {
        Ok(self.pool.get().map_err(StoreError::from)?)
    }

    /// Creates a number and writes its dial-plan block.
    ///
    /// The value is trimmed and must be unique; the agent must exist. If
    /// the dial-plan write fails the fresh row is deleted before the error
    /// is returned.
    pub async fn create(
        &self,
        value: &str,
        agent_id: &str,
    ) -> Result<PhoneNumber, OrchestratorError> {
        let value = value.trim();
        let conn = self.conn()?;

        if numbers::find_by_value(&conn, value)?.is_some() {
            return Err(OrchestratorError::conflict("Number already exists"));
        }
        let agent = agents::get(&conn, agent_id)?;

        let number = PhoneNumber {
            id: uuid::Uuid::new_v4().to_string(),
            value: value.to_string(),
            agent_id: agent.id.clone(),
            created_at: String::new(),
        };
        numbers::insert(&conn, &number)?;
        let number = numbers::get(&conn, &number.id)?;

        if let Err(e) = self.writer.provision_number(&number_entry(&number, &agent)).await {
            numbers::delete(&conn, &number.id)?;
            return Err(e.into());
        }
        Ok(number)
    }

    /// Re-points or renames a number and rewrites its dial-plan block.
    pub async fn update(
        &self,
        id: &str,
        value: Option<&str>,
        agent_id: Option<&str>,
    ) -> Result<PhoneNumber, OrchestratorError> {
        let conn = self.conn()?;
        let mut number = numbers::get(&conn, id)?;

        if let Some(value) = value {
            let value = value.trim();
            if value != number.value && numbers::find_by_value(&conn, value)?.is_some() {
                return Err(OrchestratorError::conflict("Number already exists"));
            }
            number.value = value.to_string();
        }
        if let Some(agent_id) = agent_id {
            agents::get(&conn, agent_id)?;
            number.agent_id = agent_id.to_string();
        }

        numbers::update(&conn, &number)?;
        let agent = agents::get(&conn, &number.agent_id)?;
        self.writer
            .provision_number(&number_entry(&number, &agent))
            .await?;
        Ok(number)
    }

    /// Retrieves one number.
    pub fn get(&self, id: &str) -> Result<PhoneNumber, OrchestratorError> {
        let conn = self.conn()?;
        Ok(numbers::get(&conn, id)?)
    }

    /// Lists all numbers.
    pub fn list(&self) -> Result<Vec<PhoneNumber>, OrchestratorError> {
        let conn = self.conn()?;
        Ok(numbers::list(&conn)?)
    }

    /// Deletes a number; the dial-plan block is removed best-effort.
    pub async fn remove(&self, id: &str) -> Result<(), OrchestratorError> {
        let conn = self.conn()?;
        numbers::get(&conn, id)?;
        numbers::delete(&conn, id)?;
        self.writer.remove_number(id).await;
        Ok(())
    }
}

/// SIP phone provisioning.
pub struct PhoneService<R> {
    pool: DbPool,
    writer: Arc<ConfigWriter<R>>,
}

impl<R: ReloadModule> PhoneService<R> {
    pub fn new(pool: DbPool, writer: Arc<ConfigWriter<R>>) -> Self {
        Self { pool, writer }
    }

    fn conn(&self) -> Result<DbConn, OrchestratorError> {
        Ok(self.pool.get().map_err(StoreError::from)?)
    }

    fn entry(phone: &Phone) -> PhoneEntry {
        PhoneEntry {
            id: phone.id.clone(),
            display_name: phone.full_name.clone(),
            password: phone.password.clone(),
        }
    }

    /// Creates a phone and writes its PJSIP block, rolling the row back if
    /// the write fails.
    pub async fn create(
        &self,
        full_name: Option<&str>,
        password: &str,
    ) -> Result<Phone, OrchestratorError> {
        if password.is_empty() {
            return Err(OrchestratorError::validation("phone password is required"));
        }

        let conn = self.conn()?;
        let phone = Phone {
            id: uuid::Uuid::new_v4().to_string(),
            full_name: full_name.map(str::to_string),
            password: password.to_string(),
            created_at: String::new(),
        };
        phones::insert(&conn, &phone)?;
        let phone = phones::get(&conn, &phone.id)?;

        if let Err(e) = self.writer.provision_phone(&Self::entry(&phone)).await {
            phones::delete(&conn, &phone.id)?;
            return Err(e.into());
        }
        Ok(phone)
    }

    /// Updates a phone and rewrites its PJSIP block.
    pub async fn update(
        &self,
        id: &str,
        full_name: Option<Option<&str>>,
        password: Option<&str>,
    ) -> Result<Phone, OrchestratorError> {
        let conn = self.conn()?;
        let mut phone = phones::get(&conn, id)?;

        if let Some(full_name) = full_name {
            phone.full_name = full_name.map(str::to_string);
        }
        if let Some(password) = password {
            if password.is_empty() {
                return Err(OrchestratorError::validation("phone password is required"));
            }
            phone.password = password.to_string();
        }

        phones::update(&conn, &phone)?;
        self.writer.provision_phone(&Self::entry(&phone)).await?;
        Ok(phone)
    }

    /// Retrieves one phone.
    pub fn get(&self, id: &str) -> Result<Phone, OrchestratorError> {
        let conn = self.conn()?;
        Ok(phones::get(&conn, id)?)
    }

    /// Lists all phones.
    pub fn list(&self) -> Result<Vec<Phone>, OrchestratorError> {
        let conn = self.conn()?;
        Ok(phones::list(&conn)?)
    }

    /// Deletes a phone; the PJSIP block is removed best-effort.
    pub async fn remove(&self, id: &str) -> Result<(), OrchestratorError> {
        let conn = self.conn()?;
        phones::get(&conn, id)?;
        phones::delete(&conn, id)?;
        self.writer.remove_phone(id).await;
        Ok(())
    }
}

/// SIP trunk provisioning.
pub struct TrunkService<R> {
    pool: DbPool,
    writer: Arc<ConfigWriter<R>>,
}

impl<R: ReloadModule> TrunkService<R> {
    pub fn new(pool: DbPool, writer: Arc<ConfigWriter<R>>) -> Self {
        Self { pool, writer }
    }

    fn conn(&self) -> Result<DbConn, OrchestratorError> {
        Ok(self.pool.get().map_err(StoreError::from)?)
    }

    fn entry(trunk: &Trunk) -> TrunkEntry {
        TrunkEntry {
            id: trunk.id.clone(),
            name: trunk.name.clone(),
            password: trunk.password.clone(),
        }
    }

    /// Creates a trunk and writes its PJSIP block, rolling the row back if
    /// the write fails. Trunk names are unique.
    pub async fn create(&self, name: &str, password: &str) -> Result<Trunk, OrchestratorError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OrchestratorError::validation("trunk name is required"));
        }
        if password.is_empty() {
            return Err(OrchestratorError::validation("trunk password is required"));
        }

        let conn = self.conn()?;
        if trunks::find_by_name(&conn, name)?.is_some() {
            return Err(OrchestratorError::conflict("Trunk name already exists"));
        }

        let trunk = Trunk {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            password: password.to_string(),
            created_at: String::new(),
        };
        trunks::insert(&conn, &trunk)?;
        let trunk = trunks::get(&conn, &trunk.id)?;

        if let Err(e) = self.writer.provision_trunk(&Self::entry(&trunk)).await {
            trunks::delete(&conn, &trunk.id)?;
            return Err(e.into());
        }
        Ok(trunk)
    }

    /// Updates a trunk and rewrites its PJSIP block.
    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<Trunk, OrchestratorError> {
        let conn = self.conn()?;
        let mut trunk = trunks::get(&conn, id)?;

        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                return Err(OrchestratorError::validation("trunk name is required"));
            }
            if name != trunk.name && trunks::find_by_name(&conn, name)?.is_some() {
                return Err(OrchestratorError::conflict("Trunk name already exists"));
            }
            trunk.name = name.to_string();
        }
        if let Some(password) = password {
            if password.is_empty() {
                return Err(OrchestratorError::validation("trunk password is required"));
            }
            trunk.password = password.to_string();
        }

        trunks::update(&conn, &trunk)?;
        self.writer.provision_trunk(&Self::entry(&trunk)).await?;
        Ok(trunk)
    }

    /// Retrieves one trunk.
    pub fn get(&self, id: &str) -> Result<Trunk, OrchestratorError> {
        let conn = self.conn()?;
        Ok(trunks::get(&conn, id)?)
    }

    /// Lists all trunks.
    pub fn list(&self) -> Result<Vec<Trunk>, OrchestratorError> {
        let conn = self.conn()?;
        Ok(trunks::list(&conn)?)
    }

    /// Deletes a trunk; the PJSIP block is removed best-effort.
    pub async fn remove(&self, id: &str) -> Result<(), OrchestratorError> {
        let conn = self.conn()?;
        trunks::get(&conn, id)?;
        trunks::delete(&conn, id)?;
        self.writer.remove_trunk(id).await;
        Ok(())
    }
}
