//! Agent rows.
//!
//! An agent is a configured voice-bot instance: a mode, a provider
//! selection, and the two ports its core container listens on. Ports are
//! assigned once at creation and stay stable for the agent's life.

use avrd_types::{AgentMode, AgentStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A stored agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// UUID primary key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Pipeline or speech-to-speech composition.
    pub mode: AgentMode,
    /// AudioSocket port of the core container.
    pub port: Option<u16>,
    /// HTTP port of the core container. Nullable for rows created before
    /// the column existed; backfilled on the next update.
    pub http_port: Option<u16>,
    pub provider_asr_id: Option<String>,
    pub provider_llm_id: Option<String>,
    pub provider_tts_id: Option<String>,
    pub provider_sts_id: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

const AGENT_COLUMNS: &str = "id, name, status, mode, port, http_port,
            provider_asr_id, provider_llm_id, provider_tts_id, provider_sts_id,
            created_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let status: String = row.get(2)?;
    let mode: String = row.get(3)?;
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        status: status.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        mode: mode.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        port: row.get(4)?,
        http_port: row.get(5)?,
        provider_asr_id: row.get(6)?,
        provider_llm_id: row.get(7)?,
        provider_tts_id: row.get(8)?,
        provider_sts_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Inserts a new agent row.
pub fn insert(conn: &Connection, agent: &Agent) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO agents (
            id, name, status, mode, port, http_port,
            provider_asr_id, provider_llm_id, provider_tts_id, provider_sts_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            agent.id,
            agent.name,
            agent.status.as_str(),
            agent.mode.as_str(),
            agent.port,
            agent.http_port,
            agent.provider_asr_id,
            agent.provider_llm_id,
            agent.provider_tts_id,
            agent.provider_sts_id,
        ],
    )?;
    Ok(())
}

/// Retrieves an agent by id.
pub fn get(conn: &Connection, id: &str) -> Result<Agent, StoreError> {
    conn.query_row(
        &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("agent", id))
}

/// Lists all agents, oldest first.
pub fn list(conn: &Connection) -> Result<Vec<Agent>, StoreError> {
    let mut stmt =
        conn.prepare(&format!("SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at ASC"))?;
    let rows = stmt.query_map([], map_row)?;
    let mut agents = Vec::new();
    for row in rows {
        agents.push(row?);
    }
    Ok(agents)
}

/// Writes every mutable column of an existing row.
pub fn update(conn: &Connection, agent: &Agent) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE agents SET
            name = ?2, status = ?3, mode = ?4, port = ?5, http_port = ?6,
            provider_asr_id = ?7, provider_llm_id = ?8,
            provider_tts_id = ?9, provider_sts_id = ?10
         WHERE id = ?1",
        params![
            agent.id,
            agent.name,
            agent.status.as_str(),
            agent.mode.as_str(),
            agent.port,
            agent.http_port,
            agent.provider_asr_id,
            agent.provider_llm_id,
            agent.provider_tts_id,
            agent.provider_sts_id,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("agent", &agent.id));
    }
    Ok(())
}

/// Persists only the status column.
pub fn set_status(conn: &Connection, id: &str, status: AgentStatus) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE agents SET status = ?2 WHERE id = ?1",
        params![id, status.as_str()],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("agent", id));
    }
    Ok(())
}

/// Deletes an agent row. Returns `NotFound` if no row matched.
pub fn delete(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM agents WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("agent", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        avrd_db::run_migrations(&conn).unwrap();
        conn
    }

    fn sample_agent() -> Agent {
        Agent {
            id: "a1".to_string(),
            name: "support-line".to_string(),
            status: AgentStatus::Stopped,
            mode: AgentMode::Pipeline,
            port: Some(5123),
            http_port: Some(7123),
            provider_asr_id: None,
            provider_llm_id: None,
            provider_tts_id: None,
            provider_sts_id: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn insert_get_round_trip() {
        let conn = test_conn();
        insert(&conn, &sample_agent()).unwrap();

        let stored = get(&conn, "a1").unwrap();
        assert_eq!(stored.name, "support-line");
        assert_eq!(stored.status, AgentStatus::Stopped);
        assert_eq!(stored.port, Some(5123));
        assert!(!stored.created_at.is_empty());
    }

    #[test]
    fn get_missing_is_not_found() {
        let conn = test_conn();
        let err = get(&conn, "nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn update_persists_mode_switch() {
        let conn = test_conn();
        insert(&conn, &sample_agent()).unwrap();

        let mut agent = get(&conn, "a1").unwrap();
        agent.mode = AgentMode::Sts;
        agent.http_port = Some(7200);
        update(&conn, &agent).unwrap();

        let stored = get(&conn, "a1").unwrap();
        assert_eq!(stored.mode, AgentMode::Sts);
        assert_eq!(stored.http_port, Some(7200));
    }

    #[test]
    fn set_status_only_touches_status() {
        let conn = test_conn();
        insert(&conn, &sample_agent()).unwrap();

        set_status(&conn, "a1", AgentStatus::Running).unwrap();
        let stored = get(&conn, "a1").unwrap();
        assert_eq!(stored.status, AgentStatus::Running);
        assert_eq!(stored.name, "support-line");
    }

    #[test]
    fn delete_missing_is_not_found() {
        let conn = test_conn();
        insert(&conn, &sample_agent()).unwrap();
        delete(&conn, "a1").unwrap();
        assert!(delete(&conn, "a1").unwrap_err().is_not_found());
    }
}
