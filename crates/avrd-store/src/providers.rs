//! Provider rows.
//!
//! A provider is a reusable backend configuration (image + environment)
//! referenced, never owned, by agents. Names are globally unique; the
//! uniqueness check lives in the orchestrator so it can surface a typed
//! conflict instead of a bare constraint violation.

use avrd_types::{ProviderConfig, ProviderType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A stored provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// UUID primary key.
    pub id: String,
    /// Globally unique display name.
    pub name: String,
    /// Backend category.
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Image reference and environment, persisted as JSON.
    pub config: ProviderConfig,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode(
    (id, name, provider_type, config_json, created_at): (String, String, String, String, String),
) -> Result<Provider, StoreError> {
    let provider_type = provider_type
        .parse()
        .map_err(|e: avrd_types::ParseEnumError| {
            StoreError::Database(rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))
        })?;
    let config = serde_json::from_str(&config_json)?;
    Ok(Provider {
        id,
        name,
        provider_type,
        config,
        created_at,
    })
}

/// Inserts a new provider row.
pub fn insert(conn: &Connection, provider: &Provider) -> Result<(), StoreError> {
    let config_json = serde_json::to_string(&provider.config)?;
    conn.execute(
        "INSERT INTO providers (id, name, type, config_json) VALUES (?1, ?2, ?3, ?4)",
        params![
            provider.id,
            provider.name,
            provider.provider_type.as_str(),
            config_json,
        ],
    )?;
    Ok(())
}

/// Retrieves a provider by id.
pub fn get(conn: &Connection, id: &str) -> Result<Provider, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, type, config_json, created_at FROM providers WHERE id = ?1",
            [id],
            map_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("provider", id))?;
    decode(row)
}

/// Looks a provider up by its unique name. Returns `None` when absent —
/// callers use this for duplicate checks, where absence is the happy path.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Provider>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, type, config_json, created_at FROM providers WHERE name = ?1",
            [name],
            map_row,
        )
        .optional()?;
    row.map(decode).transpose()
}

/// Lists all providers ordered by name.
pub fn list(conn: &Connection) -> Result<Vec<Provider>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT id, name, type, config_json, created_at FROM providers ORDER BY name ASC")?;
    let rows = stmt.query_map([], map_row)?;
    let mut providers = Vec::new();
    for row in rows {
        providers.push(decode(row?)?);
    }
    Ok(providers)
}

/// Writes every mutable column of an existing row.
pub fn update(conn: &Connection, provider: &Provider) -> Result<(), StoreError> {
    let config_json = serde_json::to_string(&provider.config)?;
    let changed = conn.execute(
        "UPDATE providers SET name = ?2, type = ?3, config_json = ?4 WHERE id = ?1",
        params![
            provider.id,
            provider.name,
            provider.provider_type.as_str(),
            config_json,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("provider", &provider.id));
    }
    Ok(())
}

/// Deletes a provider row.
pub fn delete(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM providers WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("provider", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        avrd_db::run_migrations(&conn).unwrap();
        conn
    }

    fn sample_provider() -> Provider {
        Provider {
            id: "p1".to_string(),
            name: "deepgram-asr".to_string(),
            provider_type: ProviderType::Asr,
            config: ProviderConfig {
                image: Some("avr/asr-deepgram:latest".to_string()),
                docker_image: None,
                env: BTreeMap::from([("DEEPGRAM_API_KEY".to_string(), "dg_key".to_string())]),
                extra: serde_json::Map::new(),
            },
            created_at: String::new(),
        }
    }

    #[test]
    fn config_round_trips_through_json_column() {
        let conn = test_conn();
        insert(&conn, &sample_provider()).unwrap();

        let stored = get(&conn, "p1").unwrap();
        assert_eq!(stored.provider_type, ProviderType::Asr);
        assert_eq!(stored.config.image_ref(), Some("avr/asr-deepgram:latest"));
        assert_eq!(
            stored.config.env.get("DEEPGRAM_API_KEY").map(String::as_str),
            Some("dg_key")
        );
    }

    #[test]
    fn find_by_name_distinguishes_absent() {
        let conn = test_conn();
        insert(&conn, &sample_provider()).unwrap();

        assert!(find_by_name(&conn, "deepgram-asr").unwrap().is_some());
        assert!(find_by_name(&conn, "other").unwrap().is_none());
    }

    #[test]
    fn duplicate_name_violates_constraint() {
        let conn = test_conn();
        insert(&conn, &sample_provider()).unwrap();

        let mut dup = sample_provider();
        dup.id = "p2".to_string();
        assert!(matches!(
            insert(&conn, &dup).unwrap_err(),
            StoreError::Database(_)
        ));
    }

    #[test]
    fn update_and_delete() {
        let conn = test_conn();
        insert(&conn, &sample_provider()).unwrap();

        let mut provider = get(&conn, "p1").unwrap();
        provider.name = "deepgram-asr-eu".to_string();
        update(&conn, &provider).unwrap();
        assert_eq!(get(&conn, "p1").unwrap().name, "deepgram-asr-eu");

        delete(&conn, "p1").unwrap();
        assert!(get(&conn, "p1").unwrap_err().is_not_found());
    }
}
