//! SIP trunk rows.
//!
//! A trunk is a carrier link provisioned into pjsip.conf. Names are unique;
//! the id doubles as the endpoint/auth/AOR section name.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A stored SIP trunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trunk {
    /// UUID primary key, also the PJSIP section name.
    pub id: String,
    /// Unique display name, also the caller id name.
    pub name: String,
    /// SIP password used for inbound and outbound auth.
    pub password: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Trunk> {
    Ok(Trunk {
        id: row.get(0)?,
        name: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Inserts a new trunk row.
pub fn insert(conn: &Connection, trunk: &Trunk) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO trunks (id, name, password) VALUES (?1, ?2, ?3)",
        params![trunk.id, trunk.name, trunk.password],
    )?;
    Ok(())
}

/// Retrieves a trunk by id.
pub fn get(conn: &Connection, id: &str) -> Result<Trunk, StoreError> {
    conn.query_row(
        "SELECT id, name, password, created_at FROM trunks WHERE id = ?1",
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("trunk", id))
}

/// Looks a trunk up by its unique name.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Trunk>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, name, password, created_at FROM trunks WHERE name = ?1",
            [name],
            map_row,
        )
        .optional()?)
}

/// Lists all trunks ordered by name.
pub fn list(conn: &Connection) -> Result<Vec<Trunk>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, name, password, created_at FROM trunks ORDER BY name ASC")?;
    let rows = stmt.query_map([], map_row)?;
    let mut trunks = Vec::new();
    for row in rows {
        trunks.push(row?);
    }
    Ok(trunks)
}

/// Writes every mutable column of an existing row.
pub fn update(conn: &Connection, trunk: &Trunk) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE trunks SET name = ?2, password = ?3 WHERE id = ?1",
        params![trunk.id, trunk.name, trunk.password],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("trunk", &trunk.id));
    }
    Ok(())
}

/// Deletes a trunk row.
pub fn delete(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM trunks WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("trunk", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        avrd_db::run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn name_lookup_and_uniqueness() {
        let conn = test_conn();
        insert(
            &conn,
            &Trunk {
                id: "t1".to_string(),
                name: "carrier-a".to_string(),
                password: "pw".to_string(),
                created_at: String::new(),
            },
        )
        .unwrap();

        assert!(find_by_name(&conn, "carrier-a").unwrap().is_some());

        let err = insert(
            &conn,
            &Trunk {
                id: "t2".to_string(),
                name: "carrier-a".to_string(),
                password: "pw2".to_string(),
                created_at: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
