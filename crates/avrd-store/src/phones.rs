//! SIP phone rows.
//!
//! A phone is a WebRTC client identity that registers against the PBX. The
//! id doubles as the SIP username; the display name feeds the caller id.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A stored SIP phone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    /// UUID primary key, also the SIP username and endpoint section name.
    pub id: String,
    /// Display name used for the caller id, if any.
    pub full_name: Option<String>,
    /// SIP password.
    pub password: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Phone> {
    Ok(Phone {
        id: row.get(0)?,
        full_name: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Inserts a new phone row.
pub fn insert(conn: &Connection, phone: &Phone) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO phones (id, full_name, password) VALUES (?1, ?2, ?3)",
        params![phone.id, phone.full_name, phone.password],
    )?;
    Ok(())
}

/// Retrieves a phone by id.
pub fn get(conn: &Connection, id: &str) -> Result<Phone, StoreError> {
    conn.query_row(
        "SELECT id, full_name, password, created_at FROM phones WHERE id = ?1",
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("phone", id))
}

/// Lists all phones, oldest first.
pub fn list(conn: &Connection) -> Result<Vec<Phone>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT id, full_name, password, created_at FROM phones ORDER BY created_at ASC")?;
    let rows = stmt.query_map([], map_row)?;
    let mut phones = Vec::new();
    for row in rows {
        phones.push(row?);
    }
    Ok(phones)
}

/// Writes every mutable column of an existing row.
pub fn update(conn: &Connection, phone: &Phone) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE phones SET full_name = ?2, password = ?3 WHERE id = ?1",
        params![phone.id, phone.full_name, phone.password],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("phone", &phone.id));
    }
    Ok(())
}

/// Deletes a phone row.
pub fn delete(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM phones WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("phone", id));
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
    fn crud_round_trip() {
        let conn = test_conn();
        insert(
            &conn,
            &Phone {
                id: "ph1".to_string(),
                full_name: Some("Front Desk".to_string()),
                password: "s3cret".to_string(),
                created_at: String::new(),
            },
        )
        .unwrap();

        let mut phone = get(&conn, "ph1").unwrap();
        assert_eq!(phone.full_name.as_deref(), Some("Front Desk"));

        phone.full_name = None;
        update(&conn, &phone).unwrap();
        assert_eq!(get(&conn, "ph1").unwrap().full_name, None);

        delete(&conn, "ph1").unwrap();
        assert!(get(&conn, "ph1").unwrap_err().is_not_found());
    }
}
