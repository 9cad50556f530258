//! Inbound phone-number rows.
//!
//! A number routes calls to one agent. Values are stored trimmed and are
//! globally unique. Rows are removed with their agent via the foreign-key
//! cascade.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A stored inbound number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// UUID primary key.
    pub id: String,
    /// The dialable value, e.g. `+390612345678`.
    pub value: String,
    /// The agent whose core container answers this number.
    pub agent_id: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<PhoneNumber> {
    Ok(PhoneNumber {
        id: row.get(0)?,
        value: row.get(1)?,
        agent_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Inserts a new number row.
pub fn insert(conn: &Connection, number: &PhoneNumber) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO numbers (id, value, agent_id) VALUES (?1, ?2, ?3)",
        params![number.id, number.value, number.agent_id],
    )?;
    Ok(())
}

/// Retrieves a number by id.
pub fn get(conn: &Connection, id: &str) -> Result<PhoneNumber, StoreError> {
    conn.query_row(
        "SELECT id, value, agent_id, created_at FROM numbers WHERE id = ?1",
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("number", id))
}

/// Looks a number up by its dialable value.
pub fn find_by_value(conn: &Connection, value: &str) -> Result<Option<PhoneNumber>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, value, agent_id, created_at FROM numbers WHERE value = ?1",
            [value],
            map_row,
        )
        .optional()?)
}

/// Lists all numbers ordered by value.
pub fn list(conn: &Connection) -> Result<Vec<PhoneNumber>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, value, agent_id, created_at FROM numbers ORDER BY value ASC")?;
    let rows = stmt.query_map([], map_row)?;
    let mut numbers = Vec::new();
    for row in rows {
        numbers.push(row?);
    }
    Ok(numbers)
}

/// Writes every mutable column of an existing row.
pub fn update(conn: &Connection, number: &PhoneNumber) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE numbers SET value = ?2, agent_id = ?3 WHERE id = ?1",
        params![number.id, number.value, number.agent_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("number", &number.id));
    }
    Ok(())
}

/// Deletes a number row.
pub fn delete(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM numbers WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("number", id));
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
        conn.execute(
            "INSERT INTO agents (id, name) VALUES ('a1', 'support-line')",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn insert_and_find_by_value() {
        let conn = test_conn();
        insert(
            &conn,
            &PhoneNumber {
                id: "n1".to_string(),
                value: "+390612345678".to_string(),
                agent_id: "a1".to_string(),
                created_at: String::new(),
            },
        )
        .unwrap();

        let found = find_by_value(&conn, "+390612345678").unwrap().unwrap();
        assert_eq!(found.agent_id, "a1");
        assert!(find_by_value(&conn, "+19999999999").unwrap().is_none());
    }

    #[test]
    fn numbers_cascade_with_their_agent() {
        let conn = test_conn();
        insert(
            &conn,
            &PhoneNumber {
                id: "n1".to_string(),
                value: "+390612345678".to_string(),
                agent_id: "a1".to_string(),
                created_at: String::new(),
            },
        )
        .unwrap();

        conn.execute("DELETE FROM agents WHERE id = 'a1'", []).unwrap();
        assert!(get(&conn, "n1").unwrap_err().is_not_found());
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let conn = test_conn();
        let err = insert(
            &conn,
            &PhoneNumber {
                id: "n1".to_string(),
                value: "+390612345678".to_string(),
                agent_id: "missing".to_string(),
                created_at: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
