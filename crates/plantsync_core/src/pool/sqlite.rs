//! SQLite-backed authoritative object pool.
//!
//! # Responsibility
//! - Store authoritative objects as JSON payload rows keyed by
//!   `(kind, name)`, with ad-hoc properties in a side table.
//! - Enforce referential integrity between objects (path endpoints, link
//!   endpoints, location types, members, hops).
//!
//! # Invariants
//! - Creation order is preserved through SQLite `rowid`.
//! - Each mutation runs in its own transaction.
//! - An object cannot be withdrawn while another object references it.

use crate::db::migrations::latest_version;
use crate::model::object::{ObjectData, PlantObject};
use crate::model::reference::{EntityKind, ObjectRef};
use crate::pool::{ObjectPool, PoolError, PoolResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

const MODEL_NAME_KEY: &str = "model_name";

/// SQLite implementation of [`ObjectPool`].
pub struct SqliteObjectPool<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectPool<'conn> {
    /// Wraps a connection opened through `db::open_db*`.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    pub fn try_new(conn: &'conn Connection) -> PoolResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(PoolError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ObjectPool for SqliteObjectPool<'_> {
    fn model_name(&self) -> PoolResult<String> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM pool_meta WHERE key = ?1;",
                [MODEL_NAME_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.unwrap_or_default())
    }

    fn set_model_name(&self, name: &str) -> PoolResult<()> {
        self.conn.execute(
            "INSERT INTO pool_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![MODEL_NAME_KEY, name],
        )?;
        Ok(())
    }

    fn objects(&self, kind: EntityKind) -> PoolResult<Vec<PlantObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, payload
             FROM plant_objects
             WHERE kind = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([kind.as_str()])?;
        let mut objects = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let payload: String = row.get("payload")?;
            let reference = ObjectRef::new(kind, name);
            objects.push(decode_object(self.conn, reference, &payload)?);
        }
        Ok(objects)
    }

    fn object(&self, reference: &ObjectRef) -> PoolResult<Option<PlantObject>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM plant_objects WHERE kind = ?1 AND name = ?2;",
                params![reference.kind.as_str(), reference.name],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => Ok(Some(decode_object(
                self.conn,
                reference.clone(),
                &payload,
            )?)),
            None => Ok(None),
        }
    }

    fn create_object(&self, object: &PlantObject) -> PoolResult<ObjectRef> {
        let reference = object.reference();
        let tx = self.conn.unchecked_transaction()?;
        if object_exists(&tx, &reference)? {
            return Err(PoolError::Duplicate(reference));
        }
        ensure_references_exist(&tx, &reference, &object.data)?;

        tx.execute(
            "INSERT INTO plant_objects (kind, name, payload) VALUES (?1, ?2, ?3);",
            params![
                reference.kind.as_str(),
                reference.name,
                encode_payload(&object.data)?
            ],
        )?;
        replace_references(&tx, &reference, &object.data)?;
        for (key, value) in &object.properties {
            upsert_property(&tx, &reference, key, value)?;
        }
        tx.commit()?;

        debug!("event=pool_create module=pool status=ok reference={reference}");
        Ok(reference)
    }

    fn update_object(&self, object: &PlantObject) -> PoolResult<()> {
        let reference = object.reference();
        let tx = self.conn.unchecked_transaction()?;
        require_object(&tx, &reference)?;
        ensure_references_exist(&tx, &reference, &object.data)?;

        tx.execute(
            "UPDATE plant_objects
             SET payload = ?1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE kind = ?2 AND name = ?3;",
            params![
                encode_payload(&object.data)?,
                reference.kind.as_str(),
                reference.name
            ],
        )?;
        replace_references(&tx, &reference, &object.data)?;
        tx.commit()?;

        debug!("event=pool_update module=pool status=ok reference={reference}");
        Ok(())
    }

    fn withdraw_object(&self, reference: &ObjectRef) -> PoolResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        require_object(&tx, reference)?;

        let referrer: Option<(String, String)> = tx
            .query_row(
                "SELECT kind, name
                 FROM object_references
                 WHERE target_kind = ?1 AND target_name = ?2
                 ORDER BY kind ASC, name ASC
                 LIMIT 1;",
                params![reference.kind.as_str(), reference.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((kind, name)) = referrer {
            return Err(PoolError::rejected(
                reference,
                format!("still referenced by {kind}:{name}"),
            ));
        }

        tx.execute(
            "DELETE FROM plant_objects WHERE kind = ?1 AND name = ?2;",
            params![reference.kind.as_str(), reference.name],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn set_property(&self, reference: &ObjectRef, key: &str, value: &str) -> PoolResult<()> {
        require_object(self.conn, reference)?;
        upsert_property(self.conn, reference, key, value)
    }

    fn clear_properties(&self, reference: &ObjectRef) -> PoolResult<()> {
        require_object(self.conn, reference)?;
        self.conn.execute(
            "DELETE FROM object_properties WHERE kind = ?1 AND name = ?2;",
            params![reference.kind.as_str(), reference.name],
        )?;
        Ok(())
    }
}

fn object_exists(conn: &Connection, reference: &ObjectRef) -> PoolResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM plant_objects WHERE kind = ?1 AND name = ?2
        );",
        params![reference.kind.as_str(), reference.name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn require_object(conn: &Connection, reference: &ObjectRef) -> PoolResult<()> {
    if object_exists(conn, reference)? {
        Ok(())
    } else {
        Err(PoolError::NotFound(reference.clone()))
    }
}

fn ensure_references_exist(
    conn: &Connection,
    reference: &ObjectRef,
    data: &ObjectData,
) -> PoolResult<()> {
    for target in data.references() {
        if !object_exists(conn, &target)? {
            return Err(PoolError::rejected(
                reference,
                format!("referenced object {target} does not exist"),
            ));
        }
    }
    Ok(())
}

fn replace_references(
    conn: &Connection,
    reference: &ObjectRef,
    data: &ObjectData,
) -> PoolResult<()> {
    conn.execute(
        "DELETE FROM object_references WHERE kind = ?1 AND name = ?2;",
        params![reference.kind.as_str(), reference.name],
    )?;
    for target in data.references() {
        conn.execute(
            "INSERT OR IGNORE INTO object_references (kind, name, target_kind, target_name)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                reference.kind.as_str(),
                reference.name,
                target.kind.as_str(),
                target.name
            ],
        )?;
    }
    Ok(())
}

fn upsert_property(
    conn: &Connection,
    reference: &ObjectRef,
    key: &str,
    value: &str,
) -> PoolResult<()> {
    conn.execute(
        "INSERT INTO object_properties (kind, name, key, value) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(kind, name, key) DO UPDATE SET value = excluded.value;",
        params![reference.kind.as_str(), reference.name, key, value],
    )?;
    Ok(())
}

fn load_properties(
    conn: &Connection,
    reference: &ObjectRef,
) -> PoolResult<BTreeMap<String, String>> {
    let mut stmt = conn.prepare(
        "SELECT key, value
         FROM object_properties
         WHERE kind = ?1 AND name = ?2
         ORDER BY key ASC;",
    )?;
    let mut rows = stmt.query(params![reference.kind.as_str(), reference.name])?;
    let mut properties = BTreeMap::new();
    while let Some(row) = rows.next()? {
        properties.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
    }
    Ok(properties)
}

fn encode_payload(data: &ObjectData) -> PoolResult<String> {
    serde_json::to_string(data)
        .map_err(|err| PoolError::InvalidData(format!("cannot encode payload: {err}")))
}

fn decode_object(
    conn: &Connection,
    reference: ObjectRef,
    payload: &str,
) -> PoolResult<PlantObject> {
    let data: ObjectData = serde_json::from_str(payload).map_err(|err| {
        PoolError::InvalidData(format!("invalid payload for {reference}: {err}"))
    })?;
    if data.kind() != reference.kind {
        return Err(PoolError::InvalidData(format!(
            "payload kind `{}` does not match row kind `{}` for {}",
            data.kind(),
            reference.kind,
            reference
        )));
    }
    let properties = load_properties(conn, &reference)?;
    Ok(PlantObject {
        name: reference.name,
        properties,
        data,
    })
}
