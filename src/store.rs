use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

pub const ECOLE: &str = "ecole";
pub const MATIERES: &str = "matieres";
pub const CLASSES: &str = "classes";
pub const ENSEIGNANTS: &str = "enseignants";
pub const FRAIS_SCOLAIRES: &str = "fraisScolaires";
pub const ELEVES: &str = "eleves";
pub const PAIEMENTS: &str = "paiements";
pub const NOTES: &str = "notes";
pub const UTILISATEURS: &str = "utilisateurs";
pub const COMPOSITIONS: &str = "compositions";

/// Collections the store accepts. Unknown names are rejected at the IPC
/// boundary, not here.
pub const COLLECTIONS: &[&str] = &[
    ECOLE,
    MATIERES,
    CLASSES,
    ENSEIGNANTS,
    FRAIS_SCOLAIRES,
    ELEVES,
    PAIEMENTS,
    NOTES,
    UTILISATEURS,
    COMPOSITIONS,
];

pub fn is_known_collection(name: &str) -> bool {
    COLLECTIONS.contains(&name)
}

/// Generic record store: named collections of JSON documents with generated
/// ids and timestamps. Constructed explicitly and passed by reference into
/// the engines; `get_all` preserves insertion order.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(workspace: &Path) -> anyhow::Result<Store> {
        std::fs::create_dir_all(workspace)?;
        let db_path = workspace.join("ecole.sqlite3");
        Self::init(Connection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Store> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Store> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records(
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY(collection, id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
            [],
        )?;
        Ok(Store { conn })
    }

    pub fn get_all(&self, collection: &str) -> anyhow::Result<Vec<Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM records WHERE collection = ? ORDER BY rowid")?;
        let rows = stmt.query_map([collection], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for data in rows {
            out.push(serde_json::from_str(&data?)?);
        }
        Ok(out)
    }

    pub fn get_by_id(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ? AND id = ?",
                (collection, id),
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    pub fn create(&self, collection: &str, fields: Value) -> anyhow::Result<Value> {
        let Value::Object(mut record) = fields else {
            anyhow::bail!("record fields must be a JSON object");
        };
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        record.insert("id".to_string(), Value::String(id.clone()));
        record.insert("createdAt".to_string(), Value::String(now.clone()));
        record.insert("updatedAt".to_string(), Value::String(now));
        let record = Value::Object(record);
        self.conn.execute(
            "INSERT INTO records(collection, id, data) VALUES(?, ?, ?)",
            (collection, &id, &serde_json::to_string(&record)?),
        )?;
        Ok(record)
    }

    /// Shallow field merge; `id` and `createdAt` are immutable. Returns the
    /// merged record, or None for an unknown id.
    pub fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> anyhow::Result<Option<Value>> {
        let Value::Object(patch) = patch else {
            anyhow::bail!("record patch must be a JSON object");
        };
        let Some(existing) = self.get_by_id(collection, id)? else {
            return Ok(None);
        };
        let Value::Object(mut record) = existing else {
            anyhow::bail!("malformed record {}/{}", collection, id);
        };
        for (k, v) in patch {
            if k == "id" || k == "createdAt" {
                continue;
            }
            record.insert(k, v);
        }
        record.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        let record = Value::Object(record);
        self.conn.execute(
            "UPDATE records SET data = ? WHERE collection = ? AND id = ?",
            (&serde_json::to_string(&record)?, collection, id),
        )?;
        Ok(Some(record))
    }

    pub fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM records WHERE collection = ? AND id = ?",
            (collection, id),
        )?;
        Ok(n > 0)
    }

    pub fn get_all_as<T: DeserializeOwned>(&self, collection: &str) -> anyhow::Result<Vec<T>> {
        self.get_all(collection)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect()
    }

    pub fn get_by_id_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> anyhow::Result<Option<T>> {
        match self.get_by_id(collection, id)? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Runs `f` inside a single transaction; rolls back on error.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Store) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        match f(self) {
            Ok(v) => {
                tx.commit()?;
                Ok(v)
            }
            Err(e) => {
                let _ = tx.rollback();
                Err(e)
            }
        }
    }
}
