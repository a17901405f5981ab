/// Local entity store backed by SQLite
use super::{with_id, Collection, EntityStore, StoreError};
use crate::model::Id;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_store.sql");

/// Keeps every collection in one `records` table with JSON bodies.
///
/// Row ids come from a single sequence, so two records created together in
/// different collections never share an id.
pub struct SqliteEntityStore {
    db: Mutex<Connection>,
}

impl SqliteEntityStore {
    /// Opens (or creates) the database file and initializes the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened local entity store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Creates a throwaway store that lives as long as the value
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::remote("sqlite connection lock poisoned"))
    }

    fn parse_body(collection: Collection, id: Id, body: &str) -> Result<Value, StoreError> {
        let value: Value = serde_json::from_str(body).map_err(|e| StoreError::Malformed {
            collection,
            message: e.to_string(),
        })?;
        with_id(collection, value, id)
    }

    /// Serializes a body for storage, dropping any id the caller left in it.
    fn body_text(collection: Collection, mut body: Value) -> Result<String, StoreError> {
        match body.as_object_mut() {
            Some(object) => {
                object.remove("id");
            }
            None => {
                return Err(StoreError::Malformed {
                    collection,
                    message: "record body must be a JSON object".to_string(),
                })
            }
        }
        Ok(body.to_string())
    }

    fn get_sync(&self, collection: Collection, id: Id) -> Result<Value, StoreError> {
        let db = self.conn()?;
        let body: Option<String> = db
            .query_row(
                "SELECT body FROM records WHERE id = ?1 AND collection = ?2",
                (id, collection.path()),
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Self::parse_body(collection, id, &body),
            None => Err(StoreError::NotFound { collection, id }),
        }
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let db = self.conn()?;
        let mut stmt =
            db.prepare("SELECT id, body FROM records WHERE collection = ?1 ORDER BY id")?;

        let rows = stmt
            .query_map([collection.path()], |row| {
                Ok((row.get::<_, Id>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body)| Self::parse_body(collection, id, &body))
            .collect()
    }

    async fn get(&self, collection: Collection, id: Id) -> Result<Value, StoreError> {
        self.get_sync(collection, id)
    }

    async fn create(&self, collection: Collection, body: Value) -> Result<Value, StoreError> {
        let text = Self::body_text(collection, body)?;
        let id = {
            let db = self.conn()?;
            db.execute(
                "INSERT INTO records (collection, body, created_at, updated_at)
                 VALUES (?1, ?2, datetime('now'), datetime('now'))",
                (collection.path(), &text),
            )?;
            db.last_insert_rowid()
        };

        debug!(collection = %collection, id, "Created record");
        Self::parse_body(collection, id, &text)
    }

    async fn update(
        &self,
        collection: Collection,
        id: Id,
        body: Value,
    ) -> Result<Value, StoreError> {
        let text = Self::body_text(collection, body)?;
        let changed = {
            let db = self.conn()?;
            db.execute(
                "UPDATE records SET body = ?1, updated_at = datetime('now')
                 WHERE id = ?2 AND collection = ?3",
                (&text, id, collection.path()),
            )?
        };

        if changed == 0 {
            return Err(StoreError::NotFound { collection, id });
        }
        debug!(collection = %collection, id, "Updated record");
        Self::parse_body(collection, id, &text)
    }

    async fn delete(&self, collection: Collection, id: Id) -> Result<(), StoreError> {
        let changed = {
            let db = self.conn()?;
            db.execute(
                "DELETE FROM records WHERE id = ?1 AND collection = ?2",
                (id, collection.path()),
            )?
        };

        if changed == 0 {
            return Err(StoreError::NotFound { collection, id });
        }
        debug!(collection = %collection, id, "Deleted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_independent_ids() {
        let store = SqliteEntityStore::in_memory().unwrap();
        let room = store
            .create(Collection::RoomSchedules, json!({"room": {"id": 1}}))
            .await
            .unwrap();
        let teacher = store
            .create(Collection::TeacherSchedules, json!({"teacher": {"id": 2}}))
            .await
            .unwrap();

        assert_ne!(room["id"], teacher["id"]);
        assert_eq!(store.list(Collection::RoomSchedules).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_ignores_client_id() {
        let store = SqliteEntityStore::in_memory().unwrap();
        let created = store
            .create(Collection::Rooms, json!({"id": 999, "name": "A101"}))
            .await
            .unwrap();

        assert_ne!(created["id"], json!(999));
        assert_eq!(created["name"], "A101");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_records() {
        let store = SqliteEntityStore::in_memory().unwrap();

        let err = store
            .update(Collection::Rooms, 5, json!({"name": "X"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                collection: Collection::Rooms,
                id: 5
            }
        );
        assert!(store.delete(Collection::Rooms, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_update_replaces_body() {
        let store = SqliteEntityStore::in_memory().unwrap();
        let created = store
            .create(Collection::Rooms, json!({"name": "A101", "capacity": 30}))
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();

        store
            .update(Collection::Rooms, id, json!({"name": "A102"}))
            .await
            .unwrap();

        let read = store.get(Collection::Rooms, id).await.unwrap();
        assert_eq!(read, json!({"id": id, "name": "A102"}));
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let path = std::env::temp_dir().join(format!("planner-store-{}.db", rand::random::<u64>()));
        {
            let store = SqliteEntityStore::open(&path).unwrap();
            store
                .create(Collection::Teachers, json!({"name": "Ana"}))
                .await
                .unwrap();
        }

        let reopened = SqliteEntityStore::open(&path).unwrap();
        assert_eq!(reopened.list(Collection::Teachers).await.unwrap().len(), 1);
        let _ = std::fs::remove_file(&path);
    }
}
