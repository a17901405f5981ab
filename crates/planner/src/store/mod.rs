//! Entity store access.
//!
//! The store is a set of independent collections with plain CRUD and no
//! cross-collection transactions. Adapters speak JSON values; the typed helpers
//! in this module convert to and from [`Record`] types.

mod error;
mod http;
mod sqlite;

pub use error::StoreError;
pub use http::{Credential, HttpEntityStore, HttpStoreConfig};
pub use sqlite::SqliteEntityStore;

use crate::model::Id;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Collections held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Rooms,
    Teachers,
    Students,
    Semesters,
    Courses,
    Offerings,
    Sections,
    Timeslots,
    RoomSchedules,
    TeacherSchedules,
    Enrollments,
    Conflicts,
}

impl Collection {
    /// Path segment of the collection on the remote store.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Rooms => "rooms",
            Collection::Teachers => "teachers",
            Collection::Students => "students",
            Collection::Semesters => "semesters",
            Collection::Courses => "courses",
            Collection::Offerings => "offerings",
            Collection::Sections => "sections",
            Collection::Timeslots => "timeslots",
            Collection::RoomSchedules => "room-schedules",
            Collection::TeacherSchedules => "teacher-schedules",
            Collection::Enrollments => "enrollments",
            Collection::Conflicts => "conflicts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// CRUD over one collection at a time.
///
/// Created and read values always carry the store-assigned `id`; bodies passed to
/// `create` and `update` never need one.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    /// Fails with [`StoreError::NotFound`] when the id does not resolve.
    async fn get(&self, collection: Collection, id: Id) -> Result<Value, StoreError>;

    async fn create(&self, collection: Collection, body: Value) -> Result<Value, StoreError>;

    /// Replaces the body of an existing record.
    async fn update(&self, collection: Collection, id: Id, body: Value)
        -> Result<Value, StoreError>;

    async fn delete(&self, collection: Collection, id: Id) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn EntityStore>;

/// A typed record stored in a fixed collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Id;
}

fn decode<T: Record>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Malformed {
        collection: T::COLLECTION,
        message: e.to_string(),
    })
}

fn encode<T: Record>(record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Malformed {
        collection: T::COLLECTION,
        message: e.to_string(),
    })
}

/// Reads every record of `T`'s collection.
pub async fn fetch_all<T: Record>(store: &dyn EntityStore) -> Result<Vec<T>, StoreError> {
    store
        .list(T::COLLECTION)
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

/// Reads one record, mapping a missing id to `None`.
pub async fn find<T: Record>(store: &dyn EntityStore, id: Id) -> Result<Option<T>, StoreError> {
    match store.get(T::COLLECTION, id).await {
        Ok(value) => decode(value).map(Some),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Reads one record, failing with [`StoreError::NotFound`] when it is missing.
pub async fn fetch<T: Record>(store: &dyn EntityStore, id: Id) -> Result<T, StoreError> {
    decode(store.get(T::COLLECTION, id).await?)
}

/// Persists a new record and returns it with its assigned id.
pub async fn insert<T: Record>(store: &dyn EntityStore, record: &T) -> Result<T, StoreError> {
    decode(store.create(T::COLLECTION, encode(record)?).await?)
}

pub async fn replace<T: Record>(
    store: &dyn EntityStore,
    id: Id,
    record: &T,
) -> Result<T, StoreError> {
    decode(store.update(T::COLLECTION, id, encode(record)?).await?)
}

pub async fn remove<T: Record>(store: &dyn EntityStore, id: Id) -> Result<(), StoreError> {
    store.delete(T::COLLECTION, id).await
}

/// Adds the store-assigned id to a record body.
fn with_id(collection: Collection, mut body: Value, id: Id) -> Result<Value, StoreError> {
    match body.as_object_mut() {
        Some(object) => {
            object.insert("id".to_string(), Value::from(id));
            Ok(body)
        }
        None => Err(StoreError::Malformed {
            collection,
            message: "record body must be a JSON object".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Room, RoomSchedule};

    #[tokio::test]
    async fn test_typed_helpers_round_trip_ids() {
        let store = SqliteEntityStore::in_memory().unwrap();
        let room = insert(
            &store,
            &Room {
                id: 0,
                name: "A101".to_string(),
                capacity: Some(30),
                building: None,
            },
        )
        .await
        .unwrap();

        assert!(room.id > 0);
        let fetched: Room = fetch(&store, room.id).await.unwrap();
        assert_eq!(fetched, room);
        assert_eq!(fetch_all::<Room>(&store).await.unwrap(), vec![room.clone()]);

        remove::<Room>(&store, room.id).await.unwrap();
        assert_eq!(find::<Room>(&store, room.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_is_scoped_to_collection() {
        let store = SqliteEntityStore::in_memory().unwrap();
        let room = insert(
            &store,
            &Room {
                id: 0,
                name: "B2".to_string(),
                capacity: None,
                building: None,
            },
        )
        .await
        .unwrap();

        // Same id, other collection.
        assert_eq!(find::<RoomSchedule>(&store, room.id).await.unwrap(), None);
    }

    #[test]
    fn test_with_id_rejects_non_objects() {
        let err = with_id(Collection::Rooms, Value::from(3), 1).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
