//! Test doubles for exercising partial failures against a real store.

use crate::model::Id;
use crate::store::{Collection, EntityStore, SqliteEntityStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;

/// Store operation a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
enum Fault {
    Once(StoreError),
    Always(StoreError),
    Delay(Duration),
    SlowReply(Duration),
}

/// Wraps a store and injects failures or delays per (collection, operation).
pub struct FaultyStore<S = SqliteEntityStore> {
    inner: S,
    faults: DashMap<(Collection, Operation), Fault>,
    calls: DashMap<(Collection, Operation), u32>,
}

impl FaultyStore<SqliteEntityStore> {
    /// Fault-free wrapper around a fresh in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(SqliteEntityStore::in_memory()?))
    }
}

impl<S: EntityStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: DashMap::new(),
            calls: DashMap::new(),
        }
    }

    /// The next call fails with a 503, later calls go through.
    pub fn fail_next(&self, collection: Collection, operation: Operation) {
        self.faults
            .insert((collection, operation), Fault::Once(injected_error()));
    }

    /// Every call fails with a 503 until [`FaultyStore::heal`].
    pub fn fail_always(&self, collection: Collection, operation: Operation) {
        self.faults
            .insert((collection, operation), Fault::Always(injected_error()));
    }

    /// Every call waits before reaching the inner store.
    pub fn delay(&self, collection: Collection, operation: Operation, by: Duration) {
        self.faults.insert((collection, operation), Fault::Delay(by));
    }

    /// Every call reaches the inner store, then waits before replying.
    pub fn delay_reply(&self, collection: Collection, operation: Operation, by: Duration) {
        self.faults
            .insert((collection, operation), Fault::SlowReply(by));
    }

    pub fn heal(&self) {
        self.faults.clear();
    }

    /// Number of calls made, including failed ones.
    pub fn calls(&self, collection: Collection, operation: Operation) -> u32 {
        self.calls
            .get(&(collection, operation))
            .map(|c| *c)
            .unwrap_or(0)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Applies the fault for a call. Returns how long to hold back the reply.
    async fn check(
        &self,
        collection: Collection,
        operation: Operation,
    ) -> Result<Option<Duration>, StoreError> {
        *self.calls.entry((collection, operation)).or_insert(0) += 1;

        let fault = self
            .faults
            .get(&(collection, operation))
            .map(|f| f.value().clone());
        match fault {
            Some(Fault::Once(err)) => {
                self.faults.remove(&(collection, operation));
                Err(err)
            }
            Some(Fault::Always(err)) => Err(err),
            Some(Fault::Delay(by)) => {
                tokio::time::sleep(by).await;
                Ok(None)
            }
            Some(Fault::SlowReply(by)) => Ok(Some(by)),
            None => Ok(None),
        }
    }
}

async fn reply<T>(hold: Option<Duration>, result: T) -> T {
    if let Some(by) = hold {
        tokio::time::sleep(by).await;
    }
    result
}

fn injected_error() -> StoreError {
    StoreError::Remote {
        status: Some(503),
        message: "injected failure".to_string(),
    }
}

#[async_trait]
impl<S: EntityStore> EntityStore for FaultyStore<S> {
    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let hold = self.check(collection, Operation::List).await?;
        reply(hold, self.inner.list(collection).await).await
    }

    async fn get(&self, collection: Collection, id: Id) -> Result<Value, StoreError> {
        let hold = self.check(collection, Operation::Get).await?;
        reply(hold, self.inner.get(collection, id).await).await
    }

    async fn create(&self, collection: Collection, body: Value) -> Result<Value, StoreError> {
        let hold = self.check(collection, Operation::Create).await?;
        reply(hold, self.inner.create(collection, body).await).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: Id,
        body: Value,
    ) -> Result<Value, StoreError> {
        let hold = self.check(collection, Operation::Update).await?;
        reply(hold, self.inner.update(collection, id, body).await).await
    }

    async fn delete(&self, collection: Collection, id: Id) -> Result<(), StoreError> {
        let hold = self.check(collection, Operation::Delete).await?;
        reply(hold, self.inner.delete(collection, id).await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let store = FaultyStore::in_memory().unwrap();
        store.fail_next(Collection::Rooms, Operation::Create);

        assert!(store
            .create(Collection::Rooms, json!({"name": "A"}))
            .await
            .is_err());
        assert!(store
            .create(Collection::Rooms, json!({"name": "A"}))
            .await
            .is_ok());
        assert_eq!(store.calls(Collection::Rooms, Operation::Create), 2);
        assert_eq!(store.inner().list(Collection::Rooms).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_reply_lands_before_timeout() {
        let store = FaultyStore::in_memory().unwrap();
        store.delay_reply(Collection::Rooms, Operation::Create, Duration::from_millis(500));

        let call = store.create(Collection::Rooms, json!({"name": "A"}));
        assert!(tokio::time::timeout(Duration::from_millis(50), call)
            .await
            .is_err());
        assert_eq!(store.inner().list(Collection::Rooms).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_always_until_healed() {
        let store = FaultyStore::in_memory().unwrap();
        store.fail_always(Collection::Rooms, Operation::List);

        assert!(store.list(Collection::Rooms).await.is_err());
        assert!(store.list(Collection::Rooms).await.is_err());
        store.heal();
        assert!(store.list(Collection::Rooms).await.is_ok());
    }
}
