//! HTTP client for a remote entity store.
//!
//! Each collection lives under `{base_url}/{collection}`; records under
//! `{base_url}/{collection}/{id}`. Every request carries the bearer credential
//! handed to the constructor.

use super::{Collection, EntityStore, StoreError};
use crate::model::Id;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Default location of the entity store API.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// Configuration for the entity store client.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the store API
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("planner/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Bearer token used to authenticate against the store.
///
/// Debug output shows only a fingerprint of the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn expose(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

/// Entity store reached over HTTP/JSON.
pub struct HttpEntityStore {
    client: Client,
    base_url: Url,
    credential: Credential,
}

impl HttpEntityStore {
    pub fn new(config: HttpStoreConfig, credential: Credential) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::remote(format!("Failed to build HTTP client: {e}")))?;

        let mut base_url = Url::parse(&config.base_url)?;
        // Url::join drops the last segment unless the base ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        debug!(
            base_url = %base_url,
            credential = %credential.fingerprint(),
            "Configured entity store client"
        );

        Ok(Self {
            client,
            base_url,
            credential,
        })
    }

    fn collection_url(&self, collection: Collection) -> Result<Url, StoreError> {
        Ok(self.base_url.join(collection.path())?)
    }

    fn record_url(&self, collection: Collection, id: Id) -> Result<Url, StoreError> {
        Ok(self
            .base_url
            .join(&format!("{}/{}", collection.path(), id))?)
    }

    /// Sends a request and returns the decoded body, if the response had one.
    async fn send(
        &self,
        collection: Collection,
        id: Option<Id>,
        request: RequestBuilder,
    ) -> Result<Option<Value>, StoreError> {
        let start = Instant::now();
        let response = request.bearer_auth(self.credential.expose()).send().await?;
        let status = response.status();

        debug!(
            collection = %collection,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Entity store responded"
        );

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(StoreError::NotFound { collection, id });
            }
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                collection = %collection,
                status = status.as_u16(),
                "Entity store request failed"
            );
            let message = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text
            };
            return Err(StoreError::Remote {
                status: Some(status.as_u16()),
                message,
            });
        }

        let text = response.text().await?;
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| StoreError::Malformed {
            collection,
            message: e.to_string(),
        })?;
        Ok(Some(unwrap_data(value)))
    }

    async fn send_record(
        &self,
        collection: Collection,
        id: Option<Id>,
        request: RequestBuilder,
    ) -> Result<Value, StoreError> {
        self.send(collection, id, request)
            .await?
            .ok_or_else(|| StoreError::Malformed {
                collection,
                message: "store returned an empty body where a record was expected".to_string(),
            })
    }
}

/// Some stores wrap payloads as `{"data": ...}`.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.len() == 1 && object.contains_key("data") => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl EntityStore for HttpEntityStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let url = self.collection_url(collection)?;
        match self.send(collection, None, self.client.get(url)).await? {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(StoreError::Malformed {
                collection,
                message: "expected a JSON array of records".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn get(&self, collection: Collection, id: Id) -> Result<Value, StoreError> {
        let url = self.record_url(collection, id)?;
        self.send_record(collection, Some(id), self.client.get(url))
            .await
    }

    async fn create(&self, collection: Collection, body: Value) -> Result<Value, StoreError> {
        let url = self.collection_url(collection)?;
        self.send_record(collection, None, self.client.post(url).json(&body))
            .await
    }

    async fn update(
        &self,
        collection: Collection,
        id: Id,
        body: Value,
    ) -> Result<Value, StoreError> {
        let url = self.record_url(collection, id)?;
        self.send_record(collection, Some(id), self.client.put(url).json(&body))
            .await
    }

    async fn delete(&self, collection: Collection, id: Id) -> Result<(), StoreError> {
        let url = self.record_url(collection, id)?;
        self.send(collection, Some(id), self.client.delete(url))
            .await
            .map(|_| ())
    }
}
