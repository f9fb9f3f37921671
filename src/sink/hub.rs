//! HTTP document store hub.
//!
//! Records live in collections of a thread (the hub's unit of database). A
//! write goes through three calls:
//!
//! ```text
//! POST {hub}/threads/{thread}/collections/{collection}/transactions       -> { transaction_id }
//! POST {hub}/threads/{thread}/collections/{collection}/transactions/{id}/instances
//!      { instances: [...] }                                                -> { instance_ids }
//! POST {hub}/threads/{thread}/collections/{collection}/transactions/{id}/commit
//! ```
//!
//! Every call carries the credentials of the injected [`Authenticator`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, trace};

use super::auth::{ApiCredentials, Authenticator, HubAuth, Identity};
use super::error::SinkError;
use super::store::{Collection, DocumentStore, WriteTransaction};
use crate::config::HubConfig;

/// Bound on each hub request.
const HUB_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct OpenResponse {
    transaction_id: String,
}

#[derive(Serialize)]
struct CreateRequest {
    instances: Vec<Value>,
}

#[derive(Deserialize)]
struct CreateResponse {
    instance_ids: Vec<String>,
}

/// A document store reached over the hub's HTTP API.
pub struct HubStore<A> {
    http: reqwest::Client,
    base: String,
    thread_id: String,
    auth: Arc<A>,
}

impl HubStore<HubAuth> {
    /// Authenticates against the hub described by `config`.
    #[instrument(skip(config), fields(hub = %config.url, thread = %config.thread_id))]
    pub async fn connect(config: &HubConfig) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(HUB_REQUEST_TIMEOUT)
            .build()
            .map_err(super::auth::AuthError::from)?;
        let identity = Identity::from_hex(&config.identity_key)?;
        let api = ApiCredentials::new(&config.api_key, &config.api_secret);
        let auth = HubAuth::establish(&http, config.url.as_str(), &identity, api).await?;

        info!("Authenticated with document store hub");
        Ok(Self::new(http, config.url.as_str(), &config.thread_id, auth))
    }
}

impl<A: Authenticator> HubStore<A> {
    pub fn new(http: reqwest::Client, base: &str, thread_id: &str, auth: A) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            thread_id: thread_id.to_string(),
            auth: Arc::new(auth),
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!(
            "{}/threads/{}/collections/{}/transactions",
            self.base, self.thread_id, collection
        )
    }
}

impl<A> std::fmt::Debug for HubStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubStore")
            .field("base", &self.base)
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

impl<A: Authenticator + 'static> DocumentStore for HubStore<A> {
    type Transaction = HubTransaction<A>;

    async fn open_write_transaction(
        &self,
        collection: Collection,
    ) -> Result<HubTransaction<A>, SinkError> {
        let open_error = |message: String| SinkError::Open {
            collection,
            message,
        };

        let response = self
            .auth
            .authorize(self.http.post(self.collection_url(collection)))
            .send()
            .await
            .map_err(|e| open_error(e.to_string()))?;
        let opened: OpenResponse = checked(response)
            .await
            .map_err(open_error)?
            .json()
            .await
            .map_err(|e| open_error(e.to_string()))?;

        trace!(%collection, transaction = %opened.transaction_id, "Opened write transaction");
        Ok(HubTransaction {
            http: self.http.clone(),
            auth: self.auth.clone(),
            url: format!(
                "{}/{}",
                self.collection_url(collection),
                opened.transaction_id
            ),
            collection,
        })
    }
}

/// An open hub write transaction.
pub struct HubTransaction<A> {
    http: reqwest::Client,
    auth: Arc<A>,
    url: String,
    collection: Collection,
}

impl<A> std::fmt::Debug for HubTransaction<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubTransaction")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl<A: Authenticator> WriteTransaction for HubTransaction<A> {
    async fn create(&mut self, records: Vec<Value>) -> Result<Vec<String>, SinkError> {
        let count = records.len();
        let collection = self.collection;
        let create_error = |message: String| SinkError::Create {
            collection,
            count,
            message,
        };

        let response = self
            .auth
            .authorize(self.http.post(format!("{}/instances", self.url)))
            .json(&CreateRequest { instances: records })
            .send()
            .await
            .map_err(|e| create_error(e.to_string()))?;
        let created: CreateResponse = checked(response)
            .await
            .map_err(create_error)?
            .json()
            .await
            .map_err(|e| create_error(e.to_string()))?;

        Ok(created.instance_ids)
    }

    async fn commit(self) -> Result<(), SinkError> {
        let collection = self.collection;
        let commit_error = |message: String| SinkError::Commit {
            collection,
            message,
        };

        let response = self
            .auth
            .authorize(self.http.post(format!("{}/commit", self.url)))
            .send()
            .await
            .map_err(|e| commit_error(e.to_string()))?;
        checked(response).await.map_err(commit_error)?;
        Ok(())
    }
}

/// Turns a non-success status into an error message including the body.
async fn checked(response: reqwest::Response) -> Result<reqwest::Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("HTTP {status}: {body}"))
}
