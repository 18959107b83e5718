//! REST client for the realtime database

use crate::credentials::Authenticator;
use crate::{split_path, Credentials, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use std::time::Duration;
use sweepline_domain::{Snapshot, TreeStore, UpdateBatch};

/// Realtime database reached over its REST interface
///
/// Reads are `GET {url}/{path}.json`; multi-path updates are a single
/// `PATCH {url}/.json` whose body maps paths to values (null deletes).
/// Credentials travel as a query parameter: `auth` for a database secret,
/// `access_token` for a service account.
pub struct RestStore {
    client: Client,
    base_url: Url,
    auth: Authenticator,
}

impl RestStore {
    /// Create a client for the database at `database_url`
    ///
    /// `timeout` bounds every request.
    pub fn new(
        database_url: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(database_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{}: {}", database_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(database_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            auth: Authenticator::new(credentials),
        })
    }

    /// URL of the node at `path` with credentials added
    async fn authorized_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, StoreError> {
        let mut url = self.node_url(path, query)?;
        if let Some((key, value)) = self.auth.query_pair().await? {
            url.query_pairs_mut().append_pair(key, &value);
        }
        Ok(url)
    }

    /// URL of the node at `path`, with extra query pairs
    fn node_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, StoreError> {
        let segments = split_path(path)?;
        let mut url = self.base_url.clone();

        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?;
            parts.pop_if_empty();
            match segments.split_last() {
                None => {
                    parts.push(".json");
                }
                Some((last, parents)) => {
                    parts.extend(parents);
                    parts.push(&format!("{}.json", last));
                }
            }
        }

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TreeStore for RestStore {
    type Error = StoreError;

    async fn get(&self, path: &str) -> Result<Snapshot, Self::Error> {
        tracing::debug!("GET {}", path);

        let response = self.client.get(self.authorized_url(path, &[]).await?).send().await?;
        let value: Value = Self::check(response).await?.json().await?;

        Ok(Snapshot::from_value(Some(value)))
    }

    async fn multi_update(&self, updates: UpdateBatch) -> Result<(), Self::Error> {
        if updates.is_empty() {
            return Ok(());
        }

        tracing::debug!("PATCH {} paths", updates.len());

        let response = self
            .client
            .patch(self.authorized_url("", &[]).await?)
            .json(&updates)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    async fn ready(&self) -> bool {
        let url = match self.authorized_url("", &[("shallow", "true")]).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Readiness probe failed: {}", e);
                return false;
            }
        };

        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!("Readiness probe returned {}", response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Readiness probe failed: {}", StoreError::from(e));
                false
            }
        }
    }
}
