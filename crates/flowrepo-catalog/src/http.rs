//! Operator repository client
//!
//! `GET {base}/operator/{id}` with the caller's `X-UserId` and
//! `Authorization` headers forwarded unchanged.

use async_trait::async_trait;
use flowrepo_core::{CatalogError, Credential, OperatorCatalog, OperatorMetadata};
use reqwest::StatusCode;
use std::time::Duration;

/// Catalog backed by the remote operator repository
#[derive(Debug, Clone)]
pub struct HttpOperatorCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOperatorCatalog {
    /// Create a catalog client for the service at `base_url`
    ///
    /// # Errors
    /// `CatalogError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OperatorCatalog for HttpOperatorCatalog {
    async fn get_operator_metadata(
        &self,
        operator_id: &str,
        user_id: &str,
        credential: &Credential,
    ) -> Result<OperatorMetadata, CatalogError> {
        let mut request = self
            .client
            .get(format!("{}/operator/{operator_id}", self.base_url))
            .header("X-UserId", user_id);
        if let Some(token) = credential.token() {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(CatalogError::NotFound(operator_id.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(CatalogError::Transport(format!("{status}: {body}")));
            }
        }

        let metadata: OperatorMetadata = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        tracing::debug!(operator_id, name = %metadata.name, "fetched operator metadata");
        Ok(metadata)
    }
}
