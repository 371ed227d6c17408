//! Flow Repository Client
//!
//! Typed access to the repository's HTTP API:
//! - listing with pagination, ordering and search
//! - fetch, create, update and delete of single flows
//!
//! Every request carries the caller's `Authorization` and `X-UserId`
//! headers; the service decides what the caller may see.

use flowrepo_core::{Flow, FlowId, FlowsResponse, ListArgs};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client failures
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Service answered with a non-success status
    #[error("service returned {code}: {body}")]
    Status { code: u16, body: String },

    /// Request never completed
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was not what the API promises
    #[error("invalid response: {0}")]
    Decode(String),

    /// Update of a flow that has no identifier
    #[error("flow has no id")]
    MissingId,
}

impl ClientError {
    /// HTTP status, when the service answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Created {
    #[serde(rename = "_id")]
    id: FlowId,
}

/// Identity a request is made on behalf of
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
    pub user_id: &'a str,
    pub token: &'a str,
}

impl<'a> Identity<'a> {
    #[inline]
    #[must_use]
    pub const fn new(user_id: &'a str, token: &'a str) -> Self {
        Self { user_id, token }
    }
}

/// Client of one repository service
#[derive(Debug, Clone)]
pub struct FlowRepoClient {
    http: reqwest::Client,
    base_url: String,
}

impl FlowRepoClient {
    /// Create a client for the service mounted at `base_url`
    ///
    /// # Errors
    /// [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are sent to
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List flows visible to the caller
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn get_flows(
        &self,
        identity: Identity<'_>,
        args: &ListArgs,
    ) -> Result<FlowsResponse, ClientError> {
        let request = self
            .http
            .get(self.url("/flow"))
            .query(&args.to_query_pairs());
        decode(send(authorize(request, identity)).await?).await
    }

    /// Fetch one flow
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn get_flow(&self, identity: Identity<'_>, id: &FlowId) -> Result<Flow, ClientError> {
        let request = self.http.get(self.url(&format!("/flow/{id}")));
        decode(send(authorize(request, identity)).await?).await
    }

    /// Store a new flow owned by the caller and return its id
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn create_flow(&self, identity: Identity<'_>, flow: &Flow) -> Result<FlowId, ClientError> {
        let request = self.http.put(self.url("/flow")).json(flow);
        let created: Created = decode(send(authorize(request, identity)).await?).await?;
        tracing::debug!(flow_id = %created.id, "created flow");
        Ok(created.id)
    }

    /// Replace the stored flow with the same id
    ///
    /// # Errors
    /// [`ClientError::MissingId`] if `flow` carries no id, otherwise see
    /// [`ClientError`].
    pub async fn update_flow(&self, identity: Identity<'_>, flow: &Flow) -> Result<(), ClientError> {
        let id = flow.id.as_ref().ok_or(ClientError::MissingId)?;
        let request = self.http.post(self.url(&format!("/flow/{id}"))).json(flow);
        send(authorize(request, identity)).await?;
        Ok(())
    }

    /// Delete a flow
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn delete_flow(&self, identity: Identity<'_>, id: &FlowId) -> Result<(), ClientError> {
        let request = self.http.delete(self.url(&format!("/flow/{id}")));
        send(authorize(request, identity)).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn authorize(request: RequestBuilder, identity: Identity<'_>) -> RequestBuilder {
    request
        .header(reqwest::header::AUTHORIZATION, identity.token)
        .header("X-UserId", identity.user_id)
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), %body, "request refused");
    Err(ClientError::Status {
        code: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}
