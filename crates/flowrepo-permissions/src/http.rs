//! HTTP client of the permissions service
//!
//! Routes:
//! - `PUT  /admin/topics/{class}` declare a class with default grants
//! - `PUT  /manage/{class}/{id}` upsert a record
//! - `GET  /manage/{class}` list records the caller administrates
//! - `DELETE /manage/{class}/{id}` remove a record
//! - `GET  /check/{class}/{id}?permissions=r` capability check
//! - `GET  /accessible/{class}?permissions=r` accessible ids

use crate::claims::TokenClaims;
use async_trait::async_trait;
use dashmap::DashMap;
use flowrepo_core::{
    AuthorityError, Capability, Credential, PermissionGateway, PermissionRecord, ResourceClass,
    ResourcePermissions,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Serialize)]
struct TopicBody<'a> {
    id: &'a str,
    default_permissions: &'a ResourcePermissions,
}

/// Permission gateway speaking to a remote permissions service
#[derive(Debug)]
pub struct HttpPermissionGateway {
    client: reqwest::Client,
    base_url: String,
    admin_token: Option<String>,
    /// Defaults registered by this process, used for class-level checks
    class_defaults: DashMap<String, ResourcePermissions>,
}

impl HttpPermissionGateway {
    /// Create a gateway for the service at `base_url`
    ///
    /// # Errors
    /// `AuthorityError::Unavailable` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthorityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthorityError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_token: None,
            class_defaults: DashMap::new(),
        })
    }

    /// Token sent when acting with the internal admin credential
    #[must_use]
    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder, credential: &Credential) -> RequestBuilder {
        let token = match credential {
            Credential::Bearer(token) => Some(token.as_str()),
            Credential::InternalAdmin => self.admin_token.as_deref(),
        };
        match token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AuthorityError> {
        let response = request
            .send()
            .await
            .map_err(|e| AuthorityError::Unavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AuthorityError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| AuthorityError::Unavailable(format!("invalid response: {e}")))
    }
}

/// Client errors are the authority refusing the request; the rest is outage
async fn status_error(response: Response) -> AuthorityError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = format!("{status}: {body}");
    if status.is_client_error() {
        AuthorityError::Rejected(message)
    } else {
        AuthorityError::Unavailable(message)
    }
}

fn permissions_param(capability: Capability) -> [(&'static str, String); 1] {
    [("permissions", capability.code().to_string())]
}

#[async_trait]
impl PermissionGateway for HttpPermissionGateway {
    async fn register_resource_class(&self, class: &ResourceClass) -> Result<(), AuthorityError> {
        let request = self
            .client
            .put(self.url(&format!("/admin/topics/{}", class.id)))
            .json(&TopicBody {
                id: &class.id,
                default_permissions: &class.default_permissions,
            });
        self.send(self.authorize(request, &Credential::InternalAdmin))
            .await?;
        self.class_defaults
            .insert(class.id.clone(), class.default_permissions.clone());
        tracing::debug!(class = %class.id, "registered resource class");
        Ok(())
    }

    async fn set_permissions(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
        permissions: &ResourcePermissions,
    ) -> Result<(), AuthorityError> {
        let request = self
            .client
            .put(self.url(&format!("/manage/{class_id}/{resource_id}")))
            .json(permissions);
        self.send(self.authorize(request, credential)).await?;
        Ok(())
    }

    async fn check_capability(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
        capability: Capability,
    ) -> Result<bool, AuthorityError> {
        let request = self
            .client
            .get(self.url(&format!("/check/{class_id}/{resource_id}")))
            .query(&permissions_param(capability));
        self.fetch(self.authorize(request, credential)).await
    }

    /// Class-wide rights from the registered defaults and the token's roles
    ///
    /// The token signature is not checked here. Requests are expected to
    /// pass a verifying gateway before they reach the service, which makes
    /// the realm roles trustworthy. A token without readable claims holds no
    /// class-wide rights.
    async fn check_class_capability(
        &self,
        credential: &Credential,
        class_id: &str,
        capability: Capability,
    ) -> Result<bool, AuthorityError> {
        let token = match credential {
            Credential::InternalAdmin => return Ok(true),
            Credential::Bearer(token) => token,
        };
        let defaults = self.class_defaults.get(class_id).ok_or_else(|| {
            AuthorityError::Rejected(format!("resource class {class_id} not registered"))
        })?;
        // Opaque tokens carry no roles, so they only get per-resource grants
        let claims = match TokenClaims::decode(token) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::debug!(class = class_id, error = %err, "token carries no readable claims");
                return Ok(false);
            }
        };

        Ok(defaults.allows(&claims.sub, &claims.groups, claims.roles(), capability))
    }

    async fn list_accessible_resource_ids(
        &self,
        credential: &Credential,
        class_id: &str,
        capability: Capability,
    ) -> Result<BTreeSet<String>, AuthorityError> {
        let request = self
            .client
            .get(self.url(&format!("/accessible/{class_id}")))
            .query(&permissions_param(capability));
        self.fetch(self.authorize(request, credential)).await
    }

    async fn list_resources_with_admin_capability(
        &self,
        credential: &Credential,
        class_id: &str,
    ) -> Result<Vec<PermissionRecord>, AuthorityError> {
        let request = self.client.get(self.url(&format!("/manage/{class_id}")));
        self.fetch(self.authorize(request, credential)).await
    }

    async fn remove_resource(
        &self,
        credential: &Credential,
        class_id: &str,
        resource_id: &str,
    ) -> Result<(), AuthorityError> {
        let request = self
            .client
            .delete(self.url(&format!("/manage/{class_id}/{resource_id}")));
        let response = self
            .authorize(request, credential)
            .send()
            .await
            .map_err(|e| AuthorityError::Unavailable(e.to_string()))?;
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}
