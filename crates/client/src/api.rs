//! REST client for the platform API's admin endpoints.
//!
//! Every resource follows the same shape:
//!
//! | Call           | Request                                    |
//! |----------------|--------------------------------------------|
//! | `list`         | `GET    /api/v1/{resource}?limit&offset&…` |
//! | `delete`       | `DELETE /api/v1/{resource}/{id}`           |
//! | `patch_status` | `PATCH  /api/v1/{resource}/{id}/status`    |
//! | `update`       | `PUT    /api/v1/{resource}/{id}`           |
//!
//! Successful bodies use the `{ "data": ... }` envelope; failures carry
//! `{ "error": "...", "code": "..." }`.

use async_trait::async_trait;
use peduli_core::lifecycle::EntityKind;
use peduli_core::remote::{EntityApi, ListPage, ListQuery};
use peduli_core::types::DbId;
use serde::Deserialize;

use crate::config::ClientConfig;

/// HTTP implementation of [`EntityApi`].
pub struct HttpEntityApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Errors from the platform API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform API returned a non-2xx status code.
    #[error("Platform API error ({status}): {body}")]
    Api {
        status: u16,
        /// Raw response body.
        body: String,
    },
}

impl ClientError {
    /// Human-readable reason, preferring the API's `error` field.
    pub fn reason(&self) -> String {
        match self {
            ClientError::Request(err) if err.is_timeout() => "request timed out".to_string(),
            ClientError::Request(err) => err.to_string(),
            ClientError::Api { status, body } => serde_json::from_str::<ErrorBody>(body)
                .map(|parsed| parsed.error)
                .unwrap_or_else(|_| format!("HTTP {status}")),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct DataResponse<T> {
    data: T,
}

impl HttpEntityApi {
    /// Build a client from configuration. The timeout applies to every request.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(
            client,
            config.base_url.clone(),
            config.token.clone(),
        ))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String, token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/api/v1/{}", self.base_url, kind.resource_path())
    }

    fn row_url(&self, kind: EntityKind, id: DbId) -> String {
        format!("{}/{}", self.collection_url(kind), id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or [`ClientError::Api`]
    /// with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a `{ "data": T }` body.
    async fn parse_data<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<DataResponse<T>>().await?.data)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), ClientError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Merge `status` into the metadata object sent with a status change.
///
/// Non-object metadata is nested under a `metadata` key.
fn status_body(status: &str, metadata: &serde_json::Value) -> serde_json::Value {
    let mut body = match metadata {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("metadata".to_string(), other.clone());
            map
        }
    };
    body.insert("status".to_string(), serde_json::Value::from(status));
    serde_json::Value::Object(body)
}

#[async_trait]
impl EntityApi for HttpEntityApi {
    type Error = ClientError;

    async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<ListPage, ClientError> {
        let response = self
            .authorize(self.client.get(self.collection_url(kind)))
            .query(query)
            .send()
            .await?;
        Self::parse_data(response).await
    }

    async fn delete(&self, kind: EntityKind, id: DbId) -> Result<(), ClientError> {
        tracing::debug!(%kind, id, "DELETE row");
        let response = self
            .authorize(self.client.delete(self.row_url(kind, id)))
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn patch_status(
        &self,
        kind: EntityKind,
        id: DbId,
        status: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), ClientError> {
        tracing::debug!(%kind, id, status, "PATCH row status");
        let response = self
            .authorize(
                self.client
                    .patch(format!("{}/status", self.row_url(kind, id))),
            )
            .json(&status_body(status, metadata))
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: DbId,
        fields: &serde_json::Value,
    ) -> Result<(), ClientError> {
        tracing::debug!(%kind, id, "PUT row");
        let response = self
            .authorize(self.client.put(self.row_url(kind, id)))
            .json(fields)
            .send()
            .await?;
        Self::check_status(response).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn status_body_merges_object_metadata() {
        let body = status_body("dijadwalkan", &json!({ "pickup_date": "2026-11-02" }));
        assert_eq!(
            body,
            json!({ "status": "dijadwalkan", "pickup_date": "2026-11-02" })
        );
    }

    #[test]
    fn status_body_wraps_scalar_metadata() {
        assert_eq!(status_body("ditutup", &json!(null)), json!({ "status": "ditutup" }));
        assert_eq!(
            status_body("dibalas", &json!("terima kasih")),
            json!({ "status": "dibalas", "metadata": "terima kasih" })
        );
    }

    #[test]
    fn status_overrides_metadata_key() {
        let body = status_body("selesai", &json!({ "status": "baru" }));
        assert_eq!(body["status"], "selesai");
    }

    #[test]
    fn reason_prefers_error_field() {
        let err = ClientError::Api {
            status: 409,
            body: r#"{"error":"Donation already paid","code":"CONFLICT"}"#.to_string(),
        };
        assert_eq!(err.reason(), "Donation already paid");

        let err = ClientError::Api {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert_eq!(err.reason(), "HTTP 502");
    }

    #[test]
    fn urls_follow_resource_path() {
        let api = HttpEntityApi::with_client(
            reqwest::Client::new(),
            "http://localhost:3000".to_string(),
            None,
        );
        assert_eq!(
            api.row_url(EntityKind::PickupRequest, 7),
            "http://localhost:3000/api/v1/pickup-requests/7"
        );
        assert_eq!(
            api.collection_url(EntityKind::BankAccount),
            "http://localhost:3000/api/v1/bank-accounts"
        );
    }
}
