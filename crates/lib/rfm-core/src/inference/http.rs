use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use rfm_store::GraphMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{InferenceError, InferenceService, ModelHandle, QueryOptions};

/// Inference service reached over HTTPS with bearer authentication.
pub struct HttpInferenceService {
    client: Client,
    api_url: String,
    credential: RwLock<Option<String>>,
}

impl HttpInferenceService {
    /// Creates a client for `api_url` with a per-request timeout.
    ///
    /// # Errors
    /// Returns `InferenceError::Transport` if the HTTP client cannot be constructed.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InferenceError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            credential: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[derive(Deserialize)]
struct MaterializeResponse {
    model_id: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a QueryOptions>,
}

#[async_trait]
impl InferenceService for HttpInferenceService {
    async fn authenticate(&self, credential: &str) -> Result<(), InferenceError> {
        let url = format!("{}/auth/validate", self.api_url);
        let response = send(self.client.get(&url).bearer_auth(credential)).await?;
        drop(response);
        *self.credential.write().await = Some(credential.to_string());
        info!(api_url = %self.api_url, "authenticated with inference service");
        Ok(())
    }

    async fn materialize(
        &self,
        graph: &GraphMetadata,
    ) -> Result<Arc<dyn ModelHandle>, InferenceError> {
        let credential = self
            .credential
            .read()
            .await
            .clone()
            .ok_or(InferenceError::NotAuthenticated)?;
        let url = format!("{}/graphs/materialize", self.api_url);
        let response = send(self.client.post(&url).bearer_auth(&credential).json(graph)).await?;
        let body: MaterializeResponse = response
            .json()
            .await
            .map_err(|err| InferenceError::Decode(err.to_string()))?;
        debug!(model_id = %body.model_id, "materialized graph");

        Ok(Arc::new(HttpModelHandle {
            client: self.client.clone(),
            base_url: format!("{}/models/{}", self.api_url, body.model_id),
            model_id: body.model_id,
            credential,
        }))
    }
}

/// Model materialized by [`HttpInferenceService`].
#[derive(Debug)]
pub struct HttpModelHandle {
    client: Client,
    base_url: String,
    model_id: String,
    credential: String,
}

impl HttpModelHandle {
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn query(
        &self,
        action: &str,
        query: &str,
        options: Option<&QueryOptions>,
    ) -> Result<Response, InferenceError> {
        let url = format!("{}/{action}", self.base_url);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.credential)
            .json(&QueryRequest { query, options });
        send(request).await
    }
}

#[async_trait]
impl ModelHandle for HttpModelHandle {
    async fn predict(&self, query: &str, options: &QueryOptions) -> Result<Value, InferenceError> {
        decode(self.query("predict", query, Some(options)).await?).await
    }

    async fn evaluate(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Value, InferenceError> {
        decode(self.query("evaluate", query, Some(options)).await?).await
    }

    async fn parse(&self, query: &str) -> Result<(), InferenceError> {
        self.query("parse", query, None).await.map(drop)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, InferenceError> {
    let response = request
        .send()
        .await
        .map_err(|err| InferenceError::Transport(err.to_string()))?;
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(InferenceError::Api { status, body })
    }
}

async fn decode(response: Response) -> Result<Value, InferenceError> {
    response
        .json()
        .await
        .map_err(|err| InferenceError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn materialize_requires_authentication() {
        let service = HttpInferenceService::new("http://127.0.0.1:9/api/", Duration::from_secs(1))
            .expect("client");
        assert_eq!(service.api_url(), "http://127.0.0.1:9/api");
        let err = service
            .materialize(&GraphMetadata::default())
            .await
            .expect_err("not authenticated");
        assert!(matches!(err, InferenceError::NotAuthenticated));
    }

    #[test]
    fn parse_requests_omit_options() {
        let body = serde_json::to_value(QueryRequest {
            query: "PREDICT users.age FOR users.user_id=1",
            options: None,
        })
        .expect("serialize");
        assert!(body.get("options").is_none());
    }
}
