//! HTTP client for the SigNoz REST API.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::types::{
    ChannelData, ChannelPayload, DashboardData, Envelope, RemoteResource, RuleData,
};

/// Endpoint used when a ProviderConfig does not name one.
pub const DEFAULT_ENDPOINT: &str = "https://api.signoz.cloud";

pub const API_KEY_HEADER: &str = "SIGNOZ-API-KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection parameters resolved from a ProviderConfig.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Errors surfaced by the SigNoz API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a status >= 400.
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("invalid API key header: {0}")]
    InvalidApiKey(#[from] reqwest::header::InvalidHeaderValue),

    #[error("failed to execute request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to unmarshal response: {source}: {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("failed to marshal request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("response from {0} carried no data")]
    EmptyResponse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Whether the error means the remote resource does not exist.
///
/// Some SigNoz versions answer a missing resource with a non-404 status and a
/// "not found" body, so the body is checked as well. Only server answers
/// count; transport and decode failures never mean absent.
pub fn is_not_found(err: &ApiError) -> bool {
    match err {
        ApiError::Status { status: 404, .. } => true,
        ApiError::Status { body, .. } => body.contains("not found") || body.contains("404"),
        _ => false,
    }
}

/// Client for one SigNoz instance.
///
/// Built fresh for every reconcile; holds no cache.
#[derive(Clone)]
pub struct SignozClient {
    base_url: String,
    http: reqwest::Client,
}

impl SignozClient {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(&config.api_key)?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: config.base_url,
            http,
        })
    }

    pub fn dashboards(&self) -> ResourceApi<'_, DashboardData> {
        ResourceApi::new(self)
    }

    pub fn rules(&self) -> ResourceApi<'_, RuleData> {
        ResourceApi::new(self)
    }

    pub fn channels(&self) -> ResourceApi<'_, ChannelData> {
        ResourceApi::new(self)
    }

    /// Ask SigNoz to send a test notification through a channel definition.
    pub async fn test_channel(&self, payload: &ChannelPayload) -> Result<(), ApiError> {
        self.send(Method::POST, "/api/v1/testChannel", Some(payload))
            .await
            .map(drop)
    }

    /// Send a request and return the raw response body.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method.clone(), &url);

        if let Some(body) = body {
            let json = serde_json::to_string(body).map_err(ApiError::Encode)?;
            debug!(body = %json, "Request body");
            req = req.body(json);
        }

        debug!(%method, %url, "Making request");
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status.as_u16() >= 400 {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

/// Decode an enveloped response; an empty body yields `None`.
fn decode<T: DeserializeOwned>(body: &str) -> Result<Option<T>, ApiError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|source| ApiError::Decode {
        source,
        body: body.to_string(),
    })?;
    Ok(envelope.data)
}

/// CRUD operations on one collection.
pub struct ResourceApi<'a, T> {
    client: &'a SignozClient,
    _marker: PhantomData<T>,
}

impl<'a, T: RemoteResource> ResourceApi<'a, T> {
    fn new(client: &'a SignozClient) -> Self {
        Self {
            client,
            _marker: PhantomData,
        }
    }

    fn collection_path() -> String {
        format!("/api/v1/{}", T::COLLECTION)
    }

    fn item_path(id: &str) -> String {
        format!("/api/v1/{}/{}", T::COLLECTION, id)
    }

    fn require(path: &str, data: Option<T>) -> Result<T, ApiError> {
        data.ok_or_else(|| ApiError::EmptyResponse(path.to_string()))
    }

    pub async fn create<P: Serialize + Sync>(&self, payload: &P) -> Result<T, ApiError> {
        let path = Self::collection_path();
        let body = self.client.send(Method::POST, &path, Some(payload)).await?;
        Self::require(&path, decode(&body)?)
    }

    pub async fn get(&self, id: &str) -> Result<T, ApiError> {
        let path = Self::item_path(id);
        let body = self.client.send::<()>(Method::GET, &path, None).await?;
        Self::require(&path, decode(&body)?)
    }

    pub async fn update<P: Serialize + Sync>(&self, id: &str, payload: &P) -> Result<T, ApiError> {
        let path = Self::item_path(id);
        let body = self.client.send(Method::PUT, &path, Some(payload)).await?;
        Self::require(&path, decode(&body)?)
    }

    /// Any successful status counts; the body is ignored.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let path = Self::item_path(id);
        self.client
            .send::<()>(Method::DELETE, &path, None)
            .await
            .map(drop)
    }

    pub async fn list(&self) -> Result<Vec<T>, ApiError> {
        let path = Self::collection_path();
        let body = self.client.send::<()>(Method::GET, &path, None).await?;
        Ok(decode::<Vec<T>>(&body)?.unwrap_or_default())
    }
}
