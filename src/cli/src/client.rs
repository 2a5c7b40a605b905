//! HTTP client for the Taskgate API server.
//!
//! Every request carries the bearer token when one is configured. Error
//! envelopes are decoded into [`ApiError`] so callers can show the server's
//! code and message.

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Success envelope returned by the server.
#[derive(Debug, Deserialize)]
struct SuccessEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// A request the server answered with an error status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{code} ({status}): {message}")]
    Rejected {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("unexpected response ({status}): {body}")]
    Unexpected { status: StatusCode, body: String },
}

impl ApiError {
    /// Hint shown alongside authentication failures.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Rejected { status, .. } if *status == StatusCode::UNAUTHORIZED => Some(
                "set a token with --token, TASKGATE_TOKEN, or `taskgate config set token <jwt>`",
            ),
            _ => None,
        }
    }
}

/// HTTP client for the Taskgate API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::DELETE, path)).await
    }

    /// GET a public endpoint and return the raw JSON body, whatever its status.
    pub async fn get_raw(&self, path: &str) -> Result<(StatusCode, serde_json::Value)> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        let value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))?;
        Ok((status, value))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = builder.send().await.context("Request to Taskgate failed")?;
        let status = resp.status();
        let url = resp.url().to_string();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => ApiError::Rejected {
                    status,
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => ApiError::Unexpected { status, body },
            };
            return Err(err.into());
        }

        let envelope: SuccessEnvelope<T> = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse response from {}", url))?;
        Ok(envelope.data)
    }
}
