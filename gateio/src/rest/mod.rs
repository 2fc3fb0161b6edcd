pub mod endpoints;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::auth::Credentials;
use crate::config::GateConfig;
use crate::error::{GateError, Result};

/// Bounded timeouts on every REST call.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client wrapper for the venue REST API.
///
/// Holds one connection-reusing `reqwest::Client`, created at startup and
/// shared by every caller. Signing is applied per request for
/// authenticated endpoints.
#[derive(Debug, Clone)]
pub struct GateHttpClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl GateHttpClient {
    pub fn new(config: &GateConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn credentials(&self, endpoint: &'static str) -> Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or(GateError::AuthRequired(endpoint))
    }

    /// GET a public JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(query).send().await?;
        Self::decode(resp).await
    }

    /// GET an authenticated JSON resource.
    pub async fn get_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T> {
        let creds = self.credentials("GET")?;
        let headers = creds.sign_rest("GET", path, query, "");
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("KEY", &headers.key)
            .header("Timestamp", &headers.timestamp)
            .header("SIGN", &headers.sign)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// POST an authenticated JSON body.
    pub async fn post_signed<T: DeserializeOwned>(&self, path: &str, body: String) -> Result<T> {
        let creds = self.credentials("POST")?;
        let headers = creds.sign_rest("POST", path, "", &body);
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("KEY", &headers.key)
            .header("Timestamp", &headers.timestamp)
            .header("SIGN", &headers.sign)
            .body(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(GateError::Http { status, message });
        }
        resp.json::<T>().await.map_err(GateError::Request)
    }
}
