//! Base HTTP client with shared logic

use crate::infrastructure::model::ProviderError;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub(super) struct HttpClientBase {
    pub id: String,
    pub endpoint: String,
    pub api_key: String,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, api_key: String) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            api_key,
            http: Client::new(),
        }
    }

    pub fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Post JSON with bearer auth
    pub async fn post_with_bearer<Req, Res>(&self, url: &str, body: &Req) -> Result<Res, ProviderError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        self.http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::network(&self.id, e))?
            .error_for_status()
            .map_err(|e| ProviderError::network(&self.id, e))?
            .json()
            .await
            .map_err(|e| ProviderError::network(&self.id, e))
    }

    /// Post JSON with header-based key auth (for Anthropic)
    pub async fn post_with_key_header<Req, Res>(
        &self,
        url: &str,
        key_header: &str,
        extra_headers: &[(&str, &str)],
        body: &Req,
    ) -> Result<Res, ProviderError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(url)
            .header(key_header, self.api_key.as_str())
            .header("Content-Type", "application/json");
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        request
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::network(&self.id, e))?
            .error_for_status()
            .map_err(|e| ProviderError::network(&self.id, e))?
            .json()
            .await
            .map_err(|e| ProviderError::network(&self.id, e))
    }
}
