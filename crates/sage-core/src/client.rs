use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ApiSettings;
use crate::error::{SageError, SageResult};
use crate::route::CompletionRequest;

/// Shown when the service answers without a `response` field
pub const NO_RESPONSE: &str = "No response received";

#[derive(Deserialize)]
struct CompletionResponse {
    response: Option<String>,
}

#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CompletionClient {
    pub fn new(settings: &ApiSettings) -> SageResult<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub async fn send(&self, request: &CompletionRequest) -> SageResult<String> {
        let url = format!("{}{}", self.base_url, request.route.path());

        let mut query: Vec<(&str, &str)> = vec![("category", request.category.as_str())];
        if request.route.sends_prompt() {
            query.push(("prompt", request.prompt.as_str()));
        }
        if let Some(paper) = &request.paper {
            query.push(("paper", paper.as_str()));
        }

        let mut builder = self
            .client
            .post(&url)
            .query(&query)
            .header("X-API-Key", &self.api_key);

        if request.route.wants_accept_header() {
            builder = builder.header("Accept", "application/json");
        }

        if let Some(file) = &request.file {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime)?;
            builder = builder.multipart(Form::new().part("file", part));
        }

        info!(
            route = request.route.path(),
            category = request.category.as_str(),
            has_file = request.file.is_some(),
            "sending completion request"
        );

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "completion request rejected");
            return Err(SageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: CompletionResponse = serde_json::from_str(&body)?;
        debug!(route = request.route.path(), bytes = body.len(), "completion response received");

        Ok(parsed
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string()))
    }

    /// Drop the service's uploaded-document collection
    pub async fn clear_documents(&self) -> SageResult<()> {
        let url = format!("{}/nuke", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("document collection cleared");
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
