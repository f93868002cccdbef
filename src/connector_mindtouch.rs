//! Role-scoped MindTouch documentation connector.
//!
//! Searches the MindTouch site search API with the customer's resolved
//! documentation role as the access filter, so a customer only sees pages
//! published to their role. A scope other than [`SearchScope::Role`]
//! yields an empty set.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::MindTouchConnectorConfig;
use crate::connector::{SearchScope, SourceConnector};
use crate::errors::ConnectorError;
use crate::models::{Document, SourceType};

pub struct MindTouchConnector {
    config: MindTouchConnectorConfig,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl MindTouchConnector {
    pub fn new(
        config: MindTouchConnectorConfig,
        timeout_secs: u64,
    ) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConnectorError::Unavailable(e.to_string()))?;
        Ok(Self {
            config,
            client,
            timeout_secs,
        })
    }

    fn token(&self) -> Result<String, ConnectorError> {
        std::env::var(&self.config.token_env).map_err(|_| {
            ConnectorError::Unavailable(format!("{} not set", self.config.token_env))
        })
    }

    fn page_to_document(page: &Value) -> Option<Document> {
        let id = page.get("id").and_then(|v| v.as_str()).or_else(|| {
            page.get("@id").and_then(|v| v.as_str())
        })?;
        let title = page.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let body = page
            .get("content")
            .and_then(|v| v.as_str())
            .or_else(|| page.get("summary").and_then(|v| v.as_str()))
            .unwrap_or("");
        Some(Document::new(id, title, body, SourceType::MindTouch))
    }
}

#[async_trait]
impl SourceConnector for MindTouchConnector {
    fn name(&self) -> &str {
        "mindtouch"
    }

    fn source_type(&self) -> SourceType {
        SourceType::MindTouch
    }

    async fn search(
        &self,
        query_text: &str,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<Document>, ConnectorError> {
        let role = match scope {
            SearchScope::Role(role) => role.trim(),
            SearchScope::Organization(_) => return Ok(Vec::new()),
        };
        if role.is_empty() {
            return Ok(Vec::new());
        }

        debug!(role = %role, "mindtouch search");

        let url = format!("{}/@api/deki/site/search", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(&[
                ("q", query_text),
                ("role", role),
                ("limit", &limit.to_string()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConnectorError::Timeout(self.timeout_secs)
                } else {
                    ConnectorError::Unavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Unavailable(format!(
                "MindTouch search returned {}: {}",
                status, body
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ConnectorError::Unavailable(e.to_string()))?;

        let pages = json
            .get("pages")
            .or_else(|| json.get("page"))
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(pages
            .iter()
            .filter_map(Self::page_to_document)
            .collect())
    }
}
