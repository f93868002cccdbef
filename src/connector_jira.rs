//! Organization-scoped JIRA connector.
//!
//! Searches JIRA issues over the REST v3 search endpoint. The organization
//! filter is applied twice: in the JQL sent to the server, and again
//! client-side against the returned issue payloads. An issue that does not
//! reference the scoped organization is dropped even if the server returned
//! it. A blank organization short-circuits to an empty result.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::JiraConnectorConfig;
use crate::connector::{SearchScope, SourceConnector};
use crate::errors::ConnectorError;
use crate::models::{Document, SourceType};

pub struct JiraConnector {
    config: JiraConnectorConfig,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl JiraConnector {
    pub fn new(config: JiraConnectorConfig, timeout_secs: u64) -> Result<Self, ConnectorError> {
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

    /// Spelling variations an organization may appear under in JIRA fields.
    fn organization_variations(organization: &str) -> Vec<String> {
        let org = organization.trim();
        let mut variations = vec![
            org.to_string(),
            org.replace(' ', "-"),
            org.replace(' ', "_"),
            org.replace(' ', ""),
            org.to_uppercase(),
            org.to_lowercase(),
        ];
        variations.sort();
        variations.dedup();
        variations
    }

    fn build_jql(&self, query_text: &str, organization: &str) -> String {
        let org_clauses: Vec<String> = Self::organization_variations(organization)
            .into_iter()
            .map(|v| format!("{} = \"{}\"", self.config.organization_field, escape_jql(&v)))
            .collect();
        let text = escape_jql(query_text);
        format!(
            "({}) AND text ~ \"{}\" ORDER BY resolved DESC, updated DESC",
            org_clauses.join(" OR "),
            text
        )
    }

    fn token(&self) -> Result<String, ConnectorError> {
        std::env::var(&self.config.token_env).map_err(|_| {
            ConnectorError::Unavailable(format!("{} not set", self.config.token_env))
        })
    }

    fn issue_to_document(issue: &Value) -> Option<Document> {
        let key = issue.get("key")?.as_str()?;
        let fields = issue.get("fields")?;
        let title = fields
            .get("summary")
            .and_then(|s| s.as_str())
            .unwrap_or("");
        let body = fields
            .get("description")
            .map(flatten_adf_text)
            .unwrap_or_default();
        let mut doc = Document::new(key, title, &body, SourceType::Jira);
        doc.resolution = fields
            .get("resolution")
            .and_then(|r| r.get("description"))
            .and_then(|d| d.as_str())
            .map(|s| s.to_string());
        Some(doc)
    }

    /// Client-side re-check of the organization boundary.
    ///
    /// The issue's raw payload must mention the organization (any spelling
    /// variation, case-insensitive) or the issue is dropped.
    fn references_organization(issue: &Value, organization: &str) -> bool {
        let payload = issue.to_string().to_lowercase();
        Self::organization_variations(organization)
            .iter()
            .any(|v| !v.is_empty() && payload.contains(&v.to_lowercase()))
    }
}

#[async_trait]
impl SourceConnector for JiraConnector {
    fn name(&self) -> &str {
        "jira"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Jira
    }

    async fn search(
        &self,
        query_text: &str,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<Document>, ConnectorError> {
        let organization = match scope {
            SearchScope::Organization(org) => org.trim(),
            SearchScope::Role(_) => return Ok(Vec::new()),
        };
        if organization.is_empty() {
            // No organization means no visibility, never an unscoped search.
            debug!("jira search skipped: blank organization scope");
            return Ok(Vec::new());
        }

        let jql = self.build_jql(query_text, organization);
        debug!(jql = %jql, "jira search");

        let url = format!("{}/rest/api/3/search", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.config.user, Some(self.token()?))
            .query(&[("jql", jql.as_str()), ("maxResults", &limit.to_string())])
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
                "JIRA search returned {}: {}",
                status, body
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ConnectorError::Unavailable(e.to_string()))?;

        let issues = json
            .get("issues")
            .and_then(|i| i.as_array())
            .cloned()
            .unwrap_or_default();

        let mut documents = Vec::with_capacity(issues.len());
        for issue in &issues {
            if !Self::references_organization(issue, organization) {
                warn!(
                    issue = issue.get("key").and_then(|k| k.as_str()).unwrap_or("?"),
                    "dropping issue outside organization scope"
                );
                continue;
            }
            if let Some(doc) = Self::issue_to_document(issue) {
                documents.push(doc);
            }
        }

        Ok(documents)
    }
}

fn escape_jql(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Flatten an Atlassian Document Format tree into plain text.
///
/// Plain-string descriptions pass through unchanged.
fn flatten_adf_text(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                return text.clone();
            }
            map.get("content")
                .map(flatten_adf_text)
                .unwrap_or_default()
        }
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(flatten_adf_text)
                .filter(|s| !s.is_empty())
                .collect();
            parts.join("\n")
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JiraConnectorConfig {
        JiraConnectorConfig {
            base_url: "https://example.atlassian.net".to_string(),
            user: "svc@example.com".to_string(),
            token_env: "JIRA_API_TOKEN".to_string(),
            organization_field: "cf[13400]".to_string(),
        }
    }

    #[test]
    fn test_jql_contains_org_variations_and_text() {
        let connector = JiraConnector::new(config(), 15).unwrap();
        let jql = connector.build_jql("latest version", "Acme Corp");
        assert!(jql.contains("cf[13400] = \"Acme Corp\""));
        assert!(jql.contains("cf[13400] = \"Acme-Corp\""));
        assert!(jql.contains("text ~ \"latest version\""));
        assert!(jql.ends_with("ORDER BY resolved DESC, updated DESC"));
    }

    #[test]
    fn test_jql_escapes_quotes() {
        let connector = JiraConnector::new(config(), 15).unwrap();
        let jql = connector.build_jql("what is \"foo\"", "AMD");
        assert!(jql.contains("text ~ \"what is \\\"foo\\\"\""));
    }

    #[test]
    fn test_flatten_adf_nested_paragraphs() {
        let adf = serde_json::json!({
            "type": "doc",
            "content": [
                { "type": "paragraph", "content": [ { "type": "text", "text": "first line" } ] },
                { "type": "paragraph", "content": [ { "type": "text", "text": "second line" } ] }
            ]
        });
        assert_eq!(flatten_adf_text(&adf), "first line\nsecond line");
    }

    #[test]
    fn test_flatten_plain_string_description() {
        let v = Value::String("plain description".to_string());
        assert_eq!(flatten_adf_text(&v), "plain description");
    }

    #[test]
    fn test_issue_outside_org_is_dropped() {
        let issue = serde_json::json!({
            "key": "OPS-1",
            "fields": { "summary": "other customer issue", "labels": ["globex"] }
        });
        assert!(!JiraConnector::references_organization(&issue, "AMD"));
        let scoped = serde_json::json!({
            "key": "OPS-2",
            "fields": { "summary": "amd outage", "labels": ["amd"] }
        });
        assert!(JiraConnector::references_organization(&scoped, "AMD"));
    }

    #[test]
    fn test_issue_to_document_extracts_resolution() {
        let issue = serde_json::json!({
            "key": "OPS-3",
            "fields": {
                "summary": "refresh failing",
                "description": "nightly refresh stalls",
                "resolution": { "description": "restarted the scheduler" }
            }
        });
        let doc = JiraConnector::issue_to_document(&issue).unwrap();
        assert_eq!(doc.source_id, "OPS-3");
        assert_eq!(doc.resolution.as_deref(), Some("restarted the scheduler"));
    }
}
