//! Outward-facing collaborators: response formatting and ticket creation.
//!
//! Both sit behind traits so the pipeline can be exercised end to end with
//! scripted implementations. The built-in [`FileTicketSink`] writes one
//! JSON file per ticket; a real deployment would swap in a sink that calls
//! the ticketing system's API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::classifier::Classification;
use crate::models::{Query, SearchResult};

/// Renders a sufficient result set into the text shown to the customer.
pub trait ResponseFormatter: Send + Sync {
    fn format(&self, query: &Query, results: &[SearchResult]) -> String;
}

/// Plain-text formatter: best match first, with source attribution and
/// resolution steps when the source recorded them.
pub struct PlainFormatter;

impl ResponseFormatter for PlainFormatter {
    fn format(&self, query: &Query, results: &[SearchResult]) -> String {
        let mut out = String::new();
        out.push_str(&format!("Results for: {}\n\n", query.text));
        for result in results.iter().take(3) {
            let doc = &result.document;
            out.push_str(&format!(
                "[{}] {} ({})\n",
                doc.source_type, doc.title, doc.source_id
            ));
            if !doc.body.is_empty() {
                out.push_str(doc.body.trim());
                out.push('\n');
            }
            if let Some(resolution) = &doc.resolution {
                out.push_str(&format!("Resolution: {}\n", resolution.trim()));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// A support ticket ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: String,
    pub category: String,
    pub summary: String,
    /// The customer's original query text.
    pub description: String,
    pub customer: String,
    pub requested_by: String,
    /// Keyword that routed the ticket, when a keyword rule matched.
    pub matched_keyword: Option<String>,
    /// Fields the customer must still provide: name → description.
    pub required_fields: BTreeMap<String, String>,
    /// Fields filled in automatically: name → value.
    pub auto_populated: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(query: &Query, classification: Classification) -> Self {
        let created_at = Utc::now();
        let customer = if query.organization.is_empty() {
            "UNKNOWN".to_string()
        } else {
            query.organization.clone()
        };
        let id = format!(
            "TICKET_{}_{}_{}",
            classification.category,
            sanitize(&customer),
            created_at.format("%Y%m%d%H%M%S")
        );
        let summary = classification
            .auto_populated
            .get("summary")
            .cloned()
            .unwrap_or_else(|| query.text.chars().take(80).collect());
        Self {
            id,
            category: classification.category.to_string(),
            summary,
            description: query.text.clone(),
            customer,
            requested_by: query.customer_email.clone(),
            matched_keyword: classification.matched_keyword,
            required_fields: classification.required_fields,
            auto_populated: classification.auto_populated,
            created_at,
        }
    }
}

/// Identifier-safe rendering of a customer name for ticket ids.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Accepts tickets for submission.
#[async_trait]
pub trait TicketSink: Send + Sync {
    /// Submit a ticket, returning its id.
    async fn create(&self, ticket: &Ticket) -> Result<String>;
}

/// Writes each ticket as a pretty-printed JSON file under the configured
/// output directory.
pub struct FileTicketSink {
    output_dir: PathBuf,
}

impl FileTicketSink {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl TicketSink for FileTicketSink {
    async fn create(&self, ticket: &Ticket) -> Result<String> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create ticket directory: {}",
                    self.output_dir.display()
                )
            })?;
        let path = self.output_dir.join(format!("{}.json", ticket.id));
        let json =
            serde_json::to_string_pretty(ticket).context("Failed to serialize ticket")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write ticket file: {}", path.display()))?;
        info!(ticket = %ticket.id, path = %path.display(), "ticket created");
        Ok(ticket.id.clone())
    }
}
