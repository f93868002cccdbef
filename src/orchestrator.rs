//! Query resolution pipeline.
//!
//! An explicit state machine walks the fallback chain: resolve the
//! customer, search each knowledge source in priority order, stop at the
//! first source whose ranked results pass the sufficiency policy, and
//! create a ticket when none does. Every run ends in exactly one terminal
//! action: a formatted response or a created ticket.
//!
//! Connector failures and deadline overruns never abort a run. A failed
//! stage is folded into an empty result set (recorded in the stage report)
//! and the chain moves on, so a source outage degrades to the next source
//! or to a ticket instead of an error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::TicketCategoryClassifier;
use crate::collab::{ResponseFormatter, Ticket, TicketSink};
use crate::connector::{SearchScope, SourceConnector};
use crate::models::{Query, SourceType, SufficiencyDecision};
use crate::policy::SufficiencyPolicy;
use crate::profile::CustomerProfileResolver;
use crate::search::SemanticSearchEngine;

/// What one search stage did and decided.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub connector: String,
    pub scope: String,
    pub fetched: usize,
    pub ranked: usize,
    pub sufficient: bool,
    pub threshold: f64,
    pub top_score: f32,
    /// Transport or ranking failure folded into an empty result set.
    pub error: Option<String>,
}

/// Terminal action of a pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Answered {
        response: String,
        source: String,
    },
    TicketCreated {
        ticket_id: String,
        category: String,
        /// Fields the customer must still provide: name → description.
        required_fields: std::collections::BTreeMap<String, String>,
    },
}

/// Full account of one query resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub outcome: Outcome,
    pub stages: Vec<StageReport>,
    /// States visited, in order.
    pub trail: Vec<String>,
}

pub struct RetrievalOrchestrator {
    resolver: Arc<dyn CustomerProfileResolver>,
    connectors: Vec<Arc<dyn SourceConnector>>,
    search: SemanticSearchEngine,
    policy: SufficiencyPolicy,
    classifier: TicketCategoryClassifier,
    formatter: Box<dyn ResponseFormatter>,
    ticket_sink: Arc<dyn TicketSink>,
    fetch_limit: usize,
    connector_timeout: Duration,
}

impl RetrievalOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Arc<dyn CustomerProfileResolver>,
        connectors: Vec<Arc<dyn SourceConnector>>,
        search: SemanticSearchEngine,
        policy: SufficiencyPolicy,
        classifier: TicketCategoryClassifier,
        formatter: Box<dyn ResponseFormatter>,
        ticket_sink: Arc<dyn TicketSink>,
        fetch_limit: usize,
        connector_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            connectors,
            search,
            policy,
            classifier,
            formatter,
            ticket_sink,
            fetch_limit,
            connector_timeout,
        }
    }

    /// Resolve one query end to end.
    pub async fn resolve(
        &self,
        text: &str,
        customer_email: &str,
        session_id: &str,
    ) -> Result<ResolutionReport> {
        let mut trail = vec!["start".to_string()];
        let mut stages = Vec::new();

        let profile = self.resolver.resolve(customer_email).await;
        let query = Query {
            text: text.to_string(),
            customer_email: customer_email.to_string(),
            organization: profile.organization.clone(),
            role: profile.role.clone(),
            session_id: session_id.to_string(),
        };
        info!(
            session = %query.session_id,
            organization = %query.organization,
            role = %query.role,
            "resolving query"
        );

        for connector in &self.connectors {
            trail.push(format!("search_{}", connector.name()));
            let (results, report) = self.run_stage(connector.as_ref(), &query).await;
            let sufficient = report.sufficient;
            stages.push(report);

            if sufficient {
                trail.push("format_response".to_string());
                let response = self.formatter.format(&query, &results);
                let source = connector.source_type().to_string();
                trail.push("end".to_string());
                return Ok(ResolutionReport {
                    outcome: Outcome::Answered { response, source },
                    stages,
                    trail,
                });
            }
        }

        trail.push("create_ticket".to_string());
        let classification = self.classifier.classify(&query, &profile);
        let required_fields = classification.required_fields.clone();
        let category = classification.category.to_string();
        let ticket = Ticket::new(&query, classification);
        let ticket_id = self.ticket_sink.create(&ticket).await?;
        info!(ticket = %ticket_id, category = %category, "query escalated to ticket");

        trail.push("end".to_string());
        Ok(ResolutionReport {
            outcome: Outcome::TicketCreated {
                ticket_id,
                category,
                required_fields,
            },
            stages,
            trail,
        })
    }

    async fn run_stage(
        &self,
        connector: &dyn SourceConnector,
        query: &Query,
    ) -> (Vec<crate::models::SearchResult>, StageReport) {
        let scope = match connector.source_type() {
            SourceType::Jira => SearchScope::Organization(query.organization.clone()),
            SourceType::MindTouch => SearchScope::Role(query.role.clone()),
        };

        let mut error = None;
        let documents = match tokio::time::timeout(
            self.connector_timeout,
            connector.search(&query.text, &scope, self.fetch_limit),
        )
        .await
        {
            Ok(Ok(documents)) => documents,
            Ok(Err(err)) => {
                warn!(connector = connector.name(), error = %err, "connector failed, treating as no results");
                error = Some(err.to_string());
                Vec::new()
            }
            Err(_) => {
                warn!(
                    connector = connector.name(),
                    "connector deadline exceeded, treating as no results"
                );
                error = Some(format!(
                    "deadline of {}s exceeded",
                    self.connector_timeout.as_secs()
                ));
                Vec::new()
            }
        };
        let fetched = documents.len();

        let results = match self.search.rank(&query.text, &documents).await {
            Ok(results) => results,
            Err(err) => {
                warn!(connector = connector.name(), error = %err, "ranking failed, treating as no results");
                error = Some(err.to_string());
                Vec::new()
            }
        };

        let decision: SufficiencyDecision = self.policy.decide(&results);
        let report = StageReport {
            connector: connector.name().to_string(),
            scope: scope.label(),
            fetched,
            ranked: results.len(),
            sufficient: decision.sufficient,
            threshold: decision.threshold,
            top_score: decision.top_score,
            error,
        };
        (results, report)
    }
}
