//! Knowledge source connector abstraction.
//!
//! A [`SourceConnector`] fetches candidate documents for a query, scoped to
//! the customer making it. Scoping is a privacy boundary, not an
//! optimization: a connector must never return another organization's
//! documents, and an empty scope yields an empty (but cleanly scoped)
//! result set rather than an unscoped search.
//!
//! Built-in connectors ([`JiraConnector`](crate::connector_jira::JiraConnector),
//! [`MindTouchConnector`](crate::connector_mindtouch::MindTouchConnector))
//! talk to their REST APIs; tests implement the trait directly with
//! scripted responses.

use async_trait::async_trait;

use crate::errors::ConnectorError;
use crate::models::{Document, SourceType};

/// Access scope applied to a connector search.
///
/// JIRA filters by the customer's organization; MindTouch filters by the
/// customer's resolved documentation role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    Organization(String),
    Role(String),
}

impl SearchScope {
    /// The scope label used in logs and stage reports.
    pub fn label(&self) -> String {
        match self {
            SearchScope::Organization(org) => format!("org:{}", org),
            SearchScope::Role(role) => format!("role:{}", role),
        }
    }
}

/// A knowledge source that produces candidate documents for a query.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Returns the connector instance name (e.g. `"jira"`, `"mindtouch"`).
    fn name(&self) -> &str;

    /// Returns which source this connector serves.
    fn source_type(&self) -> SourceType;

    /// Fetch up to `limit` candidate documents for `query_text` within
    /// `scope`.
    ///
    /// A connector handed a scope kind it does not understand returns an
    /// empty set. Zero matches is a valid result, not an error; errors are
    /// reserved for transport failures.
    async fn search(
        &self,
        query_text: &str,
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Vec<Document>, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_labels() {
        assert_eq!(SearchScope::Organization("AMD".into()).label(), "org:AMD");
        assert_eq!(SearchScope::Role("GoS-HT".into()).label(), "role:GoS-HT");
    }
}
