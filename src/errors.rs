//! Error taxonomy for the retrieval pipeline.
//!
//! Connector failures are typed so the orchestrator can fold them into an
//! insufficient result instead of aborting the query. Everything else in
//! the retrieval path degrades to a default (unknown customer → default
//! role, no category rule matched → default category) and is not an error.

use thiserror::Error;

/// Failures a [`SourceConnector`](crate::connector::SourceConnector) can report.
///
/// Both variants are caught at the orchestrator boundary and treated as an
/// empty result; they never propagate to the caller of a query.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Network or auth failure talking to the backing service.
    #[error("connector unavailable: {0}")]
    Unavailable(String),

    /// The request did not complete within the configured deadline.
    #[error("connector timed out after {0}s")]
    Timeout(u64),
}
