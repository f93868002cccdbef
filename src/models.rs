//! Core data models used throughout querydesk.
//!
//! These types represent the queries, documents, and decisions that flow
//! through the retrieval pipeline, plus the feedback records consumed by
//! the learning engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A customer query, immutable once issued.
#[derive(Debug, Clone)]
pub struct Query {
    /// Raw query text as typed by the customer.
    pub text: String,
    /// Customer email address.
    pub customer_email: String,
    /// Resolved organization (may be empty for unknown customers).
    pub organization: String,
    /// Resolved documentation role (e.g. `"GoS-HT"`, `"customer"`).
    pub role: String,
    /// Conversation/session identifier.
    pub session_id: String,
}

/// Knowledge source a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Jira,
    MindTouch,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Jira => write!(f, "JIRA"),
            SourceType::MindTouch => write!(f, "MindTouch"),
        }
    }
}

/// A candidate document fetched from a connector.
///
/// Documents live only for the duration of one query cycle; nothing is
/// cached across queries.
#[derive(Debug, Clone)]
pub struct Document {
    /// Identifier within the source (JIRA issue key, MindTouch page id).
    pub source_id: String,
    pub title: String,
    pub body: String,
    /// Resolution steps extracted from the source, when available.
    pub resolution: Option<String>,
    pub source_type: SourceType,
    pub fetched_at: DateTime<Utc>,
}

impl Document {
    pub fn new(source_id: &str, title: &str, body: &str, source_type: SourceType) -> Self {
        Self {
            source_id: source_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            resolution: None,
            source_type,
            fetched_at: Utc::now(),
        }
    }
}

/// A ranked match returned by the semantic search engine.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    /// Cosine similarity clamped to `[0.0, 1.0]`.
    pub score: f32,
    /// Position in the ranked list (0 = best).
    pub rank: usize,
}

/// Outcome of the sufficiency check for one retrieval stage.
///
/// Consumed once by the orchestrator; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SufficiencyDecision {
    pub sufficient: bool,
    /// The adaptive threshold that was in force at decision time.
    pub threshold: f64,
    /// Best similarity score observed, 0.0 when no results.
    pub top_score: f32,
}

/// User feedback classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Positive,
    Negative,
    Excellent,
    NeedsImprovement,
}

impl FeedbackKind {
    /// Whether this kind counts toward the positive ratio.
    pub fn is_positive(&self) -> bool {
        matches!(self, FeedbackKind::Positive | FeedbackKind::Excellent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Positive => "positive",
            FeedbackKind::Negative => "negative",
            FeedbackKind::Excellent => "excellent",
            FeedbackKind::NeedsImprovement => "needs_improvement",
        }
    }
}

impl std::str::FromStr for FeedbackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(FeedbackKind::Positive),
            "negative" => Ok(FeedbackKind::Negative),
            "excellent" => Ok(FeedbackKind::Excellent),
            "needs_improvement" | "needs-improvement" => Ok(FeedbackKind::NeedsImprovement),
            other => Err(format!("unknown feedback kind: {}", other)),
        }
    }
}

/// One append-only feedback event tied to a delivered response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    /// Fingerprint over the (truncated) response content and its category.
    pub response_fingerprint: String,
    pub kind: FeedbackKind,
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        user_id: &str,
        session_id: Option<&str>,
        response_content: &str,
        response_category: &str,
        kind: FeedbackKind,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.map(|s| s.to_string()),
            response_fingerprint: response_fingerprint(response_content, response_category),
            kind,
            recorded_at: Utc::now(),
        }
    }
}

/// Fingerprint a delivered response for feedback correlation.
///
/// Content is truncated to 500 chars before hashing so oversized responses
/// hash consistently with what the feedback path stored.
pub fn response_fingerprint(content: &str, category: &str) -> String {
    let truncated: String = content.chars().take(500).collect();
    let mut hasher = Sha256::new();
    hasher.update(truncated.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(category.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Satisfaction trend over the configured window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// Derived aggregate over feedback records.
///
/// Always re-derivable from the feedback store; never a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningState {
    pub total_feedback: usize,
    pub positive: usize,
    pub negative: usize,
    pub excellent: usize,
    pub needs_improvement: usize,
    /// `(positive + excellent) / total`, 0.0 when no feedback exists.
    pub positive_ratio: f64,
    pub trend: Trend,
    /// Grows toward 1.0 with feedback volume, never reaches it.
    pub confidence: f64,
    /// Adaptive similarity threshold currently in force.
    pub current_threshold: f64,
}

impl LearningState {
    /// Neutral state returned before any feedback exists.
    pub fn neutral(threshold: f64) -> Self {
        Self {
            total_feedback: 0,
            positive: 0,
            negative: 0,
            excellent: 0,
            needs_improvement: 0,
            positive_ratio: 0.0,
            trend: Trend::Stable,
            confidence: 0.0,
            current_threshold: threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_stable() {
        let a = response_fingerprint("here is your answer", "MNHT");
        let b = response_fingerprint("here is your answer", "MNHT");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_fingerprint_category_sensitive() {
        let a = response_fingerprint("same content", "NOC");
        let b = response_fingerprint("same content", "COPS");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_truncates_long_content() {
        let long_a = format!("{}{}", "x".repeat(500), "tail one");
        let long_b = format!("{}{}", "x".repeat(500), "tail two");
        assert_eq!(
            response_fingerprint(&long_a, "MNHT"),
            response_fingerprint(&long_b, "MNHT")
        );
    }

    #[test]
    fn test_feedback_kind_roundtrip() {
        for kind in [
            FeedbackKind::Positive,
            FeedbackKind::Negative,
            FeedbackKind::Excellent,
            FeedbackKind::NeedsImprovement,
        ] {
            let parsed: FeedbackKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_positive_kinds() {
        assert!(FeedbackKind::Positive.is_positive());
        assert!(FeedbackKind::Excellent.is_positive());
        assert!(!FeedbackKind::Negative.is_positive());
        assert!(!FeedbackKind::NeedsImprovement.is_positive());
    }
}
