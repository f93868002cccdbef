//! Feedback-driven continuous learning.
//!
//! The engine appends feedback to the store and re-derives an aggregate
//! [`LearningState`] on demand. Each recomputation that sees feedback not
//! yet processed nudges the shared adaptive threshold by one step:
//! improving satisfaction tightens it, declining satisfaction loosens it,
//! and a stable trend still moves when the overall positive ratio sits at
//! a high or low water mark. Recomputing with no new feedback never moves
//! the threshold, so status queries are idempotent.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::LearningConfig;
use crate::feedback_store::FeedbackStore;
use crate::models::{FeedbackKind, FeedbackRecord, LearningState, Trend};
use crate::policy::AdaptiveThreshold;

pub struct ContinuousLearningEngine {
    store: Arc<dyn FeedbackStore>,
    threshold: Arc<AdaptiveThreshold>,
    config: LearningConfig,
    /// Number of records already reflected in the threshold.
    processed: Mutex<usize>,
}

impl ContinuousLearningEngine {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        threshold: Arc<AdaptiveThreshold>,
        config: LearningConfig,
    ) -> Self {
        Self {
            store,
            threshold,
            config,
            processed: Mutex::new(0),
        }
    }

    /// Record one feedback event.
    ///
    /// A store failure is logged and swallowed: feedback is advisory and
    /// must never fail the caller's response path.
    pub async fn record(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        response_content: &str,
        response_category: &str,
        kind: FeedbackKind,
    ) -> FeedbackRecord {
        let record = FeedbackRecord::new(
            user_id,
            session_id,
            response_content,
            response_category,
            kind,
        );
        if let Err(err) = self.store.append(&record).await {
            warn!(error = %err, "failed to persist feedback record, dropping");
        } else {
            debug!(kind = kind.as_str(), user = user_id, "feedback recorded");
        }
        record
    }

    /// Recompute the learning state and, when unprocessed feedback exists,
    /// apply one threshold nudge.
    pub async fn status(&self) -> Result<LearningState> {
        let records = self.store.all().await?;
        if records.is_empty() {
            return Ok(LearningState::neutral(self.threshold.load()));
        }

        let total = records.len();
        let positive = count(&records, FeedbackKind::Positive);
        let negative = count(&records, FeedbackKind::Negative);
        let excellent = count(&records, FeedbackKind::Excellent);
        let needs_improvement = count(&records, FeedbackKind::NeedsImprovement);
        let positive_ratio = positive_ratio(&records);
        let trend = self.trend(&records);
        let confidence = 1.0 - 1.0 / (1.0 + total as f64);

        let current_threshold = {
            let mut processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
            if total > *processed {
                *processed = total;
                self.nudge(trend, positive_ratio)
            } else {
                self.threshold.load()
            }
        };

        Ok(LearningState {
            total_feedback: total,
            positive,
            negative,
            excellent,
            needs_improvement,
            positive_ratio,
            trend,
            confidence,
            current_threshold,
        })
    }

    /// Learning state scoped to one user's feedback.
    ///
    /// Read-only: a per-user view never moves the shared threshold.
    pub async fn status_for(&self, user_id: &str) -> Result<LearningState> {
        let records: Vec<FeedbackRecord> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect();
        if records.is_empty() {
            return Ok(LearningState::neutral(self.threshold.load()));
        }

        let total = records.len();
        Ok(LearningState {
            total_feedback: total,
            positive: count(&records, FeedbackKind::Positive),
            negative: count(&records, FeedbackKind::Negative),
            excellent: count(&records, FeedbackKind::Excellent),
            needs_improvement: count(&records, FeedbackKind::NeedsImprovement),
            positive_ratio: positive_ratio(&records),
            trend: self.trend(&records),
            confidence: 1.0 - 1.0 / (1.0 + total as f64),
            current_threshold: self.threshold.load(),
        })
    }

    /// Recent window vs the window before it, compared by positive ratio.
    ///
    /// Fewer than two full windows of history is not enough to call a
    /// direction; sparse feedback reads as stable.
    fn trend(&self, records: &[FeedbackRecord]) -> Trend {
        let window = self.config.trend_window;
        if records.len() < 2 * window {
            return Trend::Stable;
        }
        let tail = &records[records.len() - 2 * window..];
        let (earlier, recent) = tail.split_at(window);

        let delta = positive_ratio(recent) - positive_ratio(earlier);
        if delta >= self.config.trend_margin {
            Trend::Improving
        } else if delta <= -self.config.trend_margin {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    fn nudge(&self, trend: Trend, positive_ratio: f64) -> f64 {
        let step = self.config.threshold_step;
        let delta = match trend {
            Trend::Improving => step,
            Trend::Declining => -step,
            Trend::Stable if positive_ratio >= self.config.high_water_ratio => step,
            Trend::Stable if positive_ratio <= self.config.low_water_ratio => -step,
            Trend::Stable => 0.0,
        };
        if delta == 0.0 {
            return self.threshold.load();
        }
        let updated = self.threshold.store(self.threshold.load() + delta);
        info!(
            trend = ?trend,
            positive_ratio,
            threshold = updated,
            "adaptive threshold updated"
        );
        updated
    }
}

fn count(records: &[FeedbackRecord], kind: FeedbackKind) -> usize {
    records.iter().filter(|r| r.kind == kind).count()
}

fn positive_ratio(records: &[FeedbackRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let positive = records.iter().filter(|r| r.kind.is_positive()).count();
    positive as f64 / records.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback_store::MemoryFeedbackStore;
    use crate::policy::ThresholdBounds;

    fn engine(threshold: f64) -> ContinuousLearningEngine {
        ContinuousLearningEngine::new(
            Arc::new(MemoryFeedbackStore::new()),
            AdaptiveThreshold::new(threshold, ThresholdBounds::default()),
            LearningConfig::default(),
        )
    }

    async fn feed(engine: &ContinuousLearningEngine, kinds: &[FeedbackKind]) {
        for kind in kinds {
            engine
                .record("alice@amd.com", Some("s-1"), "answer", "MNHT", *kind)
                .await;
        }
    }

    #[tokio::test]
    async fn test_neutral_state_before_feedback() {
        let state = engine(0.75).status().await.unwrap();
        assert_eq!(state, LearningState::neutral(0.75));
    }

    #[tokio::test]
    async fn test_counts_and_ratio() {
        let engine = engine(0.75);
        feed(
            &engine,
            &[
                FeedbackKind::Positive,
                FeedbackKind::Excellent,
                FeedbackKind::Negative,
                FeedbackKind::NeedsImprovement,
            ],
        )
        .await;

        let state = engine.status().await.unwrap();
        assert_eq!(state.total_feedback, 4);
        assert_eq!(state.positive, 1);
        assert_eq!(state.excellent, 1);
        assert_eq!(state.negative, 1);
        assert_eq!(state.needs_improvement, 1);
        assert!((state.positive_ratio - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_improving_trend_tightens_threshold() {
        // Two full windows: a negative one followed by a positive one.
        let engine = engine(0.75);
        feed(&engine, &[FeedbackKind::Negative; 10]).await;
        feed(&engine, &[FeedbackKind::Positive; 10]).await;

        let state = engine.status().await.unwrap();
        assert_eq!(state.trend, Trend::Improving);
        assert!((state.current_threshold - 0.76).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_declining_trend_loosens_threshold() {
        let engine = engine(0.75);
        feed(&engine, &[FeedbackKind::Positive; 10]).await;
        feed(&engine, &[FeedbackKind::Negative; 10]).await;

        let state = engine.status().await.unwrap();
        assert_eq!(state.trend, Trend::Declining);
        assert!((state.current_threshold - 0.74).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sparse_feedback_reads_as_stable() {
        // One negative then one positive is far short of two windows; the
        // swing must not be classified as a trend or move the threshold.
        let engine = engine(0.75);
        feed(&engine, &[FeedbackKind::Negative, FeedbackKind::Positive]).await;

        let state = engine.status().await.unwrap();
        assert_eq!(state.trend, Trend::Stable);
        assert_eq!(state.current_threshold, 0.75);
    }

    #[tokio::test]
    async fn test_all_positive_feedback_raises_threshold() {
        // Uniformly positive feedback reads as stable at a high water mark,
        // so the threshold still tightens.
        let engine = engine(0.75);
        feed(&engine, &[FeedbackKind::Positive; 6]).await;

        let state = engine.status().await.unwrap();
        assert_eq!(state.trend, Trend::Stable);
        assert!(state.current_threshold > 0.75);
    }

    #[tokio::test]
    async fn test_status_idempotent_without_new_feedback() {
        let engine = engine(0.75);
        feed(&engine, &[FeedbackKind::Positive; 4]).await;

        let first = engine.status().await.unwrap();
        let second = engine.status().await.unwrap();
        assert_eq!(first.current_threshold, second.current_threshold);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_threshold_clamped_at_ceiling() {
        let engine = engine(0.9);
        feed(&engine, &[FeedbackKind::Excellent; 4]).await;

        let state = engine.status().await.unwrap();
        assert_eq!(state.current_threshold, 0.9);
    }

    #[tokio::test]
    async fn test_mixed_feedback_in_dead_zone_leaves_threshold() {
        let engine = engine(0.75);
        feed(
            &engine,
            &[
                FeedbackKind::Positive,
                FeedbackKind::Negative,
                FeedbackKind::Positive,
                FeedbackKind::Negative,
            ],
        )
        .await;

        let state = engine.status().await.unwrap();
        assert_eq!(state.trend, Trend::Stable);
        assert_eq!(state.current_threshold, 0.75);
    }

    #[tokio::test]
    async fn test_per_user_status_is_scoped_and_read_only() {
        let engine = engine(0.75);
        engine
            .record("alice@amd.com", None, "answer", "MNHT", FeedbackKind::Positive)
            .await;
        engine
            .record("bob@novartis.com", None, "answer", "MNLS", FeedbackKind::Negative)
            .await;

        let alice = engine.status_for("alice@amd.com").await.unwrap();
        assert_eq!(alice.total_feedback, 1);
        assert_eq!(alice.positive, 1);
        // The per-user view leaves the threshold untouched.
        assert_eq!(alice.current_threshold, 0.75);

        let nobody = engine.status_for("carol@example.com").await.unwrap();
        assert_eq!(nobody.total_feedback, 0);
    }

    #[tokio::test]
    async fn test_confidence_grows_with_volume() {
        let engine = engine(0.75);
        feed(&engine, &[FeedbackKind::Positive]).await;
        let small = engine.status().await.unwrap().confidence;
        feed(&engine, &[FeedbackKind::Positive; 9]).await;
        let large = engine.status().await.unwrap().confidence;
        assert!(large > small);
        assert!(large < 1.0);
    }
}
