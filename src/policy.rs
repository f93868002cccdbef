//! Sufficiency policy and the shared adaptive threshold.
//!
//! [`SufficiencyPolicy::decide`] is a pure function of the ranked results
//! and the threshold read at call time. The threshold itself lives in an
//! [`AdaptiveThreshold`] cell shared between concurrent queries and the
//! learning engine: readers take a read lock, the learning engine is the
//! only writer, and the cell clamps every store to its hard bounds so no
//! reader can ever observe an out-of-range or half-updated value.

use std::sync::{Arc, RwLock};

use crate::models::{SearchResult, SufficiencyDecision};

/// Hard floor/ceiling for the adaptive threshold.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl ThresholdBounds {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.floor, self.ceiling)
    }
}

impl Default for ThresholdBounds {
    fn default() -> Self {
        Self {
            floor: 0.5,
            ceiling: 0.9,
        }
    }
}

/// Process-wide similarity threshold, tuned by the learning engine.
#[derive(Debug)]
pub struct AdaptiveThreshold {
    value: RwLock<f64>,
    bounds: ThresholdBounds,
}

impl AdaptiveThreshold {
    /// The initial value is clamped into bounds up front.
    pub fn new(initial: f64, bounds: ThresholdBounds) -> Arc<Self> {
        Arc::new(Self {
            value: RwLock::new(bounds.clamp(initial)),
            bounds,
        })
    }

    pub fn load(&self) -> f64 {
        *self.value.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the threshold, clamped to the hard bounds.
    ///
    /// Only the learning engine calls this.
    pub fn store(&self, value: f64) -> f64 {
        let clamped = self.bounds.clamp(value);
        *self.value.write().unwrap_or_else(|e| e.into_inner()) = clamped;
        clamped
    }

    pub fn bounds(&self) -> ThresholdBounds {
        self.bounds
    }
}

/// Decides whether a ranked result set answers the query.
pub struct SufficiencyPolicy {
    threshold: Arc<AdaptiveThreshold>,
}

impl SufficiencyPolicy {
    pub fn new(threshold: Arc<AdaptiveThreshold>) -> Self {
        Self { threshold }
    }

    /// Sufficient iff results are non-empty and the top score meets the
    /// adaptive threshold in force right now.
    pub fn decide(&self, results: &[SearchResult]) -> SufficiencyDecision {
        let threshold = self.threshold.load();
        let top_score = results.first().map(|r| r.score).unwrap_or(0.0);
        SufficiencyDecision {
            sufficient: !results.is_empty() && f64::from(top_score) >= threshold,
            threshold,
            top_score,
        }
    }
}
