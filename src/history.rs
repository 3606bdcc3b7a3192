//! Bounded, most-recent-first history of verdicts for a session.

use crate::evaluator::{RiskTier, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Number of verdicts kept per session
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Summary of the verdicts currently held
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: usize,
    pub legitimate: usize,
    pub low_risk: usize,
    pub medium_risk: usize,
    pub high_risk: usize,
    pub average_score: f64,
}

/// Session history of verdicts, newest first
#[derive(Debug, Clone)]
pub struct EvaluationHistory {
    entries: VecDeque<Verdict>,
    capacity: usize,
}

impl EvaluationHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a history holding at most `capacity` verdicts (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a verdict as the most recent entry, returning the evicted oldest
    /// entry once capacity is exceeded
    pub fn append(&mut self, verdict: Verdict) -> Option<Verdict> {
        self.entries.push_front(verdict);
        if self.entries.len() > self.capacity {
            let evicted = self.entries.pop_back();
            if let Some(ref old) = evicted {
                trace!(transaction_id = %old.transaction_id, "verdict evicted from history");
            }
            evicted
        } else {
            None
        }
    }

    /// Up to `limit` verdicts, newest first
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &Verdict> {
        self.entries.iter().take(limit)
    }

    pub fn latest(&self) -> Option<&Verdict> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        let mut stats = HistoryStats {
            total: self.entries.len(),
            ..Default::default()
        };

        for verdict in &self.entries {
            match verdict.tier {
                RiskTier::Legitimate => stats.legitimate += 1,
                RiskTier::LowRisk => stats.low_risk += 1,
                RiskTier::MediumRisk => stats.medium_risk += 1,
                RiskTier::HighRisk => stats.high_risk += 1,
            }
        }

        if stats.total > 0 {
            let sum: u32 = self.entries.iter().map(|v| u32::from(v.score)).sum();
            stats.average_score = f64::from(sum) / stats.total as f64;
        }

        stats
    }
}

impl Default for EvaluationHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// History shared between threads; appends are serialized by a mutex so
/// insertion order is preserved
#[derive(Debug, Clone, Default)]
pub struct SharedHistory {
    inner: Arc<Mutex<EvaluationHistory>>,
}

impl SharedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EvaluationHistory::with_capacity(capacity))),
        }
    }

    pub fn append(&self, verdict: Verdict) -> Option<Verdict> {
        self.lock().append(verdict)
    }

    /// Snapshot of up to `limit` verdicts, newest first
    pub fn recent(&self, limit: usize) -> Vec<Verdict> {
        self.lock().recent(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> HistoryStats {
        self.lock().stats()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic mid-append cannot leave the deque half-updated
    fn lock(&self) -> MutexGuard<'_, EvaluationHistory> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
