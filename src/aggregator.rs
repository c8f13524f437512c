//! Debounce state machine.
//!
//! `Idle -> Accumulating -> Flushing -> Idle`. Every poll folds the cycle's
//! observations into the pending change-set; a non-empty observation resets
//! the quiet timer. Once the tree has been quiet for the cooldown the
//! aggregator reports [`Poll::Ready`] and waits in `Flushing` until the
//! caller resolves the flush with [`Aggregator::complete`] or
//! [`Aggregator::defer`].

use crate::changeset::{ChangeCounts, ChangeSet};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Idle,
    Accumulating,
    Flushing,
}

/// Result of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Nothing pending
    Idle,
    /// Changes pending, tree not quiet yet
    Waiting {
        remaining: Duration,
        counts: ChangeCounts,
    },
    /// Quiet for the cooldown; pending changes should be flushed
    Ready,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    cooldown: ChronoDuration,
    pending: ChangeSet,
    last_change: Option<DateTime<Utc>>,
    state: AggregatorState,
}

impl Aggregator {
    pub fn new(cooldown: Duration) -> Self {
        Self::restore(cooldown, ChangeSet::new(), None)
    }

    /// Resume with previously persisted pending changes.
    pub fn restore(
        cooldown: Duration,
        pending: ChangeSet,
        last_change: Option<DateTime<Utc>>,
    ) -> Self {
        let state = if pending.is_empty() {
            AggregatorState::Idle
        } else {
            AggregatorState::Accumulating
        };
        Self {
            cooldown: ChronoDuration::from_std(cooldown).unwrap_or(ChronoDuration::MAX),
            pending,
            last_change,
            state,
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn pending(&self) -> &ChangeSet {
        &self.pending
    }

    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        self.last_change
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown.to_std().unwrap_or_default()
    }

    /// Fold this cycle's changes in and decide whether the pending set is stable.
    pub fn observe(&mut self, changes: &ChangeSet, now: DateTime<Utc>) -> Poll {
        if !changes.is_empty() {
            self.pending.merge(changes);
            self.last_change = Some(now);
        }

        if self.pending.is_empty() {
            self.state = AggregatorState::Idle;
            self.last_change = None;
            return Poll::Idle;
        }

        let last_change = *self.last_change.get_or_insert(now);
        let elapsed = now.signed_duration_since(last_change);
        if elapsed < self.cooldown {
            self.state = AggregatorState::Accumulating;
            return Poll::Waiting {
                remaining: (self.cooldown - elapsed).to_std().unwrap_or_default(),
                counts: self.pending.counts(),
            };
        }

        self.state = AggregatorState::Flushing;
        Poll::Ready
    }

    /// Flush did not happen (freeze window or persistence failure).
    /// Pending changes and the quiet timer are kept as they were.
    pub fn defer(&mut self) {
        if !self.pending.is_empty() {
            self.state = AggregatorState::Accumulating;
        }
    }

    /// Flush succeeded: hand back the released changes and return to idle.
    pub fn complete(&mut self) -> ChangeSet {
        self.state = AggregatorState::Idle;
        self.last_change = None;
        std::mem::take(&mut self.pending)
    }
}
