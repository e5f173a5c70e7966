//! Spin scheduler - time-driven reel animation with a pre-committed winner
//!
//! A `SpinScheduler` lives for exactly one spin. The host calls
//! [`SpinScheduler::tick`] from its frame loop (or sleeps until
//! [`SpinScheduler::next_deadline`]) and renders the display index.
//!
//! # Lifecycle
//!
//! 1. **Running**: the display index advances every interval over all rows.
//!    The accelerate pattern shortens its interval on a warm-up tick.
//! 2. **Decelerating**: `request_stop` picks the winner uniformly from the
//!    pool right away, then plans the slowdown rounds. Each round steps
//!    `steps_per_round` times at its interval.
//! 3. **Settling**: once the interval reaches the threshold the display
//!    snaps to the winner; after the settle delay `Finished` is emitted.
//!
//! Cancelling (directly or through a cloned [`CancelToken`]) ends the spin
//! without a terminal event.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use super::rate_schedule::{
    deceleration_plan, initial_interval, warmup_interval, SpinPattern, SpinTimings,
};
use super::types::RowIndex;

// =============================================================================
// CANCELLATION
// =============================================================================

/// Shared cancellation flag for one spin
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// EVENTS / PHASES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinEvent {
    /// Display moved to this row
    Advanced(RowIndex),
    /// Display snapped onto the winner
    Landed(RowIndex),
    /// Terminal event: the winner, emitted once
    Finished(RowIndex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Running,
    Decelerating,
    Settling,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpinError {
    #[error("cannot spin over an empty pool")]
    EmptyPool,
    #[error("cannot spin over a table without rows")]
    NoRows,
}

#[derive(Debug)]
enum Stage {
    Running {
        next_warmup_at: Option<Instant>,
    },
    Decelerating {
        winner: RowIndex,
        plan: VecDeque<Duration>,
        round_ends_at: Instant,
    },
    Settling {
        winner: RowIndex,
        fires_at: Instant,
    },
    Finished,
    Cancelled,
}

// =============================================================================
// SCHEDULER
// =============================================================================

#[derive(Debug)]
pub struct SpinScheduler {
    pattern: SpinPattern,
    timings: SpinTimings,
    pool: Vec<RowIndex>,
    row_count: usize,
    display_index: RowIndex,
    interval: Duration,
    next_step_at: Instant,
    stage: Stage,
    cancel: CancelToken,
}

impl SpinScheduler {
    /// Start spinning at `now`.
    ///
    /// `pool` holds the rows the winner may be drawn from; `row_count` is the
    /// size of the whole table, which the display cycles over.
    pub fn start(
        pool: Vec<RowIndex>,
        row_count: usize,
        pattern: SpinPattern,
        timings: SpinTimings,
        now: Instant,
    ) -> Result<Self, SpinError> {
        if row_count == 0 {
            return Err(SpinError::NoRows);
        }
        if pool.is_empty() {
            return Err(SpinError::EmptyPool);
        }

        let interval = initial_interval(pattern, &timings);
        let next_warmup_at =
            warmup_interval(pattern, interval, &timings).map(|_| now + timings.warmup_tick());

        debug!(
            pattern = ?pattern,
            pool = pool.len(),
            rows = row_count,
            interval_ms = interval.as_millis() as u64,
            "[SPIN] Started"
        );

        Ok(Self {
            pattern,
            timings,
            pool,
            row_count,
            display_index: 0,
            interval,
            next_step_at: now + interval,
            stage: Stage::Running { next_warmup_at },
            cancel: CancelToken::new(),
        })
    }

    /// Continue from where the previous spin left the reel
    pub fn with_display_index(mut self, index: RowIndex) -> Self {
        self.display_index = index % self.row_count;
        self
    }

    pub fn pattern(&self) -> SpinPattern {
        self.pattern
    }

    pub fn display_index(&self) -> RowIndex {
        self.display_index
    }

    /// Current step interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn pool(&self) -> &[RowIndex] {
        &self.pool
    }

    pub fn phase(&self) -> SchedulerPhase {
        match self.stage {
            Stage::Running { .. } => SchedulerPhase::Running,
            Stage::Decelerating { .. } => SchedulerPhase::Decelerating,
            Stage::Settling { .. } => SchedulerPhase::Settling,
            Stage::Finished => SchedulerPhase::Finished,
            Stage::Cancelled => SchedulerPhase::Cancelled,
        }
    }

    /// True once a stop was accepted (the winner is committed)
    pub fn is_stopping(&self) -> bool {
        matches!(
            self.stage,
            Stage::Decelerating { .. } | Stage::Settling { .. }
        )
    }

    pub fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Finished | Stage::Cancelled)
    }

    /// Token the host can keep to cancel this spin from elsewhere
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancel the spin; no terminal event will be emitted
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.is_done() {
            debug!("[SPIN] Cancelled");
            self.stage = Stage::Cancelled;
        }
    }

    /// Commit the winner and begin slowing down.
    ///
    /// Returns false when the spin is already stopping or over; only the
    /// first accepted request picks a winner.
    pub fn request_stop<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) -> bool {
        if self.cancel.is_cancelled() || !matches!(self.stage, Stage::Running { .. }) {
            return false;
        }
        let Some(&winner) = self.pool.choose(rng) else {
            return false;
        };
        let plan = deceleration_plan(self.pattern, self.interval, &self.timings, rng);
        debug!(rounds = plan.len(), "[SPIN] Stop requested, winner committed");

        // The first round starts on the next tick
        self.stage = Stage::Decelerating {
            winner,
            plan,
            round_ends_at: now,
        };
        true
    }

    /// Next instant at which `tick` has something to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.stage {
            Stage::Running { next_warmup_at } => Some(
                next_warmup_at.map_or(self.next_step_at, |w| w.min(self.next_step_at)),
            ),
            Stage::Decelerating { round_ends_at, .. } => {
                Some((*round_ends_at).min(self.next_step_at))
            }
            Stage::Settling { fires_at, .. } => Some(*fires_at),
            Stage::Finished | Stage::Cancelled => None,
        }
    }

    /// Process everything due up to `now`, in time order
    pub fn tick(&mut self, now: Instant) -> Vec<SpinEvent> {
        let mut events = Vec::new();
        if self.cancel.is_cancelled() {
            self.cancel();
            return events;
        }

        loop {
            match &mut self.stage {
                Stage::Running { next_warmup_at } => {
                    match *next_warmup_at {
                        Some(at) if at <= self.next_step_at && at <= now => {
                            // Warm-up tick: shorten the interval and restart stepping
                            match warmup_interval(self.pattern, self.interval, &self.timings) {
                                Some(next) => {
                                    self.interval = next;
                                    self.next_step_at = at + next;
                                    *next_warmup_at = Some(at + self.timings.warmup_tick());
                                }
                                None => *next_warmup_at = None,
                            }
                        }
                        _ if self.next_step_at <= now => self.step(&mut events),
                        _ => break,
                    }
                }
                Stage::Decelerating {
                    winner,
                    plan,
                    round_ends_at,
                } => {
                    let round_end = *round_ends_at;
                    if round_end <= self.next_step_at && round_end <= now {
                        match plan.pop_front() {
                            Some(interval) => {
                                self.interval = interval;
                                self.next_step_at = round_end + interval;
                                *round_ends_at = round_end + self.timings.round_length(interval);
                            }
                            None => {
                                let winner = *winner;
                                self.display_index = winner;
                                events.push(SpinEvent::Landed(winner));
                                self.stage = Stage::Settling {
                                    winner,
                                    fires_at: round_end + self.timings.settle(),
                                };
                            }
                        }
                    } else if self.next_step_at <= now {
                        self.step(&mut events);
                    } else {
                        break;
                    }
                }
                Stage::Settling { winner, fires_at } => {
                    if *fires_at <= now {
                        let winner = *winner;
                        debug!(winner, "[SPIN] Finished");
                        events.push(SpinEvent::Finished(winner));
                        self.stage = Stage::Finished;
                    }
                    break;
                }
                Stage::Finished | Stage::Cancelled => break,
            }
        }
        events
    }

    fn step(&mut self, events: &mut Vec<SpinEvent>) {
        self.display_index = (self.display_index + 1) % self.row_count;
        self.next_step_at += self.interval;
        events.push(SpinEvent::Advanced(self.display_index));
    }
}

// =============================================================================
// TESTS
// =============================================================================
