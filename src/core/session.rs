//! Draw session - orchestrates the draw state machine with the spin scheduler
//!
//! `DrawSession` owns everything one interactive draw needs: the loaded
//! roster, the current `DrawState`, the active spin (if any) and the RNG.
//! The host drives it with the interactive operations and calls
//! [`DrawSession::update`] every frame; all timing comes from a `Clock`, so
//! the whole flow is testable without real delays.
//!
//! Every spin carries a token. Loading, resetting, ending and cancelling all
//! move the token forward, so a terminal result that arrives for an older
//! spin is dropped instead of being applied to a different session.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::draw_state::{DrawAction, DrawState, Tally, Transition};
use crate::core::rate_schedule::{PatternChoice, SpinPattern, SpinTimings};
use crate::core::roster::{ReservedSpec, Roster, RosterError};
use crate::core::scheduler::{CancelToken, SchedulerPhase, SpinEvent, SpinScheduler};
use crate::core::traits::Clock;
use crate::core::types::{Candidate, ParticipantTable, Prize, RowIndex};

// =============================================================================
// SETTINGS
// =============================================================================

/// Draw configuration, applied on every load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSettings {
    /// Prize catalog; empty means single-pool mode
    pub prizes: Vec<Prize>,
    /// Forced assignment of one prize to a named participant
    pub reserved: Option<ReservedSpec>,
    pub pattern: PatternChoice,
    pub timings: SpinTimings,
}

// =============================================================================
// SESSION EVENTS
// =============================================================================

/// Events emitted by `DrawSession::update` for rendering and logging
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The reel moved to this row
    DisplayAdvanced(RowIndex),
    /// The reel stopped on this row; the result follows after the settle delay
    Landed(RowIndex),
    /// A candidate now awaits accept or skip
    CandidateChosen {
        candidate: Candidate,
        prize: Option<Prize>,
    },
    /// The spin was cancelled through its token; the draw went back to idle
    SpinCancelled,
}

/// Terminal result of one spin, tagged with the token it was started under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinOutcome {
    pub token: u64,
    pub winner: RowIndex,
    pub prize: Option<Prize>,
}

struct ActiveSpin {
    scheduler: SpinScheduler,
    token: u64,
    prize: Option<Prize>,
}

// =============================================================================
// DRAW SESSION
// =============================================================================

pub struct DrawSession<R: Rng = StdRng> {
    settings: DrawSettings,
    roster: Option<Roster>,
    state: DrawState,
    spin: Option<ActiveSpin>,
    /// Incremented at every draw start and every reset/end/cancel
    token: u64,
    /// Reel position, kept between spins
    display_index: RowIndex,
    rng: R,
}

impl DrawSession<StdRng> {
    /// Create an unloaded session seeded from OS entropy
    pub fn new(settings: DrawSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }
}

impl<R: Rng> DrawSession<R> {
    pub fn with_rng(settings: DrawSettings, rng: R) -> Self {
        Self {
            settings,
            roster: None,
            state: DrawState::new(),
            spin: None,
            token: 0,
            display_index: 0,
            rng,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn settings(&self) -> &DrawSettings {
        &self.settings
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.roster.is_some()
    }

    pub fn display_index(&self) -> RowIndex {
        self.display_index
    }

    /// Rows a random draw can still pick, in table order
    pub fn eligible_rows(&self) -> Vec<RowIndex> {
        self.roster
            .as_ref()
            .map(|roster| self.state.eligible_rows(roster))
            .unwrap_or_default()
    }

    /// Whether `begin_draw(prize)` would start a spin now
    pub fn can_draw(&self, prize: Option<Prize>) -> bool {
        self.spin.is_none()
            && self
                .roster
                .as_ref()
                .is_some_and(|roster| self.state.can_draw(roster, prize))
    }

    /// True once nobody is left to draw (always false when unloaded)
    pub fn is_exhausted(&self) -> bool {
        self.roster
            .as_ref()
            .is_some_and(|roster| self.state.is_exhausted(roster))
    }

    pub fn tally(&self) -> Option<Tally> {
        self.roster.as_ref().map(|roster| self.state.tally(roster))
    }

    /// Token of the spin in flight
    pub fn active_spin_token(&self) -> Option<u64> {
        self.spin.as_ref().map(|spin| spin.token)
    }

    pub fn spin_phase(&self) -> Option<SchedulerPhase> {
        self.spin.as_ref().map(|spin| spin.scheduler.phase())
    }

    pub fn spin_pattern(&self) -> Option<SpinPattern> {
        self.spin.as_ref().map(|spin| spin.scheduler.pattern())
    }

    /// Cancellation handle of the spin in flight
    pub fn spin_cancel_token(&self) -> Option<CancelToken> {
        self.spin.as_ref().map(|spin| spin.scheduler.cancel_token())
    }

    /// True once the spin in flight has committed its winner
    pub fn is_stopping(&self) -> bool {
        self.spin
            .as_ref()
            .is_some_and(|spin| spin.scheduler.is_stopping())
    }

    /// Next instant `update` has work to do, if a spin is running
    pub fn next_deadline(&self) -> Option<std::time::Instant> {
        self.spin
            .as_ref()
            .and_then(|spin| spin.scheduler.next_deadline())
    }

    /// Pattern used for the next spins
    pub fn set_pattern(&mut self, pattern: PatternChoice) {
        debug!(pattern = ?pattern, "[SESSION] Pattern selected");
        self.settings.pattern = pattern;
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Load a new table, discarding the previous session entirely.
    ///
    /// On error the session stays unloaded and every draw operation is a
    /// no-op until a valid table is loaded.
    pub fn reset_session(
        &mut self,
        table: ParticipantTable,
        display_column: &str,
    ) -> Result<(), RosterError> {
        self.discard_spin();
        self.state = DrawState::new();
        self.display_index = 0;
        self.roster = None;

        let roster = Roster::new(
            table,
            display_column,
            &self.settings.prizes,
            self.settings.reserved.as_ref(),
        )?;
        info!(
            rows = roster.row_count(),
            column = display_column,
            prize_mode = roster.is_prize_mode(),
            "[SESSION] Table loaded"
        );
        self.roster = Some(roster);
        Ok(())
    }

    /// Clear all draw results but keep the loaded table
    pub fn reset(&mut self) -> bool {
        self.discard_spin();
        self.display_index = 0;
        match &self.roster {
            Some(roster) => {
                let t = self.state.apply(roster, DrawAction::Reset);
                self.commit(t)
            }
            None => {
                self.state = DrawState::new();
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Interactive operations
    // -------------------------------------------------------------------------

    /// Start a spin, bound to `prize` in prize mode
    pub fn begin_draw<C: Clock>(&mut self, prize: Option<Prize>, clock: &C) -> bool {
        let Some(roster) = &self.roster else {
            debug!("[SESSION] Draw requested without a table");
            return false;
        };
        if self.spin.is_some() {
            return false;
        }

        let t = self.state.apply(roster, DrawAction::BeginDraw { prize });
        if !t.is_applied() {
            self.state = t.state;
            return false;
        }

        let pool = spin_pool(&t.state, roster, prize);
        let pattern = self.settings.pattern.resolve(&mut self.rng);
        let scheduler = match SpinScheduler::start(
            pool,
            roster.row_count(),
            pattern,
            self.settings.timings.clone(),
            clock.now(),
        ) {
            Ok(scheduler) => scheduler.with_display_index(self.display_index),
            Err(e) => {
                warn!(error = %e, "[SESSION] Spin could not start");
                return false;
            }
        };

        self.token += 1;
        info!(
            token = self.token,
            prize = ?prize,
            pattern = ?pattern,
            "[SESSION] Spin started"
        );
        self.state = t.state;
        self.spin = Some(ActiveSpin {
            scheduler,
            token: self.token,
            prize,
        });
        true
    }

    /// Ask the running spin to stop; only the first request commits a winner
    pub fn request_stop<C: Clock>(&mut self, clock: &C) -> bool {
        let Some(spin) = self.spin.as_mut() else {
            return false;
        };
        spin.scheduler.request_stop(&mut self.rng, clock.now())
    }

    /// Advance the active spin to the clock's current time.
    ///
    /// Should be called every frame (or at `next_deadline`). Returns the
    /// events that occurred, in order.
    pub fn update<C: Clock>(&mut self, clock: &C) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let Some(spin) = self.spin.as_mut() else {
            return events;
        };

        let mut outcome = None;
        for event in spin.scheduler.tick(clock.now()) {
            match event {
                SpinEvent::Advanced(index) => {
                    self.display_index = index;
                    events.push(SessionEvent::DisplayAdvanced(index));
                }
                SpinEvent::Landed(index) => {
                    self.display_index = index;
                    events.push(SessionEvent::Landed(index));
                }
                SpinEvent::Finished(winner) => {
                    outcome = Some(SpinOutcome {
                        token: spin.token,
                        winner,
                        prize: spin.prize,
                    });
                }
            }
        }
        let cancelled = spin.scheduler.phase() == SchedulerPhase::Cancelled;

        if let Some(outcome) = outcome {
            self.spin = None;
            if self.complete_spin(outcome) {
                if let Some(candidate) = self.state.pending() {
                    events.push(SessionEvent::CandidateChosen {
                        candidate,
                        prize: self.state.active_prize(),
                    });
                }
            }
        } else if cancelled {
            self.cancel_spin();
            events.push(SessionEvent::SpinCancelled);
        }
        events
    }

    /// Apply a spin's terminal result, unless it belongs to an older spin.
    ///
    /// A spin still running under the same token is retired with it.
    pub(crate) fn complete_spin(&mut self, outcome: SpinOutcome) -> bool {
        if outcome.token != self.token {
            warn!(
                token = outcome.token,
                current = self.token,
                "[SESSION] Dropped late spin result"
            );
            return false;
        }
        let Some(roster) = &self.roster else {
            return false;
        };
        let t = self.state.apply(
            roster,
            DrawAction::CandidateChosen {
                index: outcome.winner,
                prize: outcome.prize,
            },
        );
        if t.is_applied() {
            info!(
                drawn = outcome.winner,
                pending = ?t.state.pending(),
                "[SESSION] Candidate chosen"
            );
            if let Some(mut spin) = self.spin.take() {
                spin.scheduler.cancel();
            }
        }
        self.commit(t)
    }

    /// Award the pending candidate
    pub fn accept_pending(&mut self) -> bool {
        self.decide(DrawAction::Accept)
    }

    /// Set the pending candidate aside
    pub fn skip_pending(&mut self) -> bool {
        self.decide(DrawAction::Skip)
    }

    /// Cancel the spin in flight; no result will be applied for it
    pub fn cancel_spin(&mut self) -> bool {
        if !self.discard_spin() {
            return false;
        }
        match &self.roster {
            Some(roster) => {
                let t = self.state.apply(roster, DrawAction::AbortDraw);
                self.commit(t)
            }
            None => false,
        }
    }

    /// End the session; only `reset` or a reload leave this phase
    pub fn end_session(&mut self) -> bool {
        self.discard_spin();
        let Some(roster) = &self.roster else {
            return false;
        };
        let t = self.state.apply(roster, DrawAction::EndDraw);
        self.commit(t)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn decide(&mut self, action: DrawAction) -> bool {
        let Some(roster) = &self.roster else {
            return false;
        };
        let t = self.state.apply(roster, action);
        let applied = self.commit(t);
        if applied && self.is_exhausted() {
            info!("[SESSION] Pool exhausted");
        }
        applied
    }

    /// Store the transition's state (rejections may still move the phase)
    fn commit(&mut self, transition: Transition) -> bool {
        let applied = transition.is_applied();
        self.state = transition.state;
        applied
    }

    /// Cancel and drop the active spin, moving the token forward
    fn discard_spin(&mut self) -> bool {
        self.token += 1;
        match self.spin.take() {
            Some(mut spin) => {
                spin.scheduler.cancel();
                debug!(token = spin.token, "[SESSION] Spin discarded");
                true
            }
            None => false,
        }
    }
}

/// Rows the scheduler may land on for a draw on `prize`.
///
/// A forced draw lands on the reserved row so the reel shows the committed
/// winner. The reserved marker has no row, so the reel lands on any
/// eligible row (or any row at all once the pool is empty).
fn spin_pool(state: &DrawState, roster: &Roster, prize: Option<Prize>) -> Vec<RowIndex> {
    if let Some(Candidate::Row(row)) = state.forced_candidate(roster, prize) {
        return vec![row];
    }
    let pool = state.eligible_rows(roster);
    if pool.is_empty() {
        (0..roster.row_count()).collect()
    } else {
        pool
    }
}

// =============================================================================
// TESTS
// =============================================================================
