//! Draw state machine
//!
//! `DrawState` is the single authoritative record of a draw session: which
//! rows were awarded or skipped, which prize went to whom, and which
//! candidate is waiting for a decision. It is an immutable snapshot; every
//! transition goes through [`DrawState::apply`], which returns the next
//! snapshot together with an [`Outcome`].
//!
//! Invalid transitions are not errors. They come back as
//! `Outcome::Rejected` with the state unchanged (or, for a double award,
//! moved back to idle without touching the award sets).
//!
//! # Eligibility
//!
//! A row is eligible when it is neither selected nor skipped, and it is not
//! the reserved row of a still-unawarded forced prize. Drawing for that
//! forced prize never uses the random pick: the reserved row (or the
//! `Candidate::Reserved` marker when the name was not found) is committed
//! instead.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::roster::Roster;
use super::types::{Candidate, Prize, RowIndex};

// =============================================================================
// PHASE / ACTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Spinning,
    AwaitingDecision,
    Ended,
}

/// Inputs of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawAction {
    /// Start a draw, optionally bound to a prize (required in prize mode)
    BeginDraw { prize: Option<Prize> },
    /// The scheduler reported its winner
    CandidateChosen {
        index: RowIndex,
        prize: Option<Prize>,
    },
    Accept,
    Skip,
    /// The spin was cancelled before reporting a winner
    AbortDraw,
    EndDraw,
    Reset,
}

/// Why a transition did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("not allowed while {0:?}")]
    WrongPhase(Phase),
    #[error("no eligible participant left")]
    EmptyPool,
    #[error("a prize must be chosen in prize mode")]
    PrizeRequired,
    #[error("prizes are not used in single-pool mode")]
    UnexpectedPrize,
    #[error("{0:?} is not in the prize catalog")]
    PrizeNotInCatalog(Prize),
    #[error("row {0} is not eligible")]
    IneligibleCandidate(RowIndex),
    #[error("{0:?} already has a winner")]
    PrizeAlreadyAwarded(Prize),
    #[error("result for {got:?} does not match the draw for {expected:?}")]
    PrizeMismatch {
        expected: Option<Prize>,
        got: Prize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Rejected(Rejection),
}

/// Result of one transition: the next snapshot and what happened
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: DrawState,
    pub outcome: Outcome,
}

impl Transition {
    fn applied(state: DrawState) -> Self {
        Self {
            state,
            outcome: Outcome::Applied,
        }
    }

    fn rejected(state: DrawState, rejection: Rejection) -> Self {
        debug!(reason = %rejection, "[DRAW] Transition rejected");
        Self {
            state,
            outcome: Outcome::Rejected(rejection),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == Outcome::Applied
    }
}

/// One decision, in the order it was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DrawRecord {
    Awarded {
        candidate: Candidate,
        prize: Option<Prize>,
    },
    Skipped {
        row: RowIndex,
        prize: Option<Prize>,
    },
}

// =============================================================================
// DRAW STATE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrawState {
    phase: Phase,
    selected: BTreeSet<RowIndex>,
    skipped: BTreeSet<RowIndex>,
    winners_by_prize: BTreeMap<Prize, Candidate>,
    pending: Option<Candidate>,
    /// Prize of the draw in progress (set from BeginDraw until the decision)
    active_prize: Option<Prize>,
    history: Vec<DrawRecord>,
}

impl DrawState {
    /// Fresh state for a newly loaded table
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected(&self) -> &BTreeSet<RowIndex> {
        &self.selected
    }

    pub fn skipped(&self) -> &BTreeSet<RowIndex> {
        &self.skipped
    }

    pub fn winners_by_prize(&self) -> &BTreeMap<Prize, Candidate> {
        &self.winners_by_prize
    }

    pub fn winner(&self, prize: Prize) -> Option<Candidate> {
        self.winners_by_prize.get(&prize).copied()
    }

    pub fn pending(&self) -> Option<Candidate> {
        self.pending
    }

    pub fn active_prize(&self) -> Option<Prize> {
        self.active_prize
    }

    pub fn history(&self) -> &[DrawRecord] {
        &self.history
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Whether `index` is set aside for the still-unawarded forced prize
    fn is_held(&self, roster: &Roster, index: RowIndex) -> bool {
        roster.reserved().is_some_and(|reserved| {
            reserved.row == Some(index) && !self.winners_by_prize.contains_key(&reserved.prize)
        })
    }

    fn is_eligible(&self, roster: &Roster, index: RowIndex) -> bool {
        index < roster.row_count()
            && !self.selected.contains(&index)
            && !self.skipped.contains(&index)
            && !self.is_held(roster, index)
    }

    /// Rows that can still come out of a random draw, in table order
    pub fn eligible_rows(&self, roster: &Roster) -> Vec<RowIndex> {
        (0..roster.row_count())
            .filter(|&index| self.is_eligible(roster, index))
            .collect()
    }

    pub fn eligible_count(&self, roster: &Roster) -> usize {
        (0..roster.row_count())
            .filter(|&index| self.is_eligible(roster, index))
            .count()
    }

    /// True once nobody is left to draw
    pub fn is_exhausted(&self, roster: &Roster) -> bool {
        self.eligible_count(roster) == 0
    }

    /// Candidate forced by the reserved assignment for a draw on `prize`.
    ///
    /// None when `prize` is not the forced prize, when it was already
    /// awarded, or when the reserved row was skipped (reservation forfeited).
    pub fn forced_candidate(&self, roster: &Roster, prize: Option<Prize>) -> Option<Candidate> {
        let reserved = roster.reserved()?;
        if prize != Some(reserved.prize) || self.winners_by_prize.contains_key(&reserved.prize) {
            return None;
        }
        match reserved.row {
            Some(row) if self.skipped.contains(&row) || self.selected.contains(&row) => None,
            Some(row) => Some(Candidate::Row(row)),
            None => Some(Candidate::Reserved),
        }
    }

    fn check_begin(&self, roster: &Roster, prize: Option<Prize>) -> Result<(), Rejection> {
        if self.phase != Phase::Idle {
            return Err(Rejection::WrongPhase(self.phase));
        }
        // The held reserved row still counts for its own prize
        if self.is_exhausted(roster) && self.forced_candidate(roster, prize).is_none() {
            return Err(Rejection::EmptyPool);
        }
        match (roster.catalog(), prize) {
            (Some(_), None) => Err(Rejection::PrizeRequired),
            (Some(catalog), Some(p)) if !catalog.contains(p) => Err(Rejection::PrizeNotInCatalog(p)),
            (None, Some(_)) => Err(Rejection::UnexpectedPrize),
            _ => Ok(()),
        }
    }

    /// Whether `BeginDraw { prize }` would be accepted right now
    pub fn can_draw(&self, roster: &Roster, prize: Option<Prize>) -> bool {
        self.check_begin(roster, prize).is_ok()
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Apply one action and return the next snapshot
    pub fn apply(&self, roster: &Roster, action: DrawAction) -> Transition {
        match action {
            DrawAction::BeginDraw { prize } => self.begin_draw(roster, prize),
            DrawAction::CandidateChosen { index, prize } => {
                self.candidate_chosen(roster, index, prize)
            }
            DrawAction::Accept => self.accept(),
            DrawAction::Skip => self.skip(),
            DrawAction::AbortDraw => self.abort_draw(),
            DrawAction::EndDraw => self.end_draw(),
            DrawAction::Reset => {
                info!("[DRAW] State reset");
                Transition::applied(DrawState::new())
            }
        }
    }

    fn begin_draw(&self, roster: &Roster, prize: Option<Prize>) -> Transition {
        if let Err(rejection) = self.check_begin(roster, prize) {
            return Transition::rejected(self.clone(), rejection);
        }
        let mut next = self.clone();
        next.phase = Phase::Spinning;
        next.pending = None;
        next.active_prize = prize;
        debug!(prize = ?prize, "[DRAW] Draw started");
        Transition::applied(next)
    }

    fn candidate_chosen(
        &self,
        roster: &Roster,
        index: RowIndex,
        prize: Option<Prize>,
    ) -> Transition {
        if self.phase != Phase::Spinning {
            return Transition::rejected(self.clone(), Rejection::WrongPhase(self.phase));
        }
        // The result may repeat the draw's prize but never change it
        if let Some(got) = prize.filter(|p| Some(*p) != self.active_prize) {
            return Transition::rejected(
                self.clone(),
                Rejection::PrizeMismatch {
                    expected: self.active_prize,
                    got,
                },
            );
        }
        let prize = self.active_prize;

        let candidate = match self.forced_candidate(roster, prize) {
            Some(forced) => {
                debug!(
                    drawn = index,
                    forced = ?forced,
                    "[DRAW] Reserved assignment overrides drawn row"
                );
                forced
            }
            None if self.is_eligible(roster, index) => Candidate::Row(index),
            None => {
                return Transition::rejected(
                    self.clone(),
                    Rejection::IneligibleCandidate(index),
                )
            }
        };

        let mut next = self.clone();
        next.phase = Phase::AwaitingDecision;
        next.pending = Some(candidate);
        next.active_prize = prize;
        Transition::applied(next)
    }

    /// Same state, back to idle with nothing pending
    fn cleared(&self) -> DrawState {
        let mut next = self.clone();
        next.phase = Phase::Idle;
        next.pending = None;
        next.active_prize = None;
        next
    }

    fn accept(&self) -> Transition {
        let Some(candidate) = self.pending.filter(|_| self.phase == Phase::AwaitingDecision)
        else {
            return Transition::rejected(self.clone(), Rejection::WrongPhase(self.phase));
        };
        let prize = self.active_prize;
        let mut next = self.cleared();

        if let Some(prize) = prize {
            if self.winners_by_prize.contains_key(&prize) {
                return Transition::rejected(next, Rejection::PrizeAlreadyAwarded(prize));
            }
            next.winners_by_prize.insert(prize, candidate);
        }
        if let Some(row) = candidate.row() {
            next.selected.insert(row);
        }
        next.history.push(DrawRecord::Awarded { candidate, prize });

        info!(candidate = ?candidate, prize = ?prize, "[DRAW] Winner accepted");
        Transition::applied(next)
    }

    fn skip(&self) -> Transition {
        let Some(candidate) = self.pending.filter(|_| self.phase == Phase::AwaitingDecision)
        else {
            return Transition::rejected(self.clone(), Rejection::WrongPhase(self.phase));
        };
        let prize = self.active_prize;
        let mut next = self.cleared();

        match candidate.row() {
            Some(row) => {
                next.skipped.insert(row);
                next.history.push(DrawRecord::Skipped { row, prize });
                info!(row, prize = ?prize, "[DRAW] Candidate skipped");
            }
            // The reserved marker has no row to skip
            None => debug!(prize = ?prize, "[DRAW] Reserved marker skip, nothing recorded"),
        }
        Transition::applied(next)
    }

    fn abort_draw(&self) -> Transition {
        if self.phase != Phase::Spinning {
            return Transition::rejected(self.clone(), Rejection::WrongPhase(self.phase));
        }
        debug!(prize = ?self.active_prize, "[DRAW] Draw aborted");
        Transition::applied(self.cleared())
    }

    fn end_draw(&self) -> Transition {
        if self.phase == Phase::Ended {
            return Transition::rejected(self.clone(), Rejection::WrongPhase(Phase::Ended));
        }
        let mut next = self.cleared();
        next.phase = Phase::Ended;
        info!(
            selected = next.selected.len(),
            skipped = next.skipped.len(),
            "[DRAW] Draw ended"
        );
        Transition::applied(next)
    }

    // -------------------------------------------------------------------------
    // Tally
    // -------------------------------------------------------------------------

    /// Final tally for exporters, in decision order
    pub fn tally(&self, roster: &Roster) -> Tally {
        let name_of = |candidate: Candidate| match candidate {
            Candidate::Row(row) => roster.display_name(row).to_string(),
            Candidate::Reserved => roster
                .reserved()
                .map(|r| r.name.clone())
                .unwrap_or_default(),
        };

        let mut winners = Vec::new();
        let mut skipped = Vec::new();
        for record in &self.history {
            match *record {
                DrawRecord::Awarded { candidate, prize } => winners.push(TallyEntry {
                    candidate,
                    prize,
                    name: name_of(candidate),
                }),
                DrawRecord::Skipped { row, prize } => skipped.push(TallyEntry {
                    candidate: Candidate::Row(row),
                    prize,
                    name: name_of(Candidate::Row(row)),
                }),
            }
        }

        Tally {
            total_participants: roster.row_count(),
            winners,
            skipped,
        }
    }
}

// =============================================================================
// TALLY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyEntry {
    pub candidate: Candidate,
    pub prize: Option<Prize>,
    /// Display-column value (or the reserved name for the marker)
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total_participants: usize,
    pub winners: Vec<TallyEntry>,
    pub skipped: Vec<TallyEntry>,
}

// =============================================================================
// TESTS
// =============================================================================
