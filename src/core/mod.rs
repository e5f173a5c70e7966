//! Core module - draw logic with no I/O or threads

pub mod constants;
pub mod draw_state;
pub mod format;
pub mod rate_schedule;
pub mod roster;
pub mod scheduler;
pub mod session;
pub mod traits;
pub mod types;

pub use draw_state::{DrawAction, DrawState, Phase, Rejection, Tally, TallyEntry};
pub use format::{format_all_results_csv, format_results_text, format_winners_csv, reel_window};
pub use rate_schedule::{PatternChoice, SpinPattern, SpinTimings, TimingsError};
pub use roster::{PrizeCatalog, ReservedSpec, Roster, RosterError};
pub use scheduler::{CancelToken, SchedulerPhase, SpinScheduler};
pub use session::{DrawSession, DrawSettings, SessionEvent, SpinOutcome};
pub use traits::{Clock, SystemClock};
pub use types::{Candidate, ParticipantTable, Prize, RowIndex};
