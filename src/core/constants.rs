//! Draw constants - spin timings, reel geometry, export markers
//!
//! Default values for everything the spin scheduler and the exporters need.
//! Timings can be overridden through `SpinTimings` in the config file.

use std::time::Duration;

// =============================================================================
// SPIN START INTERVALS
// =============================================================================

/// Initial step interval for the `normal` pattern
pub const NORMAL_START_MS: u64 = 50;

/// Initial step interval for the `accelerate` pattern (starts slower)
pub const ACCELERATE_START_MS: u64 = 100;

/// Initial step interval for the `bounce` pattern (starts faster)
pub const BOUNCE_START_MS: u64 = 40;

// =============================================================================
// ACCELERATE WARM-UP
// =============================================================================

/// How often the accelerate pattern shortens its interval before a stop
pub const WARMUP_TICK_MS: u64 = 200;

/// Amount removed from the interval at each warm-up tick
pub const WARMUP_STEP_MS: u64 = 10;

/// Warm-up never goes below this interval
pub const WARMUP_FLOOR_MS: u64 = 30;

// =============================================================================
// DECELERATION
// =============================================================================

/// Additive increment per round for the `normal` pattern
pub const LINEAR_STEP_MS: u64 = 40;

/// Multiplicative growth per round for the `accelerate` pattern
pub const GROWTH_FACTOR: f64 = 1.15;

/// Small `bounce` increment
pub const BOUNCE_SMALL_MS: u64 = 20;

/// Large `bounce` increment
pub const BOUNCE_LARGE_MS: u64 = 60;

/// Once the interval reaches this value the reel lands on the winner
pub const STOP_THRESHOLD_MS: u64 = 500;

/// Delay between landing on the winner and reporting it
pub const SETTLE_MS: u64 = 300;

/// Number of display steps per deceleration round
pub const STEPS_PER_ROUND: u32 = 3;

/// Largest accepted `growth_factor`
pub const MAX_GROWTH_FACTOR: f64 = 10.0;

/// Largest accepted stop threshold (one minute per step)
pub const MAX_STOP_THRESHOLD_MS: u64 = 60_000;

/// Smallest interval the scheduler will ever run at
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

// =============================================================================
// REEL / EXPORT
// =============================================================================

/// Number of slots shown around the display index
pub const VISIBLE_SLOTS: usize = 7;

/// Byte order mark prepended to CSV exports so spreadsheet tools detect UTF-8
pub const CSV_BOM: &str = "\u{FEFF}";

// =============================================================================
// RUNNER
// =============================================================================

/// Wake-up period of the driver thread when no spin is running
pub const RUNNER_IDLE_POLL: Duration = Duration::from_millis(100);

/// Capacity of the runner command/event channels
pub const RUNNER_CHANNEL_CAPACITY: usize = 128;
