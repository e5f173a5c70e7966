//! Spin rate schedule - patterns and interval arithmetic
//!
//! Pure functions describing how fast the reel steps. Nothing here knows
//! about timers; the scheduler asks for intervals and runs them.

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    ACCELERATE_START_MS, BOUNCE_LARGE_MS, BOUNCE_SMALL_MS, BOUNCE_START_MS, GROWTH_FACTOR,
    LINEAR_STEP_MS, MAX_GROWTH_FACTOR, MAX_STOP_THRESHOLD_MS, MIN_INTERVAL, NORMAL_START_MS,
    SETTLE_MS, STEPS_PER_ROUND, STOP_THRESHOLD_MS, WARMUP_FLOOR_MS, WARMUP_STEP_MS,
    WARMUP_TICK_MS,
};

// =============================================================================
// PATTERNS
// =============================================================================

/// How the reel slows down once a stop is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinPattern {
    /// Fixed additive slowdown
    Normal,
    /// Speeds up first, then slows down multiplicatively
    Accelerate,
    /// Irregular slowdown by one of two increments
    Bounce,
}

impl SpinPattern {
    pub const ALL: [SpinPattern; 3] = [
        SpinPattern::Normal,
        SpinPattern::Accelerate,
        SpinPattern::Bounce,
    ];
}

/// Pattern requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternChoice {
    /// Pick one of the three patterns uniformly for each spin
    #[default]
    Auto,
    Normal,
    Accelerate,
    Bounce,
}

impl PatternChoice {
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> SpinPattern {
        match self {
            PatternChoice::Auto => SpinPattern::ALL[rng.gen_range(0..SpinPattern::ALL.len())],
            PatternChoice::Normal => SpinPattern::Normal,
            PatternChoice::Accelerate => SpinPattern::Accelerate,
            PatternChoice::Bounce => SpinPattern::Bounce,
        }
    }
}

// =============================================================================
// TIMINGS
// =============================================================================

/// All animation constants, in milliseconds unless noted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinTimings {
    pub normal_start_ms: u64,
    pub accelerate_start_ms: u64,
    pub bounce_start_ms: u64,
    pub warmup_tick_ms: u64,
    pub warmup_step_ms: u64,
    pub warmup_floor_ms: u64,
    pub linear_step_ms: u64,
    /// Multiplier per round for the accelerate pattern (must be > 1)
    pub growth_factor: f64,
    pub bounce_small_ms: u64,
    pub bounce_large_ms: u64,
    pub stop_threshold_ms: u64,
    pub settle_ms: u64,
    /// Display steps per deceleration round
    pub steps_per_round: u32,
}

impl Default for SpinTimings {
    fn default() -> Self {
        Self {
            normal_start_ms: NORMAL_START_MS,
            accelerate_start_ms: ACCELERATE_START_MS,
            bounce_start_ms: BOUNCE_START_MS,
            warmup_tick_ms: WARMUP_TICK_MS,
            warmup_step_ms: WARMUP_STEP_MS,
            warmup_floor_ms: WARMUP_FLOOR_MS,
            linear_step_ms: LINEAR_STEP_MS,
            growth_factor: GROWTH_FACTOR,
            bounce_small_ms: BOUNCE_SMALL_MS,
            bounce_large_ms: BOUNCE_LARGE_MS,
            stop_threshold_ms: STOP_THRESHOLD_MS,
            settle_ms: SETTLE_MS,
            steps_per_round: STEPS_PER_ROUND,
        }
    }
}

/// Timing values a spin cannot run with
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimingsError {
    #[error("growth_factor must be finite and in (1, {max}], got {got}")]
    GrowthFactor { got: f64, max: f64 },
    #[error("steps_per_round must be at least 1")]
    NoStepsPerRound,
    #[error("stop_threshold_ms must be in 1..={max}, got {got}")]
    StopThreshold { got: u64, max: u64 },
    #[error("warmup_tick_ms must be > 0")]
    NoWarmupTick,
}

impl SpinTimings {
    /// Check the values that would make a spin never end
    pub fn validate(&self) -> Result<(), TimingsError> {
        let factor = self.growth_factor;
        if !factor.is_finite() || factor <= 1.0 || factor > MAX_GROWTH_FACTOR {
            return Err(TimingsError::GrowthFactor {
                got: factor,
                max: MAX_GROWTH_FACTOR,
            });
        }
        if self.steps_per_round == 0 {
            return Err(TimingsError::NoStepsPerRound);
        }
        if self.stop_threshold_ms == 0 || self.stop_threshold_ms > MAX_STOP_THRESHOLD_MS {
            return Err(TimingsError::StopThreshold {
                got: self.stop_threshold_ms,
                max: MAX_STOP_THRESHOLD_MS,
            });
        }
        if self.warmup_tick_ms == 0 {
            return Err(TimingsError::NoWarmupTick);
        }
        Ok(())
    }

    pub fn stop_threshold(&self) -> Duration {
        Duration::from_millis(self.stop_threshold_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn warmup_tick(&self) -> Duration {
        Duration::from_millis(self.warmup_tick_ms).max(MIN_INTERVAL)
    }

    /// Length of a deceleration round at `interval`
    pub fn round_length(&self, interval: Duration) -> Duration {
        interval * self.steps_per_round.max(1)
    }
}

// =============================================================================
// INTERVAL FUNCTIONS
// =============================================================================

/// Step interval a spin starts with
pub fn initial_interval(pattern: SpinPattern, timings: &SpinTimings) -> Duration {
    let ms = match pattern {
        SpinPattern::Normal => timings.normal_start_ms,
        SpinPattern::Accelerate => timings.accelerate_start_ms,
        SpinPattern::Bounce => timings.bounce_start_ms,
    };
    Duration::from_millis(ms).max(MIN_INTERVAL)
}

/// Interval after one warm-up tick, or None once warm-up is over.
///
/// Only the accelerate pattern warms up; it shortens the interval until the
/// floor is reached.
pub fn warmup_interval(
    pattern: SpinPattern,
    current: Duration,
    timings: &SpinTimings,
) -> Option<Duration> {
    let floor = Duration::from_millis(timings.warmup_floor_ms).max(MIN_INTERVAL);
    if pattern != SpinPattern::Accelerate || current <= floor {
        return None;
    }
    let step = Duration::from_millis(timings.warmup_step_ms);
    Some(current.saturating_sub(step).max(floor))
}

/// Interval of the next deceleration round.
///
/// Always strictly longer than `current`, so repeated calls reach the stop
/// threshold. Growth past the threshold is clamped to it.
pub fn next_interval<R: Rng + ?Sized>(
    pattern: SpinPattern,
    current: Duration,
    timings: &SpinTimings,
    rng: &mut R,
) -> Duration {
    let threshold = timings.stop_threshold();
    let next = match pattern {
        SpinPattern::Normal => {
            current.saturating_add(Duration::from_millis(timings.linear_step_ms))
        }
        SpinPattern::Accelerate => {
            let factor = timings.growth_factor.max(1.0);
            Duration::try_from_secs_f64(current.as_secs_f64() * factor).unwrap_or(threshold)
        }
        SpinPattern::Bounce => {
            let ms = if rng.gen_bool(0.5) {
                timings.bounce_large_ms
            } else {
                timings.bounce_small_ms
            };
            current.saturating_add(Duration::from_millis(ms))
        }
    };
    next.min(threshold.max(current))
        .max(current.saturating_add(MIN_INTERVAL))
}

/// Every round interval from `current` until the stop threshold.
///
/// The returned intervals are all below the threshold; the first interval
/// at or above it is where the reel lands, so it is not part of the plan.
pub fn deceleration_plan<R: Rng + ?Sized>(
    pattern: SpinPattern,
    current: Duration,
    timings: &SpinTimings,
    rng: &mut R,
) -> VecDeque<Duration> {
    let threshold = timings.stop_threshold();
    let mut plan = VecDeque::new();
    let mut interval = current;
    loop {
        interval = next_interval(pattern, interval, timings, rng);
        if interval >= threshold {
            break;
        }
        plan.push_back(interval);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_initial_intervals() {
        let t = SpinTimings::default();
        assert_eq!(initial_interval(SpinPattern::Normal, &t), ms(50));
        assert_eq!(initial_interval(SpinPattern::Accelerate, &t), ms(100));
        assert_eq!(initial_interval(SpinPattern::Bounce, &t), ms(40));
    }

    #[test]
    fn test_warmup_only_for_accelerate() {
        let t = SpinTimings::default();
        assert_eq!(warmup_interval(SpinPattern::Normal, ms(50), &t), None);
        assert_eq!(warmup_interval(SpinPattern::Bounce, ms(40), &t), None);
        assert_eq!(
            warmup_interval(SpinPattern::Accelerate, ms(100), &t),
            Some(ms(90))
        );
        assert_eq!(
            warmup_interval(SpinPattern::Accelerate, ms(35), &t),
            Some(ms(30))
        );
        assert_eq!(warmup_interval(SpinPattern::Accelerate, ms(30), &t), None);
    }

    #[test]
    fn test_warmup_reaches_floor() {
        let t = SpinTimings::default();
        let mut interval = initial_interval(SpinPattern::Accelerate, &t);
        let mut ticks = 0;
        while let Some(next) = warmup_interval(SpinPattern::Accelerate, interval, &t) {
            interval = next;
            ticks += 1;
        }
        assert_eq!(interval, ms(30));
        assert_eq!(ticks, 7);
    }

    #[test]
    fn test_normal_plan_is_linear() {
        let t = SpinTimings::default();
        let mut rng = StdRng::seed_from_u64(1);
        let plan = deceleration_plan(SpinPattern::Normal, ms(50), &t, &mut rng);
        let expected: Vec<Duration> = (1..=11).map(|i| ms(50 + 40 * i)).collect();
        assert_eq!(plan, expected);
    }

    #[test]
    fn test_accelerate_plan_grows_multiplicatively() {
        let t = SpinTimings::default();
        let mut rng = StdRng::seed_from_u64(1);
        let plan = deceleration_plan(SpinPattern::Accelerate, ms(100), &t, &mut rng);
        assert!((plan[0].as_secs_f64() - 0.115).abs() < 1e-6);
        for pair in plan.iter().collect::<Vec<_>>().windows(2) {
            let ratio = pair[1].as_secs_f64() / pair[0].as_secs_f64();
            assert!((ratio - 1.15).abs() < 1e-6);
        }
        let last = *plan.back().unwrap();
        assert!(last < ms(500));
        assert!(last.mul_f64(1.15) >= ms(500));
    }

    #[test]
    fn test_bounce_increments_are_small_or_large() {
        let t = SpinTimings::default();
        let mut rng = StdRng::seed_from_u64(7);
        let plan = deceleration_plan(SpinPattern::Bounce, ms(40), &t, &mut rng);
        let mut previous = ms(40);
        for interval in plan {
            let delta = interval - previous;
            assert!(delta == ms(20) || delta == ms(60), "delta {:?}", delta);
            previous = interval;
        }
    }

    #[test]
    fn test_next_interval_always_grows() {
        let t = SpinTimings {
            linear_step_ms: 0,
            bounce_small_ms: 0,
            bounce_large_ms: 0,
            ..SpinTimings::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        for pattern in SpinPattern::ALL {
            assert!(next_interval(pattern, ms(10), &t, &mut rng) > ms(10));
        }
    }

    #[test]
    fn test_plan_empty_when_already_slow() {
        let t = SpinTimings::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(deceleration_plan(SpinPattern::Normal, ms(480), &t, &mut rng).is_empty());
    }

    #[test]
    fn test_auto_resolves_to_every_pattern() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(PatternChoice::Auto.resolve(&mut rng));
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(
            PatternChoice::Bounce.resolve(&mut rng),
            SpinPattern::Bounce
        );
    }

    #[test]
    fn test_validate_timings() {
        assert!(SpinTimings::default().validate().is_ok());
        let bad = SpinTimings {
            growth_factor: 1.0,
            ..SpinTimings::default()
        };
        assert!(bad.validate().is_err());
        let bad = SpinTimings {
            steps_per_round: 0,
            ..SpinTimings::default()
        };
        assert_eq!(bad.validate(), Err(TimingsError::NoStepsPerRound));
    }

    #[test]
    fn test_validate_rejects_runaway_values() {
        for factor in [f64::INFINITY, f64::NAN, 1e30, MAX_GROWTH_FACTOR + 0.5] {
            let bad = SpinTimings {
                growth_factor: factor,
                ..SpinTimings::default()
            };
            assert!(
                matches!(bad.validate(), Err(TimingsError::GrowthFactor { .. })),
                "factor {} accepted",
                factor
            );
        }
        let ok = SpinTimings {
            growth_factor: MAX_GROWTH_FACTOR,
            stop_threshold_ms: MAX_STOP_THRESHOLD_MS,
            ..SpinTimings::default()
        };
        assert!(ok.validate().is_ok());
        let bad = SpinTimings {
            stop_threshold_ms: MAX_STOP_THRESHOLD_MS + 1,
            ..SpinTimings::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(TimingsError::StopThreshold { .. })
        ));
    }

    #[test]
    fn test_huge_growth_factor_clamps_to_threshold() {
        let mut rng = StdRng::seed_from_u64(4);
        for factor in [1e30, f64::INFINITY] {
            let t = SpinTimings {
                growth_factor: factor,
                ..SpinTimings::default()
            };
            assert_eq!(
                next_interval(SpinPattern::Accelerate, ms(100), &t, &mut rng),
                ms(500)
            );
            assert!(deceleration_plan(SpinPattern::Accelerate, ms(100), &t, &mut rng).is_empty());
        }
    }
}
