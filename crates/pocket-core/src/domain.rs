use serde::{Deserialize, Serialize};

// ============================================================================
// TIME HELPERS
// ============================================================================

/// Microseconds per second. One time-unit of the host scheduler.
pub const US_PER_SEC: u64 = 1_000_000;

/// Compute time delta with saturating subtraction to prevent wraparound.
/// If clocks go backwards (now < last), returns 0 instead of wrapping to huge value.
#[inline]
pub fn dt_us(now_us: i64, last_us: i64) -> u64 {
    if now_us >= last_us {
        (now_us - last_us) as u64
    } else {
        0
    }
}

/// Seconds between two instants, never negative.
#[inline]
pub fn dt_sec(now_us: i64, last_us: i64) -> f32 {
    (dt_us(now_us, last_us) as f32) / US_PER_SEC as f32
}

/// Offset an instant by a duration, saturating at `i64::MAX`.
#[inline]
pub fn ts_after(now_us: i64, delay_us: u64) -> i64 {
    now_us.saturating_add(i64::try_from(delay_us).unwrap_or(i64::MAX))
}

// ============================================================================
// HEART RATE
// ============================================================================

/// Integer beats per minute as displayed on screen.
pub type RateSample = u32;

/// Display band derived from a [`RateSample`]. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateBand {
    Normal,
    High,
    Critical,
}

impl RateBand {
    /// Short status line shown under the heart glyph.
    pub fn description(self) -> &'static str {
        match self {
            RateBand::Normal => "Heart rate normal.",
            RateBand::High => "Heart rate high.",
            RateBand::Critical => "Heart rate bad.",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            RateBand::Normal => "💚💚",
            RateBand::High => "💛💛",
            RateBand::Critical => "💔💔",
        }
    }

    /// RGB tint used by renderers.
    pub fn tint(self) -> (f32, f32, f32) {
        match self {
            RateBand::Normal => (0.2, 0.6, 0.2),
            RateBand::High => (0.6, 0.6, 0.2),
            RateBand::Critical => (0.8, 0.2, 0.2),
        }
    }

    /// The breathing exercise is offered only while the rate is elevated but
    /// not critical.
    pub fn offers_breathing(self) -> bool {
        matches!(self, RateBand::High)
    }
}

/// Band boundaries. `normal_below` is also the skip threshold of the
/// breathing sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateThresholds {
    /// Rates strictly below this are [`RateBand::Normal`].
    pub normal_below: RateSample,
    /// Rates strictly below this (and at least `normal_below`) are [`RateBand::High`].
    pub high_below: RateSample,
}

impl RateThresholds {
    pub fn classify(&self, rate: RateSample) -> RateBand {
        if rate < self.normal_below {
            RateBand::Normal
        } else if rate < self.high_below {
            RateBand::High
        } else {
            RateBand::Critical
        }
    }

    /// True once the rate has reached the top of the normal band.
    #[inline]
    pub fn is_elevated(&self, rate: RateSample) -> bool {
        rate >= self.normal_below
    }
}

impl Default for RateThresholds {
    fn default() -> Self {
        Self {
            normal_below: 100,
            high_below: 200,
        }
    }
}

// ============================================================================
// BREATHING
// ============================================================================

/// Render label for the current breathing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreathingStep {
    Inhale,
    Exhale,
    Affirmation,
}

impl BreathingStep {
    /// Label for a step count; `None` once the countdown is over.
    ///
    /// Parity drives the inhale/exhale alternation; the last step is the
    /// affirmation.
    pub fn for_remaining(steps_remaining: u32) -> Option<Self> {
        match steps_remaining {
            0 => None,
            1 => Some(BreathingStep::Affirmation),
            n if n % 2 == 1 => Some(BreathingStep::Inhale),
            _ => Some(BreathingStep::Exhale),
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            BreathingStep::Inhale => "Inhale...",
            BreathingStep::Exhale => "Exhale...",
            BreathingStep::Affirmation => "You Are Amazing",
        }
    }
}
