//! Heart-rate monitor: passive decay toward a resting floor plus on-demand
//! refresh from a [`SampleProvider`].
//!
//! # Invariants
//! - Decay never takes the rate below `resting_floor_bpm`
//! - A refresh always leaves a displayable rate; provider failure falls back to
//!   a random value instead of surfacing an error

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::MonitorConfig;
use crate::domain::{RateBand, RateSample, RateThresholds};
use crate::provider::{ProviderError, RefreshRequest, SampleProvider};
use crate::scheduler::{Scheduler, TimerId, Wakeup};

/// How a refresh produced the new rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshOutcome {
    /// Averaged provider value.
    Measured(RateSample),
    /// Random stand-in used when the provider had nothing.
    Fallback(RateSample),
}

impl RefreshOutcome {
    pub fn rate(self) -> RateSample {
        match self {
            RefreshOutcome::Measured(r) | RefreshOutcome::Fallback(r) => r,
        }
    }
}

#[derive(Debug)]
pub struct HeartRateMonitor {
    rate: RateSample,
    config: MonitorConfig,
    rng: StdRng,
    timer: Option<TimerId>,
}

impl HeartRateMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let rng = match config.fallback_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rate: config.initial_bpm,
            config,
            rng,
            timer: None,
        }
    }

    pub fn rate(&self) -> RateSample {
        self.rate
    }

    pub fn band(&self, thresholds: &RateThresholds) -> RateBand {
        thresholds.classify(self.rate)
    }

    /// Overwrite the displayed rate. Hosts use this to seed a known value.
    pub fn set_rate(&mut self, rate: RateSample) {
        self.rate = rate;
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    /// Start the perpetual decay cadence. Idempotent.
    pub fn activate(&mut self, sched: &mut dyn Scheduler) {
        if self.timer.is_some() {
            return;
        }
        let id = sched.every(self.config.tick_interval_us(), Wakeup::MonitorTick);
        log::debug!(
            "monitor cadence armed every {}ms ({:?})",
            self.config.tick_interval_ms,
            id
        );
        self.timer = Some(id);
    }

    /// Stop the cadence. The only way the decay loop ends.
    pub fn dispose(&mut self, sched: &mut dyn Scheduler) {
        if let Some(id) = self.timer.take() {
            sched.cancel(id);
            log::debug!("monitor cadence stopped ({:?})", id);
        }
    }

    /// One relaxation step toward the resting floor.
    pub fn tick(&mut self) {
        if self.rate > self.config.resting_floor_bpm {
            self.rate -= 1;
        }
    }

    /// Window to ask the provider for when refreshing at `now_us`.
    pub fn begin_refresh(&self, now_us: i64) -> RefreshRequest {
        RefreshRequest {
            window_end_us: now_us,
            window_us: self.config.refresh_window_us(),
        }
    }

    /// Apply a provider answer obtained for [`Self::begin_refresh`].
    pub fn complete_refresh(
        &mut self,
        result: Result<Option<f64>, ProviderError>,
    ) -> RefreshOutcome {
        let outcome = match result {
            Ok(Some(avg)) => RefreshOutcome::Measured(bpm_from_average(avg)),
            Ok(None) => {
                log::info!("no heart-rate samples in window, using fallback value");
                RefreshOutcome::Fallback(self.fallback_rate())
            }
            Err(e) => {
                log::warn!("heart-rate query failed ({}), using fallback value", e);
                RefreshOutcome::Fallback(self.fallback_rate())
            }
        };
        self.rate = outcome.rate();
        log::info!("heart rate refreshed: {:?}", outcome);
        outcome
    }

    /// Query the provider for the trailing window ending at `now_us` and apply
    /// the answer.
    pub fn force_refresh<P: SampleProvider + ?Sized>(
        &mut self,
        provider: &mut P,
        now_us: i64,
    ) -> RefreshOutcome {
        let req = self.begin_refresh(now_us);
        let result = provider.query_average(req.window_end_us, req.window_us);
        self.complete_refresh(result)
    }

    fn fallback_rate(&mut self) -> RateSample {
        let (min, max) = (self.config.fallback_min_bpm, self.config.fallback_max_bpm);
        if min >= max {
            log::debug!("empty fallback range {}..{}, using {}", min, max, min);
            return min;
        }
        self.rng.gen_range(min..max)
    }
}

/// Integer bpm from a provider average: truncates toward zero, saturating
/// negative and NaN inputs to 0.
pub fn bpm_from_average(avg: f64) -> RateSample {
    avg as RateSample
}
