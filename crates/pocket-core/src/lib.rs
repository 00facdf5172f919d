//! Pocket core: heart-rate monitor and guided breathing sequencer for a
//! single-screen wearable app.
//!
//! Both components run on one logical thread. They never own callbacks;
//! they register [`Wakeup`] values with a host-supplied [`Scheduler`] and the
//! host routes due wakeups back. [`Screen`] is the bundled host.

pub mod breathing;
pub mod config;
pub mod domain;
pub mod monitor;
pub mod provider;
pub mod scheduler;
pub mod screen;

#[cfg(test)]
pub mod tests_config;
#[cfg(test)]
pub mod tests_proptest;

// Domain types and time helpers
pub use domain::{
    dt_sec, dt_us, ts_after, BreathingStep, RateBand, RateSample, RateThresholds, US_PER_SEC,
};

// Configuration
pub use config::{BreathingConfig, ConfigError, MonitorConfig, PocketConfig};

// Scheduling primitive
pub use scheduler::{Scheduler, TimerId, TimerQueue, Wakeup};

// Sample provider seam
pub use provider::{ProviderError, RateReading, RefreshRequest, SampleLog, SampleProvider};

// Components
pub use breathing::{BreathingSequencer, BreathingSession, BreathingState};
pub use monitor::{bpm_from_average, HeartRateMonitor, RefreshOutcome};

// Host glue
pub use screen::{BreathingView, Screen, ScreenView};
