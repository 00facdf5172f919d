//! Heart-rate sample provider seam.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::dt_us;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("sample source unavailable: {0}")]
    Unavailable(String),
    #[error("not authorized to read heart-rate samples")]
    Unauthorized,
    #[error("query failed: {0}")]
    Query(String),
}

/// One averaged-sample request over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub window_end_us: i64,
    pub window_us: u64,
}

impl RefreshRequest {
    pub fn window_start_us(&self) -> i64 {
        self.window_end_us
            .saturating_sub(i64::try_from(self.window_us).unwrap_or(i64::MAX))
    }

    pub fn contains(&self, ts_us: i64) -> bool {
        ts_us >= self.window_start_us() && ts_us <= self.window_end_us
    }
}

/// Source of averaged heart-rate samples.
pub trait SampleProvider {
    /// Discrete average of the samples in `[window_end - window, window_end]`.
    ///
    /// `Ok(None)` means the window holds no samples.
    fn query_average(
        &mut self,
        window_end_us: i64,
        window_us: u64,
    ) -> Result<Option<f64>, ProviderError>;
}

impl<P: SampleProvider + ?Sized> SampleProvider for &mut P {
    fn query_average(
        &mut self,
        window_end_us: i64,
        window_us: u64,
    ) -> Result<Option<f64>, ProviderError> {
        (**self).query_average(window_end_us, window_us)
    }
}

/// A single timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateReading {
    pub ts_us: i64,
    pub bpm: f64,
}

/// Bounded in-memory log of readings answering discrete-average queries.
///
/// Readings older than `retention_us` relative to the newest one are pruned on
/// insert, so the log stays bounded for a perpetual stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleLog {
    readings: VecDeque<RateReading>,
    retention_us: u64,
}

impl SampleLog {
    pub fn new(retention_us: u64) -> Self {
        Self {
            readings: VecDeque::new(),
            retention_us,
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Record a reading. Out-of-order readings are inserted in place.
    pub fn record(&mut self, ts_us: i64, bpm: f64) {
        if !bpm.is_finite() {
            log::debug!("dropping non-finite reading at {}us", ts_us);
            return;
        }
        let reading = RateReading { ts_us, bpm };
        let pos = self.readings.partition_point(|r| r.ts_us <= ts_us);
        self.readings.insert(pos, reading);
        self.prune();
    }

    fn prune(&mut self) {
        let Some(newest) = self.readings.back().map(|r| r.ts_us) else {
            return;
        };
        while let Some(oldest) = self.readings.front() {
            if dt_us(newest, oldest.ts_us) > self.retention_us {
                self.readings.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn readings(&self) -> impl Iterator<Item = &RateReading> {
        self.readings.iter()
    }
}

impl Default for SampleLog {
    fn default() -> Self {
        // Ten minutes of history
        Self::new(600 * crate::domain::US_PER_SEC)
    }
}

impl SampleProvider for SampleLog {
    fn query_average(
        &mut self,
        window_end_us: i64,
        window_us: u64,
    ) -> Result<Option<f64>, ProviderError> {
        let req = RefreshRequest {
            window_end_us,
            window_us,
        };
        let (sum, count) = self
            .readings
            .iter()
            .filter(|r| req.contains(r.ts_us))
            .fold((0.0f64, 0usize), |(s, c), r| (s + r.bpm, c + 1));
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(sum / count as f64))
    }
}
