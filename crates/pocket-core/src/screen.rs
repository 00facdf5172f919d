//! Single-screen host: owns one monitor, one sequencer and the timer queue
//! they share, routes due wakeups, and produces render snapshots.

use serde::Serialize;

use crate::breathing::{BreathingSequencer, BreathingState};
use crate::config::PocketConfig;
use crate::domain::{BreathingStep, RateBand, RateSample, RateThresholds};
use crate::monitor::{HeartRateMonitor, RefreshOutcome};
use crate::provider::{ProviderError, RefreshRequest, SampleProvider};
use crate::scheduler::{Scheduler, TimerQueue, Wakeup};

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenView {
    pub now_us: i64,
    pub rate: RateSample,
    pub band: RateBand,
    pub glyph: &'static str,
    pub description: Option<&'static str>,
    pub breathing_offered: bool,
    pub breathing: Option<BreathingView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreathingView {
    pub steps_remaining: u32,
    pub step: BreathingStep,
    pub prompt: &'static str,
}

impl std::fmt::Display for ScreenView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ", self.glyph)?;
        if let Some(desc) = self.description {
            write!(f, "{} ", desc)?;
        }
        match &self.breathing {
            Some(b) => write!(f, "| {} {} ", b.steps_remaining, b.prompt)?,
            None if self.breathing_offered => write!(f, "| Begin breathing exercise... ")?,
            None => {}
        }
        write!(f, "| {} BPM", self.rate)
    }
}

#[derive(Debug)]
pub struct Screen {
    monitor: HeartRateMonitor,
    sequencer: BreathingSequencer,
    queue: TimerQueue,
    thresholds: RateThresholds,
    show_description: bool,
}

impl Screen {
    pub fn new(config: &PocketConfig) -> Self {
        Self::starting_at(config, 0)
    }

    /// Screen whose clock starts at `start_us`.
    pub fn starting_at(config: &PocketConfig, start_us: i64) -> Self {
        Self {
            monitor: HeartRateMonitor::new(config.monitor.clone()),
            sequencer: BreathingSequencer::new(config.breathing.clone(), config.bands),
            queue: TimerQueue::starting_at(start_us),
            thresholds: config.bands,
            show_description: true,
        }
    }

    pub fn monitor(&self) -> &HeartRateMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut HeartRateMonitor {
        &mut self.monitor
    }

    pub fn sequencer(&self) -> &BreathingSequencer {
        &self.sequencer
    }

    pub fn now_us(&self) -> i64 {
        self.queue.now_us()
    }

    /// Live timers across both components.
    pub fn pending_timers(&self) -> usize {
        self.queue.pending()
    }

    pub fn next_deadline(&mut self) -> Option<i64> {
        self.queue.next_deadline()
    }

    /// Screen became visible: start the decay cadence.
    pub fn appear(&mut self) {
        self.monitor.activate(&mut self.queue);
    }

    /// Screen is going away: stop every timer chain.
    pub fn teardown(&mut self) {
        self.monitor.dispose(&mut self.queue);
        self.sequencer.dispose(&mut self.queue);
        log::debug!("screen torn down, {} timers left", self.queue.pending());
    }

    /// Dispatch every wakeup due at or before `until_us`, then move the clock
    /// there. Returns the number of dispatched wakeups.
    pub fn run_until(&mut self, until_us: i64) -> usize {
        let mut fired = 0;
        while let Some((_, wakeup)) = self.queue.pop_due(until_us) {
            self.dispatch(wakeup);
            fired += 1;
        }
        self.queue.advance_to(until_us);
        fired
    }

    fn dispatch(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::MonitorTick => self.monitor.tick(),
            Wakeup::BreathingDue { generation } => {
                let rate = self.monitor.rate();
                self.sequencer.on_due(generation, rate, &mut self.queue);
            }
        }
    }

    /// Tap on the rate: synchronous refresh at the current clock.
    pub fn refresh_with<P: SampleProvider + ?Sized>(
        &mut self,
        provider: &mut P,
    ) -> RefreshOutcome {
        let now = self.queue.now_us();
        self.monitor.force_refresh(provider, now)
    }

    /// First half of an asynchronous refresh.
    pub fn begin_refresh(&self) -> RefreshRequest {
        self.monitor.begin_refresh(self.queue.now_us())
    }

    /// Apply a provider answer that arrived later.
    pub fn complete_refresh(
        &mut self,
        result: Result<Option<f64>, ProviderError>,
    ) -> RefreshOutcome {
        self.monitor.complete_refresh(result)
    }

    pub fn breathing_offered(&self) -> bool {
        !self.sequencer.is_active() && self.band().offers_breathing()
    }

    /// Start the exercise if the screen currently offers it.
    pub fn begin_breathing(&mut self) -> Option<u64> {
        if !self.breathing_offered() {
            log::debug!("breathing not offered at {} bpm", self.monitor.rate());
            return None;
        }
        Some(self.sequencer.start(&mut self.queue))
    }

    /// Tap on the breathing prompt.
    pub fn tap_breathing(&mut self) -> BreathingState {
        let rate = self.monitor.rate();
        self.sequencer.advance(rate, &mut self.queue)
    }

    pub fn toggle_description(&mut self) {
        self.show_description = !self.show_description;
    }

    pub fn band(&self) -> RateBand {
        self.monitor.band(&self.thresholds)
    }

    pub fn view(&self) -> ScreenView {
        let band = self.band();
        let breathing = self.sequencer.step().map(|step| BreathingView {
            steps_remaining: self.sequencer.session().steps_remaining,
            step,
            prompt: step.prompt(),
        });
        ScreenView {
            now_us: self.queue.now_us(),
            rate: self.monitor.rate(),
            band,
            glyph: band.glyph(),
            description: self.show_description.then(|| band.description()),
            breathing_offered: self.breathing_offered(),
            breathing,
        }
    }
}
