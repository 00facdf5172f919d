//! Guided breathing countdown with timed auto-advance.
//!
//! # Invariants
//! - At most one session is active; `start` supersedes the previous one
//! - A due callback acts only if the session is active, its generation is
//!   current and the deadline has elapsed
//! - `steps_remaining` drops by exactly one per advance, except the
//!   affirmation skip from 2 straight to 0

use serde::{Deserialize, Serialize};

use crate::config::BreathingConfig;
use crate::domain::{ts_after, BreathingStep, RateSample, RateThresholds};
use crate::scheduler::{Scheduler, TimerId, Wakeup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreathingState {
    Idle,
    Active { steps_remaining: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingSession {
    pub active: bool,
    pub steps_remaining: u32,
    pub generation: u64,
    pub deadline_us: i64,
}

#[derive(Debug, Clone)]
pub struct BreathingSequencer {
    session: BreathingSession,
    config: BreathingConfig,
    thresholds: RateThresholds,
    pending: Option<TimerId>,
}

impl BreathingSequencer {
    pub fn new(config: BreathingConfig, thresholds: RateThresholds) -> Self {
        Self {
            session: BreathingSession::default(),
            config,
            thresholds,
            pending: None,
        }
    }

    pub fn session(&self) -> &BreathingSession {
        &self.session
    }

    pub fn state(&self) -> BreathingState {
        if self.session.active {
            BreathingState::Active {
                steps_remaining: self.session.steps_remaining,
            }
        } else {
            BreathingState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    /// Label of the current step, `None` when idle.
    pub fn step(&self) -> Option<BreathingStep> {
        if !self.session.active {
            return None;
        }
        BreathingStep::for_remaining(self.session.steps_remaining)
    }

    /// Begin a session and arm the first auto-advance. Returns the new
    /// generation.
    ///
    /// Calling this while a session is running restarts it.
    pub fn start(&mut self, sched: &mut dyn Scheduler) -> u64 {
        if self.session.active {
            log::debug!(
                "restarting breathing session {} at step {}",
                self.session.generation,
                self.session.steps_remaining
            );
        }
        self.disarm(sched);

        let now = sched.now_us();
        self.session.generation += 1;
        self.session.steps_remaining = self.config.initial_steps;
        self.session.active = self.session.steps_remaining > 0;
        self.session.deadline_us = ts_after(now, self.config.step_interval_us());
        if self.session.active {
            self.arm(sched);
        }
        log::info!(
            "breathing session {} started with {} steps",
            self.session.generation,
            self.session.steps_remaining
        );
        self.session.generation
    }

    /// Move to the next step. `current_rate` decides whether the final
    /// affirmation is skipped. No-op when idle.
    pub fn advance(
        &mut self,
        current_rate: RateSample,
        sched: &mut dyn Scheduler,
    ) -> BreathingState {
        if !self.session.active {
            return BreathingState::Idle;
        }

        let steps = self.session.steps_remaining;
        let next = if steps == 2 && self.thresholds.is_elevated(current_rate) {
            log::debug!("rate {} still elevated, skipping affirmation", current_rate);
            0
        } else {
            steps.saturating_sub(1)
        };
        self.session.steps_remaining = next;

        if next == 0 {
            self.session.active = false;
            self.disarm(sched);
            log::info!("breathing session {} complete", self.session.generation);
        } else {
            self.session.deadline_us = ts_after(sched.now_us(), self.config.step_interval_us());
            self.arm(sched);
        }
        self.state()
    }

    /// Handle a due auto-advance captured with `generation`.
    ///
    /// Returns true if the step advanced.
    pub fn on_due(
        &mut self,
        generation: u64,
        current_rate: RateSample,
        sched: &mut dyn Scheduler,
    ) -> bool {
        if !self.session.active || generation != self.session.generation {
            log::trace!(
                "ignoring stale breathing callback (gen {} vs {})",
                generation,
                self.session.generation
            );
            return false;
        }

        let advanced = if self.session.deadline_us <= sched.now_us() {
            self.advance(current_rate, sched);
            true
        } else {
            false
        };

        // advance() re-arms itself; an early firing only needs re-arming here.
        if !advanced && self.session.active {
            self.arm(sched);
        }
        advanced
    }

    /// Drop any pending callback and end the session.
    pub fn dispose(&mut self, sched: &mut dyn Scheduler) {
        self.disarm(sched);
        self.session.active = false;
    }

    fn arm(&mut self, sched: &mut dyn Scheduler) {
        self.disarm(sched);
        let delay = crate::domain::dt_us(self.session.deadline_us, sched.now_us());
        let id = sched.after(
            delay,
            Wakeup::BreathingDue {
                generation: self.session.generation,
            },
        );
        self.pending = Some(id);
    }

    fn disarm(&mut self, sched: &mut dyn Scheduler) {
        if let Some(id) = self.pending.take() {
            sched.cancel(id);
        }
    }
}
