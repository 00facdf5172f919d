use proptest::prelude::*;

// Property-based checks for the monitor and sequencer invariants.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breathing::{BreathingSequencer, BreathingState};
    use crate::config::{BreathingConfig, MonitorConfig, PocketConfig};
    use crate::domain::RateThresholds;
    use crate::monitor::HeartRateMonitor;
    use crate::scheduler::TimerQueue;
    use crate::screen::Screen;

    fn sequencer() -> BreathingSequencer {
        BreathingSequencer::new(BreathingConfig::default(), RateThresholds::default())
    }

    // =========================================================================
    // Decay
    // =========================================================================
    proptest! {
        #[test]
        fn test_tick_decay(rate in 0u32..1_000u32) {
            let mut m = HeartRateMonitor::new(MonitorConfig {
                fallback_seed: Some(0),
                ..MonitorConfig::default()
            });
            m.set_rate(rate);
            m.tick();
            let expected = if rate > 60 { rate - 1 } else { rate };
            prop_assert_eq!(m.rate(), expected);
        }
    }

    // =========================================================================
    // Fallback range
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_fallback_in_range(seed in any::<u64>()) {
            let mut m = HeartRateMonitor::new(MonitorConfig {
                fallback_seed: Some(seed),
                ..MonitorConfig::default()
            });
            let out = m.complete_refresh(Ok(None));
            prop_assert!(out.rate() < 250);
            prop_assert_eq!(m.rate(), out.rate());
        }
    }

    // =========================================================================
    // Countdown is monotone and always terminates
    // =========================================================================
    proptest! {
        #[test]
        fn test_countdown_monotone(rates in proptest::collection::vec(0u32..300u32, 1..10)) {
            let mut q = TimerQueue::new();
            let mut seq = sequencer();
            seq.start(&mut q);

            let mut prev = seq.session().steps_remaining;
            let mut advances = 0;
            for rate in rates.iter().cycle() {
                if !seq.is_active() {
                    break;
                }
                seq.advance(*rate, &mut q);
                let now = seq.session().steps_remaining;
                prop_assert!(now < prev);
                prop_assert!(prev - now == 1 || (prev == 2 && now == 0 && *rate >= 100));
                prev = now;
                advances += 1;
                prop_assert!(advances <= 5);
            }
            prop_assert_eq!(seq.state(), BreathingState::Idle);
        }
    }

    // =========================================================================
    // Stale generations never mutate
    // =========================================================================
    proptest! {
        #[test]
        fn test_stale_generation_inert(
            restarts in 1usize..5usize,
            stale_offset in 1u64..4u64,
            wait_s in 0i64..30i64,
        ) {
            let mut q = TimerQueue::new();
            let mut seq = sequencer();
            let gen = (0..=restarts)
                .map(|_| seq.start(&mut q))
                .last()
                .unwrap_or_default();
            let before = *seq.session();
            q.advance_to(wait_s * 1_000_000);
            let stale = gen.saturating_sub(stale_offset);
            prop_assert!(!seq.on_due(stale, 72, &mut q));
            prop_assert_eq!(*seq.session(), before);
        }
    }

    // =========================================================================
    // At most one breathing timer is ever pending
    // =========================================================================
    proptest! {
        #[test]
        fn test_single_pending_timer(actions in proptest::collection::vec(0u8..3u8, 1..40)) {
            let mut config = PocketConfig::default();
            config.monitor.fallback_seed = Some(3);
            let mut screen = Screen::new(&config);
            screen.monitor_mut().set_rate(150);

            for (i, action) in actions.iter().enumerate() {
                match action {
                    0 => { screen.begin_breathing(); }
                    1 => { screen.tap_breathing(); }
                    _ => { screen.run_until((i as i64 + 1) * 1_000_000); }
                }
                // No monitor cadence here, so every live timer is a breathing one.
                let expected = usize::from(screen.sequencer().is_active());
                prop_assert_eq!(screen.pending_timers(), expected);
            }
        }
    }
}
