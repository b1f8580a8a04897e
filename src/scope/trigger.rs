//! Trigger rules evaluated on consecutive `(previous, current)` sample pairs.
//!
//! A detector fires at most once per arm cycle: after it returns `true`, every further check
//! returns `false` until [`TriggerDetector::reset`] re-arms it. This holds for the level rule
//! too, so a signal that stays above the level does not produce a stream of triggers.

use std::time::Instant;

use crate::scope::config::{PulseTiming, TriggerConfig, TriggerType};

/// Per-channel detector state that persists across sample blocks.
#[derive(Debug, Clone)]
pub struct TriggerRunState {
    armed: bool,
    pulse_start_time: Option<Instant>,
    pulse_in_progress: bool,
    // sample periods elapsed since the upward crossing
    pulse_samples: u64,
    // last sample of the previous scanned block
    last_sample: Option<f32>,
}

impl Default for TriggerRunState {
    fn default() -> Self {
        Self {
            armed: true,
            pulse_start_time: None,
            pulse_in_progress: false,
            pulse_samples: 0,
            last_sample: None,
        }
    }
}

impl TriggerRunState {
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn pulse_in_progress(&self) -> bool {
        self.pulse_in_progress
    }

    fn clear_pulse(&mut self) {
        self.pulse_start_time = None;
        self.pulse_in_progress = false;
        self.pulse_samples = 0;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerDetector {
    sample_rate_hz: f32,
    timing: PulseTiming,
}

impl TriggerDetector {
    /// Create a detector for a stream sampled at `sample_rate_hz`.
    ///
    /// The sample rate is only used by the pulse rule when `timing` is
    /// [`PulseTiming::SampleCount`].
    pub fn new(sample_rate_hz: f32, timing: PulseTiming) -> Self {
        Self {
            sample_rate_hz,
            timing,
        }
    }

    pub fn timing(&self) -> PulseTiming {
        self.timing
    }

    /// Evaluate one sample pair against `cfg`. Returns `true` exactly once per arm cycle.
    pub fn check(
        &self,
        current: f32,
        previous: f32,
        cfg: &TriggerConfig,
        state: &mut TriggerRunState,
    ) -> bool {
        if !state.armed {
            return false;
        }
        let level = cfg.level;
        let fired = match cfg.kind {
            TriggerType::RisingEdge => previous < level && current >= level,
            TriggerType::FallingEdge => previous > level && current <= level,
            TriggerType::Level => current >= level,
            TriggerType::Pulse => self.check_pulse(current, previous, cfg, state),
            TriggerType::Slope => {
                let slope = (current - previous) / cfg.sample_interval;
                slope.abs() >= cfg.slope_threshold
            }
        };
        if fired {
            state.armed = false;
        }
        fired
    }

    /// Re-arm the detector and forget any pulse being timed, along with the previous block.
    pub fn reset(&self, state: &mut TriggerRunState) {
        state.armed = true;
        state.last_sample = None;
        state.clear_pulse();
    }

    /// Scan `block` pairing each sample with its predecessor, starting at index 1.
    ///
    /// Returns the index of the first sample at which the detector fired. The pair formed by
    /// the last sample of the previous block and `block[0]` is only evaluated by the pulse
    /// rule, so pulse timing stays continuous across blocks; a pulse ending on `block[0]`
    /// fires at index 0. Blocks must be scanned back to back, or the state reset in between.
    pub fn scan(
        &self,
        block: &[f32],
        cfg: &TriggerConfig,
        state: &mut TriggerRunState,
    ) -> Option<usize> {
        let (&first, &last) = block.first().zip(block.last())?;
        let previous = state.last_sample.replace(last);
        if let (TriggerType::Pulse, Some(previous)) = (cfg.kind, previous) {
            if self.check(first, previous, cfg, state) {
                return Some(0);
            }
        }
        block
            .windows(2)
            .position(|pair| self.check(pair[1], pair[0], cfg, state))
            .map(|offset| offset + 1)
    }

    fn check_pulse(
        &self,
        current: f32,
        previous: f32,
        cfg: &TriggerConfig,
        state: &mut TriggerRunState,
    ) -> bool {
        let level = cfg.level;
        if state.pulse_in_progress {
            state.pulse_samples += 1;
        }
        if previous < level && current >= level {
            state.pulse_start_time = match self.timing {
                PulseTiming::WallClock => Some(Instant::now()),
                PulseTiming::SampleCount => None,
            };
            state.pulse_samples = 0;
            state.pulse_in_progress = true;
            return false;
        }
        if state.pulse_in_progress && current < level {
            let duration_ms = self.pulse_duration_ms(state);
            state.clear_pulse();
            log::trace!("pulse ended after {:.3} ms", duration_ms);
            return cfg.pulse_min_ms <= duration_ms && duration_ms <= cfg.pulse_max_ms;
        }
        false
    }

    fn pulse_duration_ms(&self, state: &TriggerRunState) -> f64 {
        match self.timing {
            PulseTiming::SampleCount => {
                state.pulse_samples as f64 * 1000.0 / self.sample_rate_hz as f64
            }
            PulseTiming::WallClock => state
                .pulse_start_time
                .map(|start| start.elapsed().as_secs_f64() * 1000.0)
                .unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(kind: TriggerType, level: f32) -> TriggerConfig {
        TriggerConfig {
            kind,
            level,
            ..TriggerConfig::default()
        }
    }

    fn detector() -> TriggerDetector {
        TriggerDetector::new(1_000.0, PulseTiming::SampleCount)
    }

    #[test]
    fn rising_edge_requires_crossing() {
        let cfg = config(TriggerType::RisingEdge, 0.5);
        let det = detector();
        let mut state = TriggerRunState::default();
        assert!(!det.check(0.6, 0.7, &cfg, &mut state));
        assert!(!det.check(0.4, 0.1, &cfg, &mut state));
        assert!(det.check(0.5, 0.4, &cfg, &mut state));
        assert!(!state.is_armed());
    }

    #[test]
    fn falling_edge_requires_crossing() {
        let cfg = config(TriggerType::FallingEdge, 0.0);
        let det = detector();
        let mut state = TriggerRunState::default();
        assert!(!det.check(0.5, -0.2, &cfg, &mut state));
        assert!(det.check(0.0, 0.1, &cfg, &mut state));
    }

    #[test]
    fn level_fires_on_first_sample_and_only_once() {
        let cfg = config(TriggerType::Level, 0.3);
        let det = detector();
        let mut state = TriggerRunState::default();
        assert!(det.check(0.9, 0.9, &cfg, &mut state));
        assert!(!det.check(0.9, 0.9, &cfg, &mut state));
        assert!(!det.check(1.0, 0.9, &cfg, &mut state));
        det.reset(&mut state);
        assert!(det.check(0.9, 0.9, &cfg, &mut state));
    }

    #[test]
    fn slope_ignores_direction() {
        let mut cfg = config(TriggerType::Slope, 0.0);
        cfg.slope_threshold = 100.0;
        cfg.sample_interval = 0.001;
        let det = detector();
        let mut state = TriggerRunState::default();
        assert!(!det.check(0.05, 0.0, &cfg, &mut state)); // 50 / s
        assert!(det.check(-0.2, 0.0, &cfg, &mut state)); // -200 / s
        det.reset(&mut state);
        assert!(det.check(0.3, 0.1, &cfg, &mut state)); // 200 / s
    }

    #[test]
    fn scan_reports_first_firing_index() {
        let cfg = config(TriggerType::RisingEdge, 0.5);
        let det = detector();
        let mut state = TriggerRunState::default();
        let block = [0.0, 0.1, 0.2, 0.8, 0.0, 0.9];
        assert_eq!(det.scan(&block, &cfg, &mut state), Some(3));
        // disarmed until reset
        assert_eq!(det.scan(&block, &cfg, &mut state), None);
        det.reset(&mut state);
        assert_eq!(det.scan(&block, &cfg, &mut state), Some(3));
    }

    #[test]
    fn scan_skips_index_zero() {
        let cfg = config(TriggerType::Level, 0.5);
        let det = detector();
        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&[1.0, 1.0], &cfg, &mut state), Some(1));
        det.reset(&mut state);
        assert_eq!(det.scan(&[1.0], &cfg, &mut state), None);
        assert_eq!(det.scan(&[], &cfg, &mut state), None);
    }

    fn pulse(high_samples: usize) -> Vec<f32> {
        let mut block = vec![0.0; 4];
        block.extend(std::iter::repeat(1.0).take(high_samples));
        block.extend([0.0; 4]);
        block
    }

    #[test]
    fn pulse_counts_samples_between_crossings() {
        // 1 kHz: one sample is one millisecond
        let mut cfg = config(TriggerType::Pulse, 0.5);
        cfg.pulse_min_ms = 5.0;
        cfg.pulse_max_ms = 10.0;
        let det = detector();

        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&pulse(3), &cfg, &mut state), None);
        assert!(!state.pulse_in_progress());
        assert!(state.is_armed());

        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&pulse(12), &cfg, &mut state), None);

        let mut state = TriggerRunState::default();
        // up-crossing at index 4, down-crossing at index 4 + 7
        assert_eq!(det.scan(&pulse(7), &cfg, &mut state), Some(11));
    }

    #[test]
    fn pulse_spans_block_boundary() {
        let mut cfg = config(TriggerType::Pulse, 0.5);
        cfg.pulse_min_ms = 6.0;
        cfg.pulse_max_ms = 6.0;
        let det = detector();
        let mut state = TriggerRunState::default();
        // up-crossing at index 2; 2 high samples here, then 4 more in the next block
        assert_eq!(det.scan(&[0.0, 0.0, 1.0, 1.0], &cfg, &mut state), None);
        assert!(state.pulse_in_progress());
        assert_eq!(det.scan(&[1.0, 1.0, 1.0, 1.0, 0.0], &cfg, &mut state), Some(4));
    }

    #[test]
    fn pulse_ending_on_block_boundary_keeps_its_length() {
        let mut cfg = config(TriggerType::Pulse, 0.5);
        cfg.pulse_min_ms = 2.0;
        cfg.pulse_max_ms = 2.0;
        let det = detector();

        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&[0.0, 0.0, 1.0, 1.0, 0.0, 0.0], &cfg, &mut state), Some(4));

        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&[0.0, 0.0, 1.0, 1.0], &cfg, &mut state), None);
        assert_eq!(det.scan(&[0.0, 0.0, 0.0], &cfg, &mut state), Some(0));
        assert!(!state.pulse_in_progress());
    }

    #[test]
    fn pulse_starting_on_block_boundary_is_timed() {
        let mut cfg = config(TriggerType::Pulse, 0.5);
        cfg.pulse_min_ms = 2.0;
        cfg.pulse_max_ms = 2.0;
        let det = detector();
        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&[0.0, 0.0], &cfg, &mut state), None);
        assert_eq!(det.scan(&[1.0, 1.0, 0.0], &cfg, &mut state), Some(2));
    }

    #[test]
    fn edge_rules_ignore_block_boundary() {
        let cfg = config(TriggerType::RisingEdge, 0.5);
        let det = detector();
        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&[0.0, 0.0], &cfg, &mut state), None);
        assert_eq!(det.scan(&[1.0, 1.0], &cfg, &mut state), None);
        assert!(state.is_armed());
    }

    #[test]
    fn reset_forgets_previous_block() {
        let mut cfg = config(TriggerType::Pulse, 0.5);
        cfg.pulse_min_ms = 1.0;
        cfg.pulse_max_ms = 1.0;
        let det = detector();
        let mut state = TriggerRunState::default();
        assert_eq!(det.scan(&[0.0, 0.0], &cfg, &mut state), None);
        det.reset(&mut state);
        // no up-crossing is seen at the boundary, so no pulse is timed
        assert_eq!(det.scan(&[1.0, 0.0], &cfg, &mut state), None);
    }

    #[test]
    fn pulse_wall_clock_measures_host_time() {
        let mut cfg = config(TriggerType::Pulse, 0.5);
        cfg.pulse_min_ms = 1.0;
        cfg.pulse_max_ms = 10_000.0;
        let det = TriggerDetector::new(1_000.0, PulseTiming::WallClock);
        let mut state = TriggerRunState::default();
        assert!(!det.check(1.0, 0.0, &cfg, &mut state));
        std::thread::sleep(Duration::from_millis(5));
        assert!(det.check(0.0, 1.0, &cfg, &mut state));
    }

    #[test]
    fn reset_clears_pulse_in_progress() {
        let cfg = config(TriggerType::Pulse, 0.5);
        let det = detector();
        let mut state = TriggerRunState::default();
        det.check(1.0, 0.0, &cfg, &mut state);
        assert!(state.pulse_in_progress());
        det.reset(&mut state);
        assert!(!state.pulse_in_progress());
        assert!(state.is_armed());
    }
}
