//! Per-channel display window driven by the four acquisition modes.
//!
//! [`AcquisitionBuffer`] is a plain state machine: it never blocks, never spawns and never
//! touches a clock (apart from a wall-clock pulse trigger). Locking and the hold timer live
//! one level up in [`Channel`](crate::scope::Channel), which reacts to the [`IngestOutcome`]
//! returned from [`AcquisitionBuffer::ingest`].

use std::time::Duration;

use crate::scope::config::{PulseTiming, TimeScale, TriggerConfig, TriggerMode, DEFAULT_HOLD_MS};
use crate::scope::trigger::{TriggerDetector, TriggerRunState};
use crate::types::ChannelId;

/// What a call to [`AcquisitionBuffer::ingest`] did to the display window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Unchanged,
    Updated,
    /// The window was realigned to the sample at `index` of the block and a hold cycle
    /// identified by `generation` has begun.
    Triggered { index: usize, generation: u64 },
}

impl IngestOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, IngestOutcome::Unchanged)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowStats {
    pub min: f32,
    pub max: f32,
    pub rms: f32,
}

/// Copy of a channel's display window taken under the channel lock.
#[derive(Clone, Debug)]
pub struct WindowSnapshot {
    pub channel: ChannelId,
    pub sample_rate_hz: f32,
    pub samples: Vec<f32>,
    pub write_cursor: usize,
    pub holding: bool,
    pub single_latched: bool,
    pub enabled: bool,
    pub revision: u64,
}

impl WindowSnapshot {
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate_hz
    }

    pub fn stats(&self) -> Option<WindowStats> {
        if self.samples.is_empty() {
            return None;
        }
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut sum_sq: f32 = 0.0;
        for &s in &self.samples {
            min = min.min(s);
            max = max.max(s);
            sum_sq += s * s;
        }
        let rms = (sum_sq / self.samples.len() as f32).sqrt();
        Some(WindowStats { min, max, rms })
    }
}

pub struct AcquisitionBuffer {
    channel: ChannelId,
    sample_rate_hz: f32,
    time_scale: TimeScale,
    samples_per_screen: usize,
    trigger: TriggerConfig,
    detector: TriggerDetector,
    run_state: TriggerRunState,
    window: Vec<f32>,
    write_cursor: usize,
    holding: bool,
    single_latched: bool,
    hold: Duration,
    hold_generation: u64,
    enabled: bool,
    revision: u64,
}

impl AcquisitionBuffer {
    pub fn new(
        channel: ChannelId,
        sample_rate_hz: f32,
        time_scale: TimeScale,
        pulse_timing: PulseTiming,
    ) -> Self {
        let samples_per_screen = time_scale.samples(sample_rate_hz);
        Self {
            channel,
            sample_rate_hz,
            time_scale,
            samples_per_screen,
            trigger: TriggerConfig::default(),
            detector: TriggerDetector::new(sample_rate_hz, pulse_timing),
            run_state: TriggerRunState::default(),
            window: vec![0.0; samples_per_screen],
            write_cursor: 0,
            holding: false,
            single_latched: false,
            hold: Duration::from_millis(DEFAULT_HOLD_MS),
            hold_generation: 0,
            enabled: true,
            revision: 0,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }
    pub fn mode(&self) -> TriggerMode {
        self.trigger.mode
    }
    pub fn trigger_config(&self) -> &TriggerConfig {
        &self.trigger
    }
    pub fn time_scale(&self) -> TimeScale {
        self.time_scale
    }
    pub fn samples_per_screen(&self) -> usize {
        self.samples_per_screen
    }
    pub fn window(&self) -> &[f32] {
        &self.window
    }
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }
    pub fn is_holding(&self) -> bool {
        self.holding
    }
    pub fn is_single_latched(&self) -> bool {
        self.single_latched
    }
    pub fn hold_duration(&self) -> Duration {
        self.hold
    }
    pub fn hold_generation(&self) -> u64 {
        self.hold_generation
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            channel: self.channel,
            sample_rate_hz: self.sample_rate_hz,
            samples: self.window.clone(),
            write_cursor: self.write_cursor,
            holding: self.holding,
            single_latched: self.single_latched,
            enabled: self.enabled,
            revision: self.revision,
        }
    }

    /// Feed one block of samples, in arrival order.
    pub fn ingest(&mut self, block: &[f32]) -> IngestOutcome {
        if block.is_empty() {
            return IngestOutcome::Unchanged;
        }
        let mode = self.trigger.mode;
        if mode == TriggerMode::None {
            self.scroll(block);
            return IngestOutcome::Updated;
        }
        if self.holding {
            return self.hold_fill(block);
        }
        let latched = mode == TriggerMode::Single && self.single_latched;
        if !latched {
            if let Some(index) = self.detector.scan(block, &self.trigger, &mut self.run_state) {
                return self.align(index, block);
            }
        }
        match mode {
            TriggerMode::Auto => {
                self.scroll(block);
                IngestOutcome::Updated
            }
            _ => IngestOutcome::Unchanged,
        }
    }

    /// End the hold cycle `generation`. Stale generations are ignored.
    pub fn release_hold(&mut self, generation: u64) -> bool {
        if !self.holding || generation != self.hold_generation {
            log::trace!(
                "{}: ignoring stale hold release {} (current {})",
                self.channel,
                generation,
                self.hold_generation
            );
            return false;
        }
        self.holding = false;
        log::debug!("{}: hold {} released", self.channel, generation);
        true
    }

    /// Clear the single-shot latch and abandon any hold in progress.
    pub fn reset_single(&mut self) {
        self.single_latched = false;
        self.restart_cycle();
        log::debug!("{}: single-shot reset", self.channel);
    }

    pub fn set_mode(&mut self, mode: TriggerMode) {
        self.trigger.mode = mode;
        self.single_latched = false;
        self.restart_cycle();
        log::info!("{}: trigger mode {:?}", self.channel, mode);
    }

    /// Replace the trigger configuration. Returns `true` if the mode changed, in which case the
    /// hold cycle was abandoned.
    pub fn set_trigger_config(&mut self, config: TriggerConfig) -> bool {
        let mode_changed = config.mode != self.trigger.mode;
        self.trigger = config;
        if mode_changed {
            self.set_mode(config.mode);
        } else {
            self.detector.reset(&mut self.run_state);
        }
        mode_changed
    }

    /// Resize the window for a new time scale, keeping the most recent samples at the end.
    pub fn set_time_scale(&mut self, time_scale: TimeScale) {
        let samples_per_screen = time_scale.samples(self.sample_rate_hz);
        let mut window = vec![0.0; samples_per_screen];
        let keep = self.window.len().min(samples_per_screen);
        window[samples_per_screen - keep..]
            .copy_from_slice(&self.window[self.window.len() - keep..]);
        self.window = window;
        self.time_scale = time_scale;
        self.samples_per_screen = samples_per_screen;
        self.write_cursor = self.write_cursor.min(samples_per_screen);
        self.restart_cycle();
        self.revision += 1;
    }

    pub fn set_hold_duration(&mut self, hold: Duration) {
        self.hold = hold;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.revision += 1;
    }

    fn restart_cycle(&mut self) {
        self.holding = false;
        self.hold_generation += 1;
        self.detector.reset(&mut self.run_state);
    }

    // Free-run: the window always ends with the newest samples.
    fn scroll(&mut self, block: &[f32]) {
        let sps = self.samples_per_screen;
        if block.len() >= sps {
            self.window.copy_from_slice(&block[block.len() - sps..]);
        } else {
            self.window.copy_within(block.len().., 0);
            self.window[sps - block.len()..].copy_from_slice(block);
        }
        self.revision += 1;
    }

    fn align(&mut self, index: usize, block: &[f32]) -> IngestOutcome {
        let sps = self.samples_per_screen;
        self.window.clear();
        self.window.resize(sps, 0.0);
        let copied = (block.len() - index).min(sps);
        self.window[..copied].copy_from_slice(&block[index..index + copied]);
        self.write_cursor = copied;
        self.holding = true;
        self.hold_generation += 1;
        if self.trigger.mode == TriggerMode::Single {
            self.single_latched = true;
        }
        self.detector.reset(&mut self.run_state);
        self.revision += 1;
        log::debug!(
            "{}: triggered at block index {}, hold {} for {:?}",
            self.channel,
            index,
            self.hold_generation,
            self.hold
        );
        IngestOutcome::Triggered {
            index,
            generation: self.hold_generation,
        }
    }

    fn hold_fill(&mut self, block: &[f32]) -> IngestOutcome {
        let space = self.samples_per_screen - self.write_cursor;
        let count = space.min(block.len());
        if count == 0 {
            return IngestOutcome::Unchanged;
        }
        let start = self.write_cursor;
        self.window[start..start + count].copy_from_slice(&block[..count]);
        self.write_cursor += count;
        self.revision += 1;
        IngestOutcome::Updated
    }
}
