//! Thread-safe channels and the two-channel oscilloscope facade.
//!
//! Every channel owns its own lock, so a producer stuck on one channel never stalls the
//! other. The spectral pipeline has a separate lock shared by whichever channel feeds it and
//! the consumer pulling spectra. The only nested locking is a time-scale change, which takes
//! the scope's time-scale lock and then each channel lock in turn.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::scope::acquisition::{AcquisitionBuffer, IngestOutcome, WindowSnapshot};
use crate::scope::config::{
    validate_pulse_bounds, validate_slope, AmplitudeScale, ChannelSettings, PulseTiming,
    ScopeSettings, TimeBase, TimeScale, TriggerConfig, TriggerMode, TriggerType,
};
use crate::scope::fft::FrequencySpectrum;
use crate::scope::hold::HoldTimer;
use crate::scope::pipeline::SpectralPipeline;
use crate::scope::ScopeError;
use crate::types::ChannelId;

// Guarded state is consistent between operations, so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One acquisition channel: its display window behind a lock, plus its hold timer.
pub struct Channel {
    id: ChannelId,
    state: Arc<Mutex<AcquisitionBuffer>>,
    timer: HoldTimer,
    redraw: Arc<AtomicBool>,
}

impl Channel {
    pub fn new(
        id: ChannelId,
        sample_rate_hz: f32,
        time_scale: TimeScale,
        pulse_timing: PulseTiming,
        settings: &ChannelSettings,
    ) -> Result<Self, ScopeError> {
        let mut buffer = AcquisitionBuffer::new(id, sample_rate_hz, time_scale, pulse_timing);
        buffer.set_trigger_config(settings.trigger);
        buffer.set_hold_duration(settings.hold());
        buffer.set_enabled(settings.enabled);
        let state = Arc::new(Mutex::new(buffer));
        let redraw = Arc::new(AtomicBool::new(true));

        let weak = Arc::downgrade(&state);
        let released = Arc::clone(&redraw);
        let timer = HoldTimer::spawn(&id.to_string(), move |generation| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            if lock(&state).release_hold(generation) {
                released.store(true, Ordering::Release);
            }
        })?;

        Ok(Self {
            id,
            state,
            timer,
            redraw,
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Feed one block. Blocks of one channel must arrive in order.
    pub fn ingest(&self, block: &[f32]) -> IngestOutcome {
        let mut buffer = lock(&self.state);
        let outcome = buffer.ingest(block);
        if let IngestOutcome::Triggered { generation, .. } = outcome {
            // Started under the lock so a concurrent cancel cannot overtake it.
            self.timer.start(buffer.hold_duration(), generation);
        }
        drop(buffer);
        if outcome.changed() {
            self.redraw.store(true, Ordering::Release);
        }
        outcome
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        lock(&self.state).snapshot()
    }

    /// Returns whether the window or its hold state changed since the last call.
    pub fn take_redraw(&self) -> bool {
        self.redraw.swap(false, Ordering::AcqRel)
    }

    pub fn is_holding(&self) -> bool {
        lock(&self.state).is_holding()
    }

    pub fn is_single_latched(&self) -> bool {
        lock(&self.state).is_single_latched()
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        *lock(&self.state).trigger_config()
    }

    pub fn samples_per_screen(&self) -> usize {
        lock(&self.state).samples_per_screen()
    }

    pub fn reset_single(&self) {
        let mut buffer = lock(&self.state);
        buffer.reset_single();
        self.timer.cancel();
    }

    pub fn set_trigger_config(&self, config: TriggerConfig) {
        self.update_trigger(|current| *current = config);
    }

    /// Edit the trigger configuration in place. A mode change cancels the pending hold.
    pub fn update_trigger(&self, edit: impl FnOnce(&mut TriggerConfig)) {
        let mut buffer = lock(&self.state);
        let mut config = *buffer.trigger_config();
        edit(&mut config);
        if buffer.set_trigger_config(config) {
            self.timer.cancel();
        }
    }

    pub fn set_time_scale(&self, time_scale: TimeScale) {
        let mut buffer = lock(&self.state);
        buffer.set_time_scale(time_scale);
        self.timer.cancel();
        drop(buffer);
        self.redraw.store(true, Ordering::Release);
    }

    pub fn set_hold_duration(&self, hold: Duration) {
        lock(&self.state).set_hold_duration(hold);
    }

    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.state).set_enabled(enabled);
        self.redraw.store(true, Ordering::Release);
    }
}

/// Two acquisition channels and the spectral view of one of them.
///
/// All methods take `&self`; share the scope between capture workers and the renderer
/// with an `Arc`.
pub struct Oscilloscope {
    sample_rate_hz: f32,
    channels: [Channel; 2],
    spectral: Mutex<SpectralPipeline>,
    time_scale: Mutex<TimeScale>,
    amplitude_scale: AtomicU32,
    running: AtomicBool,
    rejected_blocks: AtomicU64,
}

impl Oscilloscope {
    pub fn new(settings: &ScopeSettings) -> Result<Self, ScopeError> {
        settings.validate()?;
        let channel = |id: ChannelId| {
            Channel::new(
                id,
                settings.sample_rate_hz,
                settings.time_scale,
                settings.pulse_timing,
                settings.channel(id),
            )
        };
        let channels = [channel(ChannelId::One)?, channel(ChannelId::Two)?];
        let spectral = SpectralPipeline::new(&settings.spectral, settings.sample_rate_hz)?;
        log::info!(
            "oscilloscope ready: {} Hz, {} samples per screen, spectrum of {}",
            settings.sample_rate_hz,
            settings.samples_per_screen(),
            settings.spectral.source
        );
        Ok(Self {
            sample_rate_hz: settings.sample_rate_hz,
            channels,
            spectral: Mutex::new(spectral),
            time_scale: Mutex::new(settings.time_scale),
            amplitude_scale: AtomicU32::new(settings.amplitude_scale.volts().to_bits()),
            running: AtomicBool::new(true),
            rejected_blocks: AtomicU64::new(0),
        })
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate_hz
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    /// Entry point for capture workers. Never fails: a block the spectral path cannot take is
    /// logged and counted, and the display path still sees it.
    pub fn ingest(&self, id: ChannelId, block: &[f32]) -> IngestOutcome {
        if block.is_empty() {
            return IngestOutcome::Unchanged;
        }
        if self.is_running() {
            if let Err(err) = lock(&self.spectral).push(id, block) {
                self.rejected_blocks.fetch_add(1, Ordering::Relaxed);
                log::warn!("{}: spectral block rejected: {}", id, err);
            }
        }
        self.channel(id).ingest(block)
    }

    pub fn snapshot(&self, id: ChannelId) -> WindowSnapshot {
        self.channel(id).snapshot()
    }

    pub fn spectrum(&self) -> FrequencySpectrum {
        lock(&self.spectral).spectrum()
    }

    pub fn spectral_source(&self) -> ChannelId {
        lock(&self.spectral).source()
    }

    pub fn set_spectral_source(&self, id: ChannelId) {
        lock(&self.spectral).set_source(id);
    }

    pub fn rejected_blocks(&self) -> u64 {
        self.rejected_blocks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Gate the spectral path. Stopping also clears the single-shot latch of channel 1.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
        if !running {
            self.channel(ChannelId::One).reset_single();
        }
        log::info!("acquisition {}", if running { "running" } else { "stopped" });
    }

    pub fn time_scale(&self) -> TimeScale {
        *lock(&self.time_scale)
    }

    pub fn samples_per_screen(&self) -> usize {
        self.time_scale().samples(self.sample_rate_hz)
    }

    /// Set the window span of both channels. Out-of-range values leave everything unchanged.
    pub fn set_time_scale(&self, seconds: f32) -> Result<(), ScopeError> {
        let time_scale = TimeScale::new(seconds)?;
        self.apply_time_scale(time_scale);
        Ok(())
    }

    /// Apply a preset time base together with its hold duration on both channels.
    pub fn apply_time_base(&self, preset: TimeBase) {
        self.apply_time_scale(preset.time_scale());
        for channel in &self.channels {
            channel.set_hold_duration(preset.hold());
        }
    }

    fn apply_time_scale(&self, time_scale: TimeScale) {
        let mut current = lock(&self.time_scale);
        *current = time_scale;
        for channel in &self.channels {
            channel.set_time_scale(time_scale);
        }
        log::info!(
            "time scale {} s ({} samples per screen)",
            time_scale.seconds(),
            time_scale.samples(self.sample_rate_hz)
        );
    }

    pub fn amplitude_scale(&self) -> AmplitudeScale {
        let volts = f32::from_bits(self.amplitude_scale.load(Ordering::Relaxed));
        AmplitudeScale::new(volts).unwrap_or_default()
    }

    pub fn set_amplitude_scale(&self, volts: f32) -> Result<(), ScopeError> {
        let scale = AmplitudeScale::new(volts)?;
        self.amplitude_scale
            .store(scale.volts().to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn set_channel_enabled(&self, id: ChannelId, enabled: bool) {
        self.channel(id).set_enabled(enabled);
    }

    pub fn set_trigger_config(&self, id: ChannelId, config: TriggerConfig) {
        self.channel(id).set_trigger_config(config);
    }

    pub fn set_trigger_mode(&self, id: ChannelId, mode: TriggerMode) {
        self.channel(id).update_trigger(|cfg| cfg.mode = mode);
    }

    pub fn set_trigger_type(&self, id: ChannelId, kind: TriggerType) {
        self.channel(id).update_trigger(|cfg| cfg.kind = kind);
    }

    pub fn set_trigger_level(&self, id: ChannelId, level: f32) {
        self.channel(id).update_trigger(|cfg| cfg.level = level);
    }

    pub fn set_pulse_bounds(
        &self,
        id: ChannelId,
        min_ms: f64,
        max_ms: f64,
    ) -> Result<(), ScopeError> {
        validate_pulse_bounds(min_ms, max_ms)?;
        self.channel(id).update_trigger(|cfg| {
            cfg.pulse_min_ms = min_ms;
            cfg.pulse_max_ms = max_ms;
        });
        Ok(())
    }

    pub fn set_slope(
        &self,
        id: ChannelId,
        threshold: f32,
        sample_interval: f32,
    ) -> Result<(), ScopeError> {
        validate_slope(threshold, sample_interval)?;
        self.channel(id).update_trigger(|cfg| {
            cfg.slope_threshold = threshold;
            cfg.sample_interval = sample_interval;
        });
        Ok(())
    }

    pub fn set_hold_duration(&self, id: ChannelId, hold: Duration) {
        self.channel(id).set_hold_duration(hold);
    }

    pub fn reset_single(&self, id: ChannelId) {
        self.channel(id).reset_single();
    }
}
