//! Acquisition, trigger and spectral configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scope::ScopeError;
use crate::types::ChannelId;

pub const DEFAULT_SAMPLE_RATE_HZ: f32 = 48_000.0;
pub const MIN_TIME_SCALE_SECS: f32 = 0.001;
pub const MAX_TIME_SCALE_SECS: f32 = 10.0;
pub const DEFAULT_HOLD_MS: u64 = 3_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Free-running scroll, the detector is not consulted.
    #[default]
    None,
    /// Trigger when possible, scroll freely otherwise.
    Auto,
    /// Trigger only; the display freezes between triggers.
    Normal,
    /// One trigger, then latched until an explicit reset.
    Single,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerType {
    #[default]
    RisingEdge,
    FallingEdge,
    Level,
    Pulse,
    Slope,
}

/// How the pulse rule measures the time between its two level crossings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PulseTiming {
    /// Count samples and divide by the sample rate. Deterministic.
    #[default]
    SampleCount,
    /// Read the host clock at each crossing. Sensitive to scheduling jitter.
    WallClock,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub mode: TriggerMode,
    pub kind: TriggerType,
    pub level: f32,
    /// Pulse rule only.
    pub pulse_min_ms: f64,
    /// Pulse rule only.
    pub pulse_max_ms: f64,
    /// Slope rule only, in units per second.
    pub slope_threshold: f32,
    /// Slope rule only, seconds between samples.
    pub sample_interval: f32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: TriggerMode::None,
            kind: TriggerType::RisingEdge,
            level: 0.3,
            pulse_min_ms: 1.0,
            pulse_max_ms: 1000.0,
            slope_threshold: 0.5,
            sample_interval: 0.001,
        }
    }
}

impl TriggerConfig {
    /// Checks the constraints a host has to enforce before handing a config to a channel.
    ///
    /// The trigger path itself accepts any values; inconsistent pulse bounds simply never fire.
    pub fn validate(&self) -> Result<(), ScopeError> {
        validate_pulse_bounds(self.pulse_min_ms, self.pulse_max_ms)?;
        validate_slope(self.slope_threshold, self.sample_interval)
    }
}

pub fn validate_pulse_bounds(min_ms: f64, max_ms: f64) -> Result<(), ScopeError> {
    if min_ms >= 1.0 && min_ms < max_ms {
        Ok(())
    } else {
        Err(ScopeError::InvalidPulseBounds { min_ms, max_ms })
    }
}

pub fn validate_slope(threshold: f32, interval: f32) -> Result<(), ScopeError> {
    if threshold > 0.0 && interval > 0.0 {
        Ok(())
    } else {
        Err(ScopeError::InvalidSlope { threshold, interval })
    }
}

/// Horizontal span of the display window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct TimeScale {
    seconds: f32,
}

impl TimeScale {
    pub fn new(seconds: f32) -> Result<Self, ScopeError> {
        if !(MIN_TIME_SCALE_SECS..=MAX_TIME_SCALE_SECS).contains(&seconds) {
            return Err(ScopeError::TimeScaleOutOfRange {
                min: MIN_TIME_SCALE_SECS,
                max: MAX_TIME_SCALE_SECS,
                actual: seconds,
            });
        }
        Ok(Self { seconds })
    }
    pub fn seconds(&self) -> f32 {
        self.seconds
    }
    /// Number of samples the window spans at `sample_rate_hz`.
    pub fn samples(&self, sample_rate_hz: f32) -> usize {
        ((self.seconds * sample_rate_hz).round() as usize).max(1)
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        TimeScale { seconds: 1.0 }
    }
}

impl TryFrom<f32> for TimeScale {
    type Error = ScopeError;
    fn try_from(seconds: f32) -> Result<Self, Self::Error> {
        TimeScale::new(seconds)
    }
}

impl From<TimeScale> for f32 {
    fn from(scale: TimeScale) -> Self {
        scale.seconds
    }
}

/// Time-base presets, each paired with the hold duration that lets a full window fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBase {
    Ms1,
    Ms10,
    Ms50,
    Ms100,
    Ms500,
    S1,
    S5,
    S10,
}

impl TimeBase {
    pub const ALL: [TimeBase; 8] = [
        TimeBase::Ms1,
        TimeBase::Ms10,
        TimeBase::Ms50,
        TimeBase::Ms100,
        TimeBase::Ms500,
        TimeBase::S1,
        TimeBase::S5,
        TimeBase::S10,
    ];

    pub fn time_scale(self) -> TimeScale {
        let seconds = match self {
            TimeBase::Ms1 => 0.001,
            TimeBase::Ms10 => 0.010,
            TimeBase::Ms50 => 0.050,
            TimeBase::Ms100 => 0.100,
            TimeBase::Ms500 => 0.500,
            TimeBase::S1 => 1.0,
            TimeBase::S5 => 5.0,
            TimeBase::S10 => 10.0,
        };
        TimeScale { seconds }
    }

    pub fn hold(self) -> Duration {
        match self {
            TimeBase::S5 => Duration::from_millis(8_000),
            TimeBase::S10 => Duration::from_millis(13_000),
            _ => Duration::from_millis(DEFAULT_HOLD_MS),
        }
    }
}

/// Vertical zoom handed through to the renderer, in volts per half screen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct AmplitudeScale(f32);

impl AmplitudeScale {
    pub fn new(volts: f32) -> Result<Self, ScopeError> {
        if volts > 0.0 && volts.is_finite() {
            Ok(Self(volts))
        } else {
            Err(ScopeError::InvalidAmplitudeScale(volts))
        }
    }
    pub fn volts(&self) -> f32 {
        self.0
    }
}

impl Default for AmplitudeScale {
    fn default() -> Self {
        AmplitudeScale(1.0)
    }
}

impl TryFrom<f32> for AmplitudeScale {
    type Error = ScopeError;
    fn try_from(volts: f32) -> Result<Self, Self::Error> {
        AmplitudeScale::new(volts)
    }
}

impl From<AmplitudeScale> for f32 {
    fn from(scale: AmplitudeScale) -> Self {
        scale.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub enabled: bool,
    pub trigger: TriggerConfig,
    pub hold_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: TriggerConfig::default(),
            hold_ms: DEFAULT_HOLD_MS,
        }
    }
}

impl ChannelSettings {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralSettings {
    pub source: ChannelId,
    pub fifo_capacity: usize,
    pub block_size: usize,
    pub window_size: usize,
}

impl Default for SpectralSettings {
    fn default() -> Self {
        Self {
            source: ChannelId::One,
            fifo_capacity: 48_000,
            block_size: 4_800,
            window_size: 4_096,
        }
    }
}

impl SpectralSettings {
    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.block_size == 0 || self.block_size > self.fifo_capacity {
            return Err(ScopeError::InvalidFifoGeometry {
                capacity: self.fifo_capacity,
                block_size: self.block_size,
            });
        }
        if self.window_size == 0 || self.window_size % 2 != 0 {
            return Err(ScopeError::InvalidWindowSize(self.window_size));
        }
        Ok(())
    }
}

/// Everything a host needs to bring up an [`Oscilloscope`](crate::scope::Oscilloscope).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSettings {
    pub sample_rate_hz: f32,
    pub time_scale: TimeScale,
    pub amplitude_scale: AmplitudeScale,
    pub pulse_timing: PulseTiming,
    pub channels: [ChannelSettings; 2],
    pub spectral: SpectralSettings,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            time_scale: TimeScale::default(),
            amplitude_scale: AmplitudeScale::default(),
            pulse_timing: PulseTiming::default(),
            channels: [ChannelSettings::default(); 2],
            spectral: SpectralSettings::default(),
        }
    }
}

impl ScopeSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ScopeError> {
        let settings: ScopeSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScopeError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
    pub fn to_json_string(&self) -> Result<String, ScopeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
    pub fn validate(&self) -> Result<(), ScopeError> {
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(ScopeError::InvalidSampleRate);
        }
        self.spectral.validate()
    }
    pub fn channel(&self, id: ChannelId) -> &ChannelSettings {
        &self.channels[id.index()]
    }
    pub fn samples_per_screen(&self) -> usize {
        self.time_scale.samples(self.sample_rate_hz)
    }
}
