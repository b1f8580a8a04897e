// src/scope/mod.rs
pub mod acquisition;
pub mod channel;
pub mod config;
pub mod error;
pub mod fft;
pub mod fifo;
pub mod hold;
pub mod pipeline;
pub mod source;
pub mod trigger;
pub use acquisition::{AcquisitionBuffer, IngestOutcome, WindowSnapshot, WindowStats};
pub use channel::{Channel, Oscilloscope};
pub use config::{
    AmplitudeScale, ChannelSettings, PulseTiming, ScopeSettings, SpectralSettings, TimeBase,
    TimeScale, TriggerConfig, TriggerMode, TriggerType,
};
pub use error::ScopeError;
pub use fft::{FrequencySpectrum, SpectralTransform};
pub use fifo::FifoAccumulator;
pub use hold::HoldTimer;
pub use pipeline::SpectralPipeline;
pub use source::{decode_pcm16, BlockSource, ManualSource, PcmReader};
pub use trigger::{TriggerDetector, TriggerRunState};
