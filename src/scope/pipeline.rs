use crate::scope::config::SpectralSettings;
use crate::scope::error::ScopeError;
use crate::scope::fft::{FrequencySpectrum, SpectralTransform};
use crate::scope::fifo::FifoAccumulator;
use crate::types::ChannelId;
/// Rolling history of the selected channel plus the transform that turns it into a spectrum.
pub struct SpectralPipeline {
    source: ChannelId,
    sample_rate_hz: f32,
    history: FifoAccumulator,
    transform: SpectralTransform,
}
impl SpectralPipeline {
    pub fn new(settings: &SpectralSettings, sample_rate_hz: f32) -> Result<Self, ScopeError> {
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(ScopeError::InvalidSampleRate);
        }
        Ok(Self {
            source: settings.source,
            sample_rate_hz,
            history: FifoAccumulator::new(settings.fifo_capacity, settings.block_size)?,
            transform: SpectralTransform::with_size(settings.window_size)?,
        })
    }
    pub fn source(&self) -> ChannelId {
        self.source
    }
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
    pub fn block_size(&self) -> usize {
        self.history.block_size()
    }
    /// Select the channel feeding the spectrum. The history is discarded so it never mixes
    /// samples from two channels.
    pub fn set_source(&mut self, source: ChannelId) {
        if source != self.source {
            self.source = source;
            self.history.clear();
            log::info!("spectral source switched to {}", source);
        }
    }
    /// Offer a block from `channel`. Blocks from any other channel than the source are
    /// ignored and `Ok(false)` is returned.
    pub fn push(&mut self, channel: ChannelId, block: &[f32]) -> Result<bool, ScopeError> {
        if channel != self.source {
            return Ok(false);
        }
        self.history.append(block)?;
        Ok(true)
    }
    pub fn history(&self) -> Vec<f32> {
        self.history.contents()
    }
    pub fn spectrum(&self) -> FrequencySpectrum {
        self.transform
            .spectrum(&self.history.contents(), self.sample_rate_hz)
    }
    pub fn clear(&mut self) {
        self.history.clear();
    }
}
