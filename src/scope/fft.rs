use std::sync::Arc;
use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use crate::scope::ScopeError;
/// Magnitude spectrum of one channel.
#[derive(Clone, Debug)]
pub struct FrequencySpectrum {
    pub sample_rate_hz: f32,
    pub window_size: usize,
    pub magnitudes: Vec<f32>, // bins [0, window_size / 2)
}
impl FrequencySpectrum {
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate_hz / self.window_size as f32
    }
    pub fn frequency_of(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width_hz()
    }
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
    }
    pub fn peak_frequency_hz(&self) -> Option<f32> {
        self.peak_bin().map(|bin| self.frequency_of(bin))
    }
}
/// Forward transform of a fixed-size window with a rectangular window function.
///
/// Magnitudes are scaled by `1 / sqrt(N)`.
pub struct SpectralTransform {
    window_size: usize,
    fft: Arc<dyn Fft<f32>>,
}
impl SpectralTransform {
    pub fn with_size(window_size: usize) -> Result<Self, ScopeError> {
        if window_size == 0 || window_size % 2 != 0 {
            return Err(ScopeError::InvalidWindowSize(window_size));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        Ok(Self { window_size, fft })
    }
    pub fn window_size(&self) -> usize {
        self.window_size
    }
    /// Transform the first `N` samples of `history`, zero-padding at the end when it is short.
    pub fn process(&self, history: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex32> = history
            .iter()
            .copied()
            .take(self.window_size)
            .map(|v| Complex32::new(v, 0.0))
            .collect();
        buffer.resize(self.window_size, Complex32::new(0.0, 0.0));
        self.fft.process(&mut buffer);
        let scale = 1.0 / (self.window_size as f32).sqrt();
        buffer
            .iter()
            .take(self.window_size / 2)
            .map(|c| c.norm() * scale)
            .collect()
    }
    pub fn spectrum(&self, history: &[f32], sample_rate_hz: f32) -> FrequencySpectrum {
        FrequencySpectrum {
            sample_rate_hz,
            window_size: self.window_size,
            magnitudes: self.process(history),
        }
    }
}
