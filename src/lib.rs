//! Two-channel triggered oscilloscope core with a spectral view.
//!
//! Capture workers push sample blocks into an [`scope::Oscilloscope`]; a renderer pulls
//! [`scope::WindowSnapshot`]s and [`scope::FrequencySpectrum`]s from it at its own pace.

pub mod engine;
pub mod scope;
pub mod types;
