use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::erb::BankParams;
use crate::audio::spectrum::StftParams;
use crate::error::{AnalysisError, Result};

pub const MIN_SAMPLES: usize = 1000;
pub const MAX_SAMPLES: usize = 32768;
pub const MIN_ERB_BANDS: usize = 10;
pub const MAX_ERB_BANDS: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_erb_bands")]
    pub erb_bands: usize,
    #[serde(default = "default_low_lim")]
    pub low_lim: f32,
    /// Defaults to Nyquist when absent.
    #[serde(default)]
    pub high_lim: Option<f32>,
    #[serde(default = "default_hop_divisor")]
    pub hop_divisor: usize,
    #[serde(default)]
    pub skip_unreadable: bool,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_file")]
    pub file: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub show_filters: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            samples: default_samples(),
            erb_bands: default_erb_bands(),
            low_lim: default_low_lim(),
            high_lim: None,
            hop_divisor: default_hop_divisor(),
            skip_unreadable: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
            width: default_width(),
            height: default_height(),
            font: None,
            show_filters: false,
        }
    }
}

pub fn default_sample_rate() -> u32 { 44100 }
pub fn default_samples() -> usize { 32768 }
pub fn default_erb_bands() -> usize { 43 }
pub fn default_low_lim() -> f32 { 20.0 }
pub fn default_hop_divisor() -> usize { 64 }
pub fn default_file() -> String { "spectrums".into() }
pub fn default_width() -> u32 { 1200 }
pub fn default_height() -> u32 { 700 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// Everything a run needs, resolved from CLI and config.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisParams {
    pub project: String,
    pub sample_rate: u32,
    pub stft: StftParams,
    pub bands: usize,
    pub low_lim: f32,
    pub high_lim: f32,
    pub skip_unreadable: bool,
}

impl AnalysisParams {
    /// Reject out-of-range values before any track is touched.
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(AnalysisError::Config("a project name must be given".into()));
        }
        if self.sample_rate == 0 {
            return Err(AnalysisError::Config("sample rate must be positive".into()));
        }
        if !(MIN_SAMPLES..=MAX_SAMPLES).contains(&self.stft.fft_size) {
            return Err(AnalysisError::Config(format!(
                "number of samples {} is out of bounds ({}-{})",
                self.stft.fft_size, MIN_SAMPLES, MAX_SAMPLES
            )));
        }
        if !(MIN_ERB_BANDS..=MAX_ERB_BANDS).contains(&self.bands) {
            return Err(AnalysisError::Config(format!(
                "number of ERB bands {} is out of bounds ({}-{})",
                self.bands, MIN_ERB_BANDS, MAX_ERB_BANDS
            )));
        }
        self.stft
            .validate()
            .and_then(|_| self.bank_params().validate())
            .map_err(|e| match e {
                AnalysisError::InvalidParameter(msg) => AnalysisError::Config(msg),
                other => other,
            })
    }

    pub fn bank_params(&self) -> BankParams {
        BankParams {
            sample_rate: self.sample_rate,
            fft_size: self.stft.fft_size,
            bands: self.bands,
            low_lim: self.low_lim,
            high_lim: self.high_lim,
        }
    }
}
