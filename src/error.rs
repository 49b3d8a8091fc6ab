use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the analysis core.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Out-of-range or missing run parameters. Fatal, raised before any track work.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("spectrum has {actual} bins, band bank expects {expected}")]
    SpectrumLength { expected: usize, actual: usize },

    #[error("no .wav files found in {}", .0.display())]
    NoTracks(PathBuf),
}

impl AnalysisError {
    /// Per-track failures are the only ones eligible for skip-and-continue.
    pub fn is_track_local(&self) -> bool {
        matches!(self, AnalysisError::Load { .. } | AnalysisError::Resample(_))
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AnalysisError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
