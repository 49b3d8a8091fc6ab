use clap::Parser;
use std::path::PathBuf;

use crate::audio::spectrum::StftParams;
use crate::config::{self, AnalysisParams, Config};

#[derive(Parser, Debug)]
#[command(
    name = "specdiff",
    about = "Display differences between the ERB-scale spectra of a project's tracks"
)]
pub struct Cli {
    /// Name of the project where all the stems are stored
    #[arg(long, default_value = "695mixes")]
    pub project: String,

    /// Directory containing one sub-directory per project
    #[arg(long, default_value = "projects")]
    pub projects_dir: PathBuf,

    /// FFT size or number of samples (1000-32768)
    #[arg(long, default_value_t = 32768)]
    pub samples: usize,

    /// Number of ERB bands (10-100)
    #[arg(long, default_value_t = 43)]
    pub erb: usize,

    /// Name of the spectrums graph
    #[arg(long, default_value = "spectrums")]
    pub file: String,

    /// Analysis sample rate; tracks at other rates are resampled
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Lowest band edge in Hz
    #[arg(long, default_value_t = 20.0)]
    pub low_lim: f32,

    /// Highest band edge in Hz (defaults to Nyquist)
    #[arg(long)]
    pub high_lim: Option<f32>,

    /// Hop size as a fraction of the window (H = M / divisor)
    #[arg(long, default_value_t = 64)]
    pub hop_divisor: usize,

    /// Skip tracks that cannot be decoded instead of aborting
    #[arg(long)]
    pub skip_unreadable: bool,

    /// Config file (defaults to specdiff.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also write the analysis data as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Add a panel with the auditory filter responses
    #[arg(long)]
    pub show_filters: bool,

    /// TrueType font for figure titles and legend
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 700)]
    pub height: u32,
}

impl Cli {
    /// Config values apply only where the CLI is still at its default.
    pub fn merge(&mut self, cfg: Config) {
        let a = cfg.analysis;
        if self.samples == config::default_samples() { self.samples = a.samples; }
        if self.erb == config::default_erb_bands() { self.erb = a.erb_bands; }
        if self.sample_rate == config::default_sample_rate() { self.sample_rate = a.sample_rate; }
        if self.low_lim == config::default_low_lim() { self.low_lim = a.low_lim; }
        if self.high_lim.is_none() { self.high_lim = a.high_lim; }
        if self.hop_divisor == config::default_hop_divisor() { self.hop_divisor = a.hop_divisor; }
        if !self.skip_unreadable { self.skip_unreadable = a.skip_unreadable; }

        let o = cfg.output;
        if self.file == config::default_file() { self.file = o.file; }
        if self.width == config::default_width() { self.width = o.width; }
        if self.height == config::default_height() { self.height = o.height; }
        if self.font.is_none() { self.font = o.font; }
        if !self.show_filters { self.show_filters = o.show_filters; }
    }

    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            project: self.project.clone(),
            sample_rate: self.sample_rate,
            stft: StftParams::with_hop_divisor(self.samples, self.hop_divisor),
            bands: self.erb,
            low_lim: self.low_lim,
            high_lim: self.high_lim.unwrap_or(self.sample_rate as f32 / 2.0),
            skip_unreadable: self.skip_unreadable,
        }
    }

    pub fn project_dir(&self) -> PathBuf {
        self.projects_dir.join(&self.project)
    }
}
