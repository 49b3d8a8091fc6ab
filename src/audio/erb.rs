//! ERB-scale filter bank (Glasberg & Moore 1990).
//!
//! Both the ERB-number scale and the bandwidth formula use the same
//! parameterization:
//!
//! * ERB number: `21.4 * log10(1 + 4.37e-3 * f)`
//! * ERB bandwidth: `24.7 * (4.37e-3 * f + 1)`
//!
//! Band amplitudes are point samples of the spectrum at the bin nearest to
//! each band centre. The filter responses built by [`ErbBank::filter_responses`]
//! are for display only and do not weight the extracted amplitudes.

use std::f32::consts::LN_10;

use super::spectrum::normalize_peak;
use crate::error::{AnalysisError, Result};

const ERB_SCALE: f32 = 21.4;
const ERB_SLOPE: f32 = 4.37e-3;
const ERB_MIN_BW: f32 = 24.7;

/// Converts frequency [Hz] to ERB-rate value.
#[inline]
pub fn hz_to_erb(f_hz: f32) -> f32 {
    ERB_SCALE * ((ERB_SLOPE * f_hz + 1.0).ln() / LN_10)
}

/// Converts ERB-rate value to frequency [Hz].
#[inline]
pub fn erb_to_hz(e: f32) -> f32 {
    (((e / ERB_SCALE) * LN_10).exp() - 1.0) / ERB_SLOPE
}

/// ERB bandwidth in Hz of the auditory filter centred at `f_hz`.
#[inline]
pub fn erb_bandwidth(f_hz: f32) -> f32 {
    ERB_MIN_BW * (ERB_SLOPE * f_hz + 1.0)
}

/// Identifies a band bank. Two runs with equal params build identical banks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BankParams {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub bands: usize,
    pub low_lim: f32,
    pub high_lim: f32,
}

impl BankParams {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AnalysisError::InvalidParameter("sample rate must be positive".into()));
        }
        if self.fft_size == 0 {
            return Err(AnalysisError::InvalidParameter("fft size must be positive".into()));
        }
        if self.bands < 1 {
            return Err(AnalysisError::InvalidParameter("at least one ERB band is required".into()));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if !(self.low_lim > 0.0 && self.low_lim < self.high_lim) {
            return Err(AnalysisError::InvalidParameter(format!(
                "need 0 < low_lim < high_lim (got {} and {})",
                self.low_lim, self.high_lim
            )));
        }
        if self.high_lim > nyquist {
            return Err(AnalysisError::InvalidParameter(format!(
                "high_lim {} exceeds Nyquist {}",
                self.high_lim, nyquist
            )));
        }
        Ok(())
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

/// ERB band layout over a linear FFT frequency axis. Track-independent:
/// build once per run and share across tracks.
#[derive(Clone, Debug)]
pub struct ErbBank {
    params: BankParams,
    /// B + 1 band edges in Hz, equally spaced on the ERB-number scale.
    pub edges: Vec<f32>,
    pub center_freqs: Vec<f32>,
    pub bandwidths: Vec<f32>,
    /// Spectrum bin nearest each centre frequency.
    pub bin_indices: Vec<usize>,
    /// Frequency of every spectrum bin, `k * sample_rate / N`.
    pub freqs: Vec<f32>,
}

/// Normalized per-band amplitudes for one track.
#[derive(Clone, Debug, PartialEq)]
pub struct BandAmplitudes {
    pub amplitudes: Vec<f32>,
    /// Every sampled bin was zero; amplitudes were left unnormalized.
    pub degenerate: bool,
}

impl ErbBank {
    pub fn new(params: BankParams) -> Result<Self> {
        params.validate()?;

        let erb_low = hz_to_erb(params.low_lim);
        let erb_high = hz_to_erb(params.high_lim);
        let step = (erb_high - erb_low) / params.bands as f32;

        let erb_edges: Vec<f32> = (0..=params.bands)
            .map(|i| erb_low + step * i as f32)
            .collect();

        let mut edges: Vec<f32> = erb_edges.iter().map(|&e| erb_to_hz(e)).collect();
        // Pin the outer edges to the requested limits.
        edges[0] = params.low_lim;
        edges[params.bands] = params.high_lim;

        let center_freqs: Vec<f32> = erb_edges
            .windows(2)
            .map(|w| erb_to_hz(0.5 * (w[0] + w[1])))
            .collect();
        let bandwidths = center_freqs.iter().map(|&fc| erb_bandwidth(fc)).collect();

        let num_bins = params.num_bins();
        let bin_hz = params.sample_rate as f32 / params.fft_size as f32;
        let freqs: Vec<f32> = (0..num_bins).map(|k| k as f32 * bin_hz).collect();
        let bin_indices = center_freqs
            .iter()
            .map(|&fc| ((fc / bin_hz).round() as usize).min(num_bins - 1))
            .collect();

        Ok(Self {
            params,
            edges,
            center_freqs,
            bandwidths,
            bin_indices,
            freqs,
        })
    }

    pub fn params(&self) -> BankParams {
        self.params
    }

    pub fn num_bands(&self) -> usize {
        self.center_freqs.len()
    }

    pub fn num_bins(&self) -> usize {
        self.freqs.len()
    }

    /// Sample `spectrum` at each band's bin and renormalize to a peak of 1.0.
    pub fn map(&self, spectrum: &[f32]) -> Result<BandAmplitudes> {
        if spectrum.len() != self.num_bins() {
            return Err(AnalysisError::SpectrumLength {
                expected: self.num_bins(),
                actual: spectrum.len(),
            });
        }

        let sampled: Vec<f64> = self
            .bin_indices
            .iter()
            .map(|&k| spectrum[k] as f64)
            .collect();
        let (amplitudes, degenerate) = normalize_peak(&sampled);
        Ok(BandAmplitudes {
            amplitudes,
            degenerate,
        })
    }

    /// Rounded-exponential roex(p) response of every band over the frequency axis.
    pub fn filter_responses(&self) -> Vec<Vec<f32>> {
        self.center_freqs
            .iter()
            .zip(&self.bandwidths)
            .map(|(&fc, &bw)| {
                let p = 4.0 * fc / bw;
                self.freqs
                    .iter()
                    .map(|&f| {
                        let g = (f - fc).abs() / fc;
                        (1.0 + p * g) * (-p * g).exp()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Result of mapping one spectrum onto an ERB bank.
#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq)]
pub struct ErbMapping {
    pub amplitudes: Vec<f32>,
    pub bandwidths: Vec<f32>,
    pub center_freqs: Vec<f32>,
    pub bin_indices: Vec<usize>,
    pub degenerate: bool,
}

/// One-shot mapping of a K-bin spectrum. The transform size is taken as
/// N = 2 * (K - 1).
#[allow(dead_code)]
pub fn map_to_erb(
    spectrum: &[f32],
    num_bins: usize,
    sample_rate: u32,
    bands: usize,
    low_lim: f32,
    high_lim: f32,
) -> Result<ErbMapping> {
    if num_bins < 2 {
        return Err(AnalysisError::InvalidParameter(format!(
            "spectrum needs at least 2 bins, got {}",
            num_bins
        )));
    }
    let bank = ErbBank::new(BankParams {
        sample_rate,
        fft_size: 2 * (num_bins - 1),
        bands,
        low_lim,
        high_lim,
    })?;
    let BandAmplitudes {
        amplitudes,
        degenerate,
    } = bank.map(spectrum)?;

    Ok(ErbMapping {
        amplitudes,
        bandwidths: bank.bandwidths,
        center_freqs: bank.center_freqs,
        bin_indices: bank.bin_indices,
        degenerate,
    })
}
