use rustfft::{num_complex::Complex, FftPlanner};
use std::path::Path;

use super::decode::load_waveform;
use crate::error::{AnalysisError, Result};

/// Short-time Fourier transform framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StftParams {
    /// Transform size N.
    pub fft_size: usize,
    /// Analysis window length M (M <= N).
    pub window_size: usize,
    /// Hop H between successive frames.
    pub hop_size: usize,
}

impl StftParams {
    /// N = M, H = M / `hop_divisor`. A zero divisor, or one larger than N,
    /// yields H = 0, which `validate` rejects.
    pub fn with_hop_divisor(fft_size: usize, hop_divisor: usize) -> Self {
        Self {
            fft_size,
            window_size: fft_size,
            hop_size: fft_size.checked_div(hop_divisor).unwrap_or(0),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_size == 0 || self.window_size == 0 || self.hop_size == 0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "fft size, window size and hop size must be positive (got N={}, M={}, H={})",
                self.fft_size, self.window_size, self.hop_size
            )));
        }
        if self.window_size > self.fft_size {
            return Err(AnalysisError::InvalidParameter(format!(
                "window size {} exceeds fft size {}",
                self.window_size, self.fft_size
            )));
        }
        Ok(())
    }

    /// Number of spectrum bins K = N/2 + 1.
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

/// Time-averaged magnitude spectrum of one track, peak-normalized to 1.0.
#[derive(Clone, Debug)]
pub struct Spectrum {
    pub magnitudes: Vec<f32>,
    pub sample_rate: u32,
    pub fft_size: usize,
    /// STFT frames that went into the average.
    pub frames: usize,
    /// The input was silent: magnitudes are all zero and were not normalized.
    pub degenerate: bool,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.fft_size as f32
    }

    /// Index of the loudest bin (first one on ties).
    pub fn peak_bin(&self) -> usize {
        self.magnitudes
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &m)| if m > best.1 { (i, m) } else { best })
            .0
    }
}

/// Load a waveform at `sample_rate` and compute its normalized average spectrum.
pub fn analyze(path: &Path, sample_rate: u32, params: StftParams) -> Result<Spectrum> {
    params.validate()?;
    let wave = load_waveform(path, sample_rate)?;
    analyze_samples(&wave.samples, wave.sample_rate, params)
}

/// Hann-windowed STFT magnitude, averaged bin-by-bin over all frames,
/// divided by the window sum and normalized by its own maximum.
///
/// Frames are centred: the signal is zero-padded by N/2 on both sides, and
/// the M-sample window sits in the middle of each N-sample frame.
pub fn analyze_samples(samples: &[f32], sample_rate: u32, params: StftParams) -> Result<Spectrum> {
    params.validate()?;
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidParameter("sample rate must be positive".into()));
    }

    let n = params.fft_size;
    let num_bins = params.num_bins();

    let window = hann_window(params.window_size);
    let window_sum: f64 = window.iter().map(|&w| w as f64).sum();
    let offset = (n - params.window_size) / 2;
    let mut frame_window = vec![0.0f32; n];
    frame_window[offset..offset + params.window_size].copy_from_slice(&window);

    let pad = n / 2;
    let padded_len = (samples.len() + 2 * pad).max(n);
    let mut padded = vec![0.0f32; padded_len];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let num_frames = 1 + (padded_len - n) / params.hop_size;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n];
    let mut scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];
    let mut accum = vec![0.0f64; num_bins];

    for frame in 0..num_frames {
        let start = frame * params.hop_size;
        for (slot, (&s, &w)) in buffer
            .iter_mut()
            .zip(padded[start..start + n].iter().zip(frame_window.iter()))
        {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);

        for (acc, c) in accum.iter_mut().zip(buffer[..num_bins].iter()) {
            *acc += c.norm() as f64;
        }
    }

    // Average over frames, compensate for window gain.
    let scale = 1.0 / (num_frames as f64 * window_sum.max(f64::MIN_POSITIVE));
    let averaged: Vec<f64> = accum.iter().map(|&a| a * scale).collect();

    let (magnitudes, degenerate) = normalize_peak(&averaged);

    log::debug!(
        "Spectrum: {} frames, {} bins, N={}, M={}, H={}",
        num_frames,
        num_bins,
        n,
        params.window_size,
        params.hop_size
    );

    Ok(Spectrum {
        magnitudes,
        sample_rate,
        fft_size: n,
        frames: num_frames,
        degenerate,
    })
}

/// Divide by the maximum. A zero or non-finite maximum yields all zeros and `true`.
pub(crate) fn normalize_peak(values: &[f64]) -> (Vec<f32>, bool) {
    let max = values.iter().copied().fold(0.0f64, f64::max);
    if !(max.is_finite() && max > 0.0) {
        return (vec![0.0; values.len()], true);
    }
    let normalized = values
        .iter()
        .map(|&v| if v.is_finite() { (v / max) as f32 } else { 0.0 })
        .collect();
    (normalized, false)
}

fn hann_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::tests::{sine, write_wav};

    fn params(n: usize, m: usize, h: usize) -> StftParams {
        StftParams {
            fft_size: n,
            window_size: m,
            hop_size: h,
        }
    }

    #[test]
    fn spectrum_length_and_range() {
        let signal: Vec<f32> = sine(440.0, 44100, 20000)
            .iter()
            .zip(sine(3000.0, 44100, 20000))
            .map(|(a, b)| a + 0.3 * b)
            .collect();

        for p in [params(1024, 1024, 16), params(1000, 800, 100), params(4097, 4097, 64)] {
            let spec = analyze_samples(&signal, 44100, p).unwrap();
            assert_eq!(spec.len(), p.fft_size / 2 + 1);
            assert!(spec.magnitudes.iter().all(|&m| (0.0..=1.0).contains(&m)));
            assert!(spec.magnitudes.iter().any(|&m| m == 1.0));
            assert!(!spec.degenerate);
        }
    }

    #[test]
    fn sine_peak_lands_on_nearest_bin() {
        let sr = 44100;
        let spec = analyze_samples(&sine(1000.0, sr, sr as usize), sr, params(8192, 8192, 128)).unwrap();
        let bin_width = sr as f32 / 8192.0;
        let peak_freq = spec.bin_frequency(spec.peak_bin());
        assert!(
            (peak_freq - 1000.0).abs() <= bin_width,
            "peak at {peak_freq} Hz"
        );
        assert_eq!(spec.magnitudes[spec.peak_bin()], 1.0);
    }

    #[test]
    fn silence_is_degenerate_not_nan() {
        let spec = analyze_samples(&vec![0.0; 10000], 44100, params(2048, 2048, 32)).unwrap();
        assert!(spec.degenerate);
        assert_eq!(spec.len(), 1025);
        assert!(spec.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn empty_signal_still_yields_one_frame() {
        let spec = analyze_samples(&[], 44100, params(1024, 512, 8)).unwrap();
        assert_eq!(spec.frames, 1);
        assert_eq!(spec.len(), 513);
        assert!(spec.degenerate);
    }

    #[test]
    fn frame_count_follows_hop() {
        let spec = analyze_samples(&vec![0.1; 4096], 44100, params(1024, 1024, 256)).unwrap();
        // (4096 + 1024 - 1024) / 256 + 1
        assert_eq!(spec.frames, 17);
    }

    #[test]
    fn rejects_bad_params() {
        let signal = vec![0.5; 100];
        for p in [params(0, 0, 1), params(1024, 1024, 0), params(1024, 2048, 16)] {
            assert!(matches!(
                analyze_samples(&signal, 44100, p),
                Err(AnalysisError::InvalidParameter(_))
            ));
        }
        assert!(analyze_samples(&signal, 0, params(64, 64, 1)).is_err());
    }

    #[test]
    fn hann_window_shape() {
        let w = hann_window(5);
        assert_eq!(w.len(), 5);
        assert!(w[0].abs() < 1e-6 && w[4].abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert_eq!(hann_window(1), vec![1.0]);
    }

    #[test]
    fn hop_divisor_defaults() {
        let p = StftParams::with_hop_divisor(32768, 64);
        assert_eq!(p.window_size, 32768);
        assert_eq!(p.hop_size, 512);
        assert_eq!(p.num_bins(), 16385);
    }

    #[test]
    fn zero_hop_divisor_is_rejected() {
        let p = StftParams::with_hop_divisor(32768, 0);
        assert_eq!(p.hop_size, 0);
        assert!(matches!(p.validate(), Err(AnalysisError::InvalidParameter(_))));
        assert!(StftParams::with_hop_divisor(1000, 1001).validate().is_err());
    }

    #[test]
    fn analyze_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 44100, 1, &sine(2000.0, 44100, 22050));

        let spec = analyze(&path, 44100, params(4096, 4096, 64)).unwrap();
        let peak_freq = spec.bin_frequency(spec.peak_bin());
        assert!((peak_freq - 2000.0).abs() <= 44100.0 / 4096.0);
    }
}
