use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AnalysisError, Result};

/// A mono waveform at a known sample rate.
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode an audio file, collapse it to one channel and resample it to
/// `target_rate` when the source rate differs.
pub fn load_waveform(path: &Path, target_rate: u32) -> Result<Waveform> {
    let decoded = decode_audio(path)?;
    if decoded.sample_rate == target_rate {
        return Ok(decoded);
    }

    log::debug!(
        "Resampling {} from {}Hz to {}Hz",
        path.display(),
        decoded.sample_rate,
        target_rate
    );
    let samples = resample(&decoded.samples, decoded.sample_rate, target_rate)?;
    Ok(Waveform {
        samples,
        sample_rate: target_rate,
    })
}

pub fn decode_audio(path: &Path) -> Result<Waveform> {
    let file = std::fs::File::open(path).map_err(|e| AnalysisError::load(path, e))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AnalysisError::load(path, format!("unrecognised format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::load(path, "no audio tracks found"))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::load(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::load(path, format!("no decoder: {}", e)))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AnalysisError::load(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(AnalysisError::load(path, e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        downmix_into(sample_buf.samples(), channels, &mut all_samples);
    }

    let wave = Waveform {
        samples: all_samples,
        sample_rate,
    };
    log::info!(
        "Decoded {}: {} samples, {}Hz, {:.1}s",
        path.display(),
        wave.samples.len(),
        wave.sample_rate,
        wave.duration()
    );

    Ok(wave)
}

/// Average interleaved frames down to a single channel.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Resample mono f32 audio from `from_rate` to `to_rate` using rubato.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    if from_rate == 0 || to_rate == 0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "cannot resample {}Hz -> {}Hz",
            from_rate, to_rate
        )));
    }
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let sinc_len = 256;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let target_len = (samples.len() as f64 * ratio).round() as usize;

    // Trailing zeros flush the filter tail so the delayed output still covers the whole input.
    let mut padded = Vec::with_capacity(samples.len() + sinc_len);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + sinc_len, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, padded.len(), 1)
        .map_err(|e| AnalysisError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let input = vec![padded];
    let output = resampler
        .process(&input, None)
        .map_err(|e| AnalysisError::Resample(e.to_string()))?;

    let channel = output.into_iter().next().unwrap_or_default();
    Ok(channel.into_iter().skip(delay).take(target_len).collect())
}
