use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::AnalysisParams;
use crate::pipeline::RunResult;

#[derive(Serialize)]
pub struct Report<'a> {
    pub project: &'a str,
    pub sample_rate: u32,
    pub fft_size: usize,
    pub window_size: usize,
    pub hop_size: usize,
    pub low_lim: f32,
    pub high_lim: f32,
    pub bands: Vec<BandReport>,
    pub frequencies: &'a [f32],
    pub tracks: Vec<TrackReport<'a>>,
    pub skipped: &'a [String],
}

#[derive(Serialize)]
pub struct BandReport {
    pub low_edge: f32,
    pub high_edge: f32,
    pub center_freq: f32,
    pub bandwidth: f32,
    pub bin: usize,
}

#[derive(Serialize)]
pub struct TrackReport<'a> {
    pub name: &'a str,
    pub spectrum: &'a [f32],
    pub erb: &'a [f32],
    pub silent: bool,
}

impl<'a> Report<'a> {
    pub fn new(params: &'a AnalysisParams, run: &'a RunResult) -> Self {
        let bank = &run.bank;
        let bands = bank
            .center_freqs
            .iter()
            .zip(&bank.bandwidths)
            .zip(&bank.bin_indices)
            .zip(bank.edges.windows(2))
            .map(|(((&center_freq, &bandwidth), &bin), edges)| BandReport {
                low_edge: edges[0],
                high_edge: edges[1],
                center_freq,
                bandwidth,
                bin,
            })
            .collect();

        let tracks = run
            .tracks
            .iter()
            .map(|t| TrackReport {
                name: &t.name,
                spectrum: &t.spectrum.magnitudes,
                erb: &t.bands.amplitudes,
                silent: t.spectrum.degenerate || t.bands.degenerate,
            })
            .collect();

        Self {
            project: &params.project,
            sample_rate: params.sample_rate,
            fft_size: params.stft.fft_size,
            window_size: params.stft.window_size,
            hop_size: params.stft.hop_size,
            low_lim: params.low_lim,
            high_lim: params.high_lim,
            bands,
            frequencies: &bank.freqs,
            tracks,
            skipped: &run.skipped,
        }
    }
}

pub fn write_report(path: &Path, params: &AnalysisParams, run: &RunResult) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &Report::new(params, run))
        .context("Failed to write JSON report")?;
    writer.flush().context("Failed to flush JSON report")?;
    log::info!("Wrote report {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::erb::{BandAmplitudes, ErbBank};
    use crate::audio::spectrum::Spectrum;
    use crate::config::tests::params;
    use crate::pipeline::TrackResult;

    fn fake_run(params: &AnalysisParams) -> RunResult {
        let bank = ErbBank::new(params.bank_params()).unwrap();
        let mut magnitudes = vec![0.0; bank.num_bins()];
        magnitudes[bank.bin_indices[4]] = 1.0;
        let bands = bank.map(&magnitudes).unwrap();
        RunResult {
            tracks: vec![TrackResult {
                name: "kick".into(),
                spectrum: Spectrum {
                    magnitudes,
                    sample_rate: params.sample_rate,
                    fft_size: params.stft.fft_size,
                    frames: 1,
                    degenerate: false,
                },
                bands,
            }],
            bank,
            skipped: vec!["broken".into()],
        }
    }

    #[test]
    fn report_contains_bands_and_tracks() {
        let params = params();
        let run = fake_run(&params);
        let value = serde_json::to_value(Report::new(&params, &run)).unwrap();

        assert_eq!(value["project"], "mixes");
        assert_eq!(value["hop_size"], 512);
        assert_eq!(value["bands"].as_array().unwrap().len(), 43);
        assert_eq!(value["bands"][0]["low_edge"], 20.0);
        assert_eq!(value["bands"][42]["high_edge"], 22050.0);
        assert_eq!(value["frequencies"].as_array().unwrap().len(), 16385);
        assert_eq!(value["tracks"][0]["name"], "kick");
        assert_eq!(value["tracks"][0]["erb"][4], 1.0);
        assert_eq!(value["tracks"][0]["silent"], false);
        assert_eq!(value["skipped"][0], "broken");
    }

    #[test]
    fn writes_report_file() {
        let params = params();
        let run = fake_run(&params);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &params, &run).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["tracks"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn silent_flag_follows_degenerate_bands() {
        let params = params();
        let mut run = fake_run(&params);
        run.tracks[0].bands = BandAmplitudes {
            amplitudes: vec![0.0; 43],
            degenerate: true,
        };
        let value = serde_json::to_value(Report::new(&params, &run)).unwrap();
        assert_eq!(value["tracks"][0]["silent"], true);
    }
}
