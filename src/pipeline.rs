use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::audio::erb::{BandAmplitudes, ErbBank};
use crate::audio::spectrum::{self, Spectrum};
use crate::config::AnalysisParams;
use crate::error::Result;
use crate::project::Track;

/// Analysis output of a single track.
#[derive(Clone, Debug)]
pub struct TrackResult {
    pub name: String,
    pub spectrum: Spectrum,
    pub bands: BandAmplitudes,
}

/// Output of a whole run. `tracks` keeps discovery order.
#[derive(Debug)]
pub struct RunResult {
    pub bank: ErbBank,
    pub tracks: Vec<TrackResult>,
    /// Tracks dropped under the skip-unreadable policy.
    pub skipped: Vec<String>,
}

/// Spectrum then ERB mapping for one track against a shared bank.
pub fn analyze_track(track: &Track, params: &AnalysisParams, bank: &ErbBank) -> Result<TrackResult> {
    log::info!("Analyzing track: {}", track.name);
    let spectrum = spectrum::analyze(&track.path, params.sample_rate, params.stft)?;
    log::debug!(
        "{}: {} bins, peak at {:.1}Hz",
        track.name,
        spectrum.len(),
        spectrum.bin_frequency(spectrum.peak_bin())
    );
    let bands = bank.map(&spectrum.magnitudes)?;
    if spectrum.degenerate {
        log::warn!("{}: spectrum is silent, left unnormalized", track.name);
    } else if bands.degenerate {
        log::warn!("{}: no energy at any ERB band centre, bands left unnormalized", track.name);
    }
    Ok(TrackResult {
        name: track.name.clone(),
        spectrum,
        bands,
    })
}

/// Analyze every track in parallel. The band bank is built once and shared.
pub fn run(params: &AnalysisParams, tracks: &[Track], progress: &ProgressBar) -> Result<RunResult> {
    params.validate()?;
    let bank = ErbBank::new(params.bank_params())?;
    log::info!(
        "ERB bank: {} bands over {:.0}-{:.0}Hz, {} bins",
        bank.num_bands(),
        params.low_lim,
        params.high_lim,
        bank.num_bins()
    );

    let outcomes: Vec<Result<TrackResult>> = tracks
        .par_iter()
        .map(|track| {
            let outcome = analyze_track(track, params, &bank);
            progress.inc(1);
            outcome
        })
        .collect();

    let mut results = Vec::with_capacity(tracks.len());
    let mut skipped = Vec::new();
    for (track, outcome) in tracks.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) if params.skip_unreadable && e.is_track_local() => {
                log::warn!("Skipping {}: {}", track.name, e);
                skipped.push(track.name.clone());
            }
            Err(e) => return Err(e),
        }
    }

    Ok(RunResult {
        bank,
        tracks: results,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::tests::{sine, write_wav};
    use crate::audio::spectrum::StftParams;
    use crate::config::tests::params;
    use crate::error::AnalysisError;
    use crate::project::discover_tracks;

    fn small_params() -> AnalysisParams {
        AnalysisParams {
            stft: StftParams::with_hop_divisor(2048, 16),
            bands: 10,
            ..params()
        }
    }

    fn project_with(files: &[(&str, Option<f32>)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for &(name, freq) in files {
            let path = dir.path().join(format!("{name}.wav"));
            match freq {
                Some(f) => write_wav(&path, 44100, 1, &sine(f, 44100, 22050)),
                None => std::fs::write(&path, b"not audio").unwrap(),
            }
        }
        dir
    }

    #[test]
    fn results_align_with_tracks() {
        let dir = project_with(&[("bass", Some(100.0)), ("lead", Some(3000.0)), ("pad", Some(800.0))]);
        let tracks = discover_tracks(dir.path()).unwrap();
        let run = run(&small_params(), &tracks, &ProgressBar::hidden()).unwrap();

        let names: Vec<&str> = run.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["bass", "lead", "pad"]);
        assert!(run.skipped.is_empty());
        for result in &run.tracks {
            assert_eq!(result.spectrum.len(), 1025);
            assert_eq!(result.bands.amplitudes.len(), 10);
            assert!(result.bands.amplitudes.iter().any(|&a| a == 1.0));
        }

        let peak_band = |r: &TrackResult| {
            r.bands.amplitudes.iter().position(|&a| a == 1.0).unwrap()
        };
        assert!(peak_band(&run.tracks[0]) < peak_band(&run.tracks[2]));
        assert!(peak_band(&run.tracks[2]) < peak_band(&run.tracks[1]));
    }

    #[test]
    fn silent_track_is_flagged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("silence.wav"), 44100, 1, &vec![0.0; 8000]);
        let tracks = discover_tracks(dir.path()).unwrap();
        let run = run(&small_params(), &tracks, &ProgressBar::hidden()).unwrap();

        let result = &run.tracks[0];
        assert!(result.spectrum.degenerate);
        assert!(result.bands.degenerate);
        assert!(result.bands.amplitudes.iter().all(|a| a.is_finite() && *a == 0.0));
    }

    #[test]
    fn unreadable_track_aborts_by_default() {
        let dir = project_with(&[("good", Some(440.0)), ("broken", None)]);
        let tracks = discover_tracks(dir.path()).unwrap();
        let err = run(&small_params(), &tracks, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, AnalysisError::Load { .. }));
    }

    #[test]
    fn unreadable_track_can_be_skipped() {
        let dir = project_with(&[("good", Some(440.0)), ("broken", None)]);
        let tracks = discover_tracks(dir.path()).unwrap();
        let params = AnalysisParams {
            skip_unreadable: true,
            ..small_params()
        };
        let run = run(&params, &tracks, &ProgressBar::hidden()).unwrap();
        assert_eq!(run.tracks.len(), 1);
        assert_eq!(run.tracks[0].name, "good");
        assert_eq!(run.skipped, ["broken"]);
    }

    #[test]
    fn invalid_config_fails_before_any_track() {
        let tracks = vec![Track {
            name: "missing".into(),
            path: "/nonexistent/missing.wav".into(),
        }];
        let params = AnalysisParams {
            bands: 5,
            ..small_params()
        };
        assert!(matches!(
            run(&params, &tracks, &ProgressBar::hidden()),
            Err(AnalysisError::Config(_))
        ));
    }
}
