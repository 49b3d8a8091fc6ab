use std::path::{Path, PathBuf};

use crate::error::{AnalysisError, Result};

/// One waveform of a project, identified by its file stem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    pub path: PathBuf,
}

/// List the `.wav` files directly inside `dir`, sorted by name.
pub fn discover_tracks(dir: &Path) -> Result<Vec<Track>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        AnalysisError::Config(format!("cannot read project directory {}: {}", dir.display(), e))
    })?;

    let mut tracks: Vec<Track> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_wav(path))
        .filter_map(|path| {
            let name = path.file_stem()?.to_str()?.to_string();
            Some(Track { name, path })
        })
        .collect();

    if tracks.is_empty() {
        return Err(AnalysisError::NoTracks(dir.to_path_buf()));
    }

    tracks.sort_by(|a, b| a.name.cmp(&b.name));
    log::info!("Found {} tracks in {}", tracks.len(), dir.display());
    Ok(tracks)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("wav"))
}
