mod audio;
mod cli;
mod config;
mod error;
mod pipeline;
mod project;
mod render;
mod report;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use cli::Cli;
use render::plot::{render_figure, PlotConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect specdiff.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("specdiff.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("specdiff").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("specdiff").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cli.merge(cfg);
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let params = cli.analysis_params();
    params.validate()?;

    let plot_config = PlotConfig {
        width: cli.width,
        height: cli.height,
        show_filters: cli.show_filters,
        font: cli.font.clone(),
    };
    plot_config.validate()?;

    let project_dir = cli.project_dir();
    log::info!("specdiff - ERB spectrum comparison");
    log::info!("Project: {}", project_dir.display());
    log::info!(
        "STFT: N={}, M={}, H={} @ {}Hz",
        params.stft.fft_size,
        params.stft.window_size,
        params.stft.hop_size,
        params.sample_rate
    );
    log::info!(
        "ERB: {} bands, {:.0}-{:.0}Hz",
        params.bands,
        params.low_lim,
        params.high_lim
    );

    // 1. Discover tracks
    let tracks = project::discover_tracks(&project_dir)?;

    // 2. Analyze
    let pb = ProgressBar::new(tracks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks ({eta} remaining)")?
            .progress_chars("=>-"),
    );
    let run = pipeline::run(&params, &tracks, &pb)?;
    pb.finish_with_message("Analysis complete");

    if !run.skipped.is_empty() {
        log::warn!("Skipped {} unreadable tracks: {}", run.skipped.len(), run.skipped.join(", "));
    }
    if run.tracks.is_empty() {
        anyhow::bail!("No track in {} could be analyzed", project_dir.display());
    }

    // 3. Export
    if let Some(ref json) = cli.json {
        report::write_report(json, &params, &run)?;
    }

    let figure = render_figure(&run, &cli.project, &plot_config, &project_dir, &cli.file)?;

    log::info!("Done! Output: {}", figure.display());
    Ok(())
}
