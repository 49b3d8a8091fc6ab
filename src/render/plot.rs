use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::text::TextOverlay;
use crate::pipeline::RunResult;

const BACKGROUND: [u8; 4] = [255, 255, 255, 255];
const AXIS: [u8; 4] = [40, 40, 40, 255];
const GRID: [u8; 4] = [225, 225, 225, 255];
const TEXT: [u8; 4] = [20, 20, 20, 255];

/// Tab10-like palette, cycled per track.
const PALETTE: [[u8; 4]; 10] = [
    [31, 119, 180, 255],
    [255, 127, 14, 255],
    [44, 160, 44, 255],
    [214, 39, 40, 255],
    [148, 103, 189, 255],
    [140, 86, 75, 255],
    [227, 119, 194, 255],
    [127, 127, 127, 255],
    [188, 189, 34, 255],
    [23, 190, 207, 255],
];

/// Lowest frequency shown on the spectrum panel.
const MIN_PLOT_FREQ: f32 = 20.0;

/// Largest figure edge, in pixels.
pub const MAX_FIGURE_DIM: u32 = 16384;
/// Smallest figure edge that still leaves room for the panels.
pub const MIN_FIGURE_DIM: u32 = 64;

/// Figure options, injected by the caller.
#[derive(Clone, Debug)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub show_filters: bool,
    pub font: Option<PathBuf>,
}

impl PlotConfig {
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_FIGURE_DIM..=MAX_FIGURE_DIM).contains(&value) {
                anyhow::bail!(
                    "Figure {} {} is out of bounds ({}-{})",
                    label,
                    value,
                    MIN_FIGURE_DIM,
                    MAX_FIGURE_DIM
                );
            }
        }
        Ok(())
    }
}

/// RGBA pixel buffer with a few line primitives.
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        for px in pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&BACKGROUND);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[idx..idx + 4].copy_from_slice(&color);
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: [u8; 4]) {
        for py in y..y + h {
            for px in x..x + w {
                self.put(px, py, color);
            }
        }
    }

    /// Bresenham line between two points.
    fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: [u8; 4]) {
        let (mut x, mut y) = (x0.round() as i32, y0.round() as i32);
        let (x_end, y_end) = (x1.round() as i32, y1.round() as i32);
        let dx = (x_end - x).abs();
        let dy = -(y_end - y).abs();
        let sx = if x < x_end { 1 } else { -1 };
        let sy = if y < y_end { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x, y, color);
            if x == x_end && y == y_end {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn polyline(&mut self, points: &[(f32, f32)], color: [u8; 4]) {
        for pair in points.windows(2) {
            self.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color);
        }
    }

    fn frame(&mut self, r: Rect) {
        let (x0, y0, x1, y1) = (r.x, r.y, r.x + r.w, r.y + r.h);
        self.line(x0, y0, x1, y0, AXIS);
        self.line(x0, y1, x1, y1, AXIS);
        self.line(x0, y0, x0, y1, AXIS);
        self.line(x1, y0, x1, y1, AXIS);
    }

    fn text(&mut self, overlay: Option<&TextOverlay>, text: &str, x: f32, y: f32) {
        if let Some(overlay) = overlay {
            overlay.composite(
                &mut self.pixels,
                self.width,
                self.height,
                text,
                x.max(0.0) as u32,
                y.max(0.0) as u32,
                TEXT,
            );
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        image::save_buffer(path, &self.pixels, self.width, self.height, image::ColorType::Rgba8)
            .with_context(|| format!("Failed to save figure {}", path.display()))
    }
}

/// Log-frequency x mapping for the spectrum and filter panels.
struct LogAxis {
    lo: f32,
    hi: f32,
}

impl LogAxis {
    fn new(lo: f32, hi: f32) -> Self {
        Self {
            lo: lo.log10(),
            hi: hi.max(lo * 10.0).log10(),
        }
    }

    fn map(&self, f: f32, r: Rect) -> f32 {
        r.x + (f.log10() - self.lo) / (self.hi - self.lo) * r.w
    }
}

fn y_of(v: f32, r: Rect) -> f32 {
    r.y + r.h - v.clamp(0.0, 1.0) * r.h
}

fn draw_linear_grid(canvas: &mut Canvas, r: Rect, x_steps: usize) {
    for i in 1..10 {
        let y = r.y + r.h * i as f32 / 10.0;
        canvas.line(r.x, y, r.x + r.w, y, GRID);
    }
    for i in 1..x_steps {
        let x = r.x + r.w * i as f32 / x_steps as f32;
        canvas.line(x, r.y, x, r.y + r.h, GRID);
    }
}

fn draw_log_grid(canvas: &mut Canvas, r: Rect, axis: &LogAxis, hi: f32) {
    for i in 1..10 {
        let y = r.y + r.h * i as f32 / 10.0;
        canvas.line(r.x, y, r.x + r.w, y, GRID);
    }
    let mut decade = 10.0f32;
    while decade <= hi {
        for m in 1..10 {
            let f = decade * m as f32;
            if f > MIN_PLOT_FREQ && f < hi {
                let x = axis.map(f, r);
                canvas.line(x, r.y, x, r.y + r.h, GRID);
            }
        }
        decade *= 10.0;
    }
}

fn panel_rects(width: u32, height: u32, panels: usize) -> Vec<Rect> {
    let (w, h) = (width as f32, height as f32);
    let margin_x = (w * 0.07).max(10.0);
    let margin_top = (h * 0.06).max(8.0);
    let gap = (h * 0.1).max(8.0);
    let slot = (h - margin_top - gap * panels as f32) / panels as f32;
    (0..panels)
        .map(|i| Rect {
            x: margin_x,
            y: margin_top + i as f32 * (slot + gap),
            w: w - 2.0 * margin_x,
            h: slot.max(1.0),
        })
        .collect()
}

fn track_color(track: usize) -> [u8; 4] {
    PALETTE[track % PALETTE.len()]
}

/// Draw the run's spectra and ERB vectors (plus optional filter responses)
/// and return the canvas.
pub fn draw_figure(run: &RunResult, title: &str, config: &PlotConfig) -> Result<Canvas> {
    config.validate()?;
    let overlay = match &config.font {
        Some(path) => Some(TextOverlay::from_file(path, (config.height as f32 * 0.022).max(10.0))?),
        None => None,
    };
    let overlay = overlay.as_ref();

    let mut canvas = Canvas::new(config.width, config.height);
    let panels = if config.show_filters { 3 } else { 2 };
    let rects = panel_rects(config.width, config.height, panels);
    let line_height = overlay.map_or(0.0, |o| o.line_height() as f32);

    let bank = &run.bank;
    let nyquist = bank.params().sample_rate as f32 / 2.0;
    let axis = LogAxis::new(MIN_PLOT_FREQ, nyquist);

    let mut next = rects.iter().copied();

    if config.show_filters {
        if let Some(r) = next.next() {
            draw_log_grid(&mut canvas, r, &axis, nyquist);
            for (band, response) in bank.filter_responses().iter().enumerate() {
                let points: Vec<(f32, f32)> = bank
                    .freqs
                    .iter()
                    .zip(response)
                    .filter(|&(&f, _)| f >= MIN_PLOT_FREQ)
                    .map(|(&f, &w)| (axis.map(f, r), y_of(w, r)))
                    .collect();
                canvas.polyline(&points, track_color(band));
            }
            canvas.frame(r);
            let text = format!("{} Auditory filters", bank.num_bands());
            canvas.text(overlay, &text, r.x, r.y - line_height * 1.3);
        }
    }

    if let Some(r) = next.next() {
        draw_log_grid(&mut canvas, r, &axis, nyquist);
        for (i, track) in run.tracks.iter().enumerate() {
            let points: Vec<(f32, f32)> = bank
                .freqs
                .iter()
                .zip(&track.spectrum.magnitudes)
                .filter(|&(&f, _)| f >= MIN_PLOT_FREQ)
                .map(|(&f, &m)| (axis.map(f, r), y_of(m, r)))
                .collect();
            canvas.polyline(&points, track_color(i));
        }
        canvas.frame(r);
        let text = format!("{} Spectrums (Normalized)", title);
        canvas.text(overlay, &text, r.x, r.y - line_height * 1.3);
        draw_legend(&mut canvas, overlay, run, r);
    }

    if let Some(r) = next.next() {
        let bands = bank.num_bands();
        draw_linear_grid(&mut canvas, r, bands.min(20));
        for (i, track) in run.tracks.iter().enumerate() {
            // Leading zero so band k sits at ERB number k.
            let points: Vec<(f32, f32)> = std::iter::once(0.0)
                .chain(track.bands.amplitudes.iter().copied())
                .enumerate()
                .map(|(k, a)| (r.x + r.w * k as f32 / bands as f32, y_of(a, r)))
                .collect();
            canvas.polyline(&points, track_color(i));
        }
        canvas.frame(r);
        let text = format!("{} ERB Scale (Normalized)", title);
        canvas.text(overlay, &text, r.x, r.y - line_height * 1.3);
        let text = format!("ERB Numbers (1-{})", bands);
        canvas.text(overlay, &text, r.x + r.w / 2.0, r.y + r.h + line_height * 0.3);
    }

    Ok(canvas)
}

fn draw_legend(canvas: &mut Canvas, overlay: Option<&TextOverlay>, run: &RunResult, r: Rect) {
    let swatch = 12.0f32;
    let row = overlay.map_or(swatch + 4.0, |o| (o.line_height() as f32).max(swatch) + 4.0);
    let widest = overlay.map_or(0, |o| {
        run.tracks.iter().map(|t| o.measure_width(&t.name)).max().unwrap_or(0)
    }) as f32;
    let x = r.x + r.w - widest - swatch * 3.0;

    for (i, track) in run.tracks.iter().enumerate() {
        let y = r.y + 6.0 + i as f32 * row;
        canvas.fill_rect(x as i32, y as i32, swatch as i32, swatch as i32, track_color(i));
        canvas.text(overlay, &track.name, x + swatch * 1.5, y - 2.0);
    }
}

/// Render the figure and save it as `<dir>/<name>.png`.
pub fn render_figure(
    run: &RunResult,
    title: &str,
    config: &PlotConfig,
    dir: &Path,
    name: &str,
) -> Result<PathBuf> {
    let canvas = draw_figure(run, title, config)?;
    let path = dir.join(format!("{}.png", name));
    canvas.save(&path)?;
    log::info!("Saved figure {}", path.display());
    Ok(path)
}
