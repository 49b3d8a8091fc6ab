use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::Path;

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font {}: {}", path.display(), e))?;
        Ok(Self { font, font_size })
    }

    pub fn line_height(&self) -> u32 {
        self.font_size.ceil() as u32
    }

    /// Alpha-blend `text` into an RGBA buffer of `width` x `height` pixels,
    /// with the top of the line at `y`. Glyphs falling off the buffer are clipped.
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: u32,
        y: u32,
        color: [u8; 4],
    ) {
        let (width, height) = (width as i64, height as i64);
        let opacity = color[3] as f32 / 255.0;
        let mut pen_x = x as f32;

        for ch in text.chars() {
            let (metrics, coverage) = self.font.rasterize(ch, self.font_size);
            let left = pen_x.round() as i64 + metrics.xmin as i64;
            let top = y as i64 + self.font_size as i64 - metrics.height as i64 - metrics.ymin as i64;

            for (row, line) in coverage.chunks(metrics.width.max(1)).enumerate() {
                let py = top + row as i64;
                if py < 0 || py >= height {
                    continue;
                }
                for (col, &cov) in line.iter().enumerate() {
                    let px = left + col as i64;
                    if cov == 0 || px < 0 || px >= width {
                        continue;
                    }
                    let idx = (py * width + px) as usize * 4;
                    if let Some(dst) = pixels.get_mut(idx..idx + 4) {
                        blend(dst, color, cov as f32 / 255.0 * opacity);
                    }
                }
            }

            pen_x += metrics.advance_width;
        }
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}

fn blend(dst: &mut [u8], color: [u8; 4], alpha: f32) {
    for (d, &c) in dst.iter_mut().zip(&color[..3]) {
        *d = (c as f32 * alpha + *d as f32 * (1.0 - alpha)).round() as u8;
    }
    dst[3] = 255;
}
