use std::collections::HashMap;

use fontdue::layout::GlyphRasterConfig;
use image::Rgba;

use crate::compositor::Canvas;
use crate::fonts::FontHandle;

#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    pub xmin: i32,
    pub ymin: i32,
    pub bitmap: Vec<u8>,
}

/// What happened when a line was painted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOutcome {
    pub pixels_written: usize,
    pub missing_glyphs: Vec<char>,
}

/// Rasterizes text runs onto a canvas, caching coverage bitmaps per glyph,
/// size and font.
#[derive(Default)]
pub struct TextPainter {
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl TextPainter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn cached_glyphs(&self) -> usize {
        self.glyph_cache.len()
    }

    /// Draws `text` with its pen starting at `x` and its baseline on `y`.
    /// Glyphs rise above `y`; callers pass baselines, never line tops.
    ///
    /// Pen advances and kerning are whole pixels, matching
    /// [`FontHandle::measure_width`], so a line occupies exactly the width the
    /// wrapper measured for it.
    pub fn draw_line(
        &mut self,
        canvas: &mut Canvas,
        font: &FontHandle,
        x: i32,
        y: i32,
        text: &str,
        size_pt: f32,
        color: Rgba<u8>,
    ) -> LineOutcome {
        let mut outcome = LineOutcome {
            pixels_written: 0,
            missing_glyphs: font.missing_glyphs(text),
        };
        if text.is_empty() || size_pt <= 0.0 {
            return outcome;
        }

        let face = font.font();
        let mut pen_x = x as f32;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                if let Some(kern) = face.horizontal_kern(prev, ch, size_pt) {
                    pen_x += kern.round();
                }
            }
            previous = Some(ch);

            let key = GlyphRasterConfig {
                glyph_index: face.lookup_glyph_index(ch),
                px: size_pt,
                font_hash: face.file_hash(),
            };
            let glyph = self.glyph_cache.entry(key).or_insert_with(|| {
                let (metrics, bitmap) = face.rasterize_config(key);
                GlyphBitmap {
                    width: metrics.width,
                    height: metrics.height,
                    xmin: metrics.xmin,
                    ymin: metrics.ymin,
                    bitmap,
                }
            });

            if glyph.width > 0 && glyph.height > 0 {
                let left = pen_x as i32 + glyph.xmin;
                let top = y - glyph.ymin - glyph.height as i32;
                outcome.pixels_written += blend_glyph(canvas, left, top, glyph, color);
            }
            pen_x += face.metrics_indexed(key.glyph_index, size_pt).advance_width.round();
        }

        outcome
    }
}

/// Blends a coverage bitmap onto the canvas; returns how many pixels changed.
pub fn blend_glyph(canvas: &mut Canvas, x: i32, y: i32, glyph: &GlyphBitmap, color: Rgba<u8>) -> usize {
    let (frame_width, frame_height) = (canvas.width() as i32, canvas.height() as i32);
    let mut written = 0;

    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height {
            continue;
        }

        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width {
                continue;
            }

            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }

            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            blend_pixel(
                canvas.get_pixel_mut(px as u32, py as u32),
                Rgba([color[0], color[1], color[2], alpha]),
            );
            written += 1;
        }
    }
    written
}

pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }

    let inv_alpha = 255_u16.saturating_sub(alpha);

    for channel in 0..3 {
        let dst_c = u16::from(dst[channel]);
        let src_c = u16::from(src[channel]);
        dst[channel] = ((src_c * alpha + dst_c * inv_alpha + 127) / 255) as u8;
    }
    let dst_a = u16::from(dst[3]);
    dst[3] = (alpha + (dst_a * inv_alpha + 127) / 255).min(255) as u8;
}
