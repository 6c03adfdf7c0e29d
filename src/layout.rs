use std::path::PathBuf;

use image::Rgba;

use crate::template::TextElement;
use crate::wrap::{wrap_text, TextMeasure};

pub const DEFAULT_LINE_SPACING: f64 = 1.1;
/// Gap between a talk title block and the speaker name, in ems of the name.
pub const PAIR_GAP_EM: f64 = 0.5;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    /// Baseline.
    pub y: i32,
}

/// Absolute placement of one text element, ready for painting.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementLayout {
    pub font: PathBuf,
    pub origin: (i32, i32),
    pub size_pt: f64,
    pub color: Rgba<u8>,
    /// Set when the element's color string was unusable and white was used.
    pub color_fallback: bool,
    pub lines: Vec<PlacedLine>,
}

impl ElementLayout {
    /// Vertical space the stacked lines take: `round(lines * size * spacing)`.
    pub fn block_height(&self, line_spacing: f64) -> i32 {
        round_px(self.lines.len() as f64 * self.size_pt * line_spacing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairLayout {
    pub title: ElementLayout,
    pub name: ElementLayout,
}

fn round_px(value: f64) -> i32 {
    value.round() as i32
}

fn stack_lines(
    element: &TextElement,
    measure: &(impl TextMeasure + ?Sized),
    origin: (i32, i32),
    budget: i32,
    line_spacing: f64,
) -> ElementLayout {
    let (color, color_fallback) = match parse_hex_color(&element.color) {
        Some(color) => (color, false),
        None => (WHITE, true),
    };
    let lines = wrap_text(
        &element.text,
        budget as f32,
        measure,
        element.font_size as f32,
    )
    .into_iter()
    .enumerate()
    .map(|(i, text)| PlacedLine {
        text,
        x: origin.0,
        y: origin.1 + round_px(i as f64 * element.font_size * line_spacing),
    })
    .collect();

    ElementLayout {
        font: element.font.clone(),
        origin,
        size_pt: element.font_size,
        color,
        color_fallback,
        lines,
    }
}

/// Resolves an element's fractional position and box width against a
/// `width × height` image and wraps its text into stacked lines.
pub fn layout_element(
    element: &TextElement,
    measure: &(impl TextMeasure + ?Sized),
    width: u32,
    height: u32,
    line_spacing: f64,
) -> ElementLayout {
    let (w, h) = (f64::from(width), f64::from(height));
    let origin = (
        round_px(element.position.x * w),
        round_px(element.position.y * h),
    );
    let budget = round_px(element.box_width * w);
    stack_lines(element, measure, origin, budget, line_spacing)
}

/// Lays out a talk title with its speaker name directly underneath.
///
/// The name ignores its own position: it starts at the title's x and half a
/// name-em below the title block, wrapped against the name's own box width.
pub fn layout_pair(
    title: &TextElement,
    title_measure: &(impl TextMeasure + ?Sized),
    name: &TextElement,
    name_measure: &(impl TextMeasure + ?Sized),
    width: u32,
    height: u32,
    line_spacing: f64,
) -> PairLayout {
    let title_layout = layout_element(title, title_measure, width, height, line_spacing);
    let name_origin = (
        title_layout.origin.0,
        title_layout.origin.1
            + title_layout.block_height(line_spacing)
            + round_px(name.font_size * PAIR_GAP_EM),
    );
    let budget = round_px(name.box_width * f64::from(width));
    let name_layout = stack_lines(name, name_measure, name_origin, budget, line_spacing);
    PairLayout {
        title: title_layout,
        name: name_layout,
    }
}

/// Parses `#rrggbb` or `#rrggbbaa` (case-insensitive).
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}
