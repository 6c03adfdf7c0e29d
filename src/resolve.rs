use chrono::{Datelike, NaiveDate};
use image::imageops::{self, FilterType};

use crate::compositor::Canvas;
use crate::feed::ResolvedEventData;
use crate::template::{Template, TextElement};

/// Copies every non-empty event field over the matching template text.
///
/// The date is rendered through [`format_event_date`], falling back to the raw
/// string when it does not parse. The event title only lands when the
/// template declares a `title` element.
pub fn apply_overrides(template: &mut Template, data: &ResolvedEventData) {
    fn set(element: &mut TextElement, value: &str) {
        if !value.is_empty() {
            element.text = value.to_owned();
        }
    }

    set(&mut template.speaker1title, &data.speaker1_title);
    set(&mut template.speaker1name, &data.speaker1_name);
    set(&mut template.speaker2title, &data.speaker2_title);
    set(&mut template.speaker2name, &data.speaker2_name);
    set(&mut template.sponsor, &data.sponsor);
    if !data.date.is_empty() {
        let formatted = format_event_date(&data.date).unwrap_or_else(|| data.date.clone());
        set(&mut template.date, &formatted);
    }
    if let Some(title) = template.title.as_mut() {
        set(title, &data.event_title);
    }
}

/// `2024-05-23` becomes `23rd May 2024`.
pub fn format_event_date(raw: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
    let day = date.day();
    Some(format!(
        "{day}{} {} {}",
        ordinal_suffix(day),
        date.format("%B"),
        date.year()
    ))
}

fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&day) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Scales the canvas to `width` keeping its aspect ratio; the input is left
/// untouched.
pub fn resize_to_width(canvas: &Canvas, width: u32) -> Canvas {
    let (w, h) = canvas.dimensions();
    if width == 0 || w == 0 {
        return canvas.clone();
    }
    let height = ((f64::from(width) * f64::from(h) / f64::from(w)).round() as u32).max(1);
    imageops::resize(canvas, width, height, FilterType::Triangle)
}
