use crate::fonts::FontHandle;

/// Anything that can report the pixel width of a run of text.
pub trait TextMeasure {
    fn measure_width(&self, text: &str, size_pt: f32) -> f32;
}

impl TextMeasure for FontHandle {
    fn measure_width(&self, text: &str, size_pt: f32) -> f32 {
        FontHandle::measure_width(self, text, size_pt)
    }
}

/// Greedy word wrap against a pixel budget.
///
/// Words are never split: a word wider than `max_width` ends up alone on its
/// own line. Whitespace-only input produces no lines.
pub fn wrap_text<M: TextMeasure + ?Sized>(
    text: &str,
    max_width: f32,
    measure: &M,
    size_pt: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }

        let candidate = format!("{line} {word}");
        if measure.measure_width(&candidate, size_pt) > max_width {
            lines.push(std::mem::replace(&mut line, word.to_owned()));
        } else {
            line = candidate;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
