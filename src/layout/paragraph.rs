//! Paragraph segmentation of a single text block.

use crate::model::{Block, Line, StyleFlags};
use crate::text;

use super::HeadingClassifier;

/// Vertical gap, as a multiple of the base size, that starts a new paragraph.
pub const DEFAULT_GAP_FACTOR: f32 = 1.2;

/// Turns a text block into Markdown paragraphs.
///
/// The whole block shares one heading level, derived from its largest span.
/// Lines are joined with single spaces; a vertical gap larger than
/// `base_size * gap_factor` between consecutive lines ends the paragraph.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphSegmenter {
    classifier: HeadingClassifier,
    gap_factor: f32,
}

impl Default for ParagraphSegmenter {
    fn default() -> Self {
        Self::new(HeadingClassifier::default(), DEFAULT_GAP_FACTOR)
    }
}

impl ParagraphSegmenter {
    pub fn new(classifier: HeadingClassifier, gap_factor: f32) -> Self {
        Self {
            classifier,
            gap_factor,
        }
    }

    /// Format one block. Each paragraph is emitted as `"<prefix><text>\n\n"`;
    /// a block without visible text yields an empty string.
    pub fn format_block(&self, block: &Block, base_size: f32) -> String {
        let max_size = block
            .spans()
            .map(|span| span.rounded_size())
            .fold(0.0_f32, f32::max);
        let level = self.classifier.classify(max_size, base_size);
        let gap_limit = base_size * self.gap_factor;

        let mut output = String::new();
        let mut paragraph: Vec<String> = Vec::new();
        let mut last_bottom: Option<f32> = None;

        for line in block.lines() {
            let line_text = render_line(line);
            if line_text.is_empty() {
                continue;
            }

            if let Some(bottom) = last_bottom {
                if line.bbox.top - bottom > gap_limit {
                    flush_paragraph(&mut output, &mut paragraph, level);
                }
            }

            last_bottom = Some(line.bbox.bottom);
            paragraph.push(line_text);
        }
        flush_paragraph(&mut output, &mut paragraph, level);

        output
    }
}

/// Render a line: normalized, trimmed span texts wrapped in emphasis and
/// joined with single spaces. Empty spans are skipped.
pub fn render_line(line: &Line) -> String {
    let parts: Vec<String> = line
        .spans
        .iter()
        .filter_map(|span| {
            let normalized = text::normalize(&span.text);
            let trimmed = normalized.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(emphasize(trimmed, span.flags))
            }
        })
        .collect();
    parts.join(" ").trim().to_string()
}

/// Wrap `text` in Markdown emphasis according to its style bits.
pub fn emphasize(text: &str, flags: StyleFlags) -> String {
    let marker = match (flags.is_bold(), flags.is_italic()) {
        (true, true) => "***",
        (true, false) => "**",
        (false, true) => "*",
        (false, false) => return text.to_string(),
    };
    format!("{marker}{text}{marker}")
}

fn flush_paragraph(output: &mut String, paragraph: &mut Vec<String>, level: u8) {
    if paragraph.is_empty() {
        return;
    }
    if level > 0 {
        output.push_str(&"#".repeat(level as usize));
        output.push(' ');
    }
    output.push_str(&paragraph.join(" "));
    output.push_str("\n\n");
    paragraph.clear();
}
