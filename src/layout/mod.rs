//! Layout analysis: font metrics, heading levels and paragraph segmentation.
//!
//! These stages work on one page at a time and never carry state across
//! pages; every page gets its own base font size.

mod heading;
mod metrics;
mod paragraph;

pub use heading::{HeadingClassifier, HeadingThresholds};
pub use metrics::{FontMetrics, DEFAULT_BASE_SIZE};
pub use paragraph::{emphasize, render_line, ParagraphSegmenter, DEFAULT_GAP_FACTOR};
