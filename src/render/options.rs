//! Conversion options and configuration.

use crate::layout::{
    HeadingClassifier, HeadingThresholds, ParagraphSegmenter, DEFAULT_BASE_SIZE,
    DEFAULT_GAP_FACTOR,
};

/// Options controlling how a document is turned into Markdown.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Insert a separator line between pages
    pub split_by_page: bool,

    /// Separator text used when `split_by_page` is set
    pub page_separator: String,

    /// Size ratios for heading levels 1-3
    pub heading_thresholds: HeadingThresholds,

    /// Line gap (in multiples of the base size) that starts a new paragraph
    pub paragraph_gap_factor: f32,

    /// Base font size for pages without any text
    pub default_base_size: f32,

    /// Report progress every this many pages (the last page is always reported)
    pub progress_interval: usize,
}

impl ConvertOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable page separators.
    pub fn with_split_by_page(mut self, split: bool) -> Self {
        self.split_by_page = split;
        self
    }

    /// Set the page separator text.
    pub fn with_page_separator(mut self, separator: impl Into<String>) -> Self {
        self.page_separator = separator.into();
        self
    }

    /// Set the heading thresholds.
    pub fn with_heading_thresholds(mut self, thresholds: HeadingThresholds) -> Self {
        self.heading_thresholds = thresholds;
        self
    }

    /// Set the paragraph gap factor.
    pub fn with_paragraph_gap_factor(mut self, factor: f32) -> Self {
        self.paragraph_gap_factor = factor;
        self
    }

    /// Set the fallback base size for text-free pages.
    pub fn with_default_base_size(mut self, size: f32) -> Self {
        self.default_base_size = size;
        self
    }

    /// Set the progress reporting interval. Zero is treated as one.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Build the paragraph segmenter described by these options.
    pub fn segmenter(&self) -> ParagraphSegmenter {
        ParagraphSegmenter::new(
            HeadingClassifier::new(self.heading_thresholds),
            self.paragraph_gap_factor,
        )
    }

    /// Whether progress should be reported after page `index` (0-based).
    pub fn should_report(&self, index: usize, page_count: usize) -> bool {
        let interval = self.progress_interval.max(1);
        (index + 1) % interval == 0 || index + 1 == page_count
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            split_by_page: false,
            page_separator: "---".to_string(),
            heading_thresholds: HeadingThresholds::default(),
            paragraph_gap_factor: DEFAULT_GAP_FACTOR,
            default_base_size: DEFAULT_BASE_SIZE,
            progress_interval: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConvertOptions::default();
        assert!(!opts.split_by_page);
        assert_eq!(opts.page_separator, "---");
        assert_eq!(opts.progress_interval, 10);
        assert_eq!(opts.default_base_size, 12.0);
    }

    #[test]
    fn test_builder() {
        let opts = ConvertOptions::new()
            .with_split_by_page(true)
            .with_page_separator("***")
            .with_progress_interval(0);
        assert!(opts.split_by_page);
        assert_eq!(opts.page_separator, "***");
        assert_eq!(opts.progress_interval, 1);
    }

    #[test]
    fn test_progress_schedule() {
        let opts = ConvertOptions::default();
        let reported: Vec<usize> = (0..25).filter(|&i| opts.should_report(i, 25)).collect();
        assert_eq!(reported, vec![9, 19, 24]);

        // The last page is reported even when it falls on the interval
        let reported: Vec<usize> = (0..20).filter(|&i| opts.should_report(i, 20)).collect();
        assert_eq!(reported, vec![9, 19]);
    }
}
