//! Heading level inference from relative font size.

use crate::model::size_tenths;

/// Minimum size ratios (relative to the base size) for heading levels 1-3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingThresholds {
    pub h1: f64,
    pub h2: f64,
    pub h3: f64,
}

impl Default for HeadingThresholds {
    fn default() -> Self {
        Self {
            h1: 1.8,
            h2: 1.5,
            h3: 1.2,
        }
    }
}

/// Maps a font size to a heading level: 1 is most prominent, 3 least,
/// 0 means body text.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadingClassifier {
    thresholds: HeadingThresholds,
}

impl HeadingClassifier {
    pub fn new(thresholds: HeadingThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> HeadingThresholds {
        self.thresholds
    }

    /// Classify `font_size` against the page's `base_size`.
    ///
    /// Both sizes are rounded to one decimal first. The ratio is computed
    /// from integer tenths, so a ratio that is exactly on a threshold
    /// compares equal to it.
    pub fn classify(&self, font_size: f32, base_size: f32) -> u8 {
        if !base_size.is_finite() {
            return 0;
        }
        let base = size_tenths(base_size);
        if base <= 0 {
            return 0;
        }
        let ratio = f64::from(size_tenths(font_size)) / f64::from(base);
        self.level_for_ratio(ratio)
    }

    /// Level for a precomputed size ratio; thresholds are inclusive.
    pub fn level_for_ratio(&self, ratio: f64) -> u8 {
        if ratio >= self.thresholds.h1 {
            1
        } else if ratio >= self.thresholds.h2 {
            2
        } else if ratio >= self.thresholds.h3 {
            3
        } else {
            0
        }
    }
}
