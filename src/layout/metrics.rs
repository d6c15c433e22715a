//! Per-page font size statistics.

use std::collections::BTreeMap;

use crate::model::{size_tenths, Block};

/// Base size used when a page carries no text at all.
pub const DEFAULT_BASE_SIZE: f32 = 12.0;

/// Font size statistics of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// Distinct rounded sizes, largest first
    pub sizes: Vec<f32>,
    /// Most frequent rounded size (body text)
    pub base_size: f32,
}

impl FontMetrics {
    /// Compute metrics over every span of every text block.
    pub fn compute(blocks: &[Block]) -> Self {
        Self::compute_with_default(blocks, DEFAULT_BASE_SIZE)
    }

    /// Same as [`FontMetrics::compute`], with an explicit base size for
    /// pages without spans.
    ///
    /// When several sizes share the highest count, the smallest one wins.
    pub fn compute_with_default(blocks: &[Block], default_base: f32) -> Self {
        let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
        for span in blocks.iter().flat_map(Block::spans) {
            *histogram.entry(size_tenths(span.size)).or_insert(0) += 1;
        }

        if histogram.is_empty() {
            return Self {
                sizes: Vec::new(),
                base_size: default_base,
            };
        }

        // Ascending key order: a later size only wins with a strictly
        // higher count.
        let mut base_key = 0;
        let mut best = 0;
        for (&key, &count) in &histogram {
            if count > best {
                base_key = key;
                best = count;
            }
        }

        let sizes = histogram.keys().rev().map(|&k| k as f32 / 10.0).collect();
        log::trace!(
            "Font histogram: {} sizes, base {:.1}pt",
            histogram.len(),
            base_key as f32 / 10.0
        );

        Self {
            sizes,
            base_size: base_key as f32 / 10.0,
        }
    }

    /// Whether the page had no spans.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}
