//! Per-page Markdown assembly.

use crate::layout::{FontMetrics, ParagraphSegmenter};
use crate::model::{Block, ImageDescriptor, PageContent};
use crate::parser::PdfBackend;

use super::{ConvertOptions, ImageInterleaver};

/// Turns one page into Markdown: text blocks become paragraphs, image blocks
/// become links to extracted PNG files.
#[derive(Debug, Clone)]
pub struct PageAssembler {
    segmenter: ParagraphSegmenter,
    default_base_size: f32,
}

impl PageAssembler {
    pub fn new(options: &ConvertOptions) -> Self {
        Self {
            segmenter: options.segmenter(),
            default_base_size: options.default_base_size,
        }
    }

    /// Render `page` into a Markdown fragment.
    pub fn process_page<S: PdfBackend + ?Sized>(
        &self,
        page: PageContent,
        source: &S,
        images: &mut ImageInterleaver,
    ) -> String {
        let PageContent {
            index,
            mut blocks,
            images: raw_images,
        } = page;
        if blocks.is_empty() {
            return String::new();
        }

        // Stable: ties keep decoder order
        blocks.sort_by(|a, b| a.bbox().reading_order(b.bbox()));

        let metrics = FontMetrics::compute_with_default(&blocks, self.default_base_size);
        let descriptors = ImageDescriptor::from_raw_list(&raw_images);
        log::debug!(
            "Page {}: {} blocks, {} images, base size {:.1}",
            index + 1,
            blocks.len(),
            descriptors.len(),
            metrics.base_size
        );

        images.begin_page();
        let mut cursor = 0;
        let mut output = String::new();

        for block in &blocks {
            match block {
                Block::Text { .. } => {
                    let text = self.segmenter.format_block(block, metrics.base_size);
                    if !text.trim().is_empty() {
                        output.push_str(&text);
                    }
                }
                Block::Image { .. } => {
                    let Some(descriptor) = images.next_for_block(&descriptors, &mut cursor) else {
                        continue;
                    };
                    if let Some(filename) = images.extract(descriptor.xref, index, source) {
                        output.push_str(&format!(
                            "![Image {} (Page {})]({})\n\n",
                            images.image_count(),
                            index + 1,
                            images.link(&filename)
                        ));
                        images.mark_used(descriptor.xref);
                    }
                }
            }
        }

        output
    }
}
