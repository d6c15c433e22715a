//! Page-level types.

use serde::{Deserialize, Serialize};

use super::Block;

/// One entry of a page's raw image list, as reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImage {
    /// Object number of the image
    pub xref: u32,
    /// Width in pixels, when reported
    pub width: Option<u32>,
    /// Height in pixels, when reported
    pub height: Option<u32>,
}

impl RawImage {
    pub fn new(xref: u32, width: u32, height: u32) -> Self {
        Self {
            xref,
            width: Some(width),
            height: Some(height),
        }
    }
}

/// A well-formed image list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub xref: u32,
    pub width: u32,
    pub height: u32,
    /// Position in the raw image list
    pub index: usize,
}

impl ImageDescriptor {
    /// Build descriptors from a raw list, dropping entries without
    /// dimensions. `index` keeps the position in the raw list.
    pub fn from_raw_list(raw: &[RawImage]) -> Vec<ImageDescriptor> {
        raw.iter()
            .enumerate()
            .filter_map(|(index, image)| {
                Some(ImageDescriptor {
                    xref: image.xref,
                    width: image.width?,
                    height: image.height?,
                    index,
                })
            })
            .collect()
    }
}

/// Structured content of a single page, as loaded from a decoder.
///
/// Blocks are kept in the order the decoder produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// Page index (0-based)
    pub index: usize,
    /// Text and image blocks, unsorted
    pub blocks: Vec<Block>,
    /// Raw image list of the page
    pub images: Vec<RawImage>,
}

impl PageContent {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn add_image(&mut self, image: RawImage) {
        self.images.push(image);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
