//! Lines and blocks.

use serde::{Deserialize, Serialize};

use super::{BBox, Span};

/// An ordered run of spans sharing a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub spans: Vec<Span>,
    pub bbox: BBox,
}

impl Line {
    pub fn new(spans: Vec<Span>, bbox: BBox) -> Self {
        Self { spans, bbox }
    }
}

/// A page region classified by the decoder as text or image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A run of text lines
    Text { lines: Vec<Line>, bbox: BBox },
    /// A placed raster image
    Image { xref: u32, bbox: BBox },
}

impl Block {
    /// Create a text block whose box encloses all of its lines.
    pub fn text(lines: Vec<Line>) -> Self {
        let bbox = BBox::enclosing(lines.iter().map(|l| &l.bbox)).unwrap_or_default();
        Block::Text { lines, bbox }
    }

    /// Create an image block.
    pub fn image(xref: u32, bbox: BBox) -> Self {
        Block::Image { xref, bbox }
    }

    pub fn bbox(&self) -> &BBox {
        match self {
            Block::Text { bbox, .. } | Block::Image { bbox, .. } => bbox,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Block::Text { .. })
    }

    /// Lines of a text block; empty for images.
    pub fn lines(&self) -> &[Line] {
        match self {
            Block::Text { lines, .. } => lines,
            Block::Image { .. } => &[],
        }
    }

    /// All spans of the block in line order.
    pub fn spans(&self) -> impl Iterator<Item = &Span> + '_ {
        self.lines().iter().flat_map(|line| line.spans.iter())
    }
}
