//! Page geometry.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page space.
///
/// Coordinates grow rightwards and downwards: `top` is the smaller y value,
/// so sorting by `top` yields top-to-bottom reading order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BBox {
    /// Create a bounding box from its edges.
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create from the `[x0, y0, x1, y1]` layout used by most decoders.
    pub fn from_array(values: [f32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Union of an iterator of boxes, `None` when empty.
    pub fn enclosing<'a, I>(boxes: I) -> Option<BBox>
    where
        I: IntoIterator<Item = &'a BBox>,
    {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BBox>, b| {
                Some(acc.map_or(*b, |a| a.union(b)))
            })
    }

    /// Reading order: ascending `top`, then ascending `left`.
    pub fn reading_order(&self, other: &BBox) -> Ordering {
        self.top
            .partial_cmp(&other.top)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.left.partial_cmp(&other.left).unwrap_or(Ordering::Equal))
    }
}
