//! Typed structured-text model.
//!
//! This is the representation every decoder produces and every layout stage
//! consumes: pages of geometrically placed text and image blocks. Decoders
//! that hand out untyped payloads are parsed into these types once, at the
//! boundary (see [`crate::parser::structured`]).

mod block;
mod geometry;
mod page;
mod span;

pub use block::{Block, Line};
pub use geometry::BBox;
pub use page::{ImageDescriptor, PageContent, RawImage};
pub use span::{round_size, size_tenths, Span, StyleFlags};
