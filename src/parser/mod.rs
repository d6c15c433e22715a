//! Document decoding module.
//!
//! Backends turn an input file into typed [`crate::model::PageContent`]
//! pages, one at a time.

mod backend;
mod lopdf_backend;
pub mod structured;

pub use backend::{open, PdfBackend};
pub use lopdf_backend::LopdfBackend;
pub use structured::{parse_blocks, parse_image_list, JsonBackend, Raster};
