//! Rendering module: pages to Markdown, images to PNG files.

mod document;
mod images;
mod options;
mod page;

pub use document::{
    images_dir_for, render_markdown, write_atomically, ConversionSummary, DocumentAssembler,
    Progress, RenderedDocument,
};
pub use images::{normalize_color, ImageInterleaver, ImageStore, PngImageStore};
pub use options::ConvertOptions;
pub use page::PageAssembler;
