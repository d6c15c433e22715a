//! Document backend abstraction layer.
//!
//! Provides a trait-based interface to the structured-text decoder, isolating
//! the concrete PDF library (lopdf) and the JSON dump reader from the layout
//! and rendering logic.

use std::path::Path;

use image::DynamicImage;

use crate::detect::{detect_input, ensure_input_exists, InputKind};
use crate::error::Result;
use crate::model::PageContent;

use super::{JsonBackend, LopdfBackend};

/// Abstract interface for structured-text access to an open document.
///
/// Implementations hand out one page at a time, already parsed into the
/// typed model, and rasterize embedded images by object number.
pub trait PdfBackend {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Load the blocks and raw image list of page `index` (0-based).
    fn load_page(&self, index: usize) -> Result<PageContent>;

    /// Decode the image object `xref` into a raster.
    fn render_image(&self, xref: u32) -> Result<DynamicImage>;
}

impl<B: PdfBackend + ?Sized> PdfBackend for Box<B> {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn load_page(&self, index: usize) -> Result<PageContent> {
        (**self).load_page(index)
    }

    fn render_image(&self, xref: u32) -> Result<DynamicImage> {
        (**self).render_image(xref)
    }
}

/// Open `path` with the backend matching its content.
///
/// A missing file yields [`crate::Error::InputNotFound`]; anything else that
/// prevents opening is reported as [`crate::Error::DocumentOpen`].
pub fn open<P: AsRef<Path>>(path: P) -> Result<Box<dyn PdfBackend>> {
    let path = path.as_ref();
    ensure_input_exists(path)?;

    let backend: Result<Box<dyn PdfBackend>> = detect_input(path).and_then(|kind| {
        log::debug!("Opening {} as {}", path.display(), kind);
        match kind {
            InputKind::Pdf { .. } => {
                LopdfBackend::load_file(path).map(|b| Box::new(b) as Box<dyn PdfBackend>)
            }
            InputKind::StructuredJson => {
                JsonBackend::load_file(path).map(|b| Box::new(b) as Box<dyn PdfBackend>)
            }
        }
    });

    backend.map_err(|e| e.into_open_failure(path))
}
