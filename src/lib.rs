//! # layoutmd
//!
//! Layout-aware conversion of PDF documents to Markdown.
//!
//! Each page is decoded into geometrically placed text and image blocks.
//! Heading levels are inferred from font size relative to the page's body
//! text, lines are grouped into paragraphs by vertical gaps, bold and italic
//! runs become emphasis, and embedded images are extracted to PNG files and
//! linked where they appear.
//!
//! ## Quick Start
//!
//! ```no_run
//! use layoutmd::{convert_file, ConvertOptions};
//!
//! fn main() -> layoutmd::Result<()> {
//!     let options = ConvertOptions::default().with_split_by_page(true);
//!     let summary = convert_file("report.pdf", "out/report.md", &options)?;
//!     println!(
//!         "{} pages, images in {}",
//!         summary.page_count,
//!         summary.images_dir.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Inputs
//!
//! - **PDF files**, decoded with `lopdf`
//! - **Structured-text dumps** in JSON (see [`parser::structured`]), for
//!   documents decoded ahead of time

pub mod detect;
pub mod error;
pub mod layout;
pub mod model;
pub mod parser;
pub mod render;
pub mod text;

// Re-export commonly used types
pub use detect::{detect_input, is_pdf, InputKind};
pub use error::{Error, Result};
pub use layout::{FontMetrics, HeadingClassifier, HeadingThresholds, ParagraphSegmenter};
pub use model::{BBox, Block, ImageDescriptor, Line, PageContent, RawImage, Span, StyleFlags};
pub use parser::{JsonBackend, LopdfBackend, PdfBackend};
pub use render::{
    images_dir_for, render_markdown, ConversionSummary, ConvertOptions, DocumentAssembler,
    ImageStore, PngImageStore, Progress, RenderedDocument,
};

use std::fs;
use std::path::Path;

/// Open a document with the backend matching its content.
///
/// # Example
///
/// ```no_run
/// use layoutmd::{open_document, PdfBackend};
///
/// let doc = open_document("document.pdf").unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn open_document<P: AsRef<Path>>(path: P) -> Result<Box<dyn PdfBackend>> {
    parser::open(path)
}

/// Convert `input` to Markdown at `output`.
///
/// Images are written to `<output without extension>_images/`, which is
/// created before the input is opened. The Markdown file is only written
/// when the whole document converted successfully.
///
/// # Errors
///
/// - [`Error::InputNotFound`] when `input` does not exist
/// - [`Error::DocumentOpen`] when it cannot be opened as a document
/// - any error raised while reading pages or writing the output
pub fn convert_file<P, Q>(input: P, output: Q, options: &ConvertOptions) -> Result<ConversionSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let input = input.as_ref();
    let output = output.as_ref();

    detect::ensure_input_exists(input)?;
    fs::create_dir_all(images_dir_for(output))?;

    let source = parser::open(input)?;
    DocumentAssembler::new(options.clone()).convert(&source, output)
}

/// Convert `input` and return the Markdown instead of writing it.
///
/// Images are still extracted into `images_dir`.
pub fn to_markdown<P, Q>(input: P, images_dir: Q, options: &ConvertOptions) -> Result<String>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let source = parser::open(input)?;
    Ok(render_markdown(&source, images_dir.as_ref(), options)?.markdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.md");
        let err = convert_file(dir.path().join("nope.pdf"), &output, &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
        assert!(!output.exists());
    }
}
