//! Whole-document conversion and output writing.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::parser::PdfBackend;

use super::{ConvertOptions, ImageInterleaver, ImageStore, PageAssembler, PngImageStore};

/// Directory receiving extracted images for `output`: the output path with
/// its extension stripped and `_images` appended.
pub fn images_dir_for(output: &Path) -> PathBuf {
    let mut name = output.with_extension("").into_os_string();
    name.push("_images");
    PathBuf::from(name)
}

/// Progress report after a page has been assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Pages done so far
    pub page: usize,
    /// Total pages in the document
    pub total: usize,
}

/// Markdown produced for a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    pub markdown: String,
    pub page_count: usize,
    /// Image extraction attempts, failed ones included
    pub image_count: usize,
}

/// Outcome of a file conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub output_path: PathBuf,
    pub images_dir: PathBuf,
    pub page_count: usize,
    pub image_count: usize,
}

type ProgressCallback<'a> = Box<dyn FnMut(Progress) + 'a>;

/// Drives page-by-page conversion of a document.
pub struct DocumentAssembler<'a> {
    options: ConvertOptions,
    store: Option<Box<dyn ImageStore>>,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            store: None,
            progress: None,
        }
    }

    /// Use `store` instead of writing PNG files.
    pub fn with_image_store(mut self, store: Box<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Progress) + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert every page of `source` to Markdown, extracting images into
    /// `images_dir`. Nothing is written besides the images.
    pub fn render<S: PdfBackend + ?Sized>(
        &mut self,
        source: &S,
        images_dir: &Path,
    ) -> Result<RenderedDocument> {
        let store: Box<dyn ImageStore> = match self.store.take() {
            Some(store) => store,
            None => Box::new(PngImageStore),
        };
        let mut images = ImageInterleaver::with_store(images_dir, store);
        let result = self.render_pages(source, &mut images);
        self.store = Some(images.into_store());
        result
    }

    fn render_pages<S: PdfBackend + ?Sized>(
        &mut self,
        source: &S,
        images: &mut ImageInterleaver,
    ) -> Result<RenderedDocument> {
        let assembler = PageAssembler::new(&self.options);
        let total = source.page_count();
        let mut markdown = String::new();

        for index in 0..total {
            let page = source.load_page(index)?;
            markdown.push_str(&assembler.process_page(page, source, images));

            if self.options.split_by_page && index + 1 < total {
                markdown.push('\n');
                markdown.push_str(&self.options.page_separator);
                markdown.push_str("\n\n");
            }

            if self.options.should_report(index, total) {
                log::info!("Processed {}/{} pages", index + 1, total);
                if let Some(callback) = self.progress.as_mut() {
                    callback(Progress {
                        page: index + 1,
                        total,
                    });
                }
            }
        }

        Ok(RenderedDocument {
            markdown,
            page_count: total,
            image_count: images.image_count(),
        })
    }

    /// Convert `source` and write the Markdown to `output_path`.
    ///
    /// The images directory is derived from the output path and created if
    /// needed. The Markdown file is replaced atomically.
    pub fn convert<S: PdfBackend + ?Sized>(
        &mut self,
        source: &S,
        output_path: &Path,
    ) -> Result<ConversionSummary> {
        let images_dir = images_dir_for(output_path);
        fs::create_dir_all(&images_dir)?;

        let rendered = self.render(source, &images_dir)?;
        write_atomically(output_path, rendered.markdown.as_bytes())?;
        log::info!(
            "Wrote {} ({} pages, {} images)",
            output_path.display(),
            rendered.page_count,
            rendered.image_count
        );

        Ok(ConversionSummary {
            output_path: output_path.to_path_buf(),
            images_dir,
            page_count: rendered.page_count,
            image_count: rendered.image_count,
        })
    }
}

/// Write `data` to a temporary file next to `path`, then move it into place.
pub fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.flush()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Render `source` with `options`, extracting images into `images_dir`.
pub fn render_markdown<S: PdfBackend + ?Sized>(
    source: &S,
    images_dir: &Path,
    options: &ConvertOptions,
) -> Result<RenderedDocument> {
    fs::create_dir_all(images_dir)?;
    DocumentAssembler::new(options.clone()).render(source, images_dir)
}
