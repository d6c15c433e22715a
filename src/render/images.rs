//! Embedded image extraction and link bookkeeping.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};

use crate::error::Result;
use crate::model::ImageDescriptor;
use crate::parser::PdfBackend;

/// Destination for extracted rasters.
pub trait ImageStore {
    /// Persist `image` at `path`.
    fn save(&mut self, image: &DynamicImage, path: &Path) -> Result<()>;
}

/// Writes PNG files, dropping alpha and extra channels first.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngImageStore;

impl ImageStore for PngImageStore {
    fn save(&mut self, image: &DynamicImage, path: &Path) -> Result<()> {
        match normalize_color(image) {
            Some(rgb) => rgb.save_with_format(path, ImageFormat::Png)?,
            None => image.save_with_format(path, ImageFormat::Png)?,
        }
        Ok(())
    }
}

/// RGB copy of rasters with four or more channels; `None` when the image
/// can be written as is.
pub fn normalize_color(image: &DynamicImage) -> Option<DynamicImage> {
    if image.color().channel_count() >= 4 {
        Some(DynamicImage::ImageRgb8(image.to_rgb8()))
    } else {
        None
    }
}

/// Pairs image blocks with image list entries and writes the rasters.
///
/// The counter runs across the whole document; the set of used xrefs is
/// reset for every page.
pub struct ImageInterleaver {
    images_dir: PathBuf,
    link_dir: String,
    store: Box<dyn ImageStore>,
    counter: usize,
    used: HashSet<u32>,
}

impl ImageInterleaver {
    /// Interleaver writing PNG files into `images_dir`.
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self::with_store(images_dir, Box::new(PngImageStore))
    }

    /// Interleaver writing through a custom store.
    pub fn with_store(images_dir: impl Into<PathBuf>, store: Box<dyn ImageStore>) -> Self {
        let images_dir = images_dir.into();
        let link_dir = images_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            images_dir,
            link_dir,
            store,
            counter: 0,
            used: HashSet::new(),
        }
    }

    /// Reset per-page state.
    pub fn begin_page(&mut self) {
        self.used.clear();
    }

    /// Pick the descriptor for the next image block.
    ///
    /// Descriptors whose xref was already embedded on this page are skipped.
    /// The cursor moves past the returned descriptor whether or not its
    /// extraction later succeeds.
    pub fn next_for_block<'d>(
        &self,
        descriptors: &'d [ImageDescriptor],
        cursor: &mut usize,
    ) -> Option<&'d ImageDescriptor> {
        while let Some(descriptor) = descriptors.get(*cursor) {
            *cursor += 1;
            if !self.used.contains(&descriptor.xref) {
                return Some(descriptor);
            }
        }
        None
    }

    /// Extract image `xref` of page `page_index` (0-based).
    ///
    /// Every attempt takes a number, so a failed image leaves a gap in the
    /// file names. Returns the file name on success.
    pub fn extract<S: PdfBackend + ?Sized>(
        &mut self,
        xref: u32,
        page_index: usize,
        source: &S,
    ) -> Option<String> {
        let filename = format!("page{}_img{}.png", page_index + 1, self.counter + 1);
        self.counter += 1;

        let path = self.images_dir.join(&filename);
        let result = source
            .render_image(xref)
            .and_then(|image| self.store.save(&image, &path));

        match result {
            Ok(()) => {
                log::debug!("Saved image {} as {}", xref, path.display());
                Some(filename)
            }
            Err(e) => {
                log::warn!(
                    "Failed to extract image {} on page {}: {}",
                    xref,
                    page_index + 1,
                    e
                );
                None
            }
        }
    }

    pub fn mark_used(&mut self, xref: u32) {
        self.used.insert(xref);
    }

    pub fn is_used(&self, xref: u32) -> bool {
        self.used.contains(&xref)
    }

    /// Xrefs embedded on the current page.
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Extraction attempts so far, across all pages.
    pub fn image_count(&self) -> usize {
        self.counter
    }

    /// Markdown link target for an extracted file.
    pub fn link(&self, filename: &str) -> String {
        if self.link_dir.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.link_dir, filename)
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Give the store back, e.g. to inspect what a test store recorded.
    pub fn into_store(self) -> Box<dyn ImageStore> {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{PageContent, RawImage};
    use image::{GenericImageView, RgbaImage};

    struct Rasters;

    impl PdfBackend for Rasters {
        fn page_count(&self) -> usize {
            1
        }

        fn load_page(&self, index: usize) -> Result<PageContent> {
            Ok(PageContent::new(index))
        }

        fn render_image(&self, xref: u32) -> Result<DynamicImage> {
            if xref == 0 {
                return Err(Error::ImageExtract("broken".to_string()));
            }
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)))
        }
    }

    #[derive(Default)]
    struct NullStore;

    impl ImageStore for NullStore {
        fn save(&mut self, _image: &DynamicImage, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn interleaver() -> ImageInterleaver {
        ImageInterleaver::with_store("out/report_images", Box::new(NullStore))
    }

    #[test]
    fn test_filenames_and_counter() {
        let mut images = interleaver();
        assert_eq!(images.extract(5, 0, &Rasters).as_deref(), Some("page1_img1.png"));
        // Failure still consumes a number
        assert_eq!(images.extract(0, 0, &Rasters), None);
        assert_eq!(images.extract(6, 2, &Rasters).as_deref(), Some("page3_img3.png"));
        assert_eq!(images.image_count(), 3);
    }

    #[test]
    fn test_link_uses_dir_basename() {
        let images = interleaver();
        assert_eq!(images.link("page1_img1.png"), "report_images/page1_img1.png");
    }

    #[test]
    fn test_cursor_skips_used_xrefs() {
        let raw = vec![
            RawImage::new(10, 1, 1),
            RawImage::new(11, 1, 1),
            RawImage::new(10, 1, 1),
            RawImage::new(12, 1, 1),
        ];
        let descriptors = ImageDescriptor::from_raw_list(&raw);
        let mut images = interleaver();
        let mut cursor = 0;

        let first = images.next_for_block(&descriptors, &mut cursor).unwrap();
        assert_eq!(first.xref, 10);
        images.mark_used(10);

        let second = images.next_for_block(&descriptors, &mut cursor).unwrap();
        assert_eq!(second.xref, 11);

        // The repeated 10 is skipped
        let third = images.next_for_block(&descriptors, &mut cursor).unwrap();
        assert_eq!(third.xref, 12);
        assert!(images.next_for_block(&descriptors, &mut cursor).is_none());
        assert_eq!(cursor, 4);

        images.begin_page();
        assert!(!images.is_used(10));
        assert_eq!(images.used_count(), 0);
    }

    #[test]
    fn test_normalize_color() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(3, 2));
        let rgb = normalize_color(&rgba).unwrap();
        assert_eq!(rgb.color().channel_count(), 3);
        assert_eq!(rgb.dimensions(), (3, 2));

        let gray = DynamicImage::new_luma8(1, 1);
        assert!(normalize_color(&gray).is_none());
    }

    #[test]
    fn test_png_store_writes_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.png");
        let mut store = PngImageStore;
        store
            .save(&DynamicImage::ImageRgba8(RgbaImage::new(4, 4)), &path)
            .unwrap();
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.color(), image::ColorType::Rgb8);
    }
}
