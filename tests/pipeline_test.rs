//! Integration tests for document assembly with an in-memory backend.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::DynamicImage;
use layoutmd::error::{Error, Result};
use layoutmd::model::{BBox, Block, Line, PageContent, RawImage, Span, StyleFlags};
use layoutmd::render::{ConvertOptions, DocumentAssembler, ImageStore, Progress};
use layoutmd::PdfBackend;

/// Backend serving prebuilt pages; xrefs listed in `broken` fail to render.
struct FakeBackend {
    pages: Vec<PageContent>,
    broken: Vec<u32>,
    fail_page: Option<usize>,
}

impl FakeBackend {
    fn new(pages: Vec<PageContent>) -> Self {
        Self {
            pages,
            broken: Vec::new(),
            fail_page: None,
        }
    }
}

impl PdfBackend for FakeBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_page(&self, index: usize) -> Result<PageContent> {
        if self.fail_page == Some(index) {
            return Err(Error::PdfParse(format!("page {index} is damaged")));
        }
        self.pages
            .get(index)
            .cloned()
            .ok_or(Error::PageOutOfRange(index, self.pages.len()))
    }

    fn render_image(&self, xref: u32) -> Result<DynamicImage> {
        if self.broken.contains(&xref) {
            return Err(Error::ImageExtract(format!("image {xref} is broken")));
        }
        Ok(DynamicImage::new_rgb8(4, 4))
    }
}

/// Store that records the paths it was asked to write.
#[derive(Clone, Default)]
struct RecordingStore {
    saved: Rc<RefCell<Vec<PathBuf>>>,
}

impl ImageStore for RecordingStore {
    fn save(&mut self, _image: &DynamicImage, path: &Path) -> Result<()> {
        self.saved.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

impl RecordingStore {
    fn file_names(&self) -> Vec<String> {
        self.saved
            .borrow()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

fn text_page(index: usize, text: &str) -> PageContent {
    let mut page = PageContent::new(index);
    page.add_block(Block::text(vec![Line::new(
        vec![Span::new(text, 11.0)],
        BBox::new(72.0, 72.0, 300.0, 83.0),
    )]));
    page
}

fn image_page(index: usize, xref: u32) -> PageContent {
    let mut page = text_page(index, "caption");
    page.add_block(Block::image(0, BBox::new(72.0, 100.0, 300.0, 300.0)));
    page.add_image(RawImage::new(xref, 4, 4));
    page
}

#[test]
fn test_split_inserts_separator_between_pages_only() {
    let backend = FakeBackend::new(vec![
        text_page(0, "one"),
        text_page(1, "two"),
        text_page(2, "three"),
    ]);
    let options = ConvertOptions::default().with_split_by_page(true);
    let rendered = DocumentAssembler::new(options)
        .with_image_store(Box::new(RecordingStore::default()))
        .render(&backend, Path::new("out_images"))
        .unwrap();

    assert_eq!(rendered.markdown.matches("\n---\n\n").count(), 2);
    assert_eq!(
        rendered.markdown,
        "one\n\n\n---\n\ntwo\n\n\n---\n\nthree\n\n"
    );
    assert_eq!(rendered.page_count, 3);
}

#[test]
fn test_no_split_concatenates_pages() {
    let backend = FakeBackend::new(vec![text_page(0, "one"), text_page(1, "two")]);
    let rendered = DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(RecordingStore::default()))
        .render(&backend, Path::new("out_images"))
        .unwrap();
    assert_eq!(rendered.markdown, "one\n\ntwo\n\n");
}

#[test]
fn test_custom_separator() {
    let backend = FakeBackend::new(vec![text_page(0, "a"), text_page(1, "b")]);
    let options = ConvertOptions::default()
        .with_split_by_page(true)
        .with_page_separator("<!-- page -->");
    let rendered = DocumentAssembler::new(options)
        .with_image_store(Box::new(RecordingStore::default()))
        .render(&backend, Path::new("out_images"))
        .unwrap();
    assert_eq!(rendered.markdown, "a\n\n\n<!-- page -->\n\nb\n\n");
}

#[test]
fn test_image_counter_spans_pages_and_counts_failures() {
    let mut backend = FakeBackend::new(vec![
        image_page(0, 10),
        image_page(1, 11),
        image_page(2, 12),
    ]);
    backend.broken.push(11);

    let store = RecordingStore::default();
    let rendered = DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(store.clone()))
        .render(&backend, Path::new("doc_images"))
        .unwrap();

    assert_eq!(store.file_names(), vec!["page1_img1.png", "page3_img3.png"]);
    assert!(rendered
        .markdown
        .contains("![Image 1 (Page 1)](doc_images/page1_img1.png)"));
    assert!(rendered
        .markdown
        .contains("![Image 3 (Page 3)](doc_images/page3_img3.png)"));
    assert!(!rendered.markdown.contains("page2_img2"));
    assert_eq!(rendered.image_count, 3);
}

#[test]
fn test_same_xref_embedded_once_per_page() {
    let mut page = image_page(0, 10);
    page.add_block(Block::image(0, BBox::new(72.0, 400.0, 300.0, 500.0)));
    page.add_image(RawImage::new(10, 4, 4));
    let backend = FakeBackend::new(vec![page, image_page(1, 10)]);

    let store = RecordingStore::default();
    let rendered = DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(store.clone()))
        .render(&backend, Path::new("doc_images"))
        .unwrap();

    // Second block on page 1 finds no unused descriptor; page 2 starts fresh
    assert_eq!(store.file_names(), vec!["page1_img1.png", "page2_img2.png"]);
    assert_eq!(rendered.markdown.matches("![Image").count(), 2);
}

#[test]
fn test_malformed_image_entries_are_ignored() {
    let mut page = text_page(0, "text");
    page.add_block(Block::image(0, BBox::new(0.0, 200.0, 10.0, 210.0)));
    page.add_image(RawImage {
        xref: 5,
        width: None,
        height: Some(4),
    });
    let backend = FakeBackend::new(vec![page]);

    let store = RecordingStore::default();
    let rendered = DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(store.clone()))
        .render(&backend, Path::new("doc_images"))
        .unwrap();
    assert!(store.file_names().is_empty());
    assert_eq!(rendered.markdown, "text\n\n");
}

#[test]
fn test_emphasis_and_headings_per_page() {
    let mut page = PageContent::new(0);
    page.add_block(Block::text(vec![Line::new(
        vec![Span::new("Overview", 18.0).with_flags(StyleFlags::BOLD)],
        BBox::new(72.0, 40.0, 300.0, 58.0),
    )]));
    page.add_block(Block::text(vec![Line::new(
        vec![
            Span::new("plain", 12.0),
            Span::new("slanted", 12.0).with_flags(StyleFlags::ITALIC),
        ],
        BBox::new(72.0, 80.0, 300.0, 92.0),
    )]));
    let backend = FakeBackend::new(vec![page]);

    let rendered = DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(RecordingStore::default()))
        .render(&backend, Path::new("x_images"))
        .unwrap();
    assert_eq!(rendered.markdown, "## **Overview**\n\nplain *slanted*\n\n");
}

#[test]
fn test_progress_reported_every_interval_and_at_end() {
    let pages = (0..25).map(|i| text_page(i, "p")).collect();
    let backend = FakeBackend::new(pages);

    let mut reports = Vec::new();
    DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(RecordingStore::default()))
        .on_progress(|p: Progress| reports.push(p.page))
        .render(&backend, Path::new("x_images"))
        .unwrap();
    assert_eq!(reports, vec![10, 20, 25]);
}

#[test]
fn test_page_error_aborts_without_writing_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("broken.md");

    let mut backend = FakeBackend::new(vec![text_page(0, "a"), text_page(1, "b")]);
    backend.fail_page = Some(1);

    let result = DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(RecordingStore::default()))
        .convert(&backend, &output);

    assert!(matches!(result, Err(Error::PdfParse(_))));
    assert!(!output.exists());
    // Only the images directory was created
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_convert_writes_markdown_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.md");
    let backend = FakeBackend::new(vec![image_page(0, 3)]);

    let summary = DocumentAssembler::new(ConvertOptions::default())
        .with_image_store(Box::new(RecordingStore::default()))
        .convert(&backend, &output)
        .unwrap();

    assert_eq!(summary.images_dir, dir.path().join("report_images"));
    assert!(summary.images_dir.is_dir());
    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.image_count, 1);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "caption\n\n![Image 1 (Page 1)](report_images/page1_img1.png)\n\n"
    );
}
