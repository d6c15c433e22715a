//! PDF decoding backed by lopdf.
//!
//! Interprets page content streams to recover placed text runs and image
//! draws, then groups runs into lines and lines into blocks. Coordinates are
//! converted to top-down page space on the way out.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::model::{BBox, Block, Line, PageContent, RawImage, Span, StyleFlags};
use crate::text::decode_bytes;

use super::PdfBackend;

/// TJ adjustment (thousandths of an em) above which a word space is assumed.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Approximate glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f32 = 0.5;

const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

/// Upper bound on decoded samples for one image.
const MAX_IMAGE_SAMPLES: usize = 256 * 1024 * 1024;
const DEFAULT_LEADING: f32 = 12.0;

/// Parent chain depth limit when looking up inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
    pages: Vec<ObjectId>,
}

impl LopdfBackend {
    /// Load from a file path.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_document(LopdfDocument::load(path)?))
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::from_document(LopdfDocument::load_mem(data)?))
    }

    /// Wrap an already loaded document.
    pub fn from_document(doc: LopdfDocument) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    /// Get PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(Error::PageOutOfRange(index, self.pages.len()))
    }

    /// Look up a page attribute, following the `Parent` chain.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = current.get(key) {
                return Some(resolve(&self.doc, value));
            }
            let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
            current = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    /// Top edge of the page in PDF user space.
    fn page_top(&self, page_id: ObjectId) -> f32 {
        self.inherited(page_id, b"MediaBox")
            .and_then(|mb| mb.as_array().ok())
            .filter(|arr| arr.len() >= 4)
            .and_then(|arr| {
                let y0 = get_number(resolve(&self.doc, &arr[1]))?;
                let y1 = get_number(resolve(&self.doc, &arr[3]))?;
                Some(y0.max(y1))
            })
            .unwrap_or(DEFAULT_PAGE_HEIGHT)
    }

    fn page_xobjects(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let resources = self.inherited(page_id, b"Resources")?.as_dict().ok()?;
        let xobjects = resources.get(b"XObject").ok()?;
        resolve(&self.doc, xobjects).as_dict().ok()
    }

    /// Get page content stream.
    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;

        // A page without contents is blank
        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        match contents {
            Object::Reference(r) => {
                if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                    return stream_bytes(&self.doc, s);
                }
                Err(Error::PdfParse("Invalid content stream".to_string()))
            }
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Object::Reference(r) = obj {
                        if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                            match stream_bytes(&self.doc, s) {
                                Ok(data) => {
                                    content.extend_from_slice(&data);
                                    content.push(b' ');
                                }
                                Err(e) => log::debug!("Skipping content part {:?}: {}", r, e),
                            }
                        }
                    }
                }
                Ok(content)
            }
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    /// Image XObjects in the page resources, in dictionary order, without
    /// duplicates.
    fn raw_image_list(&self, xobjects: Option<&Dictionary>) -> Vec<RawImage> {
        let Some(xobjects) = xobjects else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut images = Vec::new();
        for (_, obj) in xobjects.iter() {
            let Ok(id) = obj.as_reference() else {
                continue;
            };
            let Ok(stream) = self.doc.get_object(id).and_then(Object::as_stream) else {
                continue;
            };
            if !is_image(&stream.dict) || !seen.insert(id.0) {
                continue;
            }
            images.push(RawImage {
                xref: id.0,
                width: dict_u32(&self.doc, &stream.dict, b"Width"),
                height: dict_u32(&self.doc, &stream.dict, b"Height"),
            });
        }
        images
    }

    fn find_stream(&self, xref: u32) -> Result<&Stream> {
        let (_, object) = self
            .doc
            .objects
            .range((xref, 0)..=(xref, u16::MAX))
            .next()
            .ok_or_else(|| Error::ImageExtract(format!("image {xref}: object not found")))?;
        object
            .as_stream()
            .map_err(|_| Error::ImageExtract(format!("image {xref}: not a stream")))
    }

    /// Decode an image stream. The soft mask is only applied when
    /// `with_mask` is set, so a mask is never decoded with its own mask.
    fn decode_image(&self, xref: u32, stream: &Stream, with_mask: bool) -> Result<DynamicImage> {
        let dict = &stream.dict;

        let width = dict_u32(&self.doc, dict, b"Width")
            .ok_or_else(|| image_error(xref, "missing width"))?;
        let height = dict_u32(&self.doc, dict, b"Height")
            .ok_or_else(|| image_error(xref, "missing height"))?;
        let filters = filter_names(&self.doc, dict);

        let image = match filters.last().map(String::as_str) {
            Some("DCTDecode") if filters.len() == 1 => {
                image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)?
            }
            Some("DCTDecode") => {
                return Err(image_error(xref, "chained JPEG filters are not supported"))
            }
            Some("JPXDecode") => {
                return Err(image_error(xref, "JPEG 2000 images are not supported"))
            }
            Some("JBIG2Decode") | Some("CCITTFaxDecode") => {
                return Err(image_error(xref, "bilevel fax/JBIG2 images are not supported"))
            }
            _ => {
                let data = stream_bytes(&self.doc, stream).map_err(|e| image_error(xref, e))?;
                let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
                let color_space = if is_mask {
                    ColorSpace::Gray
                } else {
                    self.color_space(dict.get(b"ColorSpace").ok(), true)
                        .map_err(|e| image_error(xref, e))?
                };
                let bpc = if is_mask {
                    1
                } else {
                    dict_u32(&self.doc, dict, b"BitsPerComponent").unwrap_or(8)
                };
                build_raster(&color_space, width, height, bpc, &data)
                    .map_err(|e| image_error(xref, e))?
            }
        };

        if with_mask {
            Ok(self.apply_soft_mask(xref, dict, image))
        } else {
            Ok(image)
        }
    }

    /// Attach the `SMask` as alpha when it decodes and matches in size.
    fn apply_soft_mask(&self, xref: u32, dict: &Dictionary, image: DynamicImage) -> DynamicImage {
        let Some(mask_id) = dict.get(b"SMask").and_then(Object::as_reference).ok() else {
            return image;
        };
        let mask = self
            .doc
            .get_object(mask_id)
            .and_then(Object::as_stream)
            .map_err(Error::from)
            .and_then(|s| self.decode_image(mask_id.0, s, false));

        match mask {
            Ok(mask) if mask.width() == image.width() && mask.height() == image.height() => {
                let alpha = mask.to_luma8();
                let mut rgba = image.to_rgba8();
                for (pixel, a) in rgba.pixels_mut().zip(alpha.pixels()) {
                    pixel.0[3] = a.0[0];
                }
                DynamicImage::ImageRgba8(rgba)
            }
            Ok(_) => {
                log::debug!("Ignoring soft mask of image {}: size mismatch", xref);
                image
            }
            Err(e) => {
                log::debug!("Ignoring soft mask of image {}: {}", xref, e);
                image
            }
        }
    }

    /// Resolve a color space. `allow_indexed` is cleared for the base of an
    /// `Indexed` space, which may not itself be indexed.
    fn color_space(
        &self,
        object: Option<&Object>,
        allow_indexed: bool,
    ) -> std::result::Result<ColorSpace, String> {
        let Some(object) = object else {
            return Ok(ColorSpace::Gray);
        };

        match resolve(&self.doc, object) {
            Object::Name(name) => ColorSpace::from_name(name),
            Object::Array(arr) => {
                let family = arr
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| "malformed color space".to_string())?;
                match family {
                    b"ICCBased" => {
                        let n = arr
                            .get(1)
                            .map(|o| resolve(&self.doc, o))
                            .and_then(|o| o.as_stream().ok())
                            .and_then(|s| dict_u32(&self.doc, &s.dict, b"N"))
                            .unwrap_or(3);
                        match n {
                            1 => Ok(ColorSpace::Gray),
                            3 => Ok(ColorSpace::Rgb),
                            4 => Ok(ColorSpace::Cmyk),
                            n => Err(format!("ICC profile with {n} components")),
                        }
                    }
                    b"Indexed" | b"I" if !allow_indexed => {
                        Err("nested indexed color space".to_string())
                    }
                    b"Indexed" | b"I" => {
                        let base = self.color_space(arr.get(1), false)?;
                        let palette = match arr.get(3).map(|o| resolve(&self.doc, o)) {
                            Some(Object::String(bytes, _)) => bytes.clone(),
                            Some(Object::Stream(s)) => {
                                stream_bytes(&self.doc, s).map_err(|e| e.to_string())?
                            }
                            _ => return Err("indexed color space without lookup".to_string()),
                        };
                        Ok(ColorSpace::Indexed {
                            base: Box::new(base),
                            palette,
                        })
                    }
                    other => ColorSpace::from_name(other),
                }
            }
            _ => Err("malformed color space".to_string()),
        }
    }

    fn interpret(&self, page_id: ObjectId, xobjects: Option<&Dictionary>) -> Result<Interpreted> {
        let fonts = match self.doc.get_page_fonts(page_id) {
            Ok(fonts) => fonts,
            Err(e) => {
                log::debug!("No fonts for page {:?}: {}", page_id, e);
                BTreeMap::new()
            }
        };

        let data = self.page_content(page_id)?;
        let content = Content::decode(&data).map_err(|e| Error::PdfParse(e.to_string()))?;

        let mut interpreter = ContentInterpreter::new(&self.doc, fonts, xobjects);
        for op in &content.operations {
            interpreter.execute(&op.operator, &op.operands);
        }
        Ok(interpreter.finish())
    }
}

impl PdfBackend for LopdfBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_page(&self, index: usize) -> Result<PageContent> {
        let page_id = self.page_id(index)?;
        let page_top = self.page_top(page_id);
        let xobjects = self.page_xobjects(page_id);

        let mut page = PageContent::new(index);
        page.images = self.raw_image_list(xobjects);

        let output = match self.interpret(page_id, xobjects) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Failed to extract text from page {}: {}", index + 1, e);
                return Ok(page);
            }
        };

        page.blocks = group_into_blocks(output.runs, page_top);
        for placed in output.images {
            page.add_block(Block::image(placed.xref, placed.rect.to_page(page_top)));
        }
        Ok(page)
    }

    fn render_image(&self, xref: u32) -> Result<DynamicImage> {
        let stream = self.find_stream(xref)?;
        if !is_image(&stream.dict) {
            return Err(Error::ImageExtract(format!("object {xref} is not an image")));
        }
        self.decode_image(xref, stream, true)
    }
}

// ---------------------------------------------------------------------------
// Content stream interpretation
// ---------------------------------------------------------------------------

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        let v = operands[..6]
            .iter()
            .map(get_number)
            .collect::<Option<Vec<f32>>>()?;
        Some(Matrix {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    fn translation(tx: f32, ty: f32) -> Matrix {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    /// `self` applied first, then `next`.
    fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// A rectangle in PDF user space (bottom-up).
#[derive(Debug, Clone, Copy)]
struct UserRect {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl UserRect {
    /// Bounds of the unit square under `m`.
    fn unit_square(m: &Matrix) -> Self {
        let corners = [m.apply(0.0, 0.0), m.apply(1.0, 0.0), m.apply(0.0, 1.0), m.apply(1.0, 1.0)];
        let xs = corners.iter().map(|c| c.0);
        let ys = corners.iter().map(|c| c.1);
        Self {
            x0: xs.clone().fold(f32::INFINITY, f32::min),
            x1: xs.fold(f32::NEG_INFINITY, f32::max),
            y0: ys.clone().fold(f32::INFINITY, f32::min),
            y1: ys.fold(f32::NEG_INFINITY, f32::max),
        }
    }

    fn to_page(self, page_top: f32) -> BBox {
        BBox::new(self.x0, page_top - self.y1, self.x1, page_top - self.y0)
    }
}

/// A text run as shown by one text operator.
#[derive(Debug, Clone)]
struct TextRun {
    text: String,
    x: f32,
    /// Baseline, bottom-up
    y: f32,
    width: f32,
    size: f32,
    font: String,
    encoding: Option<String>,
}

impl TextRun {
    fn bbox(&self, page_top: f32) -> BBox {
        BBox::new(
            self.x,
            page_top - (self.y + self.size * 0.8),
            self.x + self.width,
            page_top - (self.y - self.size * 0.2),
        )
    }

    fn into_span(self) -> Span {
        let flags = StyleFlags::from_font_name(&self.font);
        let mut span = Span::new(self.text, self.size)
            .with_flags(flags)
            .with_font(self.font);
        span.encoding = self.encoding;
        span
    }
}

#[derive(Debug, Clone, Copy)]
struct PlacedImage {
    xref: u32,
    rect: UserRect,
}

struct TextState {
    font_key: Vec<u8>,
    font_name: String,
    font_size: f32,
    leading: f32,
    matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 12.0,
            leading: DEFAULT_LEADING,
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
        }
    }
}

/// What the interpreter collected from one page.
struct Interpreted {
    runs: Vec<TextRun>,
    images: Vec<PlacedImage>,
}

/// Minimal content stream interpreter: graphics state (CTM), text state and
/// text showing operators, and image XObject draws.
struct ContentInterpreter<'a> {
    doc: &'a LopdfDocument,
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
    xobjects: Option<&'a Dictionary>,
    ctm: Matrix,
    saved: Vec<Matrix>,
    text: TextState,
    in_text: bool,
    runs: Vec<TextRun>,
    images: Vec<PlacedImage>,
}

impl<'a> ContentInterpreter<'a> {
    fn new(
        doc: &'a LopdfDocument,
        fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
        xobjects: Option<&'a Dictionary>,
    ) -> Self {
        Self {
            doc,
            fonts,
            xobjects,
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            text: TextState::default(),
            in_text: false,
            runs: Vec::new(),
            images: Vec::new(),
        }
    }

    fn finish(self) -> Interpreted {
        Interpreted {
            runs: self.runs,
            images: self.images,
        }
    }

    fn execute(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }
            "BT" => {
                self.in_text = true;
                self.text.matrix = Matrix::IDENTITY;
                self.text.line_matrix = Matrix::IDENTITY;
            }
            "ET" => self.in_text = false,
            "Tf" => {
                if operands.len() >= 2 {
                    if let Object::Name(key) = &operands[0] {
                        self.text.font_name = self
                            .fonts
                            .get(key)
                            .and_then(|font| font.get(b"BaseFont").ok())
                            .and_then(|name| name.as_name().ok())
                            .map(|name| String::from_utf8_lossy(name).to_string())
                            .unwrap_or_else(|| String::from_utf8_lossy(key).to_string());
                        self.text.font_key = key.clone();
                    }
                    self.text.font_size = get_number(&operands[1]).unwrap_or(12.0);
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(get_number) {
                    self.text.leading = leading;
                }
            }
            "Td" | "TD" => {
                if operands.len() >= 2 {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if operator == "TD" {
                        self.text.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.text.matrix = m;
                    self.text.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    let advance = self.advance_for(&text);
                    self.show(text, advance);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
            }
            "'" | "\"" => {
                self.next_line();
                let text_idx = if operator == "\"" { 2 } else { 0 };
                if let Some(Object::String(bytes, _)) = operands.get(text_idx) {
                    let text = self.decode(bytes);
                    let advance = self.advance_for(&text);
                    self.show(text, advance);
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.draw_xobject(name);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text.line_matrix = Matrix::translation(tx, ty).then(&self.text.line_matrix);
        self.text.matrix = self.text.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.text.leading);
    }

    /// Decode a string operand with the current font's encoding, falling
    /// back to the byte-level decoding chain.
    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(font) = self.fonts.get(&self.text.font_key) {
            if let Ok(encoding) = font.get_font_encoding(self.doc) {
                if let Ok(text) = LopdfDocument::decode_text(&encoding, bytes) {
                    return text;
                }
            }
        }
        decode_bytes(bytes).into_string()
    }

    fn encoding_name(&self) -> Option<String> {
        self.fonts
            .get(&self.text.font_key)
            .and_then(|font| font.get(b"Encoding").ok())
            .and_then(|enc| enc.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).to_string())
    }

    /// Horizontal advance of `text` in unscaled text space.
    fn advance_for(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.text.font_size * GLYPH_ADVANCE
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut combined = String::new();
        let mut advance = 0.0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let decoded = self.decode(bytes);
                    advance += self.advance_for(&decoded);
                    combined.push_str(&decoded);
                }
                Object::Integer(_) | Object::Real(_) => {
                    // Negative adjustments move right; large ones mark word breaks
                    let adjustment = -get_number(item).unwrap_or(0.0);
                    advance += adjustment / 1000.0 * self.text.font_size;
                    if adjustment > TJ_SPACE_THRESHOLD
                        && !combined.is_empty()
                        && !combined.ends_with(' ')
                        && !combined.ends_with('\u{00A0}')
                    {
                        combined.push(' ');
                    }
                }
                _ => {}
            }
        }

        self.show(combined, advance);
    }

    /// Record a run at the current position and advance the text matrix.
    fn show(&mut self, text: String, advance: f32) {
        let rendering = self.text.matrix.then(&self.ctm);

        if self.in_text && !text.trim().is_empty() {
            let (x, y) = rendering.apply(0.0, 0.0);
            self.runs.push(TextRun {
                x,
                y,
                width: advance * rendering.horizontal_scale(),
                size: self.text.font_size * rendering.vertical_scale(),
                font: self.text.font_name.clone(),
                encoding: self.encoding_name(),
                text,
            });
        }

        self.text.matrix = Matrix::translation(advance, 0.0).then(&self.text.matrix);
    }

    fn draw_xobject(&mut self, name: &[u8]) {
        let Some(id) = self
            .xobjects
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|obj| obj.as_reference().ok())
        else {
            return;
        };
        let Ok(stream) = self.doc.get_object(id).and_then(Object::as_stream) else {
            return;
        };
        if is_image(&stream.dict) {
            self.images.push(PlacedImage {
                xref: id.0,
                rect: UserRect::unit_square(&self.ctm),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Runs -> lines -> blocks
// ---------------------------------------------------------------------------

struct LineDraft {
    baseline: f32,
    left: f32,
    size: f32,
    line: Line,
}

/// Group text runs into lines (shared baseline) and lines into blocks.
fn group_into_blocks(runs: Vec<TextRun>, page_top: f32) -> Vec<Block> {
    let lines = group_into_lines(runs, page_top);
    if lines.is_empty() {
        return Vec::new();
    }

    let avg_spacing = average_line_spacing(&lines);
    let mut blocks = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    let mut prev: Option<(f32, f32, f32)> = None;

    for draft in lines {
        if let Some(prev) = prev {
            if should_break_block(prev, &draft, avg_spacing) && !current.is_empty() {
                blocks.push(Block::text(std::mem::take(&mut current)));
            }
        }
        prev = Some((draft.baseline, draft.left, draft.size));
        current.push(draft.line);
    }
    if !current.is_empty() {
        blocks.push(Block::text(current));
    }

    blocks
}

fn group_into_lines(mut runs: Vec<TextRun>, page_top: f32) -> Vec<LineDraft> {
    // Top to bottom (PDF y is bottom-up), then left to right
    runs.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines = Vec::new();
    let mut current: Vec<TextRun> = Vec::new();
    let mut current_y: Option<f32> = None;

    for run in runs {
        let tolerance = run.size * 0.3;
        match current_y {
            Some(y) if (run.y - y).abs() <= tolerance => current.push(run),
            _ => {
                if !current.is_empty() {
                    lines.push(build_line(std::mem::take(&mut current), page_top));
                }
                current_y = Some(run.y);
                current.push(run);
            }
        }
    }
    if !current.is_empty() {
        lines.push(build_line(current, page_top));
    }

    lines
}

/// Build a line from runs sharing a baseline, merging neighbours that share
/// font and size into one span.
fn build_line(mut runs: Vec<TextRun>, page_top: f32) -> LineDraft {
    runs.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

    let baseline = runs[0].y;
    let left = runs[0].x;
    let size = runs.iter().map(|r| r.size).fold(0.0_f32, f32::max);
    let boxes: Vec<BBox> = runs.iter().map(|r| r.bbox(page_top)).collect();
    let bbox = BBox::enclosing(&boxes).unwrap_or_default();

    let mut merged: Vec<TextRun> = Vec::new();
    for run in runs {
        match merged.last_mut() {
            Some(last) if last.font == run.font && (last.size - run.size).abs() < 0.05 => {
                let gap = run.x - (last.x + last.width);
                if gap > run.size * 0.1
                    && !last.text.ends_with(char::is_whitespace)
                    && !run.text.starts_with(char::is_whitespace)
                {
                    last.text.push(' ');
                }
                last.text.push_str(&run.text);
                last.width = (run.x + run.width) - last.x;
            }
            _ => merged.push(run),
        }
    }

    LineDraft {
        baseline,
        left,
        size,
        line: Line::new(merged.into_iter().map(TextRun::into_span).collect(), bbox),
    }
}

fn average_line_spacing(lines: &[LineDraft]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[0].baseline - w[1].baseline).abs())
        .filter(|s| *s > 0.1)
        .collect();

    if spacings.is_empty() {
        return 12.0;
    }
    spacings.iter().sum::<f32>() / spacings.len() as f32
}

/// Whether `curr` starts a new block after a line at
/// `(baseline, left, size)`.
fn should_break_block(prev: (f32, f32, f32), curr: &LineDraft, avg_spacing: f32) -> bool {
    let (baseline, left, size) = prev;

    // Large spacing indicates new paragraph
    if (baseline - curr.baseline).abs() > avg_spacing * 1.5 {
        return true;
    }

    // Significant font size change
    if (size - curr.size).abs() > 1.0 {
        return true;
    }

    // Significant left margin change (indentation)
    (left - curr.left).abs() > 20.0
}

// ---------------------------------------------------------------------------
// Object helpers
// ---------------------------------------------------------------------------

fn image_error(xref: u32, detail: impl std::fmt::Display) -> Error {
    Error::ImageExtract(format!("image {xref}: {detail}"))
}

/// Stream data with its filters applied. Streams without a `Filter` are
/// returned as stored.
fn stream_bytes(doc: &LopdfDocument, stream: &Stream) -> Result<Vec<u8>> {
    if filter_names(doc, &stream.dict).is_empty() {
        return Ok(stream.content.clone());
    }

    // lopdf refuses to decompress streams tagged as images
    let decoded = if is_image(&stream.dict) {
        let mut dict = stream.dict.clone();
        dict.remove(b"Subtype");
        Stream::new(dict, stream.content.clone()).decompressed_content()
    } else {
        stream.decompressed_content()
    };
    decoded.map_err(|e| Error::PdfParse(e.to_string()))
}

fn resolve<'a>(doc: &'a LopdfDocument, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Helper to extract number from PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn dict_u32(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    let value = resolve(doc, dict.get(key).ok()?);
    value.as_i64().ok().and_then(|v| u32::try_from(v).ok())
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image"))
}

fn filter_names(doc: &LopdfDocument, dict: &Dictionary) -> Vec<String> {
    let Ok(filter) = dict.get(b"Filter") else {
        return Vec::new();
    };
    let names = match resolve(doc, filter) {
        Object::Name(name) => vec![name.as_slice()],
        Object::Array(arr) => arr.iter().filter_map(|o| o.as_name().ok()).collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .map(|n| String::from_utf8_lossy(n).to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Raster decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    fn from_name(name: &[u8]) -> std::result::Result<ColorSpace, String> {
        match name {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(format!(
                "unsupported color space {}",
                String::from_utf8_lossy(other)
            )),
        }
    }

    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

/// Build a raster from decoded sample data.
fn build_raster(
    color_space: &ColorSpace,
    width: u32,
    height: u32,
    bpc: u32,
    data: &[u8],
) -> std::result::Result<DynamicImage, String> {
    let components = color_space.components();
    let expected = sample_count(width as usize, height as usize, components)?;
    let scale = !matches!(color_space, ColorSpace::Indexed { .. });
    let samples = unpack_samples(data, width as usize, height as usize, components, bpc, scale)?;

    if samples.len() < expected {
        return Err(format!(
            "{} samples do not fill {width}x{height}x{components}",
            samples.len()
        ));
    }
    let samples = &samples[..expected];

    let too_short = || format!("sample buffer does not fit {width}x{height}");
    match color_space {
        ColorSpace::Gray => GrayImage::from_raw(width, height, samples.to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(too_short),
        ColorSpace::Rgb => RgbImage::from_raw(width, height, samples.to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(too_short),
        ColorSpace::Cmyk => RgbImage::from_raw(width, height, cmyk_to_rgb(samples))
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(too_short),
        ColorSpace::Indexed { base, palette } => {
            let base_components = base.components();
            let mut expanded = Vec::with_capacity(samples.len() * base_components);
            for &index in samples {
                let start = index as usize * base_components;
                match palette.get(start..start + base_components) {
                    Some(color) => expanded.extend_from_slice(color),
                    None => expanded.extend(std::iter::repeat(0).take(base_components)),
                }
            }
            build_raster(base, width, height, 8, &expanded)
        }
    }
}

/// Samples in a `width` x `height` raster, rejecting empty or oversized
/// images.
fn sample_count(
    width: usize,
    height: usize,
    components: usize,
) -> std::result::Result<usize, String> {
    if width == 0 || height == 0 {
        return Err(format!("empty image {width}x{height}"));
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(components))
        .filter(|&n| n <= MAX_IMAGE_SAMPLES)
        .ok_or_else(|| format!("image {width}x{height}x{components} is too large"))
}

/// Unpack samples to one byte each. Sub-byte depths are rescaled to 0-255
/// when `scale` is set (palette indices are not).
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bpc: u32,
    scale: bool,
) -> std::result::Result<Vec<u8>, String> {
    let total = sample_count(width, height, components)?;
    match bpc {
        8 => Ok(data.to_vec()),
        16 => Ok(data.chunks_exact(2).map(|c| c[0]).collect()),
        1 | 2 | 4 => {
            let bits = bpc as usize;
            let per_row = width * components;
            let row_bytes = (per_row * bits + 7) / 8;
            let max = (1u32 << bits) - 1;
            let mut out = Vec::with_capacity(total);
            for row in data.chunks(row_bytes).take(height) {
                for i in 0..per_row {
                    let bit = i * bits;
                    let Some(&byte) = row.get(bit / 8) else {
                        break;
                    };
                    let shift = 8 - bits - (bit % 8);
                    let value = (u32::from(byte) >> shift) & max;
                    out.push(if scale { (value * 255 / max) as u8 } else { value as u8 });
                }
            }
            Ok(out)
        }
        other => Err(format!("unsupported bit depth {other}")),
    }
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u32::from(px[3]);
            [0, 1, 2].map(|i| ((255 - u32::from(px[i])) * k / 255) as u8)
        })
        .collect()
}
