//! Structured-text dumps in JSON form.
//!
//! The decoder payload is untyped JSON in the "dict" shape common PDF
//! text extractors produce: blocks with a numeric or named `type`, a
//! four-number `bbox`, and for text blocks `lines` of `spans`. It is parsed
//! into the typed model here, once, and never handled as raw JSON past this
//! module.
//!
//! A dump file wraps per-page payloads:
//!
//! ```json
//! {
//!   "pages": [{ "blocks": [...], "images": [[12, 0, 640, 480], ...] }],
//!   "rasters": { "12": { "width": 640, "height": 480, "channels": 3, "samples": [...] } }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{BBox, Block, Line, PageContent, RawImage, Span, StyleFlags};
use crate::text::decode_bytes;

use super::PdfBackend;

/// Parse a page's block list.
///
/// Accepts either the array itself or an object holding it under `blocks`.
pub fn parse_blocks(value: &Value) -> Result<Vec<Block>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("blocks") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => return Err(invalid("\"blocks\" is not an array")),
        },
        Value::Null => return Ok(Vec::new()),
        _ => return Err(invalid("block list is not an array")),
    };

    items.iter().map(parse_block).collect()
}

/// Parse a page's raw image list.
///
/// Entries are either tuples `[xref, smask, width, height, ...]` or
/// objects with `xref`, `width` and `height`. Entries without an xref are
/// skipped; missing dimensions are kept as `None`.
pub fn parse_image_list(value: &Value) -> Vec<RawImage> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let (xref, width, height) = match item {
                Value::Array(fields) => (fields.first(), fields.get(2), fields.get(3)),
                Value::Object(map) => (map.get("xref"), map.get("width"), map.get("height")),
                _ => (None, None, None),
            };
            let Some(xref) = xref.and_then(as_u32) else {
                log::debug!("Skipping image list entry without xref: {item}");
                return None;
            };
            Some(RawImage {
                xref,
                width: width.and_then(as_u32),
                height: height.and_then(as_u32),
            })
        })
        .collect()
}

fn parse_block(value: &Value) -> Result<Block> {
    let Value::Object(map) = value else {
        return Err(invalid("block is not an object"));
    };

    let is_image = match map.get("type") {
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => s == "image",
        None => !map.contains_key("lines"),
        Some(other) => return Err(invalid(format!("unknown block type {other}"))),
    };
    let bbox = map.get("bbox").map(parse_bbox).transpose()?;

    if is_image {
        let xref = map.get("xref").and_then(as_u32).unwrap_or(0);
        return Ok(Block::image(xref, bbox.unwrap_or_default()));
    }

    let lines = match map.get("lines") {
        Some(Value::Array(lines)) => lines.iter().map(parse_line).collect::<Result<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(invalid("\"lines\" is not an array")),
    };

    Ok(match bbox {
        Some(bbox) => Block::Text { lines, bbox },
        None => Block::text(lines),
    })
}

fn parse_line(value: &Value) -> Result<Line> {
    let Value::Object(map) = value else {
        return Err(invalid("line is not an object"));
    };

    let spans = match map.get("spans") {
        Some(Value::Array(spans)) => spans.iter().map(parse_span).collect::<Result<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(invalid("\"spans\" is not an array")),
    };
    let bbox = map
        .get("bbox")
        .map(parse_bbox)
        .transpose()?
        .unwrap_or_default();

    Ok(Line::new(spans, bbox))
}

fn parse_span(value: &Value) -> Result<Span> {
    let Value::Object(map) = value else {
        return Err(invalid("span is not an object"));
    };

    let text = match map.get("text") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(raw)) => {
            let bytes = raw
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| invalid("span text bytes out of range"))?;
            decode_bytes(&bytes).into_string()
        }
        Some(Value::Null) | None => String::new(),
        Some(_) => return Err(invalid("span text is neither a string nor bytes")),
    };
    let size = map
        .get("size")
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid("span without a numeric size"))? as f32;
    let flags = map.get("flags").and_then(as_u32).unwrap_or(0);

    let mut span = Span::new(text, size).with_flags(StyleFlags::from_bits(flags));
    span.font = map.get("font").and_then(Value::as_str).map(str::to_string);
    span.encoding = map
        .get("encoding")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(span)
}

fn parse_bbox(value: &Value) -> Result<BBox> {
    let coords = value
        .as_array()
        .filter(|a| a.len() == 4)
        .and_then(|a| a.iter().map(|v| v.as_f64().map(|f| f as f32)).collect::<Option<Vec<_>>>())
        .ok_or_else(|| invalid(format!("bbox is not four numbers: {value}")))?;
    Ok(BBox::new(coords[0], coords[1], coords[2], coords[3]))
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

fn invalid(detail: impl Into<String>) -> Error {
    Error::InvalidPayload(detail.into())
}

/// Raw pixel samples of one image object.
#[derive(Debug, Clone, Deserialize)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// Samples per pixel, alpha included
    pub channels: u8,
    pub samples: Vec<u8>,
}

impl Raster {
    fn to_image(&self, xref: u32) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let samples = self.samples.clone();
        let image = match self.channels {
            1 => GrayImage::from_raw(w, h, samples).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, samples).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, samples).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, samples).map(DynamicImage::ImageRgba8),
            n => {
                return Err(Error::ImageExtract(format!(
                    "image {xref}: unsupported channel count {n}"
                )))
            }
        };
        image.ok_or_else(|| {
            Error::ImageExtract(format!(
                "image {xref}: {} samples do not fill {w}x{h}x{}",
                self.samples.len(),
                self.channels
            ))
        })
    }
}

#[derive(Deserialize)]
struct Dump {
    pages: Vec<Value>,
    #[serde(default)]
    rasters: HashMap<u32, Raster>,
}

/// [`PdfBackend`] reading a pre-extracted structured-text dump.
pub struct JsonBackend {
    pages: Vec<Value>,
    rasters: HashMap<u32, Raster>,
}

impl JsonBackend {
    /// Load from a file path.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Self::load_bytes(&data)
    }

    /// Load from an in-memory dump.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let dump: Dump = serde_json::from_slice(data)?;
        Ok(Self {
            pages: dump.pages,
            rasters: dump.rasters,
        })
    }
}

impl PdfBackend for JsonBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_page(&self, index: usize) -> Result<PageContent> {
        let page = self
            .pages
            .get(index)
            .ok_or(Error::PageOutOfRange(index, self.pages.len()))?;

        let mut content = PageContent::new(index);
        content.blocks = parse_blocks(page)?;
        if let Some(images) = page.get("images") {
            content.images = parse_image_list(images);
        }
        Ok(content)
    }

    fn render_image(&self, xref: u32) -> Result<DynamicImage> {
        self.rasters
            .get(&xref)
            .ok_or_else(|| Error::ImageExtract(format!("image {xref}: no raster in dump")))?
            .to_image(xref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dict_blocks() {
        let payload = json!({
            "width": 612.0,
            "blocks": [
                {
                    "type": 0,
                    "bbox": [72.0, 60.0, 300.0, 84.0],
                    "lines": [{
                        "bbox": [72.0, 60.0, 300.0, 84.0],
                        "spans": [
                            {"text": "Title", "size": 24.0, "flags": 20, "font": "Times-Bold"},
                            {"text": "here", "size": 24.0, "flags": 2}
                        ]
                    }]
                },
                {"type": 1, "bbox": [72.0, 100.0, 200.0, 200.0], "width": 640, "height": 480}
            ]
        });
        let blocks = parse_blocks(&payload).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].is_text());
        let spans: Vec<_> = blocks[0].spans().collect();
        assert_eq!(spans[0].text, "Title");
        assert_eq!(spans[0].flags.bits(), 20);
        assert_eq!(spans[0].font.as_deref(), Some("Times-Bold"));
        assert!(spans[1].flags.is_italic());
        assert_eq!(*blocks[1].bbox(), BBox::new(72.0, 100.0, 200.0, 200.0));
        assert!(!blocks[1].is_text());
    }

    #[test]
    fn test_named_types_and_byte_text() {
        let payload = json!([
            {"type": "text", "lines": [{"spans": [
                {"text": [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69], "size": 10}
            ]}]},
            {"type": "image", "xref": 9, "bbox": [0, 0, 1, 1]}
        ]);
        let blocks = parse_blocks(&payload).unwrap();
        assert_eq!(blocks[0].spans().next().unwrap().text, "Hi");
        assert_eq!(blocks[1], Block::image(9, BBox::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(parse_blocks(&json!("nope")).is_err());
        assert!(parse_blocks(&json!([{"type": 0, "bbox": [1, 2, 3]}])).is_err());
        assert!(parse_blocks(&json!([{"type": 0, "lines": [{"spans": [{"text": "x"}]}]}])).is_err());
        assert!(parse_blocks(&json!([{"type": true}])).is_err());
        assert!(parse_blocks(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_image_list_shapes() {
        let list = json!([
            [12, 0, 640, 480, 8, "DeviceRGB", "", "Im1", "DCTDecode"],
            {"xref": 13, "width": 10},
            ["bad"],
            [14]
        ]);
        let images = parse_image_list(&list);
        assert_eq!(images.len(), 3);
        assert_eq!(images[0], RawImage::new(12, 640, 480));
        assert_eq!(images[1].height, None);
        assert_eq!(images[2].width, None);
    }

    #[test]
    fn test_backend_pages_and_rasters() {
        let dump = json!({
            "pages": [
                {"blocks": [], "images": [[5, 0, 2, 1]]}
            ],
            "rasters": {
                "5": {"width": 2, "height": 1, "channels": 4, "samples": [1, 2, 3, 4, 5, 6, 7, 8]}
            }
        });
        let backend = JsonBackend::load_bytes(dump.to_string().as_bytes()).unwrap();
        assert_eq!(backend.page_count(), 1);

        let page = backend.load_page(0).unwrap();
        assert_eq!(page.images, vec![RawImage::new(5, 2, 1)]);
        assert!(matches!(
            backend.load_page(1),
            Err(Error::PageOutOfRange(1, 1))
        ));

        let image = backend.render_image(5).unwrap();
        assert_eq!(image.color().channel_count(), 4);
        assert!(matches!(backend.render_image(6), Err(Error::ImageExtract(_))));
    }

    #[test]
    fn test_short_raster_is_an_error() {
        let raster = Raster {
            width: 4,
            height: 4,
            channels: 3,
            samples: vec![0; 10],
        };
        assert!(raster.to_image(1).is_err());
    }
}
