//! Text spans and their style flags.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Font size in integer tenths of a point.
///
/// All size comparisons go through this rounding so that 11.96 and 12.04
/// count as the same size.
pub fn size_tenths(size: f32) -> i32 {
    (f64::from(size) * 10.0).round() as i32
}

/// Round a font size to one decimal place.
pub fn round_size(size: f32) -> f32 {
    size_tenths(size) as f32 / 10.0
}

/// Style bits reported by the decoder for a span.
///
/// Bit 0 marks bold, bit 1 marks italic. Other bits are carried through
/// untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleFlags(u32);

impl StyleFlags {
    pub const NONE: StyleFlags = StyleFlags(0);
    pub const BOLD: StyleFlags = StyleFlags(1 << 0);
    pub const ITALIC: StyleFlags = StyleFlags(1 << 1);

    pub const fn from_bits(bits: u32) -> Self {
        StyleFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_bold(self) -> bool {
        self.0 & Self::BOLD.0 != 0
    }

    pub const fn is_italic(self) -> bool {
        self.0 & Self::ITALIC.0 != 0
    }

    /// Guess style bits from a font name such as `Helvetica-BoldOblique`.
    pub fn from_font_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let mut flags = StyleFlags::NONE;
        if lower.contains("bold") || lower.contains("black") || lower.contains("heavy") {
            flags = flags | StyleFlags::BOLD;
        }
        if lower.contains("italic") || lower.contains("oblique") {
            flags = flags | StyleFlags::ITALIC;
        }
        flags
    }
}

impl BitOr for StyleFlags {
    type Output = StyleFlags;

    fn bitor(self, rhs: StyleFlags) -> StyleFlags {
        StyleFlags(self.0 | rhs.0)
    }
}

/// Smallest unit of text sharing one font size and one style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Decoded text
    pub text: String,
    /// Font size in points
    pub size: f32,
    /// Style bits
    #[serde(default)]
    pub flags: StyleFlags,
    /// Font name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    /// Font encoding name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl Span {
    /// Create an unstyled span.
    pub fn new(text: impl Into<String>, size: f32) -> Self {
        Self {
            text: text.into(),
            size,
            flags: StyleFlags::NONE,
            font: None,
            encoding: None,
        }
    }

    /// Set the style bits.
    pub fn with_flags(mut self, flags: StyleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the font name.
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    /// Font size rounded to one decimal.
    pub fn rounded_size(&self) -> f32 {
        round_size(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_size_is_idempotent() {
        for size in [0.0_f32, 9.95, 11.96, 12.04, 12.34, 17.85, 23.999, 72.25] {
            let once = round_size(size);
            assert_eq!(round_size(once), once, "size {size}");
            assert_eq!(size_tenths(once), size_tenths(size));
        }
    }

    #[test]
    fn test_size_tenths() {
        assert_eq!(size_tenths(12.0), 120);
        assert_eq!(size_tenths(11.96), 120);
        assert_eq!(size_tenths(21.6), 216);
    }

    #[test]
    fn test_style_flags() {
        let both = StyleFlags::BOLD | StyleFlags::ITALIC;
        assert!(both.is_bold() && both.is_italic());
        assert_eq!(both.bits(), 3);
        assert!(!StyleFlags::from_bits(4).is_bold());
        assert!(StyleFlags::from_bits(5).is_bold());
        assert!(StyleFlags::from_bits(6).is_italic());
    }

    #[test]
    fn test_flags_from_font_name() {
        assert_eq!(
            StyleFlags::from_font_name("Helvetica-Bold"),
            StyleFlags::BOLD
        );
        assert_eq!(
            StyleFlags::from_font_name("Helvetica-Oblique"),
            StyleFlags::ITALIC
        );
        assert_eq!(
            StyleFlags::from_font_name("Times-BoldItalic"),
            StyleFlags::BOLD | StyleFlags::ITALIC
        );
        assert_eq!(StyleFlags::from_font_name("Courier"), StyleFlags::NONE);
    }

    #[test]
    fn test_span_builder() {
        let span = Span::new("Title", 24.04)
            .with_flags(StyleFlags::BOLD)
            .with_font("Arial-Bold");
        assert_eq!(span.rounded_size(), 24.0);
        assert!(span.flags.is_bold());
        assert_eq!(span.font.as_deref(), Some("Arial-Bold"));
    }
}
