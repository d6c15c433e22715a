//! Input format detection and validation.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Kind of input the converter can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// A PDF file with the given header version (e.g. "1.7").
    Pdf { version: String },
    /// A pre-decoded structured-text dump in JSON.
    StructuredJson,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Pdf { version } => write!(f, "PDF {}", version),
            InputKind::StructuredJson => write!(f, "structured-text JSON"),
        }
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"
const HEADER_LEN: usize = 16;

/// Fail with [`Error::InputNotFound`] unless `path` names an existing file.
pub fn ensure_input_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::InputNotFound(path.to_path_buf()))
    }
}

/// Detect the input kind from a file path.
///
/// # Example
/// ```no_run
/// use layoutmd::detect::{detect_input, InputKind};
///
/// let kind = detect_input("document.pdf").unwrap();
/// assert!(matches!(kind, InputKind::Pdf { .. }));
/// ```
pub fn detect_input<P: AsRef<Path>>(path: P) -> Result<InputKind> {
    let path = path.as_ref();
    ensure_input_exists(path)?;

    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header)?;
    detect_input_from_bytes(&header)
}

/// Detect the input kind from the first bytes of a file.
pub fn detect_input_from_bytes(data: &[u8]) -> Result<InputKind> {
    if data.starts_with(PDF_MAGIC) {
        if data.len() < PDF_MAGIC_LEN + VERSION_LEN {
            return Err(Error::UnknownFormat);
        }

        // Extract version string (e.g., "1.7" from "%PDF-1.7")
        let version_bytes = &data[PDF_MAGIC_LEN..PDF_MAGIC_LEN + VERSION_LEN];
        let version = String::from_utf8_lossy(version_bytes).to_string();

        if !is_valid_version(&version) {
            return Err(Error::UnsupportedVersion(version));
        }
        return Ok(InputKind::Pdf { version });
    }

    let first = data
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF);
    match first {
        Some(b'{') => Ok(InputKind::StructuredJson),
        _ => Err(Error::UnknownFormat),
    }
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if a file is a PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    matches!(detect_input(path), Ok(InputKind::Pdf { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_valid_pdf() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let kind = detect_input_from_bytes(data).unwrap();
        assert_eq!(
            kind,
            InputKind::Pdf {
                version: "1.7".to_string()
            }
        );
    }

    #[test]
    fn test_detect_json_dump() {
        assert_eq!(
            detect_input_from_bytes(b"  \n{\"pages\": []}").unwrap(),
            InputKind::StructuredJson
        );
        // UTF-8 BOM before the object
        assert_eq!(
            detect_input_from_bytes(b"\xEF\xBB\xBF{}").unwrap(),
            InputKind::StructuredJson
        );
    }

    #[test]
    fn test_detect_invalid_format() {
        let result = detect_input_from_bytes(b"<!DOCTYPE html>");
        assert!(matches!(result, Err(Error::UnknownFormat)));
        assert!(matches!(
            detect_input_from_bytes(b""),
            Err(Error::UnknownFormat)
        ));
    }

    #[test]
    fn test_detect_too_short() {
        let result = detect_input_from_bytes(b"%PDF-1");
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_detect_bad_version() {
        let result = detect_input_from_bytes(b"%PDF-x.y\n");
        assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_missing_input() {
        let result = detect_input("/definitely/not/here.pdf");
        assert!(matches!(result, Err(Error::InputNotFound(_))));
        assert!(!is_pdf("/definitely/not/here.pdf"));
    }

    #[test]
    fn test_version_validation() {
        assert!(is_valid_version("1.0"));
        assert!(is_valid_version("2.0"));
        assert!(!is_valid_version("10.0"));
        assert!(!is_valid_version("abc"));
    }
}
