//! Error types for layoutmd.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for layoutmd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input path does not exist.
    #[error("Input file does not exist - {}", .0.display())]
    InputNotFound(PathBuf),

    /// The input is neither a PDF nor a structured-text dump.
    #[error("Unknown file format: not a PDF or structured-text dump")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The document could not be opened (corrupt or unsupported).
    #[error("Failed to open document '{}': {detail}", .path.display())]
    DocumentOpen { path: PathBuf, detail: String },

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// A decoder payload did not have the expected shape.
    #[error("Invalid structured-text payload: {0}")]
    InvalidPayload(String),

    /// A single embedded image could not be decoded or saved.
    #[error("Image extraction error: {0}")]
    ImageExtract(String),

    /// Error from the image codec.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Page index is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(usize, usize),
}

impl Error {
    /// Wrap any error raised while opening `path` as [`Error::DocumentOpen`].
    ///
    /// A missing input keeps its own variant so callers can tell the two apart.
    pub fn into_open_failure(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Error::InputNotFound(_) | Error::DocumentOpen { .. } => self,
            other => Error::DocumentOpen {
                path: path.into(),
                detail: other.to_string(),
            },
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InputNotFound(PathBuf::from("missing.pdf"));
        assert_eq!(err.to_string(), "Input file does not exist - missing.pdf");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page 10 is out of range (document has 5 pages)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_into_open_failure() {
        let err = Error::PdfParse("bad xref".into()).into_open_failure("doc.pdf");
        match err {
            Error::DocumentOpen { path, detail } => {
                assert_eq!(path, PathBuf::from("doc.pdf"));
                assert!(detail.contains("bad xref"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = Error::InputNotFound("x.pdf".into()).into_open_failure("x.pdf");
        assert!(matches!(err, Error::InputNotFound(_)));
    }
}
