pub mod docx;
pub mod pdfium;
pub mod text;
pub mod types;

pub use text::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Word document parsing failed: {0}")]
    DocxParsing(String),

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("Document contains no pages")]
    EmptyDocument,

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),
}
