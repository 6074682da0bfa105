use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;

/// Report formats accepted for upload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Pdf,
    PlainText,
    /// Office Open XML (`.docx`).
    WordDocx,
    /// Legacy binary Word (`.doc`).
    WordLegacy,
    Unsupported,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PlainText => "plain_text",
            Self::WordDocx => "word_docx",
            Self::WordLegacy => "word_legacy",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Result of format detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDetection {
    pub category: FileCategory,
    pub file_name: String,
    pub file_size_bytes: u64,
}

/// Upload limit for report files.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Detect the report format from magic bytes, falling back to a UTF-8 check of the first bytes.
///
/// Oversized and empty files are rejected outright.
pub fn detect_format(path: &Path) -> Result<FormatDetection, ImportError> {
    let file_size = std::fs::metadata(path)?.len();
    let file_name = sanitize_filename(&path.to_string_lossy());

    if file_size > MAX_FILE_SIZE {
        return Err(ImportError::FileTooLarge {
            size_mb: file_size as f64 / (1024.0 * 1024.0),
            max_mb: MAX_FILE_SIZE / (1024 * 1024),
        });
    }
    if file_size == 0 {
        return Err(ImportError::EmptyFile);
    }

    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 8];
    let bytes_read = file.read(&mut header)?;

    let category = match &header[..bytes_read] {
        // %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => FileCategory::Pdf,
        // OLE compound document
        [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1] => FileCategory::WordLegacy,
        // ZIP container; only .docx is meaningful here
        [0x50, 0x4B, 0x03, 0x04, ..] => {
            if has_extension(path, "docx") {
                FileCategory::WordDocx
            } else {
                FileCategory::Unsupported
            }
        }
        _ => {
            if is_likely_text(path)? {
                FileCategory::PlainText
            } else {
                FileCategory::Unsupported
            }
        }
    };

    tracing::debug!(
        file = %file_name,
        size = file_size,
        category = category.as_str(),
        "Detected report format"
    );

    Ok(FormatDetection {
        category,
        file_name,
        file_size_bytes: file_size,
    })
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(expected))
}

/// Check if a file is likely plain text (valid UTF-8, mostly printable).
fn is_likely_text(path: &Path) -> Result<bool, ImportError> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = vec![0u8; 4096];
    let n = file.read(&mut buffer)?;
    buffer.truncate(n);

    let text = match std::str::from_utf8(&buffer) {
        Ok(t) => t,
        // A multi-byte character cut by the sample window is still text.
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&buffer[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return Ok(false),
    };

    let total = text.chars().count();
    if total == 0 {
        return Ok(false);
    }
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    Ok(printable as f64 / total as f64 > 0.80)
}

/// Strip path components from a filename and cap its length.
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "document".to_string()
    } else {
        clean
    }
}
