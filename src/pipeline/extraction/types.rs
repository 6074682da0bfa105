use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::pipeline::import::FormatDetection;

/// Text pulled out of one uploaded report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub method: ExtractionMethod,
    pub pages: Vec<PageText>,
    pub full_text: String,
    pub page_count: usize,
}

/// How text was extracted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionMethod {
    PdfTextLayer,
    DocxXml,
    PlainTextRead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
}

/// Turns an uploaded file into plain text for the model.
pub trait TextExtractor {
    fn extract(
        &self,
        path: &Path,
        format: &FormatDetection,
    ) -> Result<ExtractionResult, ExtractionError>;
}
