use std::path::Path;

use super::docx::extract_docx_text;
use super::pdfium::extract_pdf_pages;
use super::types::{ExtractionMethod, ExtractionResult, PageText, TextExtractor};
use super::ExtractionError;
use crate::pipeline::import::{FileCategory, FormatDetection};

/// Extractor for the formats the analyzer reads directly: plain text, the body
/// of `.docx` files and the text layer of digital PDFs.
///
/// Legacy `.doc` files are detected on import but cannot be read here.
pub struct DocumentTextExtractor;

impl TextExtractor for DocumentTextExtractor {
    fn extract(
        &self,
        path: &Path,
        format: &FormatDetection,
    ) -> Result<ExtractionResult, ExtractionError> {
        tracing::info!(
            category = format.category.as_str(),
            size = format.file_size_bytes,
            "Starting text extraction"
        );

        let (method, mut pages) = match format.category {
            FileCategory::PlainText => {
                let bytes = std::fs::read(path)?;
                let page = PageText {
                    page_number: 1,
                    text: decode_utf8_text(bytes)?,
                };
                (ExtractionMethod::PlainTextRead, vec![page])
            }
            FileCategory::Pdf => {
                let bytes = std::fs::read(path)?;
                (ExtractionMethod::PdfTextLayer, extract_pdf_pages(&bytes)?)
            }
            FileCategory::WordDocx => {
                let page = PageText {
                    page_number: 1,
                    text: extract_docx_text(path)?,
                };
                (ExtractionMethod::DocxXml, vec![page])
            }
            FileCategory::WordLegacy => {
                return Err(ExtractionError::UnsupportedFormat(
                    "legacy .doc files must be saved as DOCX, PDF or TXT first".into(),
                ));
            }
            FileCategory::Unsupported => {
                return Err(ExtractionError::UnsupportedFormat(
                    "only TXT, PDF, DOC and DOCX reports are accepted".into(),
                ));
            }
        };

        for page in &mut pages {
            page.text = clean_extracted_text(&page.text);
        }

        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let page_count = pages.len();

        tracing::info!(
            method = ?method,
            pages = page_count,
            text_length = full_text.len(),
            "Text extraction complete"
        );

        Ok(ExtractionResult {
            method,
            pages,
            full_text,
            page_count,
        })
    }
}

fn decode_utf8_text(mut bytes: Vec<u8>) -> Result<String, ExtractionError> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }
    String::from_utf8(bytes).map_err(|e| ExtractionError::EncodingError(e.to_string()))
}

/// Strip control characters and trim each line, dropping empty ones.
pub fn clean_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::import::detect_format;

    fn extract_file(name: &str, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        let format = detect_format(&path).unwrap();
        DocumentTextExtractor.extract(&path, &format)
    }

    #[test]
    fn plain_text_extraction() {
        let text = "项目名称：智慧农业\r\n\r\n  总投资：500万元  \n";
        let result = extract_file("report.txt", text.as_bytes()).unwrap();
        assert_eq!(result.method, ExtractionMethod::PlainTextRead);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.full_text, "项目名称：智慧农业\n总投资：500万元");
    }

    #[test]
    fn utf8_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("报告".as_bytes());
        let result = extract_file("bom.txt", &bytes).unwrap();
        assert_eq!(result.full_text, "报告");
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_body_extraction() {
        let xml = concat!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body><w:p><w:r><w:t>项目名称：智慧农业</w:t></w:r></w:p>",
            r#"<w:p><w:r><w:t xml:space="preserve">  总投资：500万元 </w:t></w:r></w:p>"#,
            "</w:body></w:document>",
        );
        let result = extract_file("report.docx", &docx_bytes(xml)).unwrap();
        assert_eq!(result.method, ExtractionMethod::DocxXml);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.full_text, "项目名称：智慧农业\n总投资：500万元");
    }

    #[test]
    fn docx_without_document_part_rejected() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("xl/workbook.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<workbook/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let result = extract_file("sheet.docx", &bytes);
        assert!(matches!(result, Err(ExtractionError::DocxParsing(_))));
    }

    #[test]
    fn legacy_word_unsupported() {
        let result = extract_file("old.doc", &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
        assert!(matches!(result, Err(ExtractionError::UnsupportedFormat(_))));
    }

    #[test]
    fn unsupported_binary_rejected() {
        let result = extract_file("x.bin", &[0x4D, 0x5A, 0x90, 0x00, 0x03, 0x00]);
        assert!(matches!(result, Err(ExtractionError::UnsupportedFormat(_))));
    }

    #[test]
    fn clean_text_drops_controls_and_blank_lines() {
        assert_eq!(clean_extracted_text("a\u{0007}b\n\n  c \r\n"), "ab\nc");
    }
}
