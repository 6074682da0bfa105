//! Report processing orchestrator.
//!
//! Single entry point that drives the full pipeline for one upload:
//! import → extract → structure. Engines are injected as trait objects so the
//! pipeline stays testable with mocks.

use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::config::AnalyzerConfig;
use crate::pipeline::diagnostic;
use crate::pipeline::extraction::{DocumentTextExtractor, ExtractionError, TextExtractor};
use crate::pipeline::import::{detect_format, ImportError};
use crate::pipeline::structuring::{
    BalanceCheck, CanonicalReport, OpenRouterClient, ReportStructurer, StructuringError,
    StructuringOutcome,
};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Structuring failed: {0}")]
    Structuring(#[from] StructuringError),
}

/// Result of one processed report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOutcome {
    pub run_id: Uuid,
    pub file_name: String,
    pub report: CanonicalReport,
    pub balance: BalanceCheck,
    pub warnings: Vec<String>,
}

pub struct ReportProcessor {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    structurer: ReportStructurer,
}

impl ReportProcessor {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        structurer: ReportStructurer,
    ) -> Self {
        Self {
            extractor,
            structurer,
        }
    }

    /// Full pipeline from a source file path.
    ///
    /// Import and extraction failures and model transport failures are
    /// returned; any completion the model gives back yields a report.
    pub fn process_file(&self, source_path: &Path) -> Result<ProcessingOutcome, ProcessingError> {
        let run_id = Uuid::new_v4();
        let format = detect_format(source_path)?;
        tracing::info!(
            run_id = %run_id,
            file = %format.file_name,
            category = format.category.as_str(),
            "Processing report"
        );

        let extraction = self.extractor.extract(source_path, &format)?;
        self.structure_text(run_id, format.file_name, &extraction.full_text)
    }

    /// Structure text that was already extracted elsewhere.
    pub fn process_text(
        &self,
        file_name: &str,
        text: &str,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        self.structure_text(Uuid::new_v4(), file_name.to_string(), text)
    }

    fn structure_text(
        &self,
        run_id: Uuid,
        file_name: String,
        text: &str,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let dump_dir = diagnostic::dump_dir_for(&run_id);
        if let Some(dir) = &dump_dir {
            diagnostic::dump_text(dir, "01-extracted-text.txt", text);
        }

        let outcome = self.structurer.structure(&run_id, text)?;

        if let Some(dir) = &dump_dir {
            dump_outcome(dir, &outcome);
        }

        tracing::info!(
            run_id = %run_id,
            indicators = outcome.report.progress_indicators.len(),
            risks = outcome.report.risks.len(),
            flows = outcome.report.financial_data.flow_details.len(),
            balance_valid = outcome.balance.is_valid,
            warnings = outcome.warnings.len(),
            "Report processing complete"
        );

        Ok(ProcessingOutcome {
            run_id,
            file_name,
            report: outcome.report,
            balance: outcome.balance,
            warnings: outcome.warnings,
        })
    }
}

fn dump_outcome(dir: &Path, outcome: &StructuringOutcome) {
    diagnostic::dump_text(dir, "02-prompt.txt", &outcome.prompt);
    diagnostic::dump_text(dir, "03-raw-response.txt", &outcome.raw_response);
    diagnostic::dump_text(dir, "04-sanitized.json", &outcome.sanitized);
    diagnostic::dump_json(dir, "05-report.json", &outcome.report);
    diagnostic::dump_json(dir, "06-balance.json", &outcome.balance);
}

/// Build a `ReportProcessor` with production implementations.
///
/// Fails when no API key is configured.
pub fn build_processor(config: &AnalyzerConfig) -> Result<ReportProcessor, ProcessingError> {
    let client = OpenRouterClient::from_config(config)?;
    tracing::info!(model = %config.model, "Report processor using model");

    let structurer = ReportStructurer::new(Box::new(client), config.balance);
    Ok(ReportProcessor::new(Box::new(DocumentTextExtractor), structurer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::{BalanceConfig, MockLlmClient};

    const RESPONSE: &str = r#"{"projectInfo": {"title": "智慧灌溉示范工程", "investment": 100},
        "financialData": {"flowDetails": [
            {"source": "专项资金", "primaryCategory": "直接费用", "target": "设备费", "amount": 100}
        ]}}"#;

    fn processor(response: &str) -> ReportProcessor {
        let structurer = ReportStructurer::new(
            Box::new(MockLlmClient::new(response)),
            BalanceConfig::default(),
        );
        ReportProcessor::new(Box::new(DocumentTextExtractor), structurer)
    }

    #[test]
    fn text_file_processed_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("季度报告.txt");
        std::fs::write(&path, "项目名称：智慧灌溉示范工程\n总投资：100万元").unwrap();

        let outcome = processor(RESPONSE).process_file(&path).unwrap();
        assert_eq!(outcome.file_name, "季度报告.txt");
        assert_eq!(outcome.report.project_info.title, "智慧灌溉示范工程");
        assert_eq!(outcome.report.financial_data.flow_details.len(), 1);
        assert!(outcome.balance.is_valid);
    }

    #[test]
    fn garbage_response_still_yields_report() {
        let outcome = processor("not json at all").process_text("r.txt", "正文").unwrap();
        assert!(outcome.report.is_parse_failure());
    }

    #[test]
    fn missing_file_is_import_error() {
        let result = processor(RESPONSE).process_file(Path::new("/nonexistent/report.txt"));
        assert!(matches!(result, Err(ProcessingError::Import(_))));
    }

    #[test]
    fn corrupt_word_file_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        std::fs::write(&path, [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00]).unwrap();
        let result = processor(RESPONSE).process_file(&path);
        assert!(matches!(result, Err(ProcessingError::Extraction(_))));
    }

    #[test]
    fn empty_text_is_structuring_error() {
        let result = processor(RESPONSE).process_text("r.txt", "   ");
        assert!(matches!(
            result,
            Err(ProcessingError::Structuring(StructuringError::InputEmpty))
        ));
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let outcome = processor(RESPONSE).process_text("r.txt", "正文").unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("runId").is_some());
        assert!(json.get("fileName").is_some());
        assert!(json["report"]["projectInfo"].is_object());
    }
}
