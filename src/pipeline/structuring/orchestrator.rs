use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::balance::{BalanceCheck, BalanceConfig};
use super::normalize::normalize_with;
use super::prompt::{build_report_prompt, prepare_document_text};
use super::sanitize::sanitize;
use super::types::{CanonicalReport, LlmClient};
use super::StructuringError;

/// Maximum retries for transport failures of the model call.
const MAX_LLM_RETRIES: usize = 2;

/// Everything produced by one structuring run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuringOutcome {
    pub report: CanonicalReport,
    pub balance: BalanceCheck,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub prompt: String,
    #[serde(skip)]
    pub raw_response: String,
    #[serde(skip)]
    pub sanitized: String,
}

/// Runs prompt → model → sanitize → normalize for one document.
///
/// Only the model call can fail; once a completion is in hand the rest of the
/// run always produces a report.
pub struct ReportStructurer {
    llm: Box<dyn LlmClient + Send + Sync>,
    balance: BalanceConfig,
}

impl ReportStructurer {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, balance: BalanceConfig) -> Self {
        Self { llm, balance }
    }

    pub fn structure(
        &self,
        run_id: &Uuid,
        document_text: &str,
    ) -> Result<StructuringOutcome, StructuringError> {
        let _span = tracing::info_span!("structure_report", run_id = %run_id).entered();

        let prepared = prepare_document_text(document_text);
        if prepared.trim().is_empty() {
            return Err(StructuringError::InputEmpty);
        }

        let prompt = build_report_prompt(&prepared);
        tracing::info!(
            model = self.llm.model_name(),
            text_chars = prepared.chars().count(),
            "Requesting structured extraction"
        );

        let raw_response = self.call_llm_with_retry(&prompt, run_id)?;
        Ok(self.structure_response(&prompt, raw_response))
    }

    /// Turn an already obtained completion into an outcome.
    pub fn structure_response(&self, prompt: &str, raw_response: String) -> StructuringOutcome {
        let sanitized = sanitize(&raw_response);
        let parsed: Value = serde_json::from_str(&sanitized).unwrap_or(Value::Null);
        let normalized = normalize_with(&parsed, &self.balance);

        if normalized.report.is_parse_failure() {
            tracing::warn!(
                response_len = raw_response.len(),
                "Model response unusable, returning placeholder report"
            );
        }
        if !normalized.balance.is_valid {
            tracing::warn!(
                issues = normalized.balance.errors.len(),
                high = normalized.balance.high_severity_count(),
                "Fund-flow consistency check failed"
            );
        }

        StructuringOutcome {
            report: normalized.report,
            balance: normalized.balance,
            warnings: normalized.warnings,
            prompt: prompt.to_string(),
            raw_response,
            sanitized,
        }
    }

    fn call_llm_with_retry(&self, prompt: &str, run_id: &Uuid) -> Result<String, StructuringError> {
        let mut attempt = 0;
        loop {
            match self.llm.complete(prompt) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < MAX_LLM_RETRIES => {
                    attempt += 1;
                    tracing::warn!(
                        run_id = %run_id,
                        attempt,
                        error = %e,
                        "Model call failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
