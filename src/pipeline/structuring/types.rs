use serde::{Deserialize, Serialize};

use super::defaults;
use super::StructuringError;

/// The single output contract of the structuring pipeline.
///
/// Every field is always populated; absence in the model output is replaced
/// by the values in [`defaults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalReport {
    pub project_info: ProjectInfo,
    pub progress_indicators: Vec<ProgressIndicator>,
    pub research_progress: Vec<ResearchItem>,
    pub risks: Vec<RiskItem>,
    pub financial_data: FinancialData,
}

impl CanonicalReport {
    /// All-default report for a response that could not be parsed.
    pub fn parse_failed() -> Self {
        Self {
            project_info: ProjectInfo {
                title: defaults::PARSE_FAILED_TITLE.to_string(),
                ..ProjectInfo::default()
            },
            ..Self::default()
        }
    }

    pub fn is_parse_failure(&self) -> bool {
        self.project_info.title == defaults::PARSE_FAILED_TITLE
    }
}

impl Default for CanonicalReport {
    fn default() -> Self {
        Self {
            project_info: ProjectInfo::default(),
            progress_indicators: Vec::new(),
            research_progress: Vec::new(),
            risks: Vec::new(),
            financial_data: FinancialData::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub title: String,
    pub company: String,
    pub location: String,
    pub period: String,
    pub investment: f64,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            title: defaults::UNTITLED_PROJECT.to_string(),
            company: defaults::UNKNOWN.to_string(),
            location: defaults::UNKNOWN.to_string(),
            period: defaults::UNKNOWN.to_string(),
            investment: defaults::DEFAULT_INVESTMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressIndicator {
    pub name: String,
    /// Clamped to [0, 100].
    pub value: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchItem {
    pub title: String,
    /// Clamped to [0, 100].
    pub value: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskItem {
    pub level: RiskLevel,
    pub title: String,
    pub description: String,
    pub solution: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Case-insensitive match; unrecognized tokens yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "high" | "高" => Some(Self::High),
            "medium" | "中" => Some(Self::Medium),
            "low" | "低" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    pub total_budget: f64,
    pub flow_details: Vec<FlowRecord>,
    pub budget_categories: Vec<BudgetCategory>,
}

/// One edge of the source → primary category → target fund-flow hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    pub source: String,
    pub primary_category: String,
    pub target: String,
    /// Rounded to 2 decimal places.
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetCategory {
    pub name: String,
    pub budget: f64,
    pub spent: f64,
    pub remaining: f64,
}

/// Flow record as read from the model, before required fields are enforced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowEntry {
    pub source: Option<String>,
    pub primary_category: Option<String>,
    pub target: Option<String>,
    pub amount: Option<f64>,
}

impl FlowEntry {
    /// Converts to a canonical record when every required field is present.
    pub fn to_record(&self) -> Option<FlowRecord> {
        Some(FlowRecord {
            source: self.source.clone()?,
            primary_category: self.primary_category.clone()?,
            target: self.target.clone()?,
            amount: self.amount?,
        })
    }
}

impl From<&FlowRecord> for FlowEntry {
    fn from(record: &FlowRecord) -> Self {
        Self {
            source: Some(record.source.clone()),
            primary_category: Some(record.primary_category.clone()),
            target: Some(record.target.clone()),
            amount: Some(record.amount),
        }
    }
}

/// Chat-completion client abstraction (allows mocking).
pub trait LlmClient {
    /// Send one user prompt, return the `message.content` of the first choice.
    fn complete(&self, prompt: &str) -> Result<String, StructuringError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_has_placeholders() {
        let report = CanonicalReport::default();
        assert_eq!(report.project_info.title, "未命名项目");
        assert_eq!(report.project_info.company, "未知");
        assert_eq!(report.project_info.investment, 0.0);
        assert!(report.risks.is_empty());
        assert!(!report.is_parse_failure());
    }

    #[test]
    fn parse_failed_report_is_marked() {
        let report = CanonicalReport::parse_failed();
        assert_eq!(report.project_info.title, "解析失败");
        assert!(report.is_parse_failure());
        assert_eq!(report.project_info.location, "未知");
    }

    #[test]
    fn report_serializes_camel_case() {
        let json = serde_json::to_value(CanonicalReport::default()).unwrap();
        assert!(json.get("projectInfo").is_some());
        assert!(json.get("progressIndicators").is_some());
        assert!(json.get("researchProgress").is_some());
        assert!(json["financialData"].get("flowDetails").is_some());
        assert!(json["financialData"].get("totalBudget").is_some());
    }

    #[test]
    fn risk_level_serializes_lowercase() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"high\"");
        assert_eq!(RiskLevel::default(), RiskLevel::Medium);
    }

    #[test]
    fn risk_level_parse_ignores_case() {
        assert_eq!(RiskLevel::parse("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse(" Low "), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::parse("低"), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::parse("severe"), None);
    }

    #[test]
    fn flow_entry_requires_all_fields() {
        let entry = FlowEntry {
            source: Some("A".into()),
            primary_category: Some("P".into()),
            target: None,
            amount: Some(1.0),
        };
        assert!(entry.to_record().is_none());

        let record = FlowRecord {
            source: "A".into(),
            primary_category: "P".into(),
            target: "B".into(),
            amount: 2.5,
        };
        assert_eq!(FlowEntry::from(&record).to_record(), Some(record));
    }
}
