// Map parsed-but-untrusted model JSON onto the canonical report schema.
//
// Normalization never fails outward: each field falls back to its entry in the
// defaults table, each bad section becomes empty, and a structurally unusable
// input yields `CanonicalReport::parse_failed()`. The input is only borrowed.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use super::balance::{check_balance, BalanceCheck, BalanceConfig};
use super::coerce::{clamp_value, coerce_amount, coerce_number, coerce_text, text_or};
use super::defaults;
use super::types::{
    BudgetCategory, CanonicalReport, FinancialData, FlowEntry, FlowRecord, ProgressIndicator,
    ProjectInfo, ResearchItem, RiskItem, RiskLevel,
};

/// Canonical report plus the advisory findings produced while building it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReport {
    pub report: CanonicalReport,
    pub balance: BalanceCheck,
    /// Completeness notes (missing or empty sections, skipped items).
    pub warnings: Vec<String>,
}

/// Normalize with the default balance configuration.
///
/// Balance problems are logged, never returned; use [`normalize_with`] to
/// inspect them.
pub fn normalize(parsed: &Value) -> CanonicalReport {
    let normalized = normalize_with(parsed, &BalanceConfig::default());
    if !normalized.balance.is_valid {
        tracing::warn!(
            issues = normalized.balance.errors.len(),
            "Fund-flow consistency check failed"
        );
    }
    normalized.report
}

pub fn normalize_with(parsed: &Value, config: &BalanceConfig) -> NormalizedReport {
    let root = match parsed {
        Value::Object(map) if !map.is_empty() => map,
        _ => {
            tracing::warn!("Model output is not a usable JSON object, using placeholder report");
            return NormalizedReport {
                report: CanonicalReport::parse_failed(),
                balance: check_balance(&[], None, config),
                warnings: vec!["Model output could not be parsed".to_string()],
            };
        }
    };

    let mut warnings = Vec::new();
    note_completeness(root, &mut warnings);

    let project_info = normalize_project_info(root.get("projectInfo"));
    let progress_indicators =
        normalize_section(root, "progressIndicators", &mut warnings, normalize_indicator);
    let research_progress =
        normalize_section(root, "researchProgress", &mut warnings, normalize_research_item);
    let risks = normalize_section(root, "risks", &mut warnings, normalize_risk);

    let financial = root.get("financialData").and_then(Value::as_object);
    let entries = dedup_flow_entries(parse_flow_entries(financial, &mut warnings));

    let investment = (project_info.investment > 0.0).then_some(project_info.investment);
    let balance = check_balance(&entries, investment, config);

    let flow_details: Vec<FlowRecord> = entries.iter().filter_map(FlowEntry::to_record).collect();
    let dropped = entries.len() - flow_details.len();
    if dropped > 0 {
        warnings.push(format!(
            "{dropped} fund-flow record(s) missing required fields were dropped"
        ));
    }

    let financial_data = FinancialData {
        total_budget: financial
            .and_then(|f| coerce_amount(f.get("totalBudget")))
            .unwrap_or(defaults::ZERO),
        flow_details,
        budget_categories: financial
            .map(|f| normalize_items(f.get("budgetCategories"), normalize_budget_category))
            .unwrap_or_default(),
    };

    tracing::debug!(
        indicators = progress_indicators.len(),
        research_items = research_progress.len(),
        risks = risks.len(),
        flows = financial_data.flow_details.len(),
        warnings = warnings.len(),
        "Normalized model output"
    );

    NormalizedReport {
        report: CanonicalReport {
            project_info,
            progress_indicators,
            research_progress,
            risks,
            financial_data,
        },
        balance,
        warnings,
    }
}

fn normalize_project_info(value: Option<&Value>) -> ProjectInfo {
    let Some(info) = value.and_then(Value::as_object) else {
        return ProjectInfo::default();
    };

    ProjectInfo {
        title: text_or(info.get("title"), defaults::UNTITLED_PROJECT),
        company: text_or(info.get("company"), defaults::UNKNOWN),
        location: text_or(info.get("location"), defaults::UNKNOWN),
        period: text_or(info.get("period"), defaults::UNKNOWN),
        investment: coerce_number(info.get("investment")).unwrap_or(defaults::DEFAULT_INVESTMENT),
    }
}

/// Normalize one array section; a non-array becomes an empty section.
fn normalize_section<T>(
    root: &Map<String, Value>,
    key: &str,
    warnings: &mut Vec<String>,
    item_fn: fn(&Map<String, Value>) -> T,
) -> Vec<T> {
    match root.get(key) {
        Some(Value::Array(items)) => {
            let skipped = items.iter().filter(|v| !v.is_object()).count();
            if skipped > 0 {
                warnings.push(format!("{key}: skipped {skipped} non-object item(s)"));
            }
            normalize_items(root.get(key), item_fn)
        }
        Some(other) if !other.is_null() && !is_empty_string(other) => {
            warnings.push(format!("{key} is not a list, treated as empty"));
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn normalize_items<T>(value: Option<&Value>, item_fn: fn(&Map<String, Value>) -> T) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).map(item_fn).collect())
        .unwrap_or_default()
}

fn normalize_indicator(item: &Map<String, Value>) -> ProgressIndicator {
    ProgressIndicator {
        name: text_or(item.get("name"), defaults::UNNAMED_INDICATOR),
        value: clamp_value(item.get("value")),
        total: coerce_number(item.get("total"))
            .filter(|t| *t > 0.0)
            .unwrap_or(defaults::DEFAULT_INDICATOR_TOTAL),
    }
}

fn normalize_research_item(item: &Map<String, Value>) -> ResearchItem {
    ResearchItem {
        title: text_or(item.get("title"), defaults::UNNAMED_RESEARCH_ITEM),
        value: clamp_value(item.get("value")),
        description: text_or(item.get("description"), defaults::NO_DESCRIPTION),
    }
}

fn normalize_risk(item: &Map<String, Value>) -> RiskItem {
    RiskItem {
        level: coerce_text(item.get("level"))
            .and_then(|l| RiskLevel::parse(&l))
            .unwrap_or_default(),
        title: text_or(item.get("title"), defaults::UNNAMED_RISK),
        description: text_or(item.get("description"), defaults::NO_DESCRIPTION),
        solution: text_or(item.get("solution"), defaults::NO_SOLUTION),
    }
}

fn normalize_budget_category(item: &Map<String, Value>) -> BudgetCategory {
    let amount = |key: &str| coerce_amount(item.get(key)).unwrap_or(defaults::ZERO);
    BudgetCategory {
        name: text_or(item.get("name"), defaults::UNNAMED_BUDGET_CATEGORY),
        budget: amount("budget"),
        spent: amount("spent"),
        remaining: amount("remaining"),
    }
}

fn parse_flow_entries(
    financial: Option<&Map<String, Value>>,
    warnings: &mut Vec<String>,
) -> Vec<FlowEntry> {
    let Some(details) = financial.and_then(|f| f.get("flowDetails")) else {
        return Vec::new();
    };
    let Some(items) = details.as_array() else {
        warnings.push("financialData.flowDetails is not a list, treated as empty".to_string());
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| FlowEntry {
            source: coerce_text(item.get("source")),
            primary_category: coerce_text(item.get("primaryCategory"))
                .or_else(|| coerce_text(item.get("category"))),
            target: coerce_text(item.get("target")),
            amount: coerce_amount(item.get("amount")),
        })
        .collect()
}

/// Keep the first complete entry per (source, target). Incomplete entries
/// never claim a key; they are all kept so each one is reported.
fn dedup_flow_entries(entries: Vec<FlowEntry>) -> Vec<FlowEntry> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| match entry.to_record() {
            Some(record) => seen.insert((record.source, record.target)),
            None => true,
        })
        .collect()
}

/// Sections the extraction prompt asks for; absence is only a warning.
const EXPECTED_SECTIONS: &[&str] = &[
    "projectInfo",
    "progressIndicators",
    "researchProgress",
    "risks",
];

fn note_completeness(root: &Map<String, Value>, warnings: &mut Vec<String>) {
    for section in EXPECTED_SECTIONS {
        match root.get(*section) {
            None | Some(Value::Null) => warnings.push(format!("{section} is missing")),
            Some(Value::Array(items)) if items.is_empty() => {
                warnings.push(format!("{section} is empty"))
            }
            _ => {}
        }
    }
}

fn is_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.trim().is_empty())
}
