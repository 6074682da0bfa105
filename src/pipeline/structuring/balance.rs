//! Fund-flow consistency checking.
//!
//! Advisory only: findings are reported alongside the report, never used to
//! correct amounts. Records missing a required field are the one finding the
//! normalizer acts on (it leaves them out of `flowDetails`).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::types::{CanonicalReport, FlowEntry};

/// Thresholds for the balance check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceConfig {
    /// Largest difference between grouped totals still treated as equal.
    pub tolerance: f64,
    /// Flows may exceed the declared investment by this factor before warning.
    pub over_budget_ratio: f64,
}

pub const DEFAULT_BALANCE_TOLERANCE: f64 = 0.01;
pub const DEFAULT_OVER_BUDGET_RATIO: f64 = 1.1;

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_BALANCE_TOLERANCE,
            over_budget_ratio: DEFAULT_OVER_BUDGET_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceIssue {
    pub message: String,
    pub severity: Severity,
    /// Zero-based index of the offending record, for per-record findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_index: Option<usize>,
}

impl BalanceIssue {
    fn high(message: String, record_index: Option<usize>) -> Self {
        Self {
            message,
            severity: Severity::High,
            record_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceStats {
    pub record_count: usize,
    pub total_amount: f64,
    /// Distinct values per hierarchy level, in first-seen order.
    pub sources: Vec<String>,
    pub primary_categories: Vec<String>,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    /// False when any high-severity issue was found.
    pub is_valid: bool,
    pub errors: Vec<BalanceIssue>,
    pub stats: BalanceStats,
}

impl BalanceCheck {
    pub fn high_severity_count(&self) -> usize {
        self.errors.iter().filter(|e| e.severity == Severity::High).count()
    }
}

/// Check fund-flow records for completeness, balance and budget overrun.
pub fn check_balance(
    entries: &[FlowEntry],
    total_investment: Option<f64>,
    config: &BalanceConfig,
) -> BalanceCheck {
    let mut errors = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let missing: Vec<&str> = [
            ("source", entry.source.is_none()),
            ("primaryCategory", entry.primary_category.is_none()),
            ("target", entry.target.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        if !missing.is_empty() {
            errors.push(BalanceIssue::high(
                format!(
                    "Record {} is missing required field(s): {}",
                    index + 1,
                    missing.join(", ")
                ),
                Some(index),
            ));
        }
        if entry.amount.is_none() {
            errors.push(BalanceIssue::high(
                format!("Record {} has a missing or non-numeric amount", index + 1),
                Some(index),
            ));
        }
    }

    let by_source = group_sums(entries, |e| e.source.as_deref());
    let by_target = group_sums(entries, |e| e.target.as_deref());
    let total_by_source: f64 = by_source.values().sum();
    let total_by_target: f64 = by_target.values().sum();

    if (total_by_source - total_by_target).abs() > config.tolerance {
        errors.push(BalanceIssue::high(
            format!(
                "Fund flow imbalance: total by source {total_by_source:.2} vs total by target {total_by_target:.2}"
            ),
            None,
        ));
    }

    // Nodes that both receive and pass on funds must pass on what they receive.
    let mut intermediate: Vec<&str> = by_source
        .keys()
        .filter(|node| by_target.contains_key(*node))
        .copied()
        .collect();
    intermediate.sort_unstable();
    for node in intermediate {
        let inflow = by_target[node];
        let outflow = by_source[node];
        if (inflow - outflow).abs() > config.tolerance {
            errors.push(BalanceIssue::high(
                format!(
                    "Fund flow imbalance at {node}: received {inflow:.2}, allocated {outflow:.2}"
                ),
                None,
            ));
        }
    }

    if let Some(investment) = total_investment {
        let limit = investment * config.over_budget_ratio;
        if total_by_source > limit {
            errors.push(BalanceIssue {
                message: format!(
                    "Allocated funds {total_by_source:.2} exceed investment {investment:.2} by more than {:.0}%",
                    (config.over_budget_ratio - 1.0) * 100.0
                ),
                severity: Severity::Medium,
                record_index: None,
            });
        }
    }

    let stats = collect_stats(entries);
    let is_valid = !errors.iter().any(|e| e.severity == Severity::High);

    BalanceCheck { is_valid, errors, stats }
}

/// Check the flows of an already normalized report.
pub fn check_report(report: &CanonicalReport, config: &BalanceConfig) -> BalanceCheck {
    let entries: Vec<FlowEntry> = report
        .financial_data
        .flow_details
        .iter()
        .map(FlowEntry::from)
        .collect();
    let investment = report.project_info.investment;
    check_balance(&entries, (investment > 0.0).then_some(investment), config)
}

fn group_sums<'a>(
    entries: &'a [FlowEntry],
    key: impl Fn(&'a FlowEntry) -> Option<&'a str>,
) -> HashMap<&'a str, f64> {
    let mut sums = HashMap::new();
    for entry in entries {
        if let (Some(k), Some(amount)) = (key(entry), entry.amount) {
            *sums.entry(k).or_insert(0.0) += amount;
        }
    }
    sums
}

fn collect_stats(entries: &[FlowEntry]) -> BalanceStats {
    let mut stats = BalanceStats {
        record_count: entries.len(),
        total_amount: entries.iter().filter_map(|e| e.amount).fold(0.0, |acc, a| acc + a),
        ..BalanceStats::default()
    };

    let mut seen: [HashSet<&str>; 3] = Default::default();
    for entry in entries {
        let levels = [
            (&entry.source, &mut stats.sources),
            (&entry.primary_category, &mut stats.primary_categories),
            (&entry.target, &mut stats.targets),
        ];
        for ((value, distinct), seen_at_level) in levels.into_iter().zip(seen.iter_mut()) {
            if let Some(v) = value.as_deref() {
                if seen_at_level.insert(v) {
                    distinct.push(v.to_string());
                }
            }
        }
    }

    stats
}
