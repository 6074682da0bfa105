//! Dashboard view model: derived figures and display strings for a
//! canonical report. Pure functions; nothing here touches the report.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::pipeline::structuring::coerce::round_to_cents;
use crate::pipeline::structuring::defaults;
use crate::pipeline::structuring::{CanonicalReport, FlowRecord};

pub const DEFAULT_AMOUNT_UNIT: &str = "万元";

/// Share of the investment attributed to special funds when the report does
/// not break it down.
pub const DEFAULT_SPECIAL_FUND_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowLevel {
    Source,
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub level: FlowLevel,
    /// Larger of the node's inflow and outflow.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

/// Three-level Sankey model: source → primary category → target.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub links: Vec<FlowLink>,
}

impl FlowGraph {
    /// Build the graph, merging links on the same path. Nodes keep first-seen
    /// order within each level, sources first.
    pub fn from_records(records: &[FlowRecord]) -> Self {
        let mut levels: [(FlowLevel, Vec<&str>); 3] = [
            (FlowLevel::Source, Vec::new()),
            (FlowLevel::Primary, Vec::new()),
            (FlowLevel::Secondary, Vec::new()),
        ];
        let mut seen: [HashSet<&str>; 3] = Default::default();
        let mut links: Vec<FlowLink> = Vec::new();
        let mut link_index: HashMap<(&str, &str), usize> = HashMap::new();

        for record in records {
            let primary = if record.primary_category.is_empty() {
                defaults::OTHER_CATEGORY
            } else {
                record.primary_category.as_str()
            };
            let path = [record.source.as_str(), primary, record.target.as_str()];

            for ((_, names), (&name, seen_at_level)) in
                levels.iter_mut().zip(path.iter().zip(seen.iter_mut()))
            {
                if seen_at_level.insert(name) {
                    names.push(name);
                }
            }

            for (from, to) in [(path[0], path[1]), (path[1], path[2])] {
                match link_index.get(&(from, to)) {
                    Some(&i) => links[i].value += record.amount,
                    None => {
                        link_index.insert((from, to), links.len());
                        links.push(FlowLink {
                            source: from.to_string(),
                            target: to.to_string(),
                            value: record.amount,
                        });
                    }
                }
            }
        }

        for link in &mut links {
            link.value = round_to_cents(link.value);
        }

        let nodes = levels
            .iter()
            .flat_map(|(level, names)| {
                names.iter().map(|name| FlowNode {
                    id: name.to_string(),
                    level: *level,
                    value: node_value(&links, name),
                })
            })
            .collect();

        Self { nodes, links }
    }

    /// Subgraph of the links touching `node_id` and the nodes they reach.
    pub fn focus(&self, node_id: &str) -> Self {
        let links: Vec<FlowLink> = self
            .links
            .iter()
            .filter(|l| l.source == node_id || l.target == node_id)
            .cloned()
            .collect();
        let relevant: HashSet<&str> = links
            .iter()
            .flat_map(|l| [l.source.as_str(), l.target.as_str()])
            .collect();
        let nodes = self
            .nodes
            .iter()
            .filter(|n| relevant.contains(n.id.as_str()))
            .cloned()
            .collect();
        Self { nodes, links }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn node_value(links: &[FlowLink], id: &str) -> f64 {
    let (inflow, outflow) = links.iter().fold((0.0, 0.0), |(inflow, outflow), l| {
        (
            inflow + if l.target == id { l.value } else { 0.0 },
            outflow + if l.source == id { l.value } else { 0.0 },
        )
    });
    round_to_cents(f64::max(inflow, outflow))
}

/// Investment broken down into special funds and self-raised funds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentSplit {
    pub total: f64,
    pub special: f64,
    pub self_raised: f64,
}

impl InvestmentSplit {
    /// Split `investment` with `ratio` (clamped to [0, 1]) going to special
    /// funds, rounded down to a whole unit.
    pub fn with_ratio(investment: f64, ratio: f64) -> Self {
        let total = if investment.is_finite() { investment } else { 0.0 };
        let ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            DEFAULT_SPECIAL_FUND_RATIO
        };
        let special = (total * ratio).floor();
        Self {
            total,
            special,
            self_raised: round_to_cents(total - special),
        }
    }

    pub fn describe(&self, unit: &str) -> String {
        if self.total <= 0.0 {
            return "未设置".to_string();
        }
        format!(
            "总额 {} {unit}（专项资金 {} {unit} + 自筹资金 {} {unit}）",
            group_digits(self.total),
            group_digits(self.special),
            group_digits(self.self_raised),
        )
    }
}

impl Default for InvestmentSplit {
    fn default() -> Self {
        Self::with_ratio(0.0, DEFAULT_SPECIAL_FUND_RATIO)
    }
}

/// Amount with thousands separators and unit, e.g. `1,234.5 万元`.
/// Zero and non-finite values render as `0`.
pub fn format_amount(value: f64, unit: &str) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    format!("{} {unit}", group_digits(value))
}

/// Up to three fraction digits, trailing zeros trimmed, integer part grouped.
fn group_digits(value: f64) -> String {
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

const PERIOD_SEPARATORS: [&str; 4] = [" - ", "至", "~", "～"];

/// Normalize a `start - end` period. Recognized dates become ISO
/// (`2023-01-05`, or `2023-01` for month precision); anything else is kept.
pub fn format_period(period: &str) -> String {
    let period = period.trim();
    let split = PERIOD_SEPARATORS
        .iter()
        .find_map(|sep| period.split_once(sep));

    match split {
        Some((start, end)) if !start.trim().is_empty() && !end.trim().is_empty() => {
            format!("{} - {}", format_date(start.trim()), format_date(end.trim()))
        }
        _ => period.to_string(),
    }
}

fn format_date(raw: &str) -> String {
    const DAY_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];
    const MONTH_FORMATS: [&str; 4] = ["%Y-%m", "%Y/%m", "%Y.%m", "%Y年%m月"];

    for fmt in DAY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    // chrono needs a day to build a date; try the first of the month.
    for fmt in MONTH_FORMATS {
        let with_day = format!("{raw}-01");
        if let Ok(date) = NaiveDate::parse_from_str(&with_day, &format!("{fmt}-%d")) {
            return date.format("%Y-%m").to_string();
        }
    }
    raw.to_string()
}

/// Heading shown above the dashboard.
pub fn dashboard_title(report: &CanonicalReport) -> String {
    format!(
        "{} {}进展情况",
        report.project_info.title,
        format_period(&report.project_info.period)
    )
}

/// Mean completion percentage over the progress indicators, 0 when there
/// are none.
pub fn average_progress(report: &CanonicalReport) -> f64 {
    let indicators = &report.progress_indicators;
    if indicators.is_empty() {
        return 0.0;
    }
    let sum: f64 = indicators.iter().map(|i| i.value).sum();
    round_to_cents(sum / indicators.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::ProgressIndicator;

    fn record(source: &str, primary: &str, target: &str, amount: f64) -> FlowRecord {
        FlowRecord {
            source: source.into(),
            primary_category: primary.into(),
            target: target.into(),
            amount,
        }
    }

    #[test]
    fn flow_graph_merges_paths() {
        let records = vec![
            record("专项资金", "直接费用", "设备费", 60.0),
            record("自筹资金", "直接费用", "设备费", 20.0),
            record("专项资金", "直接费用", "材料费", 0.125),
        ];
        let graph = FlowGraph::from_records(&records);

        let ids: Vec<(&str, FlowLevel)> =
            graph.nodes.iter().map(|n| (n.id.as_str(), n.level)).collect();
        assert_eq!(
            ids,
            vec![
                ("专项资金", FlowLevel::Source),
                ("自筹资金", FlowLevel::Source),
                ("直接费用", FlowLevel::Primary),
                ("设备费", FlowLevel::Secondary),
                ("材料费", FlowLevel::Secondary),
            ]
        );

        let link = |s: &str, t: &str| {
            graph
                .links
                .iter()
                .find(|l| l.source == s && l.target == t)
                .unwrap()
                .value
        };
        assert_eq!(link("专项资金", "直接费用"), 60.13);
        assert_eq!(link("直接费用", "设备费"), 80.0);
        assert_eq!(graph.links.len(), 4);

        let direct = graph.nodes.iter().find(|n| n.id == "直接费用").unwrap();
        assert_eq!(direct.value, 80.13);
    }

    #[test]
    fn empty_primary_falls_back_to_other() {
        let graph = FlowGraph::from_records(&[record("A", "", "B", 1.0)]);
        assert!(graph.nodes.iter().any(|n| n.id == "其他" && n.level == FlowLevel::Primary));
    }

    #[test]
    fn focus_keeps_adjacent_links() {
        let graph = FlowGraph::from_records(&[
            record("A", "P", "X", 1.0),
            record("B", "Q", "Y", 2.0),
        ]);
        let focused = graph.focus("P");
        assert_eq!(focused.links.len(), 2);
        let ids: Vec<&str> = focused.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "P", "X"]);
        assert!(graph.focus("nobody").is_empty());
    }

    #[test]
    fn investment_split_default_ratio() {
        let split = InvestmentSplit::with_ratio(501.0, DEFAULT_SPECIAL_FUND_RATIO);
        assert_eq!(split.special, 250.0);
        assert_eq!(split.self_raised, 251.0);
        assert_eq!(
            split.describe(DEFAULT_AMOUNT_UNIT),
            "总额 501 万元（专项资金 250 万元 + 自筹资金 251 万元）"
        );
    }

    #[test]
    fn investment_split_ratio_clamped() {
        let split = InvestmentSplit::with_ratio(100.0, 1.5);
        assert_eq!(split.special, 100.0);
        assert_eq!(split.self_raised, 0.0);
        assert_eq!(InvestmentSplit::default().describe("万元"), "未设置");
    }

    #[test]
    fn amounts_grouped_with_unit() {
        assert_eq!(format_amount(1234567.5, DEFAULT_AMOUNT_UNIT), "1,234,567.5 万元");
        assert_eq!(format_amount(999.0, "元"), "999 元");
        assert_eq!(format_amount(-1500.25, "元"), "-1,500.25 元");
        assert_eq!(format_amount(0.0, "元"), "0");
        assert_eq!(format_amount(f64::NAN, "元"), "0");
        assert_eq!(format_amount(1.23456, "元"), "1.235 元");
    }

    #[test]
    fn period_dates_normalized() {
        assert_eq!(format_period("2023/1/5 - 2024/12/31"), "2023-01-05 - 2024-12-31");
        assert_eq!(format_period("2023-01 - 2024-12"), "2023-01 - 2024-12");
        assert_eq!(format_period("2023年1月至2025年6月"), "2023-01 - 2025-06");
        assert_eq!(format_period("三年"), "三年");
        assert_eq!(format_period("未知"), "未知");
    }

    #[test]
    fn title_combines_name_and_period() {
        let mut report = CanonicalReport::default();
        report.project_info.title = "智慧农业".into();
        report.project_info.period = "2023-01 - 2024-12".into();
        assert_eq!(dashboard_title(&report), "智慧农业 2023-01 - 2024-12进展情况");
    }

    #[test]
    fn average_progress_over_indicators() {
        let mut report = CanonicalReport::default();
        assert_eq!(average_progress(&report), 0.0);
        for value in [80.0, 65.0, 50.0] {
            report.progress_indicators.push(ProgressIndicator {
                name: "n".into(),
                value,
                total: 100.0,
            });
        }
        assert_eq!(average_progress(&report), 65.0);
    }
}
