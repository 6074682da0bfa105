//! Placeholder values substituted for absent or unusable model output.
//!
//! Every fallback the normalizer applies is named here so the full set of
//! defaults can be audited in one place.

/// Project title when the model gave none.
pub const UNTITLED_PROJECT: &str = "未命名项目";

/// Project title marking a response that could not be parsed at all.
pub const PARSE_FAILED_TITLE: &str = "解析失败";

/// Company, location, period and flow endpoints.
pub const UNKNOWN: &str = "未知";

pub const DEFAULT_INVESTMENT: f64 = 0.0;

pub const UNNAMED_INDICATOR: &str = "未命名指标";

/// Indicator total when missing, non-numeric or not positive.
pub const DEFAULT_INDICATOR_TOTAL: f64 = 100.0;

pub const UNNAMED_RESEARCH_ITEM: &str = "未命名进展";

pub const NO_DESCRIPTION: &str = "暂无说明";

pub const UNNAMED_RISK: &str = "未命名风险";

pub const NO_SOLUTION: &str = "暂无应对措施";

/// Primary category for flows that name neither `primaryCategory` nor `category`.
pub const OTHER_CATEGORY: &str = "其他";

pub const UNNAMED_BUDGET_CATEGORY: &str = "未命名科目";

/// Lower and upper bound of every percentage-like `value` field.
pub const VALUE_MIN: f64 = 0.0;
pub const VALUE_MAX: f64 = 100.0;

/// Numeric fallback for any field that failed coercion.
pub const ZERO: f64 = 0.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failure_marker_differs_from_untitled() {
        assert_ne!(PARSE_FAILED_TITLE, UNTITLED_PROJECT);
    }

    #[test]
    fn value_bounds_are_percentages() {
        assert_eq!(VALUE_MIN, 0.0);
        assert_eq!(VALUE_MAX, 100.0);
        assert_eq!(DEFAULT_INDICATOR_TOTAL, VALUE_MAX);
    }
}
