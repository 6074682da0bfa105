//! Property tests for the sanitize → normalize pipeline.

use proptest::prelude::*;
use serde_json::{json, Value};

use super::normalize::normalize;
use super::sanitize::sanitize;
use super::types::{CanonicalReport, RiskLevel};

/// Arbitrary JSON values, a few levels deep.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        ".{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![
                    Just("projectInfo".to_string()),
                    Just("progressIndicators".to_string()),
                    Just("researchProgress".to_string()),
                    Just("risks".to_string()),
                    Just("financialData".to_string()),
                    Just("flowDetails".to_string()),
                    Just("value".to_string()),
                    Just("level".to_string()),
                    Just("amount".to_string()),
                    "[a-z]{1,8}",
                ],
                inner,
                0..6,
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Values a model might put in a numeric `value` field.
fn arb_value_field() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<f64>()
            .prop_map(|f| serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)),
        any::<i64>().prop_map(|n| json!(n)),
        "-?[0-9]{0,4}(\\.[0-9]{0,3})?".prop_map(Value::String),
        "[a-zA-Z%]{0,6}".prop_map(Value::String),
        Just(json!("NaN")),
        Just(Value::Null),
    ]
}

fn assert_well_formed(report: &CanonicalReport) {
    for item in &report.progress_indicators {
        assert!((0.0..=100.0).contains(&item.value));
        assert!(item.total > 0.0 && item.total.is_finite());
        assert!(!item.name.is_empty());
    }
    for item in &report.research_progress {
        assert!((0.0..=100.0).contains(&item.value));
        assert!(!item.title.is_empty() && !item.description.is_empty());
    }
    for risk in &report.risks {
        assert!(matches!(risk.level, RiskLevel::High | RiskLevel::Medium | RiskLevel::Low));
        assert!(!risk.title.is_empty() && !risk.solution.is_empty());
    }
    for flow in &report.financial_data.flow_details {
        assert!(flow.amount.is_finite());
        assert!(!flow.source.is_empty() && !flow.target.is_empty());
    }
    assert!(!report.project_info.title.is_empty());
    assert!(report.project_info.investment.is_finite());

    let json = serde_json::to_value(report).unwrap();
    assert!(!contains_null(&json), "null in canonical output: {json}");
}

fn contains_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.iter().any(contains_null),
        Value::Object(map) => map.values().any(contains_null),
        _ => false,
    }
}

proptest! {
    #[test]
    fn sanitize_always_yields_json_object(raw in ".{0,200}") {
        let out = sanitize(&raw);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        prop_assert!(parsed.is_object());
    }

    #[test]
    fn sanitize_handles_mangled_json(value in arb_json(), noise in "[,'\\\\ \n]{0,3}", cut in 0usize..64) {
        let mut text = format!("结果：{value}");
        let at = text.char_indices().nth(cut).map(|(i, _)| i).unwrap_or(text.len());
        text.insert_str(at, &noise);
        let out = sanitize(&text);
        prop_assert!(serde_json::from_str::<Value>(&out).is_ok());
    }

    #[test]
    fn normalize_is_total(value in arb_json()) {
        let report = normalize(&value);
        assert_well_formed(&report);
    }

    #[test]
    fn normalized_values_are_clamped(v in arb_value_field()) {
        let input = json!({
            "progressIndicators": [{"name": "n", "value": v.clone()}],
            "researchProgress": [{"title": "t", "value": v}],
        });
        let report = normalize(&input);
        let indicator = report.progress_indicators[0].value;
        let research = report.research_progress[0].value;
        prop_assert!((0.0..=100.0).contains(&indicator));
        prop_assert!((0.0..=100.0).contains(&research));
    }

    #[test]
    fn risk_level_always_in_enum(level in "\\PC{0,10}") {
        let report = normalize(&json!({"risks": [{"level": level.clone()}]}));
        let expected = match level.trim().to_lowercase().as_str() {
            "high" | "高" => RiskLevel::High,
            "low" | "低" => RiskLevel::Low,
            _ => RiskLevel::Medium,
        };
        prop_assert_eq!(report.risks[0].level, expected);
    }

    #[test]
    fn casing_variants_of_level_normalize(upper in prop::collection::vec(any::<bool>(), 4)) {
        let level: String = "high"
            .chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect();
        let report = normalize(&json!({"risks": [{"level": level}]}));
        prop_assert_eq!(report.risks[0].level, RiskLevel::High);
    }

    #[test]
    fn duplicate_flow_pairs_keep_first(first in 0.0f64..1.0e6, second in 0.0f64..1.0e6) {
        let input = json!({"financialData": {"flowDetails": [
            {"source": "A", "primaryCategory": "P", "target": "B", "amount": first},
            {"source": "A", "primaryCategory": "Q", "target": "B", "amount": second},
        ]}});
        let flows = normalize(&input).financial_data.flow_details;
        prop_assert_eq!(flows.len(), 1);
        prop_assert_eq!(flows[0].primary_category.as_str(), "P");
    }
}
