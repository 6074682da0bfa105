/// Maximum document length sent to the model (characters).
pub const MAX_INPUT_LENGTH: usize = 50_000;

/// Build the extraction prompt for one project report.
pub fn build_report_prompt(content: &str) -> String {
    format!(
        r#"请仔细分析以下项目报告内容，并严格按照指定的 JSON 格式返回关键信息。要求：
1. 只返回一个 JSON 对象，不要附加任何解释文字
2. 所有必需字段都要填写，报告中没有的信息请留空字符串
3. 数值类型的字段必须是数字，进度 value 取值 0-100
4. 所有数组至少包含一个元素
5. 风险等级 level 只能是 high / medium / low
6. 如果报告中包含经费使用表格，请提取资金流向数据，保留原始金额数值，不要进行单位转换
7. 资金流向按 来源(source) → 一级科目(primaryCategory) → 二级科目(target) 三个层级标注

返回格式：
{{
  "projectInfo": {{
    "title": "项目名称",
    "company": "承担单位",
    "location": "实施地点",
    "period": "实施周期",
    "investment": 0
  }},
  "progressIndicators": [
    {{ "name": "指标名称", "value": 75, "total": 100 }}
  ],
  "researchProgress": [
    {{ "title": "进展名称", "value": 80, "description": "详细说明" }}
  ],
  "risks": [
    {{ "level": "high", "title": "风险名称", "description": "风险说明", "solution": "应对措施" }}
  ],
  "financialData": {{
    "totalBudget": 0,
    "flowDetails": [
      {{ "source": "资金来源", "primaryCategory": "一级科目", "target": "二级科目", "amount": 0 }}
    ],
    "budgetCategories": [
      {{ "name": "科目名称", "budget": 0, "spent": 0, "remaining": 0 }}
    ]
  }}
}}

项目报告内容：
<document>
{content}
</document>"#
    )
}

/// Prepare extracted document text for the prompt: drop invisible
/// characters, trim lines, collapse blank runs and cap the length.
pub fn prepare_document_text(raw: &str) -> String {
    let visible = remove_invisible_chars(raw);
    let normalized = normalize_blank_lines(&visible);
    truncate_to_max_length(&normalized, MAX_INPUT_LENGTH)
}

fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t') {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}'
                    | '\u{202A}'..='\u{202E}'
                    | '\u{2060}'..='\u{2064}'
                    | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

fn normalize_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut prev_blank = true;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_blank {
                lines.push("");
            }
            prev_blank = true;
        } else {
            lines.push(trimmed);
            prev_blank = false;
        }
    }

    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

/// Truncate to `max_chars` characters, preferring the last line break.
fn truncate_to_max_length(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    match head.rfind('\n') {
        Some(pos) if pos > cut / 2 => head[..pos].to_string(),
        _ => head.to_string(),
    }
}
