//! LLM 意图识别：prompt 构造与固定格式回复解析
//!
//! 回复格式（逐行，按第一个 `:` 切分）：
//! INTENT / CONFIDENCE / TOOLS / IS_VAGUE / CLARIFICATION / ENTITIES。

use std::collections::HashMap;

use crate::intent::{DetectedIntent, IntentCategory};
use crate::memory::Message;

/// 历史消息在 prompt 中的截断长度（字符）
const HISTORY_PREVIEW_CHARS: usize = 100;
/// 解析不到置信度时的默认值
const DEFAULT_LLM_CONFIDENCE: f64 = 0.7;
/// 模型判为模糊却没给澄清语时使用
const DEFAULT_CLARIFICATION: &str = "Could you clarify what you are referring to?";

fn format_history(history: &[Message]) -> String {
    if history.is_empty() {
        return "No recent conversation".to_string();
    }
    history
        .iter()
        .map(|m| {
            let content: String = m.content.chars().take(HISTORY_PREVIEW_CHARS).collect();
            format!("{}: {}", m.role.as_str(), content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 构造意图识别 prompt；history 应已截到最近几条
pub fn build_prompt(
    query: &str,
    available_documents: &[String],
    tool_catalog: &str,
    history: &[Message],
) -> String {
    let docs = if available_documents.is_empty() {
        "None uploaded".to_string()
    } else {
        available_documents.join(", ")
    };
    let labels = IntentCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Analyze this user query and determine the intent.

User query: "{query}"

Available documents: {docs}

Available tools:
{tool_catalog}

Recent conversation context (last {n} messages):
{history}

Respond in this exact format:
INTENT: <one of: {labels}>
CONFIDENCE: <0.0 to 1.0>
TOOLS: <comma-separated tool names to use, or "none">
IS_VAGUE: <true or false>
CLARIFICATION: <if vague, what to ask the user, otherwise "none">
ENTITIES: <extracted entities like filename=X, otherwise "none">
"#,
        n = history.len(),
        history = format_history(history),
    )
}

fn is_none(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("none")
}

/// 解析 LLM 回复；任何字段缺失或格式错误都退化为默认值，不会失败
pub fn parse_response(response: &str, available_documents: &[String]) -> DetectedIntent {
    let parsed: HashMap<String, String> = response
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_uppercase(), v.trim().to_string()))
        .collect();
    let field = |key: &str| parsed.get(key).map(String::as_str).unwrap_or("");

    let category = field("INTENT")
        .parse::<IntentCategory>()
        .unwrap_or(IntentCategory::GeneralChat);
    let confidence = field("CONFIDENCE")
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_LLM_CONFIDENCE);

    let tools: Vec<String> = field("TOOLS")
        .split(',')
        .map(str::trim)
        .filter(|t| !is_none(t))
        .map(String::from)
        .collect();

    let is_vague =
        field("IS_VAGUE").eq_ignore_ascii_case("true") || category == IntentCategory::VagueQuery;
    let clarification = Some(field("CLARIFICATION"))
        .filter(|c| !is_none(c))
        .map(String::from);

    let entities_raw = field("ENTITIES");
    let entities: Vec<(String, String)> = if is_none(entities_raw) {
        Vec::new()
    } else {
        entities_raw
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect()
    };

    let mut intent = if is_vague {
        let options = (!available_documents.is_empty()).then(|| available_documents.to_vec());
        let mut vague = DetectedIntent::vague(
            confidence,
            clarification.unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string()),
            options,
        );
        vague.category = category;
        vague
    } else {
        let mut intent = DetectedIntent::new(category, confidence);
        if !tools.is_empty() {
            intent.tools_to_use = tools;
        }
        intent.clarification_message = clarification;
        intent
    };
    for (k, v) in entities {
        intent = intent.with_entity(k, v);
    }
    intent
}
