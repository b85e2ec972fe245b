//! 生成阶段的系统提示：基础指令 + 按意图的任务补充 + 工具结果拼成的上下文块
//!
//! 工具结果按载荷形状格式化：检索片段列表、按文件分组的文档、单个文档、文件名列表。

use serde_json::Value;

use crate::intent::IntentCategory;
use crate::tools::ToolResult;

/// 检索片段最多取多少条
const MAX_CHUNK_ITEMS: usize = 20;
/// 单个片段截断长度（字符）
const MAX_CHUNK_CHARS: usize = 2000;
/// 单个文档截断长度（字符）
const MAX_DOCUMENT_CHARS: usize = 3000;

const BASE_PROMPT: &str = "You are an AI assistant with access to the user's uploaded documents and conversation history.

CRITICAL INSTRUCTIONS:
1. Base your answers on the provided document content below.
2. If the answer is in the documents, cite it confidently (e.g., \"According to your document...\").
3. If no relevant information is found in the documents, clearly say so.
4. Be concise but thorough.

FORMATTING RULES:
- For numbered lists, keep the number and content on the SAME line (e.g., \"1. **Title:** Content\" not \"1.\\n**Title:**\")
- Use markdown formatting for emphasis: **bold** for titles, *italic* for emphasis
- Keep list items compact and readable";

const NO_CONTENT_NOTE: &str = "Note: No relevant document content was found for this query.";

fn task_addendum(category: IntentCategory) -> Option<&'static str> {
    match category {
        IntentCategory::DocumentSummary => Some(
            "TASK: Summarize the key points from the user's documents.
- Provide a clear, structured summary
- Highlight the most important information
- Use bullet points or numbered lists when appropriate",
        ),
        IntentCategory::DocumentSearch => Some(
            "TASK: Find and present specific information from the documents.
- Quote relevant passages when possible
- Indicate which document the information comes from",
        ),
        IntentCategory::MemoryRecall => Some(
            "TASK: Recall information from previous conversations.
- Reference relevant past discussions
- Provide context from earlier interactions",
        ),
        IntentCategory::DocumentList => Some(
            "TASK: Help the user understand their uploaded documents.
- List the available documents
- Briefly describe what each contains if information is available",
        ),
        IntentCategory::DocumentSpecific
        | IntentCategory::GeneralChat
        | IntentCategory::VagueQuery => None,
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str)
}

fn format_document(filename: &str, content: &str) -> String {
    format!("=== Document: {filename} ===\n{content}")
}

/// 单个工具载荷 -> 上下文文本；无法识别的形状原样输出 JSON
pub fn format_tool_data(data: &Value) -> String {
    match data {
        Value::Array(items) if items.iter().all(|i| i.is_string()) => {
            let names: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            format!("Available documents: {}", names.join(", "))
        }
        // 分组文档带 chunk_count；检索片段与记忆只有 content / metadata
        Value::Array(items) if items.iter().all(|i| i.get("chunk_count").is_some()) => items
            .iter()
            .map(|item| {
                let filename = str_field(item, "filename").unwrap_or("unknown");
                let content = str_field(item, "content").unwrap_or_default();
                format_document(filename, truncate(content, MAX_DOCUMENT_CHARS))
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        Value::Array(items) if items.iter().all(|i| i.get("content").is_some()) => items
            .iter()
            .take(MAX_CHUNK_ITEMS)
            .map(|item| {
                let content = truncate(str_field(item, "content").unwrap_or_default(), MAX_CHUNK_CHARS);
                let filename = item
                    .get("metadata")
                    .and_then(|m| str_field(m, "filename"))
                    .or_else(|| str_field(item, "filename"))
                    .filter(|f| !f.is_empty());
                match filename {
                    Some(f) => format!("[From {f}]:\n{content}"),
                    None => content.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n"),
        Value::Object(_) => {
            let content = truncate(str_field(data, "content").unwrap_or_default(), MAX_DOCUMENT_CHARS);
            match str_field(data, "filename").filter(|f| !f.is_empty()) {
                Some(f) => format_document(f, content),
                None => content.to_string(),
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 拼接全部有内容的工具结果；没有可用内容时返回空串
pub fn build_context(results: &[ToolResult]) -> String {
    results
        .iter()
        .filter(|r| r.has_content())
        .filter_map(|r| r.data.as_ref())
        .map(format_tool_data)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 组装系统提示
pub fn build_system_prompt(category: IntentCategory, context: &str) -> String {
    let mut prompt = BASE_PROMPT.to_string();
    if let Some(task) = task_addendum(category) {
        prompt.push_str("\n\n");
        prompt.push_str(task);
    }
    if context.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(NO_CONTENT_NOTE);
    } else {
        prompt.push_str("\n\n=== DOCUMENT CONTENT ===\n");
        prompt.push_str(context);
        prompt.push_str("\n=== END DOCUMENT CONTENT ===");
    }
    prompt
}
