//! Agent 过程事件：思考、意图、工具调用、澄清、流式回复、结束与错误
//!
//! 序列化为 `{"type": "...", ...}`；只有 `type` 一定存在，空字段不输出（不编码为 null）。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::intent::IntentCategory;

/// 单条事件（可序列化为 JSON 供传输层转发）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 进度提示
    Thinking { content: String },
    /// 意图识别结果
    Intent {
        intent: IntentCategory,
        confidence: f64,
    },
    /// 调用工具（参数已剔除调用方身份）
    ToolCall {
        tool: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        params: Map<String, Value>,
    },
    /// 工具返回（只带摘要，不带载荷）
    ToolResult { tool: String, summary: String },
    /// 需要用户澄清；之后不再有任何事件
    Clarification {
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<String>,
    },
    /// 回复的一小段（流式输出）
    Chunk { content: String },
    /// 回复结束
    Done { conversation_id: String },
    /// 错误；之后不再有任何事件
    Error { content: String },
}

impl AgentEvent {
    pub fn thinking(content: impl Into<String>) -> Self {
        AgentEvent::Thinking {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Thinking { .. } => "thinking",
            AgentEvent::Intent { .. } => "intent",
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::Clarification { .. } => "clarification",
            AgentEvent::Chunk { .. } => "chunk",
            AgentEvent::Done { .. } => "done",
            AgentEvent::Error { .. } => "error",
        }
    }

    /// clarification / done / error 之后流结束
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::Clarification { .. } | AgentEvent::Done { .. } | AgentEvent::Error { .. }
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// 事件线格式的 JSON Schema
pub fn event_schema_json() -> String {
    let schema = schemars::schema_for!(AgentEvent);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_snake_case_encoding() {
        let event = AgentEvent::ToolResult {
            tool: "list_documents".into(),
            summary: "Found 1 document(s): a.pdf".into(),
        };
        let v: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            v,
            json!({"type": "tool_result", "tool": "list_documents", "summary": "Found 1 document(s): a.pdf"})
        );

        let intent = AgentEvent::Intent {
            intent: IntentCategory::MemoryRecall,
            confidence: 0.5,
        };
        assert_eq!(
            intent.to_json().unwrap(),
            r#"{"type":"intent","intent":"memory_recall","confidence":0.5}"#
        );
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let call = AgentEvent::ToolCall {
            tool: "list_documents".into(),
            params: Map::new(),
        };
        assert_eq!(call.to_json().unwrap(), r#"{"type":"tool_call","tool":"list_documents"}"#);

        let clarify = AgentEvent::Clarification {
            message: "Which one?".into(),
            options: vec![],
        };
        let encoded = clarify.to_json().unwrap();
        assert!(!encoded.contains("options"));
        assert!(!encoded.contains("null"));
    }

    #[test]
    fn test_round_trip_is_stable() {
        let mut params = Map::new();
        params.insert("query".into(), json!("revenue"));
        params.insert("limit".into(), json!(10));
        let events = vec![
            AgentEvent::thinking("Analyzing your request..."),
            AgentEvent::ToolCall {
                tool: "search_documents".into(),
                params,
            },
            AgentEvent::Clarification {
                message: "Which one?".into(),
                options: vec!["a.pdf".into(), "b.pdf".into()],
            },
            AgentEvent::Clarification {
                message: "Which one?".into(),
                options: vec![],
            },
            AgentEvent::Done {
                conversation_id: "c-1".into(),
            },
        ];
        for event in events {
            let once = event.to_json().unwrap();
            let decoded = AgentEvent::from_json(&once).unwrap();
            assert_eq!(decoded, event);
            assert_eq!(decoded.to_json().unwrap(), once);
        }
    }

    #[test]
    fn test_terminal_events() {
        assert!(AgentEvent::Error { content: "x".into() }.is_terminal());
        assert!(!AgentEvent::Chunk { content: "x".into() }.is_terminal());
        assert_eq!(AgentEvent::thinking("x").kind(), "thinking");
    }

    #[test]
    fn test_schema_lists_every_tag() {
        let schema = event_schema_json();
        for tag in ["thinking", "intent", "tool_call", "tool_result", "clarification", "chunk", "done", "error"] {
            assert!(schema.contains(&format!("\"{tag}\"")), "missing {tag}");
        }
    }
}
