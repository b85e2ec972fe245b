//! 工具执行器
//!
//! 持有只读 ToolRegistry 与可选超时；execute 在超时内调用 registry.execute，超时转为失败的 ToolResult。
//! 每次调用输出一条结构化审计日志（JSON，参数已剔除身份）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::tools::{ToolParams, ToolRegistry, ToolResult};

/// 参数预览最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    /// timeout_secs 为 0 表示不设超时
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    pub async fn execute(&self, tool_name: &str, params: ToolParams, user_id: &str) -> ToolResult {
        let start = Instant::now();
        let preview = args_preview(&params);
        let call = self.registry.execute(tool_name, params, user_id);

        let (result, timed_out) = match self.timeout {
            Some(limit) => match timeout(limit, call).await {
                Ok(r) => (r, false),
                Err(_) => (
                    ToolResult::failure(
                        format!("Tool '{tool_name}' timed out"),
                        format!("Tool timeout: {tool_name}"),
                    ),
                    true,
                ),
            },
            None => (call.await, false),
        };

        let outcome = match (result.success, timed_out) {
            (true, _) => "ok",
            (false, true) => "timeout",
            (false, false) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.success,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        result
    }
}

fn args_preview(params: &ToolParams) -> String {
    let s = serde_json::Value::Object(params.redacted()).to_string();
    if s.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", s.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        s
    }
}
