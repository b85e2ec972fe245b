//! 工具注册表
//!
//! 启动阶段显式调用 register 填充（之后只读，多请求并发共享）；execute 是唯一分发入口：
//! 注入调用方身份、调用处理器，并把一切结果（含错误与 panic）归一为 ToolResult。
//! 工具失败是数据而不是控制流，execute 从不返回 Err。

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::StoreError;
use crate::tools::params::ToolParams;
use crate::tools::schema::{parse_schema, ParamSpec};

/// 单次工具调用的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// 结果载荷，失败时为 None
    pub data: Option<Value>,
    /// 给人看的简短摘要（tool_result 事件只携带这一项）
    pub summary: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: impl Into<Value>, summary: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            summary: summary.into(),
            success: true,
            error: None,
        }
    }

    /// 成功但没有内容（如未检索到任何文档）
    pub fn empty(summary: impl Into<String>) -> Self {
        Self::ok(Value::Array(Vec::new()), summary)
    }

    pub fn failure(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            data: None,
            summary: summary.into(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// 调用方身份缺失
    pub fn identity_required() -> Self {
        Self::failure("No user ID provided", "User ID required")
    }

    /// 成功且载荷非空（可用于生成上下文）
    pub fn has_content(&self) -> bool {
        if !self.success {
            return false;
        }
        match &self.data {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// 处理器返回值：已成形的 ToolResult 原样透传，其它值由注册表包装
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Result(ToolResult),
    Value(Value),
}

impl From<ToolResult> for ToolOutput {
    fn from(r: ToolResult) -> Self {
        ToolOutput::Result(r)
    }
}

impl From<Value> for ToolOutput {
    fn from(v: Value) -> Self {
        ToolOutput::Value(v)
    }
}

/// 处理器内部故障；由注册表转为失败的 ToolResult
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Failed(String),
}

/// 注册阶段错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered with a different handler")]
    DuplicateTool(String),

    #[error("invalid schema for tool '{tool}': {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("tool '{tool}' declares reserved parameter '{param}'")]
    ReservedParameter { tool: String, param: String },
}

/// 异步工具处理器：统一形状 (参数包, 调用方身份) -> 输出
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError>;
}

/// 同步处理器签名
pub type SyncHandlerFn =
    dyn Fn(&ToolParams, &str) -> Result<ToolOutput, ToolError> + Send + Sync;

/// 处理器引用，同时充当同步 / 异步标记
#[derive(Clone)]
pub enum Handler {
    Sync(Arc<SyncHandlerFn>),
    Async(Arc<dyn ToolHandler>),
}

impl Handler {
    fn addr(&self) -> *const () {
        match self {
            Handler::Sync(f) => Arc::as_ptr(f) as *const (),
            Handler::Async(h) => Arc::as_ptr(h) as *const (),
        }
    }

    fn same_as(&self, other: &Handler) -> bool {
        self.addr() == other.addr()
    }
}

/// 工具定义：注册后不再修改
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub handler: Handler,
}

impl ToolDefinition {
    pub fn is_async(&self) -> bool {
        matches!(self.handler, Handler::Async(_))
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// 工具目录条目（不含处理器），供 LLM 与外部展示
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

/// 工具注册表：按注册顺序存放定义，名称索引到位置
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册异步工具
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        schema: &[(&str, &str)],
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        self.insert(name, description, schema, Handler::Async(handler))
    }

    /// 注册同步工具
    pub fn register_fn<F>(
        &mut self,
        name: &str,
        description: &str,
        schema: &[(&str, &str)],
        f: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&ToolParams, &str) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    {
        self.insert(name, description, schema, Handler::Sync(Arc::new(f)))
    }

    /// 同名且同一处理器重复注册视为幂等；同名不同处理器立即失败
    pub fn insert(
        &mut self,
        name: &str,
        description: &str,
        schema: &[(&str, &str)],
        handler: Handler,
    ) -> Result<(), RegistryError> {
        let parameters = parse_schema(name, schema)?;
        if let Some(&i) = self.index.get(name) {
            if self.tools[i].handler.same_as(&handler) {
                tracing::debug!(tool = name, "tool already registered, skipping");
                return Ok(());
            }
            return Err(RegistryError::DuplicateTool(name.to_string()));
        }
        self.index.insert(name.to_string(), self.tools.len());
        self.tools.push(ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            handler,
        });
        tracing::info!(tool = name, "registered tool");
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(ToolDefinition::spec).collect()
    }

    /// 供意图识别 prompt 使用的工具目录：`- name(p: type, ...): description`
    pub fn tools_for_llm(&self) -> String {
        self.tools
            .iter()
            .map(|t| {
                let params = t
                    .parameters
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.kind))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("- {}({}): {}", t.name, params, t.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 工具目录 JSON
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.specs()).unwrap_or_else(|_| "[]".to_string())
    }

    /// 分发入口：注入身份（覆盖调用方自带值）→ 调用处理器 → 归一化结果
    pub async fn execute(&self, name: &str, mut params: ToolParams, user_id: &str) -> ToolResult {
        let Some(tool) = self.lookup(name) else {
            tracing::error!(tool = name, "tool not found");
            return ToolResult::failure(
                format!("Tool '{name}' not found"),
                format!("Unknown tool: {name}"),
            );
        };

        params.set_identity(user_id);
        tracing::info!(
            tool = name,
            params = ?params.redacted().keys().collect::<Vec<_>>(),
            "executing tool"
        );

        let outcome = match &tool.handler {
            Handler::Sync(f) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| f(&params, user_id)))
                    .map_err(panic_message)
            }
            Handler::Async(h) => AssertUnwindSafe(h.call(&params, user_id))
                .catch_unwind()
                .await
                .map_err(panic_message),
        };

        match outcome {
            Ok(Ok(ToolOutput::Result(result))) => result,
            Ok(Ok(ToolOutput::Value(value))) => {
                ToolResult::ok(value, format!("Tool '{name}' executed successfully"))
            }
            Ok(Err(e)) => {
                tracing::error!(tool = name, error = %e, "tool execution error");
                ToolResult::failure(format!("Error executing '{name}': {e}"), e.to_string())
            }
            Err(msg) => {
                tracing::error!(tool = name, panic = %msg, "tool handler panicked");
                ToolResult::failure(format!("Error executing '{name}': {msg}"), msg)
            }
        }
    }
}

/// panic 载荷 -> 文本
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Greeter;

    #[async_trait]
    impl ToolHandler for Greeter {
        async fn call(&self, params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError> {
            let name = params.require_str("name")?;
            Ok(ToolResult::ok(json!(format!("hi {name} from {user_id}")), "greeted").into())
        }
    }

    struct Exploder;

    #[async_trait]
    impl ToolHandler for Exploder {
        async fn call(&self, _params: &ToolParams, _user_id: &str) -> Result<ToolOutput, ToolError> {
            panic!("boom");
        }
    }

    fn registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register("greet", "Say hi", &[("name", "string")], Arc::new(Greeter))
            .unwrap();
        reg.register_fn("echo_params", "Echo params", &[], |params, _| {
            Ok(Value::Object(params.redacted()).into())
        })
        .unwrap();
        reg.register_fn("fail", "Always fails", &[], |_, _| {
            Err(ToolError::Failed("backend down".to_string()))
        })
        .unwrap();
        reg.register("explode", "Panics", &[], Arc::new(Exploder)).unwrap();
        reg
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failed_result() {
        let result = registry()
            .execute("nonexistent_tool", ToolParams::new(), "user-1")
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: nonexistent_tool"));
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn test_tool_result_passes_through() {
        let result = registry()
            .execute("greet", ToolParams::new().with("name", "Ann"), "user-1")
            .await;
        assert!(result.success);
        assert_eq!(result.summary, "greeted");
        assert_eq!(result.data, Some(json!("hi Ann from user-1")));
    }

    #[tokio::test]
    async fn test_plain_value_is_wrapped_and_identity_injected() {
        let params = ToolParams::new().with("k", 1).with("user_id", "spoofed");
        let result = registry().execute("echo_params", params, "user-1").await;
        assert!(result.success);
        assert_eq!(result.summary, "Tool 'echo_params' executed successfully");
        assert_eq!(result.data, Some(json!({"k": 1})));
    }

    #[tokio::test]
    async fn test_handler_error_and_panic_become_data() {
        let reg = registry();
        let failed = reg.execute("fail", ToolParams::new(), "u").await;
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("backend down"));

        let missing = reg.execute("greet", ToolParams::new(), "u").await;
        assert_eq!(missing.error.as_deref(), Some("missing parameter: name"));

        let panicked = reg.execute("explode", ToolParams::new(), "u").await;
        assert!(!panicked.success);
        assert_eq!(panicked.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_duplicate_registration_rules() {
        let mut reg = ToolRegistry::new();
        let handler: Arc<dyn ToolHandler> = Arc::new(Greeter);
        reg.register("greet", "Say hi", &[("name", "string")], handler.clone())
            .unwrap();
        // 同一处理器：幂等
        reg.register("greet", "Say hi", &[("name", "string")], handler)
            .unwrap();
        assert_eq!(reg.len(), 1);

        let err = reg
            .register("greet", "Other", &[], Arc::new(Greeter))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("greet".to_string()));
    }

    #[test]
    fn test_tools_for_llm_keeps_registration_order() {
        let text = registry().tools_for_llm();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "- greet(name: string): Say hi");
        assert!(lines[1].starts_with("- echo_params()"));
        assert!(registry().lookup("explode").unwrap().is_async());
        assert!(!registry().lookup("fail").unwrap().is_async());
    }
}
