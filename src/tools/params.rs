//! 工具参数包
//!
//! ToolParams 是所有工具处理器的统一入参：JSON 对象 + 类型化读取方法。
//! 调用方身份由注册表在分发时写入 IDENTITY_KEY，对外展示时必须剔除。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolError;

/// 调用方身份在参数包中的键
pub const IDENTITY_KEY: &str = "user_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolParams(Map<String, Value>);

impl ToolParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// 非负整数；字符串形式的数字也接受（LLM 产出的参数常为字符串）
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64().map(|v| v as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> usize {
        self.get_usize(key).unwrap_or(default)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, ToolError> {
        self.get_str(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// 写入调用方身份（覆盖调用方自带的同名键）
    pub fn set_identity(&mut self, user_id: &str) {
        self.0
            .insert(IDENTITY_KEY.to_string(), Value::String(user_id.to_string()));
    }

    /// 剔除身份后的快照，用于 tool_call 事件与日志
    pub fn redacted(&self) -> Map<String, Value> {
        let mut map = self.0.clone();
        map.remove(IDENTITY_KEY);
        map
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ToolParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
