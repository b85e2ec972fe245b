//! 错误类型
//!
//! AgentError 只出现在流水线顶层与启动阶段；协作方（文档库 / 记忆库）的故障为 StoreError，
//! 在工具执行器边界被吸收为失败的 ToolResult，不会上升为 AgentError。

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::RegistryError;

/// 编排流水线与启动阶段的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(String),

    /// 事件消费方断开或主动取消
    #[error("Cancelled by caller")]
    Cancelled,

    /// 流水线以 error 事件结束（缓冲消费模式下转为 Err）
    #[error("{0}")]
    Pipeline(String),

    /// 事件流结束但既没有 done 也没有 clarification / error
    #[error("Agent stream ended without a terminal event")]
    Incomplete,
}

/// 文档库 / 记忆库协作方的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage query failed: {0}")]
    Query(String),
}
