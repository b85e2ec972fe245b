//! Aware - 文档与记忆增强的对话 Agent 核心
//!
//! 模块划分：
//! - **agent**: 组件装配与缓冲 / 流式两种入口
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 事件协议、流水线编排、上下文组装、事件流
//! - **documents**: 文档库接口与内存实现
//! - **intent**: 意图识别（关键词快速路径 + LLM 慢速路径）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话历史与记忆库接口
//! - **tools**: 工具注册表、执行器与文档 / 记忆工具

pub mod agent;
pub mod config;
pub mod core;
pub mod documents;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;

pub use agent::{build_components, process_message, process_message_stream, AgentComponents};
pub use crate::core::{AgentError, AgentEvent, AgentOrchestrator};
