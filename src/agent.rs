//! Headless Agent 运行时
//!
//! 供 REPL / HTTP 等前端调用：create_llm_from_config 选择 LLM 后端，
//! build_components 注册工具并装配编排器，process_message / process_message_stream
//! 分别提供缓冲与流式两种消费方式（共用同一条事件流水线）。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{collect_reply, AgentError, AgentEventStream, AgentOrchestrator, AgentReply};
use crate::documents::DocumentStore;
use crate::intent::IntentClassifier;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{Message, MemoryStore};
use crate::tools::{register_document_tools, register_memory_tools, ToolExecutor, ToolRegistry};

/// 生成用与意图识别用的 LLM；intent 为 None 时意图识别只走快速路径
#[derive(Clone)]
pub struct LlmBackends {
    pub generation: Arc<dyn LlmClient>,
    pub intent: Option<Arc<dyn LlmClient>>,
}

impl LlmBackends {
    /// 同一个客户端同时用于生成与意图识别
    pub fn shared(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            intent: Some(llm.clone()),
            generation: llm,
        }
    }

    pub fn generation_only(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            generation: llm,
            intent: None,
        }
    }
}

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
///
/// Mock 的回显无法当作意图识别回复解析，因此 Mock 只用于生成。
pub fn create_llm_from_config(cfg: &AppConfig) -> LlmBackends {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY").ok();

    match (provider.as_str(), api_key) {
        ("openai", Some(key)) => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            LlmBackends::shared(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                Some(&key),
            )))
        }
        ("mock", _) => {
            tracing::info!("Using Mock LLM");
            LlmBackends::generation_only(Arc::new(MockLlmClient::new()))
        }
        _ => {
            tracing::warn!("No API key set or provider unknown, using Mock LLM");
            LlmBackends::generation_only(Arc::new(MockLlmClient::new()))
        }
    }
}

/// 预构建的 Agent 组件，可在多个会话间共享
pub struct AgentComponents {
    pub orchestrator: AgentOrchestrator,
    pub registry: Arc<ToolRegistry>,
}

/// 注册全部工具并装配编排器；工具注册失败（重名 / 非法 schema）时返回错误
pub fn build_components(
    cfg: &AppConfig,
    documents: Arc<dyn DocumentStore>,
    memories: Arc<dyn MemoryStore>,
    llm: LlmBackends,
) -> Result<AgentComponents, AgentError> {
    let mut registry = ToolRegistry::new();
    register_document_tools(&mut registry, documents.clone())?;
    register_memory_tools(&mut registry, memories)?;
    let registry = Arc::new(registry);
    tracing::info!(tools = registry.len(), "tool registry loaded");

    let classifier = IntentClassifier::new(llm.intent, registry.tools_for_llm())
        .with_settings(cfg.classifier_settings());
    let executor = ToolExecutor::new(registry.clone(), cfg.tools.timeout_secs);

    let orchestrator = AgentOrchestrator::new(
        documents,
        Arc::new(executor),
        Arc::new(classifier),
        llm.generation,
    )
    .with_settings(cfg.orchestrator_settings());

    Ok(AgentComponents {
        orchestrator,
        registry,
    })
}

/// 处理单条用户消息（缓冲模式）：排空事件流并返回聚合结果
pub async fn process_message(
    components: &AgentComponents,
    query: &str,
    user_id: &str,
    conversation_id: &str,
    history: &[Message],
) -> Result<AgentReply, AgentError> {
    let stream = process_message_stream(components, query, user_id, conversation_id, history);
    collect_reply(stream).await
}

/// 流式处理单条用户消息：返回事件流，由调用方逐条转发
pub fn process_message_stream(
    components: &AgentComponents,
    query: &str,
    user_id: &str,
    conversation_id: &str,
    history: &[Message],
) -> AgentEventStream {
    components
        .orchestrator
        .process_query(query, user_id, conversation_id, history.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::InMemoryDocumentStore;
    use crate::intent::IntentCategory;
    use crate::memory::InMemoryMemoryStore;

    #[tokio::test]
    async fn test_components_register_all_tools() {
        let components = build_components(
            &AppConfig::default(),
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryMemoryStore::default()),
            LlmBackends::generation_only(Arc::new(MockLlmClient::new())),
        )
        .unwrap();
        assert_eq!(components.registry.len(), 6);
        assert!(components.registry.tools_for_llm().contains("- list_documents(): "));
    }

    #[tokio::test]
    async fn test_process_message_buffers_reply() {
        let components = build_components(
            &AppConfig::default(),
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryMemoryStore::default()),
            LlmBackends::generation_only(Arc::new(MockLlmClient::new())),
        )
        .unwrap();
        let reply = process_message(&components, "hello there", "u1", "c1", &[])
            .await
            .unwrap();
        assert_eq!(reply.intent, Some(IntentCategory::GeneralChat));
        assert_eq!(reply.content, "Echo from Mock: hello there");
        assert_eq!(reply.conversation_id.as_deref(), Some("c1"));
    }
}
