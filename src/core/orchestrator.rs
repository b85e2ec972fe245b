//! Agent 编排器：单次查询的流水线
//!
//! 文档清单 → 意图识别 → (澄清并结束) | (顺序执行工具 → 组装上下文 → 流式生成) → done。
//! 流水线在独立任务中运行，事件经有界通道推给调用方；每个外部调用处都可被取消。

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::{FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::core::context::{build_context, build_system_prompt};
use crate::core::stream::{event_channel, AgentEventStream, EventSink};
use crate::core::{AgentError, AgentEvent, PipelinePhase};
use crate::documents::DocumentStore;
use crate::intent::{DetectedIntent, IntentClassifier, FILENAME_ENTITY};
use crate::llm::LlmClient;
use crate::memory::{tail, Message};
use crate::tools::registry::panic_message;
use crate::tools::{
    ToolExecutor, ToolParams, ToolResult, GET_ALL_USER_DOCUMENTS, GET_DOCUMENT_BY_NAME,
    GET_RECENT_MEMORIES, LIST_DOCUMENTS, SEARCH_DOCUMENTS, SEARCH_MEMORIES,
};

const DEFAULT_CLARIFICATION: &str = "Could you clarify what you are referring to?";

/// 流水线参数（来自配置 [agent] / [tools] / [llm]）
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// 生成时附带的历史条数
    pub history_turns: usize,
    pub temperature: f32,
    pub event_buffer: usize,
    pub search_limit: usize,
    pub all_documents_max_chunks: usize,
    pub document_max_chunks: usize,
    pub memory_search_limit: usize,
    pub recent_memory_limit: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            history_turns: 10,
            temperature: 0.7,
            event_buffer: 64,
            search_limit: 10,
            all_documents_max_chunks: 50,
            document_max_chunks: 30,
            memory_search_limit: 5,
            recent_memory_limit: 10,
        }
    }
}

/// 单次查询的输入
struct QueryRequest {
    query: String,
    user_id: String,
    conversation_id: String,
    history: Vec<Message>,
}

/// 编排器：只持有注入的协作方句柄，可廉价克隆并在多个查询间共享
#[derive(Clone)]
pub struct AgentOrchestrator {
    documents: Arc<dyn DocumentStore>,
    executor: Arc<ToolExecutor>,
    classifier: Arc<IntentClassifier>,
    llm: Arc<dyn LlmClient>,
    settings: OrchestratorSettings,
}

/// 在取消令牌与外部调用之间竞争；取消优先
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, AgentError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        out = fut => Ok(out),
    }
}

fn advance(phase: &mut PipelinePhase, next: PipelinePhase) {
    debug_assert!(phase.can_advance_to(next), "{phase:?} -> {next:?}");
    tracing::debug!(from = phase.as_str(), to = next.as_str(), "pipeline phase");
    *phase = next;
}

impl AgentOrchestrator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        executor: Arc<ToolExecutor>,
        classifier: Arc<IntentClassifier>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            documents,
            executor,
            classifier,
            llm,
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 处理一条查询，立即返回事件流；流水线在后台任务中运行
    ///
    /// 必须在 tokio 运行时内调用。丢弃返回的流会在下一个挂起点停止流水线。
    pub fn process_query(
        &self,
        query: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        history: Vec<Message>,
    ) -> AgentEventStream {
        let (sink, stream) = event_channel(self.settings.event_buffer);
        let request = QueryRequest {
            query: query.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            history,
        };
        let this = self.clone();
        tokio::spawn(async move { this.run(request, sink).await });
        stream
    }

    async fn run(&self, request: QueryRequest, sink: EventSink) {
        let mut phase = PipelinePhase::Start;
        // 协作方 panic 与普通故障一样以 error 事件结束
        let outcome = AssertUnwindSafe(self.pipeline(&request, &sink, &mut phase))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(AgentError::Pipeline(panic_message(payload))));

        match outcome {
            Ok(()) => tracing::debug!(
                conversation_id = %request.conversation_id,
                phase = phase.as_str(),
                "pipeline finished"
            ),
            Err(AgentError::Cancelled) => tracing::info!(
                conversation_id = %request.conversation_id,
                phase = phase.as_str(),
                "event consumer gone, pipeline stopped"
            ),
            Err(e) => {
                tracing::error!(
                    conversation_id = %request.conversation_id,
                    phase = phase.as_str(),
                    error = %e,
                    "Agent error"
                );
                if phase.can_advance_to(PipelinePhase::Error) {
                    advance(&mut phase, PipelinePhase::Error);
                }
                let event = AgentEvent::Error {
                    content: format!("An error occurred: {e}"),
                };
                if sink.emit(event).await.is_err() {
                    tracing::debug!("error event dropped, consumer gone");
                }
            }
        }
    }

    /// 逐阶段推进 `phase`；返回 Err 时 `phase` 停在出错的阶段
    async fn pipeline(
        &self,
        req: &QueryRequest,
        sink: &EventSink,
        phase: &mut PipelinePhase,
    ) -> Result<(), AgentError> {
        let cancel = sink.cancellation();

        advance(phase, PipelinePhase::DocumentInventory);
        sink.emit(AgentEvent::thinking("Checking your available documents..."))
            .await?;
        let documents = match guarded(cancel, self.documents.list_names(&req.user_id)).await? {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get document list");
                Vec::new()
            }
        };

        advance(phase, PipelinePhase::IntentDetection);
        sink.emit(AgentEvent::thinking("Analyzing your request...")).await?;
        let intent = guarded(
            cancel,
            self.classifier.classify(&req.query, &req.history, &documents),
        )
        .await?;
        tracing::info!(
            intent = intent.category.as_str(),
            confidence = intent.confidence,
            "Detected intent"
        );
        sink.emit(AgentEvent::Intent {
            intent: intent.category,
            confidence: intent.confidence,
        })
        .await?;

        if intent.is_vague {
            advance(phase, PipelinePhase::Clarify);
            let options = intent
                .clarification_options
                .clone()
                .filter(|o| !o.is_empty())
                .unwrap_or(documents);
            let message = intent
                .clarification_message
                .clone()
                .unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string());
            sink.emit(AgentEvent::Clarification { message, options }).await?;
            return Ok(());
        }

        advance(phase, PipelinePhase::ToolRound);
        let mut results: Vec<ToolResult> = Vec::with_capacity(intent.tools_to_use.len());
        if !intent.tools_to_use.is_empty() {
            sink.emit(AgentEvent::thinking(format!(
                "Preparing to use {} tool(s)...",
                intent.tools_to_use.len()
            )))
            .await?;
        }
        for tool in &intent.tools_to_use {
            let params = self.build_tool_params(tool, &req.query, &intent);
            sink.emit(AgentEvent::ToolCall {
                tool: tool.clone(),
                params: params.redacted(),
            })
            .await?;

            let result = guarded(cancel, self.executor.execute(tool, params, &req.user_id)).await?;
            if !result.success {
                tracing::warn!(
                    tool = %tool,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Tool failed"
                );
            }
            sink.emit(AgentEvent::ToolResult {
                tool: tool.clone(),
                summary: result.summary.clone(),
            })
            .await?;
            results.push(result);
        }

        advance(phase, PipelinePhase::Generation);
        sink.emit(AgentEvent::thinking("Generating response...")).await?;
        let context = build_context(&results);
        let mut messages = Vec::with_capacity(self.settings.history_turns + 2);
        messages.push(Message::system(build_system_prompt(intent.category, &context)));
        messages.extend_from_slice(tail(&req.history, self.settings.history_turns));
        messages.push(Message::user(req.query.clone()));

        let mut tokens = guarded(
            cancel,
            self.llm.complete_stream(&messages, self.settings.temperature),
        )
        .await??;
        while let Some(token) = guarded(cancel, tokens.next()).await? {
            let content = token?;
            if !content.is_empty() {
                sink.emit(AgentEvent::Chunk { content }).await?;
            }
        }

        advance(phase, PipelinePhase::Done);
        sink.emit(AgentEvent::Done {
            conversation_id: req.conversation_id.clone(),
        })
        .await?;
        Ok(())
    }

    /// 按工具名构造参数；身份由注册表在分发时注入
    fn build_tool_params(&self, tool: &str, query: &str, intent: &DetectedIntent) -> ToolParams {
        let s = &self.settings;
        match tool {
            SEARCH_DOCUMENTS => ToolParams::new()
                .with("query", query)
                .with("limit", s.search_limit),
            GET_ALL_USER_DOCUMENTS => ToolParams::new().with("max_chunks", s.all_documents_max_chunks),
            GET_DOCUMENT_BY_NAME => {
                let filename = intent
                    .entity(FILENAME_ENTITY)
                    .map(String::from)
                    .or_else(|| self.classifier.extract_at_reference(query))
                    .unwrap_or_default();
                ToolParams::new()
                    .with("filename", filename)
                    .with("max_chunks", s.document_max_chunks)
            }
            LIST_DOCUMENTS => ToolParams::new(),
            SEARCH_MEMORIES => ToolParams::new()
                .with("query", query)
                .with("limit", s.memory_search_limit),
            GET_RECENT_MEMORIES => ToolParams::new().with("limit", s.recent_memory_limit),
            _ => ToolParams::new(),
        }
    }
}
