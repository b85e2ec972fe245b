//! 事件流：有界通道 + 取消令牌
//!
//! 流水线在独立任务中通过 EventSink 推送事件；调用方持有 AgentEventStream 逐条消费，
//! 或用 collect_reply 一次性收集。丢弃 AgentEventStream 即取消流水线。

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, AgentEvent};
use crate::intent::IntentCategory;
use crate::memory::Message;

/// 建立一对发送端 / 接收端
pub fn event_channel(buffer: usize) -> (EventSink, AgentEventStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let cancel = CancellationToken::new();
    (
        EventSink {
            tx,
            cancel: cancel.clone(),
        },
        AgentEventStream { rx, cancel },
    )
}

/// 流水线侧的发送端
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// 推送一条事件；消费方已断开时返回 Cancelled
    pub async fn emit(&self, event: AgentEvent) -> Result<(), AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| AgentError::Cancelled),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

/// 调用方侧的事件流（有限、不可重放）
pub struct AgentEventStream {
    rx: mpsc::Receiver<AgentEvent>,
    cancel: CancellationToken,
}

impl AgentEventStream {
    /// 主动取消：流水线在下一个挂起点停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for AgentEventStream {
    type Item = AgentEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for AgentEventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 缓冲模式的聚合结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub intent: Option<IntentCategory>,
    pub confidence: Option<f64>,
    /// (工具名, 摘要)，按调用顺序
    pub tool_summaries: Vec<(String, String)>,
    /// 拼接后的完整回复
    pub content: String,
    /// (澄清语, 选项)
    pub clarification: Option<(String, Vec<String>)>,
    /// 收到 done 时才有
    pub conversation_id: Option<String>,
}

impl AgentReply {
    /// 以 done 或 clarification 结束
    pub fn is_complete(&self) -> bool {
        self.conversation_id.is_some() || self.clarification.is_some()
    }

    pub fn needs_clarification(&self) -> bool {
        self.clarification.is_some()
    }

    /// 可写入会话历史的条目；未完成的回复不产生任何条目
    pub fn history_entries(&self, query: &str) -> Vec<Message> {
        if let Some((question, _)) = &self.clarification {
            return vec![Message::user(query), Message::assistant(question.clone())];
        }
        if self.conversation_id.is_some() {
            return vec![Message::user(query), Message::assistant(self.content.clone())];
        }
        Vec::new()
    }
}

/// 排空事件流并聚合；error 事件转为 Err，流在终止事件前结束视为 Incomplete
pub async fn collect_reply<S>(mut stream: S) -> Result<AgentReply, AgentError>
where
    S: Stream<Item = AgentEvent> + Unpin,
{
    let mut reply = AgentReply::default();
    while let Some(event) = stream.next().await {
        match event {
            AgentEvent::Thinking { .. } => {}
            AgentEvent::Intent { intent, confidence } => {
                reply.intent = Some(intent);
                reply.confidence = Some(confidence);
            }
            AgentEvent::ToolCall { .. } => {}
            AgentEvent::ToolResult { tool, summary } => reply.tool_summaries.push((tool, summary)),
            AgentEvent::Chunk { content } => reply.content.push_str(&content),
            AgentEvent::Clarification { message, options } => {
                reply.clarification = Some((message, options));
                return Ok(reply);
            }
            AgentEvent::Done { conversation_id } => {
                reply.conversation_id = Some(conversation_id);
                return Ok(reply);
            }
            AgentEvent::Error { content } => return Err(AgentError::Pipeline(content)),
        }
    }
    Err(AgentError::Incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_collect_answer() {
        let events = vec![
            AgentEvent::thinking("Analyzing your request..."),
            AgentEvent::Intent {
                intent: IntentCategory::GeneralChat,
                confidence: 0.5,
            },
            AgentEvent::Chunk { content: "Hel".into() },
            AgentEvent::Chunk { content: "lo".into() },
            AgentEvent::Done {
                conversation_id: "c1".into(),
            },
        ];
        let reply = collect_reply(stream::iter(events)).await.unwrap();
        assert_eq!(reply.content, "Hello");
        assert!(reply.is_complete());
        assert_eq!(
            reply.history_entries("hi"),
            vec![Message::user("hi"), Message::assistant("Hello")]
        );
    }

    #[tokio::test]
    async fn test_collect_clarification_and_error() {
        let clarify = vec![AgentEvent::Clarification {
            message: "Which one?".into(),
            options: vec!["a.pdf".into()],
        }];
        let reply = collect_reply(stream::iter(clarify)).await.unwrap();
        assert!(reply.needs_clarification());
        assert_eq!(
            reply.history_entries("summarize this"),
            vec![Message::user("summarize this"), Message::assistant("Which one?")]
        );

        let failed = vec![
            AgentEvent::Chunk { content: "partial".into() },
            AgentEvent::Error {
                content: "An error occurred: boom".into(),
            },
        ];
        let err = collect_reply(stream::iter(failed)).await.unwrap_err();
        assert_eq!(err.to_string(), "An error occurred: boom");
    }

    #[tokio::test]
    async fn test_truncated_stream_is_incomplete() {
        let events = vec![AgentEvent::Chunk { content: "partial".into() }];
        let err = collect_reply(stream::iter(events)).await.unwrap_err();
        assert!(matches!(err, AgentError::Incomplete));
        assert!(AgentReply::default().history_entries("q").is_empty());
    }

    #[tokio::test]
    async fn test_drop_cancels_sink() {
        let (sink, stream) = event_channel(4);
        sink.emit(AgentEvent::thinking("one")).await.unwrap();
        drop(stream);
        assert!(sink.is_cancelled());
        let err = sink.emit(AgentEvent::thinking("two")).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}
