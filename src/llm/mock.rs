//! Mock LLM 客户端（无需 API）
//!
//! 默认回显最后一条 User 消息；测试中可预设非流式输出、流式片段与错误，并记录收到的请求。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, LlmError, TokenStream};
use crate::memory::{Message, Role};

/// 可编排的 Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    completion: Option<Result<String, LlmError>>,
    chunks: Option<Vec<String>>,
    stream_error: Option<LlmError>,
    complete_calls: AtomicUsize,
    stream_requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// complete 固定返回 text
    pub fn with_completion(mut self, text: impl Into<String>) -> Self {
        self.completion = Some(Ok(text.into()));
        self
    }

    /// complete 固定返回错误
    pub fn with_completion_error(mut self, err: LlmError) -> Self {
        self.completion = Some(Err(err));
        self
    }

    /// complete_stream 依次产出这些片段
    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = Some(chunks.into_iter().map(Into::into).collect());
        self
    }

    /// 片段产出完后再产出一个错误
    pub fn with_stream_error(mut self, err: LlmError) -> Self {
        self.stream_error = Some(err);
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// 最近一次流式请求的消息列表
    pub fn last_stream_request(&self) -> Option<Vec<Message>> {
        self.stream_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    fn echo(messages: &[Message]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        format!("Echo from Mock: {last_user}")
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message], _temperature: f32) -> Result<String, LlmError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        match &self.completion {
            Some(result) => result.clone(),
            None => Ok(Self::echo(messages)),
        }
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        _temperature: f32,
    ) -> Result<TokenStream, LlmError> {
        self.stream_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let chunks = self.chunks.clone().unwrap_or_else(|| {
            Self::echo(messages)
                .split_inclusive(' ')
                .map(String::from)
                .collect()
        });
        let mut items: Vec<Result<String, LlmError>> = chunks.into_iter().map(Ok).collect();
        if let Some(err) = &self.stream_error {
            items.push(Err(err.clone()));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_echo_stream_reassembles() {
        let llm = MockLlmClient::new();
        let messages = vec![Message::system("sys"), Message::user("hello there")];
        let parts: Vec<String> = llm
            .complete_stream(&messages, 0.7)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts.concat(), "Echo from Mock: hello there");
        assert_eq!(llm.last_stream_request().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_completion_counts_calls() {
        let llm = MockLlmClient::new().with_completion("INTENT: general_chat");
        assert_eq!(llm.complete(&[], 0.1).await.unwrap(), "INTENT: general_chat");
        assert_eq!(llm.complete_calls(), 1);
    }
}
