//! 文档库协作方
//!
//! DocumentStore 是编排核心消费的检索接口（向量检索实现在外部，这里只约定接口）。
//! InMemoryDocumentStore 为参考实现：已分块的文本按用户隔离，关键词重叠打分。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::core::StoreError;
use crate::memory::store::tokenize_lower;

/// 元数据中记录来源文件名的键
pub const FILENAME_KEY: &str = "filename";

/// 文档块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DocumentChunk {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(FILENAME_KEY.to_string(), Value::String(filename.into()));
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata.get(FILENAME_KEY).and_then(Value::as_str)
    }
}

/// 带相关度的检索命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub relevance: f64,
}

impl ScoredChunk {
    pub fn filename(&self) -> Option<&str> {
        self.metadata.get(FILENAME_KEY).and_then(Value::as_str)
    }
}

/// 文档库接口
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 语义检索，按相关度降序
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    /// 该用户全部文档块，最多 max_items 条
    async fn fetch_all(
        &self,
        user_id: &str,
        max_items: usize,
    ) -> Result<Vec<DocumentChunk>, StoreError>;

    /// 指定文件名的全部块；文件不存在时返回空
    async fn fetch_by_name(
        &self,
        user_id: &str,
        name: &str,
        max_items: usize,
    ) -> Result<Vec<DocumentChunk>, StoreError>;

    /// 该用户已上传的文件名（按首次上传顺序，去重）
    async fn list_names(&self, user_id: &str) -> Result<Vec<String>, StoreError>;
}

struct StoredChunk {
    chunk: DocumentChunk,
    tokens: HashSet<String>,
}

/// 内存实现
#[derive(Default)]
pub struct InMemoryDocumentStore {
    chunks: RwLock<HashMap<String, Vec<StoredChunk>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_chunk(&self, user_id: &str, chunk: DocumentChunk) {
        let tokens = tokenize_lower(&chunk.content);
        self.chunks
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(StoredChunk { chunk, tokens });
    }

    /// 以文件名写入多块内容
    pub async fn add_document<I, S>(&self, user_id: &str, filename: &str, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for content in chunks {
            self.add_chunk(user_id, DocumentChunk::new(filename, content))
                .await;
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let chunks = self.chunks.read().await;
        let Some(list) = chunks.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<(usize, &StoredChunk)> = list
            .iter()
            .map(|c| (query_tokens.intersection(&c.tokens).count(), c))
            .filter(|(s, _)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let total = query_tokens.len() as f64;
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(s, c)| ScoredChunk {
                content: c.chunk.content.clone(),
                metadata: c.chunk.metadata.clone(),
                relevance: s as f64 / total,
            })
            .collect())
    }

    async fn fetch_all(
        &self,
        user_id: &str,
        max_items: usize,
    ) -> Result<Vec<DocumentChunk>, StoreError> {
        let chunks = self.chunks.read().await;
        Ok(chunks
            .get(user_id)
            .map(|list| {
                list.iter()
                    .take(max_items)
                    .map(|c| c.chunk.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_by_name(
        &self,
        user_id: &str,
        name: &str,
        max_items: usize,
    ) -> Result<Vec<DocumentChunk>, StoreError> {
        let chunks = self.chunks.read().await;
        Ok(chunks
            .get(user_id)
            .map(|list| {
                list.iter()
                    .filter(|c| c.chunk.filename() == Some(name))
                    .take(max_items)
                    .map(|c| c.chunk.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_names(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let chunks = self.chunks.read().await;
        let mut names: Vec<String> = Vec::new();
        if let Some(list) = chunks.get(user_id) {
            for c in list {
                if let Some(name) = c.chunk.filename() {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Ok(names)
    }
}
