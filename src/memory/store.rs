//! 记忆库协作方
//!
//! MemoryStore 是编排核心消费的抽象接口：按用户检索记忆、按时间顺序取全部记忆。
//! InMemoryMemoryStore 为参考实现：关键词重叠打分（无真实向量），按用户隔离。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::core::StoreError;

/// 一条记忆：内容 + 元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// 记忆库接口
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 按相关性检索，最多 limit 条
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, StoreError>;

    /// 该用户全部记忆，按时间从旧到新
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<MemoryItem>, StoreError>;
}

struct Entry {
    text: String,
    tokens: HashSet<String>,
    created_at: DateTime<Utc>,
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
pub(crate) fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// 内存实现：每个用户一份按写入顺序排列的记忆，超出 max_entries 时丢弃最旧的
pub struct InMemoryMemoryStore {
    entries: RwLock<HashMap<String, Vec<Entry>>>,
    max_entries: usize,
}

impl InMemoryMemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    pub async fn add(&self, user_id: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut entries = self.entries.write().await;
        let list = entries.entry(user_id.to_string()).or_default();
        list.push(Entry {
            text: text.to_string(),
            tokens: tokenize_lower(text),
            created_at: Utc::now(),
        });
        let n = list.len();
        if n > self.max_entries {
            list.drain(0..n - self.max_entries);
        }
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn to_item(entry: &Entry) -> MemoryItem {
    let mut metadata = Map::new();
    metadata.insert(
        "created_at".to_string(),
        Value::String(entry.created_at.to_rfc3339()),
    );
    MemoryItem {
        content: entry.text.clone(),
        metadata,
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, StoreError> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().await;
        let Some(list) = entries.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<(usize, &Entry)> = list
            .iter()
            .map(|e| (query_tokens.intersection(&e.tokens).count(), e))
            .filter(|(s, _)| *s > 0)
            .collect();
        // 同分时新记忆优先
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.created_at.cmp(&a.1.created_at)));
        Ok(scored.into_iter().take(limit).map(|(_, e)| to_item(e)).collect())
    }

    async fn fetch_all(&self, user_id: &str) -> Result<Vec<MemoryItem>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(user_id)
            .map(|list| list.iter().map(to_item).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_is_scoped_per_user() {
        let store = InMemoryMemoryStore::default();
        store.add("alice", "Trip to Kyoto in April").await;
        store.add("bob", "Kyoto ramen recommendations").await;

        let hits = store.search("alice", "kyoto trip", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Trip to Kyoto in April");
    }

    #[tokio::test]
    async fn test_fetch_all_is_chronological_and_bounded() {
        let store = InMemoryMemoryStore::new(2);
        store.add("u", "first").await;
        store.add("u", "second").await;
        store.add("u", "third").await;

        let all = store.fetch_all("u").await.unwrap();
        let texts: Vec<_> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["second", "third"]);
        assert!(all[0].metadata.contains_key("created_at"));
    }

    #[test]
    fn test_tokenize_drops_punctuation_and_short_words() {
        let tokens = tokenize_lower("What's my trip, a plan?");
        assert!(tokens.contains("trip"));
        assert!(tokens.contains("plan"));
        assert!(!tokens.contains("a"));
    }
}
