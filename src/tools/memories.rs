//! 记忆类工具：检索记忆 / 最近记忆

use std::sync::Arc;

use async_trait::async_trait;

use crate::memory::MemoryStore;
use crate::tools::{
    RegistryError, ToolError, ToolHandler, ToolOutput, ToolParams, ToolRegistry, ToolResult,
    GET_RECENT_MEMORIES, SEARCH_MEMORIES,
};

/// search_memories(query, limit)
pub struct SearchMemoriesTool {
    store: Arc<dyn MemoryStore>,
}

#[async_trait]
impl ToolHandler for SearchMemoriesTool {
    async fn call(&self, params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError> {
        if user_id.trim().is_empty() {
            return Ok(ToolResult::identity_required().into());
        }
        let query = params.require_str("query")?;
        let limit = params.usize_or("limit", 5);

        let memories = self.store.search(user_id, query, limit).await?;
        if memories.is_empty() {
            return Ok(ToolResult::empty("No matching memories found").into());
        }
        let summary = format!("Found {} relevant memories", memories.len());
        let data = serde_json::to_value(&memories).map_err(|e| ToolError::Failed(e.to_string()))?;
        Ok(ToolResult::ok(data, summary).into())
    }
}

/// get_recent_memories(limit)：按时间顺序取最后 limit 条
pub struct RecentMemoriesTool {
    store: Arc<dyn MemoryStore>,
}

#[async_trait]
impl ToolHandler for RecentMemoriesTool {
    async fn call(&self, params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError> {
        if user_id.trim().is_empty() {
            return Ok(ToolResult::identity_required().into());
        }
        let limit = params.usize_or("limit", 10);

        let mut all = self.store.fetch_all(user_id).await?;
        let recent = all.split_off(all.len().saturating_sub(limit));
        if recent.is_empty() {
            return Ok(ToolResult::empty("No memories found").into());
        }
        let summary = format!("Retrieved {} recent memories", recent.len());
        let data = serde_json::to_value(&recent).map_err(|e| ToolError::Failed(e.to_string()))?;
        Ok(ToolResult::ok(data, summary).into())
    }
}

/// 注册全部记忆类工具
pub fn register_memory_tools(
    registry: &mut ToolRegistry,
    store: Arc<dyn MemoryStore>,
) -> Result<(), RegistryError> {
    registry.register(
        SEARCH_MEMORIES,
        "Search through past conversation memories. Use when user refers to previous discussions, asks 'remember when', or needs context from earlier conversations.",
        &[("query", "string"), ("limit", "integer")],
        Arc::new(SearchMemoriesTool { store: store.clone() }),
    )?;
    registry.register(
        GET_RECENT_MEMORIES,
        "Get the most recent conversation memories. Use when user asks about recent discussions or when context from recent conversations would be helpful.",
        &[("limit", "integer")],
        Arc::new(RecentMemoriesTool { store }),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMemoryStore;
    use serde_json::json;

    async fn registry() -> ToolRegistry {
        let store = InMemoryMemoryStore::default();
        for text in ["Planning a trip to Lisbon", "Prefers window seats", "Trip budget is 2000"] {
            store.add("u1", text).await;
        }
        let mut reg = ToolRegistry::new();
        register_memory_tools(&mut reg, Arc::new(store)).unwrap();
        reg
    }

    #[tokio::test]
    async fn test_search_memories() {
        let reg = registry().await;
        let result = reg
            .execute(SEARCH_MEMORIES, ToolParams::new().with("query", "my trip"), "u1")
            .await;
        assert!(result.success);
        assert_eq!(result.summary, "Found 2 relevant memories");
    }

    #[tokio::test]
    async fn test_recent_memories_takes_latest() {
        let reg = registry().await;
        let result = reg
            .execute(GET_RECENT_MEMORIES, ToolParams::new().with("limit", 2), "u1")
            .await;
        assert_eq!(result.summary, "Retrieved 2 recent memories");
        let data = result.data.unwrap();
        assert_eq!(data[0]["content"], json!("Prefers window seats"));
        assert_eq!(data[1]["content"], json!("Trip budget is 2000"));
    }

    #[tokio::test]
    async fn test_no_memories_for_other_user() {
        let reg = registry().await;
        let result = reg.execute(GET_RECENT_MEMORIES, ToolParams::new(), "u2").await;
        assert!(result.success);
        assert_eq!(result.summary, "No memories found");
        assert!(!result.has_content());
    }
}
