//! 文档类工具：检索 / 全量 / 按名取 / 列表
//!
//! 每个执行器都是薄适配层：校验身份 → 调用 DocumentStore → 整形为 ToolResult 并生成摘要。
//! 文档库故障经 `?` 转为 ToolError，由注册表记录日志并归一为失败结果。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::documents::{DocumentChunk, DocumentStore};
use crate::tools::{
    ToolError, ToolHandler, ToolOutput, ToolParams, ToolRegistry, ToolResult, RegistryError,
    GET_ALL_USER_DOCUMENTS, GET_DOCUMENT_BY_NAME, LIST_DOCUMENTS, SEARCH_DOCUMENTS,
};

/// 文件名未知时的分组键
const UNKNOWN_FILENAME: &str = "unknown";

/// 按文件合并后的文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub filename: String,
    pub content: String,
    pub chunk_count: usize,
}

/// 前 cap 个名字，逗号连接；超出部分以 (+N more) 标注
pub(crate) fn name_list(names: &[String], cap: usize) -> String {
    let shown = names.iter().take(cap).cloned().collect::<Vec<_>>().join(", ");
    if names.len() > cap {
        format!("{shown} (+{} more)", names.len() - cap)
    } else {
        shown
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// 按文件名分组，保持首次出现顺序
fn group_by_filename(chunks: &[DocumentChunk]) -> Vec<DocumentGroup> {
    let mut groups: Vec<(String, Vec<&str>)> = Vec::new();
    for chunk in chunks {
        let name = chunk.filename().unwrap_or(UNKNOWN_FILENAME);
        match groups.iter_mut().find(|(n, _)| n == name) {
            Some((_, parts)) => parts.push(&chunk.content),
            None => groups.push((name.to_string(), vec![&chunk.content])),
        }
    }
    groups
        .into_iter()
        .map(|(filename, parts)| DocumentGroup {
            filename,
            chunk_count: parts.len(),
            content: parts.join("\n\n"),
        })
        .collect()
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Failed(e.to_string()))
}

/// search_documents(query, limit)：语义检索
pub struct SearchDocumentsTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for SearchDocumentsTool {
    async fn call(&self, params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError> {
        if user_id.trim().is_empty() {
            return Ok(ToolResult::identity_required().into());
        }
        let query = params.require_str("query")?;
        let limit = params.usize_or("limit", 10);

        let hits = self.store.search(query, user_id, limit).await?;
        if hits.is_empty() {
            return Ok(ToolResult::empty("No matching documents found").into());
        }

        let mut filenames: Vec<String> = Vec::new();
        for hit in &hits {
            if let Some(name) = hit.filename() {
                push_unique(&mut filenames, name);
            }
        }
        let mut summary = format!(
            "Found {} relevant chunks from {} document(s)",
            hits.len(),
            filenames.len()
        );
        if !filenames.is_empty() {
            summary.push_str(&format!(": {}", name_list(&filenames, 3)));
        }
        Ok(ToolResult::ok(to_value(&hits)?, summary).into())
    }
}

/// get_all_user_documents(max_chunks)：取全部文档（按文件分组）
pub struct AllDocumentsTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for AllDocumentsTool {
    async fn call(&self, params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError> {
        if user_id.trim().is_empty() {
            return Ok(ToolResult::identity_required().into());
        }
        let max_chunks = params.usize_or("max_chunks", 50);

        let chunks = self.store.fetch_all(user_id, max_chunks).await?;
        let groups = group_by_filename(&chunks);
        let names: Vec<String> = groups.iter().map(|g| g.filename.clone()).collect();

        let mut summary = format!(
            "Retrieved {} chunks from {} document(s)",
            chunks.len(),
            groups.len()
        );
        if !names.is_empty() {
            summary.push_str(&format!(": {}", name_list(&names, 5)));
        }
        Ok(ToolResult::ok(to_value(&groups)?, summary).into())
    }
}

/// get_document_by_name(filename, max_chunks)：取指定文档
pub struct DocumentByNameTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for DocumentByNameTool {
    async fn call(&self, params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError> {
        if user_id.trim().is_empty() {
            return Ok(ToolResult::identity_required().into());
        }
        let filename = params.get_str("filename").unwrap_or_default().trim();
        let max_chunks = params.usize_or("max_chunks", 30);
        if filename.is_empty() {
            return Ok(ToolResult::empty("No document name given").into());
        }

        let chunks = self.store.fetch_by_name(user_id, filename, max_chunks).await?;
        if chunks.is_empty() {
            return Ok(ToolResult::empty(format!("Document '{filename}' not found")).into());
        }

        let group = DocumentGroup {
            filename: filename.to_string(),
            content: chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            chunk_count: chunks.len(),
        };
        let summary = format!("Retrieved {} chunks from '{}'", group.chunk_count, filename);
        Ok(ToolResult::ok(to_value(&group)?, summary).into())
    }
}

/// list_documents()：列出已上传文件名
pub struct ListDocumentsTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for ListDocumentsTool {
    async fn call(&self, _params: &ToolParams, user_id: &str) -> Result<ToolOutput, ToolError> {
        if user_id.trim().is_empty() {
            return Ok(ToolResult::identity_required().into());
        }
        let names = self.store.list_names(user_id).await?;
        if names.is_empty() {
            return Ok(ToolResult::empty("No documents uploaded").into());
        }
        let summary = format!("Found {} document(s): {}", names.len(), name_list(&names, 5));
        Ok(ToolResult::ok(to_value(&names)?, summary).into())
    }
}

/// 注册全部文档类工具
pub fn register_document_tools(
    registry: &mut ToolRegistry,
    store: Arc<dyn DocumentStore>,
) -> Result<(), RegistryError> {
    registry.register(
        SEARCH_DOCUMENTS,
        "Search uploaded documents using semantic similarity. Use when user asks to find specific information in their documents.",
        &[("query", "string"), ("limit", "integer")],
        Arc::new(SearchDocumentsTool { store: store.clone() }),
    )?;
    registry.register(
        GET_ALL_USER_DOCUMENTS,
        "Retrieve ALL content from user's uploaded documents. Use when user asks to summarize, review, or discuss all their documents without a specific search query.",
        &[("max_chunks", "integer")],
        Arc::new(AllDocumentsTool { store: store.clone() }),
    )?;
    registry.register(
        GET_DOCUMENT_BY_NAME,
        "Retrieve content from a specific document by filename. Use when user mentions a specific document name or uses @filename syntax.",
        &[("filename", "string"), ("max_chunks", "integer")],
        Arc::new(DocumentByNameTool { store: store.clone() }),
    )?;
    registry.register(
        LIST_DOCUMENTS,
        "List all document names the user has uploaded. Use to show available documents or when user asks what files they have.",
        &[],
        Arc::new(ListDocumentsTool { store }),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreError;
    use crate::documents::{InMemoryDocumentStore, ScoredChunk};
    use serde_json::json;

    async fn registry() -> ToolRegistry {
        let store = InMemoryDocumentStore::new();
        store
            .add_document("u1", "report.pdf", ["Revenue grew 12%", "Margins improved"])
            .await;
        store.add_document("u1", "notes.txt", ["Revenue plan"]).await;
        let mut reg = ToolRegistry::new();
        register_document_tools(&mut reg, Arc::new(store)).unwrap();
        reg
    }

    #[tokio::test]
    async fn test_search_summary_names_documents() {
        let reg = registry().await;
        let params = ToolParams::new().with("query", "revenue").with("limit", 10);
        let result = reg.execute(SEARCH_DOCUMENTS, params, "u1").await;
        assert!(result.success);
        assert_eq!(
            result.summary,
            "Found 2 relevant chunks from 2 document(s): report.pdf, notes.txt"
        );
    }

    #[tokio::test]
    async fn test_missing_identity_fails_fast() {
        let reg = registry().await;
        let params = ToolParams::new().with("query", "revenue");
        let result = reg.execute(SEARCH_DOCUMENTS, params, "").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("User ID required"));
    }

    #[tokio::test]
    async fn test_all_documents_grouped_in_upload_order() {
        let reg = registry().await;
        let result = reg
            .execute(GET_ALL_USER_DOCUMENTS, ToolParams::new().with("max_chunks", 50), "u1")
            .await;
        assert_eq!(
            result.summary,
            "Retrieved 3 chunks from 2 document(s): report.pdf, notes.txt"
        );
        let data = result.data.unwrap();
        assert_eq!(data[0]["filename"], json!("report.pdf"));
        assert_eq!(data[0]["chunk_count"], json!(2));
        assert_eq!(data[0]["content"], json!("Revenue grew 12%\n\nMargins improved"));
    }

    #[tokio::test]
    async fn test_document_by_name_found_and_missing() {
        let reg = registry().await;
        let found = reg
            .execute(
                GET_DOCUMENT_BY_NAME,
                ToolParams::new().with("filename", "notes.txt"),
                "u1",
            )
            .await;
        assert_eq!(found.summary, "Retrieved 1 chunks from 'notes.txt'");
        assert_eq!(found.data.unwrap()["filename"], json!("notes.txt"));

        let missing = reg
            .execute(
                GET_DOCUMENT_BY_NAME,
                ToolParams::new().with("filename", "ghost.pdf"),
                "u1",
            )
            .await;
        assert!(missing.success);
        assert!(!missing.has_content());
        assert_eq!(missing.summary, "Document 'ghost.pdf' not found");
    }

    #[tokio::test]
    async fn test_list_documents() {
        let reg = registry().await;
        let result = reg.execute(LIST_DOCUMENTS, ToolParams::new(), "u1").await;
        assert_eq!(result.summary, "Found 2 document(s): report.pdf, notes.txt");
        assert_eq!(result.data, Some(json!(["report.pdf", "notes.txt"])));
    }

    struct BrokenStore;

    #[async_trait]
    impl DocumentStore for BrokenStore {
        async fn search(&self, _: &str, _: &str, _: usize) -> Result<Vec<ScoredChunk>, StoreError> {
            Err(StoreError::Unavailable("index offline".to_string()))
        }
        async fn fetch_all(&self, _: &str, _: usize) -> Result<Vec<DocumentChunk>, StoreError> {
            Err(StoreError::Unavailable("index offline".to_string()))
        }
        async fn fetch_by_name(
            &self,
            _: &str,
            _: &str,
            _: usize,
        ) -> Result<Vec<DocumentChunk>, StoreError> {
            Err(StoreError::Unavailable("index offline".to_string()))
        }
        async fn list_names(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("index offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_fault_surfaces_as_failed_result() {
        let mut reg = ToolRegistry::new();
        register_document_tools(&mut reg, Arc::new(BrokenStore)).unwrap();
        let result = reg.execute(LIST_DOCUMENTS, ToolParams::new(), "u1").await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("storage backend unavailable: index offline")
        );
    }

    #[test]
    fn test_name_list_caps() {
        let names: Vec<String> = (1..=7).map(|i| format!("d{i}")).collect();
        assert_eq!(name_list(&names, 5), "d1, d2, d3, d4, d5 (+2 more)");
        assert_eq!(name_list(&names[..2], 5), "d1, d2");
    }
}
