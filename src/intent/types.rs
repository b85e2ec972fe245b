//! 意图类型
//!
//! IntentCategory 是封闭枚举；DetectedIntent 每次查询构造一次，之后不再修改。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{
    GET_ALL_USER_DOCUMENTS, GET_DOCUMENT_BY_NAME, GET_RECENT_MEMORIES, LIST_DOCUMENTS,
    SEARCH_DOCUMENTS, SEARCH_MEMORIES,
};

/// 意图类别（声明顺序即关键词打分同分时的优先顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    DocumentSummary,
    DocumentSearch,
    DocumentSpecific,
    DocumentList,
    MemoryRecall,
    GeneralChat,
    VagueQuery,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 7] = [
        IntentCategory::DocumentSummary,
        IntentCategory::DocumentSearch,
        IntentCategory::DocumentSpecific,
        IntentCategory::DocumentList,
        IntentCategory::MemoryRecall,
        IntentCategory::GeneralChat,
        IntentCategory::VagueQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::DocumentSummary => "document_summary",
            IntentCategory::DocumentSearch => "document_search",
            IntentCategory::DocumentSpecific => "document_specific",
            IntentCategory::DocumentList => "document_list",
            IntentCategory::MemoryRecall => "memory_recall",
            IntentCategory::GeneralChat => "general_chat",
            IntentCategory::VagueQuery => "vague_query",
        }
    }

    /// 模糊指代只对这些类别生效
    pub fn is_document_oriented(&self) -> bool {
        matches!(
            self,
            IntentCategory::DocumentSummary
                | IntentCategory::DocumentSearch
                | IntentCategory::DocumentSpecific
        )
    }

    /// 类别 -> 所需工具（静态表）
    pub fn default_tools(&self) -> Vec<String> {
        let names: &[&str] = match self {
            IntentCategory::DocumentSummary => &[GET_ALL_USER_DOCUMENTS],
            IntentCategory::DocumentSearch => &[SEARCH_DOCUMENTS],
            IntentCategory::DocumentSpecific => &[GET_DOCUMENT_BY_NAME],
            IntentCategory::DocumentList => &[LIST_DOCUMENTS],
            IntentCategory::MemoryRecall => &[SEARCH_MEMORIES, GET_RECENT_MEMORIES],
            IntentCategory::GeneralChat | IntentCategory::VagueQuery => &[],
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentCategory {
    type Err = String;

    /// 宽松解析：大小写与空格不敏感（"Document Search" -> document_search）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        IntentCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| s.to_string())
    }
}

/// 意图识别结果
///
/// 不变量：`is_vague` 为真时 `tools_to_use` 为空且 `clarification_message` 存在。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIntent {
    pub category: IntentCategory,
    pub confidence: f64,
    pub tools_to_use: Vec<String>,
    pub is_vague: bool,
    pub clarification_message: Option<String>,
    pub clarification_options: Option<Vec<String>>,
    pub extracted_entities: BTreeMap<String, String>,
}

impl DetectedIntent {
    /// 非模糊意图；工具取类别默认表
    pub fn new(category: IntentCategory, confidence: f64) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            tools_to_use: category.default_tools(),
            is_vague: false,
            clarification_message: None,
            clarification_options: None,
            extracted_entities: BTreeMap::new(),
        }
    }

    /// 需要澄清的模糊意图
    pub fn vague(
        confidence: f64,
        message: impl Into<String>,
        options: Option<Vec<String>>,
    ) -> Self {
        Self {
            category: IntentCategory::VagueQuery,
            confidence: confidence.clamp(0.0, 1.0),
            tools_to_use: Vec::new(),
            is_vague: true,
            clarification_message: Some(message.into()),
            clarification_options: options,
            extracted_entities: BTreeMap::new(),
        }
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extracted_entities.insert(key.into(), value.into());
        self
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.extracted_entities.get(key).map(String::as_str)
    }
}
