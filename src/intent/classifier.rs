//! 意图识别器（两级）
//!
//! 快速路径 classify_fast：确定性、同步、无外部调用（@ 引用 → 文档名命中 → 关键词打分 → 模糊指代覆盖）。
//! 慢速路径 classify：快速结果不够确定或判为模糊时才调用 LLM；LLM 失败或超时一律退回快速结果。

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::intent::llm::{build_prompt, parse_response};
use crate::intent::{DetectedIntent, IntentCategory};
use crate::llm::LlmClient;
use crate::memory::{tail, Message};

/// 实体键：文档名
pub const FILENAME_ENTITY: &str = "filename";

/// 各类别的关键词触发表（顺序即同分优先级）
const INTENT_KEYWORDS: &[(IntentCategory, &[&str])] = &[
    (
        IntentCategory::DocumentSummary,
        &[
            "summarize", "summary", "key points", "main points", "overview",
            "what does it say", "tell me about", "explain the paper",
            "highlights", "tldr", "brief", "recap",
        ],
    ),
    (
        IntentCategory::DocumentSearch,
        &[
            "find", "search", "look for", "where does it say", "locate",
            "which part", "mentions", "refers to", "contains",
        ],
    ),
    (
        IntentCategory::DocumentSpecific,
        &[
            "@", ".pdf", ".docx", ".txt", "the document", "the file",
            "that paper", "this paper", "uploaded file", "my document",
        ],
    ),
    (
        IntentCategory::DocumentList,
        &[
            "what documents", "list files", "my uploads", "what did i upload",
            "show documents", "available files", "uploaded documents",
        ],
    ),
    (
        IntentCategory::MemoryRecall,
        &[
            "remember", "recall", "we discussed", "earlier", "last time",
            "previously", "you said", "i told you", "our conversation",
        ],
    ),
];

/// 模糊模式的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VagueKind {
    /// 指代词后没有紧跟文件名（"this" / "the paper" ...）
    DocumentReference,
    /// 只有动词没有对象（"summarize"）
    EmptyRequest,
    /// 填充词（"something" / "stuff"）
    Filler,
}

struct VaguePattern {
    kind: VagueKind,
    regex: Regex,
    message: &'static str,
}

/// 慢速路径参数
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    /// 快速结果置信度高于该值且非模糊时不调用 LLM
    pub llm_confidence_threshold: f64,
    /// 放入 prompt 的历史条数
    pub history_turns: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            llm_confidence_threshold: 0.85,
            history_turns: 3,
            temperature: 0.1,
            timeout: Duration::from_secs(20),
        }
    }
}

pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmClient>>,
    tool_catalog: String,
    settings: ClassifierSettings,
    at_marker: Regex,
    filename_after: Regex,
    vague_patterns: Vec<VaguePattern>,
}

impl IntentClassifier {
    /// llm 为 None 时只用快速路径
    pub fn new(llm: Option<Arc<dyn LlmClient>>, tool_catalog: impl Into<String>) -> Self {
        let compile = |p: &str| Regex::new(p).expect("static intent pattern must compile");
        Self {
            llm,
            tool_catalog: tool_catalog.into(),
            settings: ClassifierSettings::default(),
            at_marker: compile(r"@(\S+)"),
            filename_after: compile(r"^\s+\w+\.(pdf|docx|txt)"),
            vague_patterns: vec![
                VaguePattern {
                    kind: VagueKind::DocumentReference,
                    regex: compile(
                        r"\b(this document|this paper|the document|the paper|the file|uploaded file|my file|this|that|it)\b",
                    ),
                    message: "Which document are you referring to?",
                },
                VaguePattern {
                    kind: VagueKind::EmptyRequest,
                    regex: compile(r"^(summarize|explain|tell me about)\s*$"),
                    message: "What would you like me to summarize?",
                },
                VaguePattern {
                    kind: VagueKind::Filler,
                    regex: compile(r"\b(something|stuff|things)\b"),
                    message: "Could you be more specific about what you're looking for?",
                },
            ],
        }
    }

    pub fn with_settings(mut self, settings: ClassifierSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 从原始查询中提取 @name 引用
    pub fn extract_at_reference(&self, query: &str) -> Option<String> {
        self.at_marker
            .captures(query)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// 快速路径
    pub fn classify_fast(&self, query: &str, available_documents: &[String]) -> DetectedIntent {
        let query_lower = query.trim().to_lowercase();

        if let Some(filename) = self.extract_at_reference(query) {
            return DetectedIntent::new(IntentCategory::DocumentSpecific, 0.95)
                .with_entity(FILENAME_ENTITY, filename);
        }

        if let Some(doc) = available_documents
            .iter()
            .find(|d| !d.trim().is_empty() && query_lower.contains(&d.to_lowercase()))
        {
            return DetectedIntent::new(IntentCategory::DocumentSpecific, 0.9)
                .with_entity(FILENAME_ENTITY, doc.clone());
        }

        let (category, confidence) = score_keywords(&query_lower);

        if category.is_document_oriented() {
            if let Some(message) = self.check_vagueness(&query_lower, available_documents) {
                let options = (!available_documents.is_empty()).then(|| available_documents.to_vec());
                return DetectedIntent::vague(0.8, message, options);
            }
        }

        DetectedIntent::new(category, confidence)
    }

    /// 命中任一模糊模式时返回澄清语；有多个文档时改为列出全部文档名
    fn check_vagueness(&self, query_lower: &str, available_documents: &[String]) -> Option<String> {
        let pattern = self
            .vague_patterns
            .iter()
            .find(|p| self.pattern_matches(p, query_lower))?;
        tracing::debug!(kind = ?pattern.kind, "vague query pattern matched");

        if available_documents.len() > 1 {
            return Some(format!(
                "You have {} documents: {}. Which one would you like me to use?",
                available_documents.len(),
                available_documents.join(", ")
            ));
        }
        Some(pattern.message.to_string())
    }

    fn pattern_matches(&self, pattern: &VaguePattern, query_lower: &str) -> bool {
        match pattern.kind {
            // 指代词紧跟文件名（"this report.pdf"）不算模糊
            VagueKind::DocumentReference => pattern
                .regex
                .find_iter(query_lower)
                .any(|m| !self.filename_after.is_match(&query_lower[m.end()..])),
            VagueKind::EmptyRequest | VagueKind::Filler => pattern.regex.is_match(query_lower),
        }
    }

    /// 完整识别：先走快速路径，必要时由 LLM 复核；从不返回错误
    pub async fn classify(
        &self,
        query: &str,
        history: &[Message],
        available_documents: &[String],
    ) -> DetectedIntent {
        let fast = self.classify_fast(query, available_documents);
        if fast.confidence > self.settings.llm_confidence_threshold && !fast.is_vague {
            return fast;
        }
        let Some(llm) = &self.llm else {
            return fast;
        };

        let prompt = build_prompt(
            query,
            available_documents,
            &self.tool_catalog,
            tail(history, self.settings.history_turns),
        );
        let messages = [Message::user(prompt)];
        let call = llm.complete(&messages, self.settings.temperature);

        match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(Ok(response)) => parse_response(&response, available_documents),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "LLM intent detection failed, using fast detection");
                fast
            }
            Err(_) => {
                tracing::warn!("LLM intent detection timed out, using fast detection");
                fast
            }
        }
    }
}

/// 关键词打分：取最高分类别（同分按声明顺序），无命中时为 general_chat / 0.5
fn score_keywords(query_lower: &str) -> (IntentCategory, f64) {
    let mut best: Option<(IntentCategory, usize, usize)> = None;
    for (category, keywords) in INTENT_KEYWORDS {
        let score = keywords.iter().filter(|k| query_lower.contains(*k)).count();
        if score > 0 && best.map_or(true, |(_, s, _)| score > s) {
            best = Some((*category, score, keywords.len()));
        }
    }
    match best {
        Some((category, score, total)) => {
            (category, (score as f64 / total as f64 + 0.3).min(0.95))
        }
        None => (IntentCategory::GeneralChat, 0.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    fn docs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fast_only() -> IntentClassifier {
        IntentClassifier::new(None, "")
    }

    #[test]
    fn test_at_marker_wins_over_keywords() {
        let c = fast_only();
        let intent = c.classify_fast(
            "@quarterly_report.pdf what was the revenue?",
            &docs(&["quarterly_report.pdf", "notes.txt"]),
        );
        assert_eq!(intent.category, IntentCategory::DocumentSpecific);
        assert_eq!(intent.confidence, 0.95);
        assert_eq!(intent.entity(FILENAME_ENTITY), Some("quarterly_report.pdf"));
        assert_eq!(intent.tools_to_use, vec!["get_document_by_name"]);

        let noisy = c.classify_fast("summarize and search @x.txt, remember stuff", &[]);
        assert_eq!(noisy.category, IntentCategory::DocumentSpecific);
        assert_eq!(noisy.entity(FILENAME_ENTITY), Some("x.txt,"));
    }

    #[test]
    fn test_document_name_in_text() {
        let intent = fast_only().classify_fast(
            "What are the risks in Notes.TXT?",
            &docs(&["report.pdf", "notes.txt"]),
        );
        assert_eq!(intent.category, IntentCategory::DocumentSpecific);
        assert_eq!(intent.confidence, 0.9);
        assert_eq!(intent.entity(FILENAME_ENTITY), Some("notes.txt"));
    }

    #[test]
    fn test_keyword_scoring_and_confidence() {
        let c = fast_only();
        let intent = c.classify_fast("what do you remember about my trip?", &[]);
        assert_eq!(intent.category, IntentCategory::MemoryRecall);
        assert!((intent.confidence - (1.0 / 9.0 + 0.3)).abs() < 1e-9);
        assert_eq!(intent.tools_to_use, vec!["search_memories", "get_recent_memories"]);

        let chat = c.classify_fast("hello there", &[]);
        assert_eq!(chat.category, IntentCategory::GeneralChat);
        assert_eq!(chat.confidence, 0.5);
        assert!(chat.tools_to_use.is_empty());
    }

    #[test]
    fn test_bare_at_sign_scores_as_document_trigger() {
        // 没有紧跟名字的 @ 不是引用，只按关键词计分（10 个触发词中命中 1 个）
        let intent = fast_only().classify_fast("meet @ noon", &[]);
        assert_eq!(intent.category, IntentCategory::DocumentSpecific);
        assert!((intent.confidence - 0.4).abs() < 1e-9);
        assert!(intent.entity(FILENAME_ENTITY).is_none());
    }

    #[test]
    fn test_tie_breaks_by_declaration_order() {
        // summary 与 search 各命中 1 个
        let intent = fast_only().classify_fast("give me an overview and search results", &[]);
        assert_eq!(intent.category, IntentCategory::DocumentSummary);
    }

    #[test]
    fn test_vague_summarize_lists_documents() {
        let intent = fast_only().classify_fast("summarize this", &docs(&["a.pdf", "b.pdf"]));
        assert_eq!(intent.category, IntentCategory::VagueQuery);
        assert!(intent.is_vague);
        assert!(intent.tools_to_use.is_empty());
        let message = intent.clarification_message.unwrap();
        assert_eq!(
            message,
            "You have 2 documents: a.pdf, b.pdf. Which one would you like me to use?"
        );
        assert_eq!(message.matches("a.pdf").count(), 1);
        assert_eq!(intent.clarification_options, Some(docs(&["a.pdf", "b.pdf"])));
    }

    #[test]
    fn test_vague_messages_are_pattern_specific() {
        let c = fast_only();
        let single = docs(&["only.pdf"]);
        assert_eq!(
            c.classify_fast("summarize", &single).clarification_message.as_deref(),
            Some("What would you like me to summarize?")
        );
        assert_eq!(
            c.classify_fast("find the paper", &[]).clarification_message.as_deref(),
            Some("Which document are you referring to?")
        );
        assert_eq!(
            c.classify_fast("search for something", &[]).clarification_message.as_deref(),
            Some("Could you be more specific about what you're looking for?")
        );
    }

    #[test]
    fn test_reference_followed_by_filename_is_not_vague() {
        let intent = fast_only().classify_fast("summarize this report.pdf please", &[]);
        assert_eq!(intent.category, IntentCategory::DocumentSummary);
        assert!(!intent.is_vague);
    }

    #[test]
    fn test_vagueness_ignored_for_non_document_categories() {
        let intent = fast_only().classify_fast("remember that thing", &docs(&["a.pdf", "b.pdf"]));
        assert_eq!(intent.category, IntentCategory::MemoryRecall);
        assert!(!intent.is_vague);
    }

    #[tokio::test]
    async fn test_confident_fast_path_skips_llm() {
        let llm = Arc::new(MockLlmClient::new().with_completion("INTENT: general_chat"));
        let c = IntentClassifier::new(Some(llm.clone()), "");
        let intent = c.classify("@a.pdf hi", &[], &[]).await;
        assert_eq!(intent.category, IntentCategory::DocumentSpecific);
        assert_eq!(llm.complete_calls(), 0);
    }

    #[tokio::test]
    async fn test_llm_refines_unconfident_result() {
        let llm = Arc::new(MockLlmClient::new().with_completion(
            "INTENT: document_search\nCONFIDENCE: 0.92\nTOOLS: search_documents\nIS_VAGUE: false\nCLARIFICATION: none\nENTITIES: none",
        ));
        let c = IntentClassifier::new(Some(llm.clone()), "");
        let intent = c.classify("how did sales go", &[], &[]).await;
        assert_eq!(intent.category, IntentCategory::DocumentSearch);
        assert_eq!(intent.confidence, 0.92);
        assert_eq!(llm.complete_calls(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_to_fast_result() {
        let llm = Arc::new(
            MockLlmClient::new().with_completion_error(LlmError::Request("503".to_string())),
        );
        let c = IntentClassifier::new(Some(llm), "");
        let intent = c.classify("summarize this", &[], &docs(&["a.pdf", "b.pdf"])).await;
        assert_eq!(intent.category, IntentCategory::VagueQuery);
        assert!(intent.is_vague);
    }
}
