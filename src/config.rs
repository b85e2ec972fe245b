//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AWARE__*` 覆盖（双下划线表示嵌套，如 `AWARE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::OrchestratorSettings;
use crate::intent::ClassifierSettings;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、REPL 默认用户
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    pub default_user: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            default_user: "local-user".to_string(),
        }
    }
}

/// [llm] 段：后端选择、温度与意图识别超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock；openai 需设置 OPENAI_API_KEY，否则回退 mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub generation_temperature: f32,
    pub intent_temperature: f32,
    /// 慢速意图识别的超时（秒）
    pub intent_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            generation_temperature: 0.7,
            intent_temperature: 0.1,
            intent_timeout_secs: 20,
        }
    }
}

/// [agent] 段：历史窗口、LLM 复核阈值、事件通道容量
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 生成时附带的历史条数
    pub history_turns: usize,
    /// 意图识别 prompt 中的历史条数
    pub intent_history_turns: usize,
    pub llm_confidence_threshold: f64,
    pub event_buffer: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            history_turns: 10,
            intent_history_turns: 3,
            llm_confidence_threshold: 0.85,
            event_buffer: 64,
        }
    }
}

/// [tools] 段：工具超时与各工具的默认参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒），0 表示不限
    pub timeout_secs: u64,
    pub search_limit: usize,
    pub all_documents_max_chunks: usize,
    pub document_max_chunks: usize,
    pub memory_search_limit: usize,
    pub recent_memory_limit: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            search_limit: 10,
            all_documents_max_chunks: 50,
            document_max_chunks: 30,
            memory_search_limit: 5,
            recent_memory_limit: 10,
        }
    }
}

impl AppConfig {
    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            llm_confidence_threshold: self.agent.llm_confidence_threshold,
            history_turns: self.agent.intent_history_turns,
            temperature: self.llm.intent_temperature,
            timeout: Duration::from_secs(self.llm.intent_timeout_secs),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            history_turns: self.agent.history_turns,
            temperature: self.llm.generation_temperature,
            event_buffer: self.agent.event_buffer,
            search_limit: self.tools.search_limit,
            all_documents_max_chunks: self.tools.all_documents_max_chunks,
            document_max_chunks: self.tools.document_max_chunks,
            memory_search_limit: self.tools.memory_search_limit,
            recent_memory_limit: self.tools.recent_memory_limit,
        }
    }
}

/// 从 config 目录加载配置，环境变量 AWARE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AWARE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AWARE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载失败时告警并使用默认配置
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}
