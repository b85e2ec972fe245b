//! Aware - 文档与记忆增强的对话 Agent
//!
//! 入口：初始化日志、装配 Agent 组件，然后从 stdin 逐行读取查询，把每个事件以一行 JSON 写到 stdout。
//! 命令：`/upload <path>` 上传文本文件，`/remember <text>` 写入记忆，`/tools` 与 `/schema` 输出目录，`/quit` 退出。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use aware::agent::{build_components, create_llm_from_config, process_message_stream};
use aware::config::load_config_or_default;
use aware::core::{collect_reply, event_schema_json};
use aware::documents::InMemoryDocumentStore;
use aware::memory::{ConversationMemory, InMemoryMemoryStore};
use aware::observability;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config_or_default(config_path);

    let documents = Arc::new(InMemoryDocumentStore::new());
    let memories = Arc::new(InMemoryMemoryStore::default());
    let llm = create_llm_from_config(&cfg);
    let components = build_components(&cfg, documents.clone(), memories.clone(), llm)
        .context("Failed to build agent")?;

    let user_id = cfg.app.default_user.clone();
    let conversation_id = uuid::Uuid::new_v4().to_string();
    let mut history = ConversationMemory::new(cfg.agent.history_turns);
    tracing::info!(
        app = cfg.app.name.as_deref().unwrap_or("aware"),
        conversation_id = %conversation_id,
        "ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').unwrap_or((input, "")) {
            ("/quit", _) => break,
            ("/tools", _) => {
                println!("{}", components.registry.to_schema_json());
                continue;
            }
            ("/schema", _) => {
                println!("{}", event_schema_json());
                continue;
            }
            ("/upload", path) => {
                upload(&documents, &user_id, path.trim()).await;
                continue;
            }
            ("/remember", text) => {
                memories.add(&user_id, text).await;
                continue;
            }
            _ => {}
        }

        let stream = process_message_stream(
            &components,
            input,
            &user_id,
            &conversation_id,
            history.messages(),
        );
        let printed = stream.inspect(|event| match event.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode event"),
        });

        match collect_reply(printed).await {
            Ok(reply) => {
                if reply.conversation_id.is_some() {
                    let exchange = format!("User: {input}\nAssistant: {}", reply.content);
                    memories.add(&user_id, &exchange).await;
                }
                history.extend(reply.history_entries(input));
            }
            Err(e) => tracing::warn!(error = %e, "query did not complete"),
        }
    }

    Ok(())
}

/// 读取文本文件，按空行切块写入文档库
async fn upload(documents: &InMemoryDocumentStore, user_id: &str, path: &str) {
    let filename = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string();
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let chunks: Vec<String> = text
                .split("\n\n")
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
            let count = chunks.len();
            documents.add_document(user_id, &filename, chunks).await;
            tracing::info!(filename = %filename, chunks = count, "document uploaded");
        }
        Err(e) => tracing::warn!(path = %path, error = %e, "upload failed"),
    }
}
