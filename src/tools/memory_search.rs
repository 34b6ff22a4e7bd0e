//! Long-term-memory search native tool
//!
//! Embeds the query and runs a user-filtered cosine search over summarized
//! past conversations, returning the top hits with dates and similarity
//! scores.

use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{ToolDefinition, SEARCH_LONG_TERM_MEMORY_TOOL};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::memory::Embedder;
use crate::storage::LongTermMemoryStore;

use super::traits::{Tool, ToolParams, ToolResult};

const SEARCH_LIMIT: usize = 3;

/// Searches the user's long-term memory for relevant past conversations
pub struct SearchLongTermMemoryTool {
    store: Arc<dyn LongTermMemoryStore>,
    embedder: Arc<dyn Embedder>,
}

impl SearchLongTermMemoryTool {
    pub fn new(store: Arc<dyn LongTermMemoryStore>, embedder: Arc<dyn Embedder>) -> Self {
        SearchLongTermMemoryTool { store, embedder }
    }
}

#[async_trait]
impl Tool for SearchLongTermMemoryTool {
    fn name(&self) -> &str {
        SEARCH_LONG_TERM_MEMORY_TOOL
    }

    fn description(&self) -> &str {
        "Use para buscar informações ou contexto de conversas que aconteceram há mais de um dia."
    }

    fn mandatory_params(&self) -> &[&str] {
        &["query"]
    }

    async fn execute(
        &self,
        params: &ToolParams,
        context: &ExecutionContext,
        _tool_def: Option<&ToolDefinition>,
    ) -> Result<ToolResult> {
        let Some(query) = params.get("query").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::failure(
                "Parâmetro 'query' não fornecido para a busca na memória.",
            ));
        };
        if context.user_id.is_empty() {
            return Ok(ToolResult::failure(
                "Não foi possível identificar o usuário para a busca na memória.",
            ));
        }

        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(_) => {
                return Ok(ToolResult::failure(
                    "Não foi possível processar a busca na memória de longo prazo.",
                ));
            }
        };

        let hits = match self
            .store
            .search(&context.user_id, &embedding, SEARCH_LIMIT)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Erro ao executar a busca na memória: {}",
                    e
                )));
            }
        };

        if hits.is_empty() {
            return Ok(ToolResult::success(
                "Nenhuma memória relevante encontrada em conversas passadas.",
            ));
        }

        let formatted = hits
            .iter()
            .map(|hit| {
                format!(
                    "Memória de {}:\n'{}' (similaridade: {:.2})",
                    hit.conversation_end.format("%d/%m/%Y"),
                    hit.summary,
                    hit.score
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolResult::success(format!(
            "Encontrei as seguintes memórias relevantes de conversas passadas:\n{}",
            formatted
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmem::InMemoryLongTermMemoryStore;
    use crate::storage::MemoryPoint;
    use chrono::Utc;
    use serde_json::json;

    struct StubEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    fn point(user_id: &str, summary: &str, embedding: Vec<f32>) -> MemoryPoint {
        MemoryPoint {
            user_id: user_id.into(),
            session_id: "old".into(),
            summary: summary.into(),
            conversation_start: Utc::now(),
            conversation_end: Utc::now(),
            processed_at: Utc::now(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_search_is_filtered_by_user() {
        let store = Arc::new(InMemoryLongTermMemoryStore::default());
        store
            .upsert(vec![
                point("alice", "discussão sobre o projeto Alpha", vec![1.0, 0.0]),
                point("bob", "segredo de outro usuário", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let tool = SearchLongTermMemoryTool::new(store, Arc::new(StubEmbedder(vec![1.0, 0.0])));
        let mut context = ExecutionContext::new("s1", "alice", "q");
        context.user_id = "alice".into();

        let mut params = ToolParams::new();
        params.insert("query".into(), json!("projeto Alpha"));

        let result = tool.execute(&params, &context, None).await.unwrap();
        let output = result.output.as_str().unwrap();
        assert!(output.contains("projeto Alpha"));
        assert!(output.contains("similaridade"));
        assert!(!output.contains("segredo"));
    }

    #[tokio::test]
    async fn test_no_hits_message() {
        let store = Arc::new(InMemoryLongTermMemoryStore::default());
        let tool = SearchLongTermMemoryTool::new(store, Arc::new(StubEmbedder(vec![1.0])));
        let context = ExecutionContext::new("s1", "alice", "q");

        let mut params = ToolParams::new();
        params.insert("query".into(), json!("anything"));

        let result = tool.execute(&params, &context, None).await.unwrap();
        assert!(result
            .output
            .as_str()
            .unwrap()
            .contains("Nenhuma memória relevante"));
    }
}
