//! 질의응답 모듈
//!
//! 통합 인덱스에서 질의와 가까운 패시지를 찾아 프롬프트에 그대로 넣고
//! ("stuff" 방식) 언어 모델에게 답변을 요청합니다.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::QaConfig;
use crate::embedding::EmbeddingProvider;
use crate::knowledge::{KnowledgeIndex, SearchResult};
use crate::llm::LanguageModel;

/// 검색된 패시지가 없을 때의 고정 답변
pub const NO_INFORMATION_ANSWER: &str =
    "I don't have any information about that in the knowledge base.";

/// 질의응답 결과
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// 답변 근거로 쓰인 패시지 (유사도 순)
    pub sources: Vec<SearchResult>,
}

/// 검색 결과를 컨텍스트로 묶은 프롬프트
pub fn build_prompt(query: &str, passages: &[SearchResult]) -> String {
    let context = passages
        .iter()
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, \
         don't try to make up an answer.\n\n\
         {}\n\n\
         Question: {}\n\
         Helpful Answer:",
        context,
        query.trim()
    )
}

pub struct QaService {
    index: KnowledgeIndex,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl QaService {
    pub fn new(index: KnowledgeIndex, llm: Arc<dyn LanguageModel>, top_k: usize) -> Self {
        Self {
            index,
            llm,
            top_k: top_k.max(1),
        }
    }

    /// 설정의 (통합) 인덱스로 열기
    pub async fn open(
        config: &QaConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let index = KnowledgeIndex::open(&config.vector_dir, embedder).await?;
        Ok(Self::new(index, llm, config.top_k))
    }

    pub async fn ask(&self, query: &str) -> Result<Answer> {
        if query.trim().is_empty() {
            anyhow::bail!("Query must not be empty");
        }

        let passages = self
            .index
            .search(query, self.top_k)
            .await
            .context("Failed to retrieve passages")?;

        if passages.is_empty() {
            tracing::info!("No passages retrieved for query");
            return Ok(Answer {
                text: NO_INFORMATION_ANSWER.to_string(),
                sources: vec![],
            });
        }

        tracing::debug!(
            "Retrieved {} passages, asking {}",
            passages.len(),
            self.llm.name()
        );

        let prompt = build_prompt(query, &passages);
        let text = self
            .llm
            .generate(&prompt)
            .await
            .context("Failed to generate answer")?;

        Ok(Answer {
            text,
            sources: passages,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{IndexSink, Passage};
    use crate::knowledge::testing::{KeywordEmbedding, MemoryVectorStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Applications are due May 1.".to_string())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn service(llm: Arc<RecordingModel>, top_k: usize) -> QaService {
        let index = KnowledgeIndex::new(
            Arc::new(KeywordEmbedding::new()),
            Arc::new(MemoryVectorStore::default()),
        );
        QaService::new(index, llm, top_k)
    }

    async fn seed(service: &QaService, texts: &[&str]) {
        let passages: Vec<Passage> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Passage {
                source: format!("page{}.txt", i),
                index: 0,
                text: t.to_string(),
            })
            .collect();
        service.index.add_passages(&passages).await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_stuffs_retrieved_context() {
        let llm = Arc::new(RecordingModel::default());
        let qa = service(llm.clone(), 2);
        seed(
            &qa,
            &[
                "The admission deadline is May 1.",
                "Housing opens in August.",
                "The library is on campus.",
            ],
        )
        .await;

        let answer = qa.ask("What is the admission deadline?").await.unwrap();
        assert_eq!(answer.text, "Applications are due May 1.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].text, "The admission deadline is May 1.");

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The admission deadline is May 1."));
        assert!(prompts[0].contains("Question: What is the admission deadline?"));
    }

    #[tokio::test]
    async fn test_empty_index_skips_model() {
        let llm = Arc::new(RecordingModel::default());
        let qa = service(llm.clone(), 5);

        let answer = qa.ask("Where is the library?").await.unwrap();
        assert_eq!(answer.text, NO_INFORMATION_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let qa = service(Arc::new(RecordingModel::default()), 5);
        assert!(qa.ask("   ").await.is_err());
    }

    #[test]
    fn test_build_prompt_layout() {
        let passages = vec![
            SearchResult {
                source: "a".to_string(),
                chunk_index: 0,
                text: " first ".to_string(),
                similarity: 0.9,
            },
            SearchResult {
                source: "b".to_string(),
                chunk_index: 0,
                text: "second".to_string(),
                similarity: 0.5,
            },
        ];
        let prompt = build_prompt("  why? ", &passages);
        assert!(prompt.contains("first\n\nsecond\n\nQuestion: why?\nHelpful Answer:"));
    }
}
