//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 패시지는 `batchEmbedContents`로 한 번에 최대 100개씩 임베딩합니다.
//! 문서 임베딩과 질의 임베딩은 task type이 다릅니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::from_env()?;
//! let vectors = embedder.embed_batch(&texts, TaskType::RetrievalDocument).await?;
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::gemini::{has_api_key, GeminiClient};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 용도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// 인덱스에 저장할 패시지
    RetrievalDocument,
    /// 검색 질의
    RetrievalQuery,
}

impl TaskType {
    fn as_api_str(self) -> &'static str {
        match self {
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 배치 임베딩 (입력 순서 유지)
    async fn embed_batch(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>>;

    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()], task).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector"))
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// 임베딩 모델 (MRL 지원: 768 / 1536 / 3072)
const EMBED_MODEL: &str = "gemini-embedding-001";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// 지원 차원
const VALID_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

/// `batchEmbedContents` 한 번에 보낼 수 있는 최대 요청 수
const MAX_API_BATCH: usize = 100;

/// Google Gemini 임베딩 구현체
#[derive(Debug, Clone)]
pub struct GeminiEmbedding {
    client: GeminiClient,
    dimension: usize,
}

impl GeminiEmbedding {
    /// 클라이언트와 차원을 지정하여 생성
    pub fn new(client: GeminiClient, dimension: usize) -> Result<Self> {
        if !VALID_DIMENSIONS.contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }
        Ok(Self { client, dimension })
    }

    /// 환경변수 API 키 + 기본 차원으로 생성
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiClient::from_env()?, DEFAULT_DIMENSION)
    }

    async fn embed_chunk(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        let model = format!("models/{}", EMBED_MODEL);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: model.clone(),
                    content: EmbedContent {
                        parts: vec![EmbedPart { text: text.clone() }],
                    },
                    task_type: task.as_api_str(),
                    output_dimensionality: Some(self.dimension),
                })
                .collect(),
        };

        let response: BatchEmbedResponse = self
            .client
            .call(EMBED_MODEL, "batchEmbedContents", &request)
            .await
            .context("batchEmbedContents failed")?;

        if response.embeddings.len() != texts.len() {
            anyhow::bail!(
                "Embedding count mismatch: sent {}, received {}",
                texts.len(),
                response.embeddings.len()
            );
        }

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

/// source: https://ai.google.dev/api/embeddings#method:-models.batchembedcontents
#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: &'static str,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed_batch(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        let mut results = vec![Vec::new(); texts.len()];

        // 빈 텍스트는 API를 거치지 않고 0 벡터
        let pending: Vec<usize> = (0..texts.len())
            .filter(|&i| {
                if texts[i].trim().is_empty() {
                    results[i] = vec![0.0; self.dimension];
                    false
                } else {
                    true
                }
            })
            .collect();

        for (n, chunk) in pending.chunks(MAX_API_BATCH).enumerate() {
            tracing::debug!(
                "Embedding request {}/{} ({} texts)",
                n + 1,
                pending.len().div_ceil(MAX_API_BATCH),
                chunk.len()
            );
            let batch: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.embed_chunk(&batch, task).await?;
            for (&i, vector) in chunk.iter().zip(vectors) {
                results[i] = vector;
            }
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        EMBED_MODEL
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성 (Gemini API)
pub fn create_embedder() -> Result<GeminiEmbedding> {
    if !has_api_key() {
        anyhow::bail!(
            "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
             Set: export GEMINI_API_KEY=your-api-key\n\
             Get your API key at: https://aistudio.google.com/app/apikey"
        );
    }

    let embedder = GeminiEmbedding::from_env()?;
    tracing::info!(
        "Using Gemini API embedding (dimension: {})",
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
