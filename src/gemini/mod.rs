//! Gemini API 공통 클라이언트
//!
//! 임베딩(`batchEmbedContents`)과 답변 생성(`generateContent`)이 같은
//! 클라이언트를 공유합니다. API 키는 URL이 아닌 `x-goog-api-key` 헤더로 보냅니다.
//!
//! - 요청 간 최소 간격 + 분당 요청 수 제한 (무료 티어 60 RPM)
//! - 429 / 전송 오류 시 지수 백오프 재시도
//!
//! source: https://ai.google.dev/gemini-api/docs

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// API 베이스 URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 분당 최대 요청 수
const RATE_LIMIT_RPM: usize = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY: Duration = Duration::from_millis(1000);
/// 429 / 전송 오류 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(2000);

// ============================================================================
// API Key
// ============================================================================

/// API 키를 찾는 환경변수 (우선순위 순)
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"];

/// API 키 로드 (환경변수에서)
pub fn get_api_key() -> Result<String> {
    for var in API_KEY_VARS {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부
pub fn has_api_key() -> bool {
    API_KEY_VARS.iter().any(|var| {
        std::env::var(var)
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    })
}

// ============================================================================
// Rate Limiter
// ============================================================================

/// 슬라이딩 윈도우 + 최소 간격 Rate Limiter
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: usize,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration, min_delay: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay,
            last_request: None,
        }
    }

    /// 다음 요청까지 기다려야 하는 시간
    fn wait_time(&mut self, now: Instant) -> Duration {
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        let gap = self
            .last_request
            .map(|last| self.min_delay.saturating_sub(now.duration_since(last)))
            .unwrap_or_default();

        let window_wait = if self.requests.len() >= self.max_requests {
            self.requests
                .first()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or_default()
        } else {
            Duration::ZERO
        };

        gap.max(window_wait)
    }

    async fn acquire(&mut self) {
        let wait = self.wait_time(Instant::now());
        if !wait.is_zero() {
            tracing::debug!("Rate limit: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

// ============================================================================
// GeminiClient
// ============================================================================

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini REST 클라이언트
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
                MIN_DELAY,
            ))),
        })
    }

    /// 환경변수의 API 키로 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    /// 베이스 URL 교체 (프록시, 테스트 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// 레이트 리밋 해제 (테스트 전용)
    #[cfg(test)]
    pub(crate) fn without_rate_limit(self) -> Self {
        Self {
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                usize::MAX,
                RATE_LIMIT_WINDOW,
                Duration::ZERO,
            ))),
            ..self
        }
    }

    /// `models/{model}:{method}` 호출
    pub async fn call<Req, Resp>(&self, model: &str, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/models/{}:{}", self.base_url, model, method);
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            self.rate_limiter.lock().await.acquire().await;

            let backoff = INITIAL_BACKOFF * 2u32.pow(attempt);

            let response = match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send Gemini request: {}", e));
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Gemini request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read Gemini response body")?;

            if status.is_success() {
                return serde_json::from_str(&body)
                    .with_context(|| format!("Failed to parse {} response", method));
            }

            if status.as_u16() == 429 {
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));
                if attempt < MAX_RETRIES {
                    tracing::warn!(
                        "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }

            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                anyhow::bail!(
                    "Gemini API error ({}): {}",
                    error.error.status,
                    error.error.message
                );
            }
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Gemini call failed after {} retries", MAX_RETRIES)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Echo {
        ok: bool,
    }

    #[test]
    fn test_rate_limiter_min_delay() {
        let mut limiter = RateLimiter::new(10, Duration::from_secs(60), Duration::from_secs(1));
        let now = Instant::now();
        assert_eq!(limiter.wait_time(now), Duration::ZERO);

        limiter.last_request = Some(now);
        limiter.requests.push(now);
        let wait = limiter.wait_time(now);
        assert!(wait > Duration::from_millis(900));
    }

    #[test]
    fn test_rate_limiter_window_full() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60), Duration::ZERO);
        let now = Instant::now();
        limiter.requests = vec![now, now];
        assert!(limiter.wait_time(now) > Duration::from_secs(59));
    }

    #[tokio::test]
    async fn test_call_sends_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:doThing"))
            .and(header("x-goog-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .mount(&server)
            .await;

        let client = GeminiClient::new("secret".to_string())
            .unwrap()
            .with_base_url(server.uri())
            .without_rate_limit();

        let echo: Echo = client
            .call("test-model", "doThing", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(echo.ok);
    }

    #[tokio::test]
    async fn test_call_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error":{"message":"bad input","status":"INVALID_ARGUMENT"}}"#,
            ))
            .mount(&server)
            .await;

        let client = GeminiClient::new("k".to_string())
            .unwrap()
            .with_base_url(server.uri())
            .without_rate_limit();

        let err = client
            .call::<_, Echo>("m", "x", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("INVALID_ARGUMENT"));
    }
}
