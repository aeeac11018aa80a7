//! 웹 스크래퍼 모듈 - 페이지 본문 가져오기
//!
//! 페이지를 한 번의 GET 요청으로 가져옵니다. 재시도는 하지 않습니다.
//! 실패는 모두 [`FetchError`]로 분류되며, 호출자는 이를 soft failure로
//! 다룹니다 (페이지 건너뛰기 + 로그).
//!
//! HTML -> 본문 텍스트 변환([`html_to_text`])도 이 모듈에 있습니다.

use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

// ============================================================================
// Errors
// ============================================================================

/// 페이지 가져오기 실패 사유
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("failed to decode response body: {0}")]
    Decode(String),
}

// ============================================================================
// Fetched Page
// ============================================================================

/// 가져온 페이지
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 요청 URL
    pub url: String,
    /// HTTP 상태 코드 (항상 2xx)
    pub status: u16,
    /// 응답 본문 (charset에 따라 디코딩된 텍스트)
    pub body: String,
}

// ============================================================================
// WebScraper
// ============================================================================

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebScraper {
    /// 타임아웃과 User-Agent를 지정하여 생성
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client, timeout })
    }

    /// URL 본문 가져오기
    ///
    /// 2xx가 아닌 상태, 전송 오류, 타임아웃, 본문 디코딩 오류는 모두
    /// `FetchError`로 반환됩니다.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Fetching: {}", parsed);

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Decode(e.to_string())
            }
        })?;

        Ok(FetchedPage {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if error.is_decode() {
            FetchError::Decode(error.to_string())
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}

// ============================================================================
// HTML -> Text
// ============================================================================

/// 본문 후보 셀렉터 (우선순위 순)
const CONTENT_SELECTORS: [&str; 6] = [
    "article",
    "main",
    "[role=main]",
    ".content",
    "#content",
    "body",
];

/// 본문으로 인정할 최소 길이
const MIN_CONTENT_CHARS: usize = 100;

/// HTML 문서에서 제목과 본문 텍스트 추출
///
/// 제목이 있으면 `# 제목` 헤더를 앞에 붙입니다.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let content = extract_content(&document);

    match extract_title(&document) {
        Some(title) if !content.is_empty() => format!("# {}\n\n{}", title, content),
        Some(title) => format!("# {}", title),
        None => content,
    }
}

/// 문자열이 HTML 문서로 보이는지 확인
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
}

/// 제목 추출 (<title> 우선, 없으면 첫 <h1>)
fn extract_title(document: &Html) -> Option<String> {
    for tag in ["title", "h1"] {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let title = element.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                return Some(title);
            }
        }
    }
    None
}

fn extract_content(document: &Html) -> String {
    let mut fallback = String::new();

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element_text(&element);
            if text.chars().count() > MIN_CONTENT_CHARS {
                return text;
            }
            if selector_str == "body" {
                fallback = text;
            }
        }
    }

    fallback
}

/// 요소의 텍스트 노드를 공백 하나로 이어붙임 (script/style 제외)
fn element_text(element: &ElementRef) -> String {
    let mut text = String::new();

    for node in element.descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };
        let inside_code = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| matches!(e.name(), "script" | "style" | "noscript"))
                .unwrap_or(false)
        });
        if inside_code {
            continue;
        }

        let trimmed = t.trim();
        if !trimmed.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
        }
    }

    match regex::Regex::new(r"\s+") {
        Ok(re) => re.replace_all(&text, " ").trim().to_string(),
        Err(_) => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scraper() -> WebScraper {
        WebScraper::new(Duration::from_secs(5), "campus-rag-test").expect("scraper")
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/home"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let page = scraper()
            .fetch(&format!("{}/home", server.uri()))
            .await
            .expect("fetch");
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = scraper()
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let scraper = WebScraper::new(Duration::from_millis(200), "campus-rag-test").unwrap();
        let err = scraper.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let err = scraper().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_html_to_text_prefers_article() {
        let html = r#"
            <html>
                <head><title>Admissions</title><style>.x { color: red }</style></head>
                <body>
                    <nav>Navigation menu</nav>
                    <article>
                        Graduate admission requires a completed application,
                        official transcripts, and two letters of recommendation.
                    </article>
                    <footer>Footer content</footer>
                </body>
            </html>
        "#;
        let text = html_to_text(html);
        assert!(text.starts_with("# Admissions"));
        assert!(text.contains("official transcripts"));
        assert!(!text.contains("Navigation menu"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn test_html_to_text_short_body_fallback() {
        let html = "<html><body><h1>Tiny</h1><p>short</p></body></html>";
        let text = html_to_text(html);
        assert_eq!(text, "# Tiny\n\nTiny short");
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(looks_like_html("  <html lang=\"en\">"));
        assert!(!looks_like_html("Plain text about tuition."));
    }
}
