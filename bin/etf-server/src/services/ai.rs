//! Client for the external AI analysis service.
//!
//! The service exposes two endpoints taking the same body
//! (`{messages, api_key, model_type}`):
//!
//! - `POST /analyze` answers `{success, answer, error}` in one piece;
//! - `POST /analyze/stream` streams the answer as raw UTF-8 text.
//!
//! Handlers and the scheduler only see the [`Advisor`] trait so the HTTP
//! client can be swapped for a canned implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::entities::{PortfolioEntry, SettingsRecord};

/// Model used when the user never configured one.
pub const DEFAULT_MODEL_TYPE: &str = "clova-x";

/// One message of the conversation sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Body of both `/analyze` endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub messages: Vec<PromptMessage>,
    pub api_key: Option<String>,
    pub model_type: String,
}

impl AnalysisRequest {
    /// Attach the user's credentials, falling back to the default model.
    pub fn for_settings(messages: Vec<PromptMessage>, settings: Option<&SettingsRecord>) -> Self {
        Self {
            messages,
            api_key: settings.and_then(|s| s.api_key.clone()),
            model_type: settings
                .map(|s| s.model_type.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_TYPE.to_owned()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    success: bool,
    answer: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Connection, time-out or body decoding failure.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI service returned HTTP {0}")]
    Status(u16),

    /// The service answered but reported `success: false`. Never retried.
    #[error("{0}")]
    Rejected(String),
}

/// Incremental answer text.
pub type TextStream = BoxStream<'static, Result<String, AdvisorError>>;

#[async_trait]
pub trait Advisor: Send + Sync + 'static {
    /// Ask for a complete answer.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AdvisorError>;

    /// Ask for an answer delivered chunk by chunk.
    async fn analyze_stream(&self, request: &AnalysisRequest) -> Result<TextStream, AdvisorError>;
}

/// [`Advisor`] backed by the HTTP analysis service.
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl HttpAdvisor {
    /// Streamed answers are only bounded per read, never in total.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("etf-server/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.ai_request_timeout)
            .read_timeout(config.ai_request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.ai_service_url.trim_end_matches('/').to_owned(),
            max_retries: config.ai_max_retries.max(1),
            retry_delay: config.ai_retry_delay,
            timeout: config.ai_request_timeout,
        })
    }

    async fn analyze_once(&self, request: &AnalysisRequest) -> Result<String, AdvisorError> {
        let resp = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdvisorError::Status(status.as_u16()));
        }

        let body: AnalyzeResponse = resp.json().await?;
        if body.success {
            Ok(body.answer.unwrap_or_default())
        } else {
            Err(AdvisorError::Rejected(
                body.error.unwrap_or_else(|| "Unknown error".to_owned()),
            ))
        }
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AdvisorError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(attempt, max = self.max_retries, "requesting AI analysis");
            match self.analyze_once(request).await {
                Ok(answer) => {
                    info!(attempt, answer_len = answer.len(), "AI analysis succeeded");
                    return Ok(answer);
                }
                Err(e @ AdvisorError::Rejected(_)) => {
                    warn!(error = %e, "AI service rejected the request");
                    return Err(e);
                }
                Err(e) if attempt >= self.max_retries => {
                    warn!(error = %e, attempts = attempt, "AI service retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "AI service request failed; retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn analyze_stream(&self, request: &AnalysisRequest) -> Result<TextStream, AdvisorError> {
        let resp = self
            .client
            .post(format!("{}/analyze/stream", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdvisorError::Status(status.as_u16()));
        }

        Ok(utf8_chunks(Box::pin(resp.bytes_stream())).boxed())
    }
}

/// Decode a byte stream into text chunks. A multi-byte sequence split across
/// chunks is held back; whatever is left when the body ends is flushed lossily.
/// The stream stops after the first transport error.
fn utf8_chunks<S, B, E>(body: S) -> impl Stream<Item = Result<String, AdvisorError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    AdvisorError: From<E>,
{
    stream::unfold(
        (body, Vec::new(), false),
        |(mut body, mut pending, done)| async move {
            if done {
                return None;
            }
            match body.next().await {
                Some(Ok(chunk)) => {
                    pending.extend_from_slice(chunk.as_ref());
                    let text = drain_utf8(&mut pending);
                    Some((Ok(text), (body, pending, false)))
                }
                Some(Err(e)) => Some((Err(AdvisorError::from(e)), (body, pending, true))),
                None if pending.is_empty() => None,
                None => {
                    let tail = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    Some((Ok(tail), (body, pending, true)))
                }
            }
        },
    )
    .filter(|item| futures::future::ready(!matches!(item, Ok(text) if text.is_empty())))
}

/// Take the longest valid UTF-8 prefix out of `buf`, keeping a split
/// multi-byte sequence for the next chunk. Invalid bytes are replaced.
fn drain_utf8(buf: &mut Vec<u8>) -> String {
    match std::str::from_utf8(buf) {
        Ok(text) => {
            let out = text.to_owned();
            buf.clear();
            out
        }
        Err(e) if e.error_len().is_none() => {
            let rest = buf.split_off(e.valid_up_to());
            let out = String::from_utf8_lossy(buf).into_owned();
            *buf = rest;
            out
        }
        Err(_) => {
            let out = String::from_utf8_lossy(buf).into_owned();
            buf.clear();
            out
        }
    }
}

// ── Prompts ───────────────────────────────────────────────────────────────────

fn portfolio_lines(portfolio: &[PortfolioEntry]) -> String {
    if portfolio.is_empty() {
        return "없음".to_owned();
    }
    portfolio
        .iter()
        .map(|e| {
            format!(
                "{} ({}): {}원, {} 투자",
                e.etf.symbol, e.etf.name, e.portfolio.monthly_investment, e.portfolio.cycle
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn korean_date(today: NaiveDate) -> String {
    today.format("%Y년 %-m월 %-d일").to_string()
}

/// System message framing every chat turn.
pub fn chat_system_prompt(
    user_name: &str,
    settings: Option<&SettingsRecord>,
    portfolio: &[PortfolioEntry],
    today: NaiveDate,
) -> String {
    let risk = settings.map(|s| s.risk_level).unwrap_or(5);
    let persona = settings
        .and_then(|s| s.persona.as_deref())
        .unwrap_or("ETF 투자");
    format!(
        "너의 이름은 금융 Agent야. 사용자를 '{user_name} 고객님'이라고 불러야 해. \
         사용자의 질문에 ETF 투자 관점에서 간결하게 답해줘. \
         오늘 날짜는 {date}야. \
         사용자의 투자 성향은 0(보수적) ~ 10(공격적)이라고 할 때, {risk}이야. \
         사용자의 관심사는 {persona}이야. \
         사용자가 현재 투자하고 있는 ETF: {holdings}.",
        date = korean_date(today),
        holdings = portfolio_lines(portfolio),
    )
}

/// Messages asking for one integrated analysis of the ETFs due today.
pub fn portfolio_analysis_messages(
    user_name: &str,
    settings: &SettingsRecord,
    due: &[PortfolioEntry],
    today: NaiveDate,
) -> Vec<PromptMessage> {
    let persona = settings.persona.as_deref().unwrap_or("ETF 투자");
    let developer = format!(
        "너의 이름은 금융 Agent야. 사용자를 '{user_name} 고객님'이라고 불러야 해. \
         너가 해야하는 업무는 사용자의 성향과 최근 뉴스 및 한국 은행에서 제공하는 해외 동향분석, \
         현지정보 자료를 기반으로 상품마다 투자하기 전에 투자 비중 조정이 필요한지 알려주는 거야. \
         오늘 날짜는 {date}야. \
         사용자의 투자 성향은 0(보수적) ~ 10(공격적)이라고 할 때, {risk}이야. \
         사용자의 관심사는 {persona}이야. \
         사용자가 현재 투자하고 있는 ETF 및 그에 대한 정보는 {holdings}야.",
        date = korean_date(today),
        risk = settings.risk_level,
        holdings = portfolio_lines(due),
    );
    let plan = due
        .iter()
        .map(|e| format!("{} {}원", e.etf.symbol, e.portfolio.monthly_investment))
        .collect::<Vec<_>>()
        .join(", ");
    let user = format!(
        "네이버 글로벌 경제 뉴스, 네이버 한국 경제 뉴스, 한국은행에서 제공하는 정보 3가지를 모두 분석해줘. \
         오늘 나는 {plan} 투자하는 날이야. 이중에서 투자 비율을 조정해야 하는 것이 있어? \
         요약만 간결하게 해서 상품에 투자 비중을 정해서 최종 금액을 도출해줘."
    );
    vec![
        PromptMessage::new("developer", developer),
        PromptMessage::new("user", user),
    ]
}
