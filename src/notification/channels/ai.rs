//! AI 通知文案生成（OpenAI 兼容 `/chat/completions` 接口）

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::notification::backend::{MessageGenerator, MessageRequest};
use crate::notification::kind::NotificationKind;

/// 默认模型
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 默认最大 tokens
pub const DEFAULT_MAX_TOKENS: u32 = 60;

const SYSTEM_PROMPT: &str = "You write short, friendly spoken notifications for a developer. \
Reply with a single sentence under 25 words, no quotes, no emoji, no markdown.";

/// AI 客户端配置
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// 接口地址（如 `http://localhost:11434/v1`）
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Chat Completions 请求体
#[derive(Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat Completions 响应体
#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

/// OpenAI 兼容的消息生成器
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    config: AiConfig,
}

impl OpenAiGenerator {
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }

    /// 完整的请求 URL
    pub fn completions_url(&self) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

/// 生成提示词
pub fn build_prompt(request: &MessageRequest) -> String {
    let situation = match (request.kind, request.count > 1) {
        (NotificationKind::Idle, _) => "the agent finished its task and is waiting for review".to_string(),
        (NotificationKind::Permission, false) => "the agent needs permission to continue".to_string(),
        (NotificationKind::Permission, true) => format!(
            "the agent has {} permission requests waiting for approval",
            request.count
        ),
        (NotificationKind::Question, false) => "the agent has a question for the user".to_string(),
        (NotificationKind::Question, true) => {
            format!("the agent has {} questions waiting for answers", request.count)
        }
        (NotificationKind::Error, _) => "the agent ran into an error".to_string(),
    };

    if request.is_reminder {
        format!(
            "Write a gentle reminder: {}, and the user has not responded yet.",
            situation
        )
    } else {
        format!("Write a notification: {}.", situation)
    }
}

#[async_trait]
impl MessageGenerator for OpenAiGenerator {
    async fn generate(&self, request: &MessageRequest) -> Result<String> {
        let body = ChatRequest {
            model: self.config.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.8,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(request),
                },
            ],
        };

        let url = self.completions_url();
        debug!(model = %self.config.model, url = %url, kind = %request.kind, "Requesting AI message");

        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| anyhow!("AI request failed: {}", e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read AI response: {}", e))?;
        if !status.is_success() {
            bail!("AI API error ({}): {}", status, text);
        }

        parse_completion(&text)
    }
}

/// 提取第一个候选的文本
pub(crate) fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| anyhow!("Failed to parse AI response: {}", e))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("AI response contained no text"))
}
