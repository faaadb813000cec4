//! 宿主事件归一化
//!
//! 不同版本的宿主 SDK 对同一逻辑事件使用不同的属性名（如 `permissionID` / `requestID`）。
//! 所有差异只在这里处理，路由器只看到 [`RouterEvent`]。

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use crate::notification::kind::BatchKind;

/// 宿主原始事件 `{ "type": ..., "properties": {...} }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub properties: Value,
}

impl HostEvent {
    pub fn new(event_type: impl Into<String>, properties: Value) -> Self {
        Self {
            event_type: event_type.into(),
            properties,
        }
    }

    /// 解析一行 JSON
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// 归一化后的事件
#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    SessionIdle {
        session_id: String,
    },
    SessionCreated {
        session_id: String,
        parent_id: Option<String>,
    },
    SessionError {
        session_id: String,
        message: Option<String>,
    },
    UserMessage {
        message_id: String,
        created_at: Option<DateTime<Utc>>,
    },
    /// 权限或问题请求，`count` 为子问题数量（权限固定为 1）
    Requested {
        kind: BatchKind,
        id: String,
        count: usize,
    },
    /// 权限回复、问题回复或问题拒绝
    Replied {
        kind: BatchKind,
        id: String,
    },
}

impl RouterEvent {
    /// 归一化宿主事件，未识别的事件返回 `None`
    pub fn normalize(event: &HostEvent) -> Option<Self> {
        let props = &event.properties;
        match event.event_type.as_str() {
            "session.idle" => Some(RouterEvent::SessionIdle {
                session_id: required_id(props, &[&["sessionID"], &["sessionId"]], "session"),
            }),
            "session.created" => Some(RouterEvent::SessionCreated {
                session_id: required_id(
                    props,
                    &[&["info", "id"], &["sessionID"], &["sessionId"]],
                    "session",
                ),
                parent_id: lookup_str(props, &[&["info", "parentID"], &["parentID"]]),
            }),
            "session.error" => Some(RouterEvent::SessionError {
                session_id: required_id(props, &[&["sessionID"], &["sessionId"]], "session"),
                message: lookup_str(
                    props,
                    &[
                        &["error", "data", "message"],
                        &["error", "message"],
                        &["error", "name"],
                    ],
                ),
            }),
            "message.updated" => {
                let role = lookup_str(props, &[&["info", "role"]]);
                if role.as_deref() != Some("user") {
                    return None;
                }
                Some(RouterEvent::UserMessage {
                    message_id: required_id(props, &[&["info", "id"]], "message"),
                    created_at: lookup(props, &[&["info", "time", "created"]])
                        .and_then(Value::as_i64)
                        .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                })
            }
            "permission.updated" | "permission.asked" => Some(RouterEvent::Requested {
                kind: BatchKind::Permission,
                id: required_id(props, &[&["id"], &["requestID"], &["permissionID"]], "permission"),
                count: 1,
            }),
            "permission.replied" => Some(RouterEvent::Replied {
                kind: BatchKind::Permission,
                id: required_id(props, &[&["permissionID"], &["requestID"], &["id"]], "permission"),
            }),
            "question.asked" => Some(RouterEvent::Requested {
                kind: BatchKind::Question,
                id: required_id(props, &[&["id"], &["requestID"]], "question"),
                count: props
                    .get("questions")
                    .and_then(Value::as_array)
                    .map_or(1, |questions| questions.len().max(1)),
            }),
            "question.replied" | "question.rejected" => Some(RouterEvent::Replied {
                kind: BatchKind::Question,
                id: required_id(props, &[&["requestID"], &["id"], &["questionID"]], "question"),
            }),
            _ => None,
        }
    }
}

fn lookup<'a>(props: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(props, |value, key| value.get(*key))
            .filter(|value| !value.is_null())
    })
}

fn lookup_str(props: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(props, |value, key| value.get(*key))
            .and_then(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    })
}

fn required_id(props: &Value, paths: &[&[&str]], prefix: &str) -> String {
    lookup_str(props, paths).unwrap_or_else(|| {
        let id = placeholder_id(prefix);
        warn!(placeholder = %id, "Event missing identifier, using placeholder");
        id
    })
}

static PLACEHOLDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// 生成唯一占位 ID：`<kind>-<epoch-ms>-<seq>`
fn placeholder_id(prefix: &str) -> String {
    let seq = PLACEHOLDER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), seq)
}
