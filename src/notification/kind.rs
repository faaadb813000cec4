//! 通知类型定义

use serde::{Deserialize, Serialize};

/// 通知类型（每种类型最多一个待触发的提醒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Agent 完成工作，等待用户
    Idle,
    /// 权限请求
    Permission,
    /// 问题请求
    Question,
    /// 会话错误
    Error,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Idle,
        NotificationKind::Permission,
        NotificationKind::Question,
        NotificationKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Idle => "idle",
            NotificationKind::Permission => "permission",
            NotificationKind::Question => "question",
            NotificationKind::Error => "error",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 可批量合并的请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Permission,
    Question,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Permission => "permission",
            BatchKind::Question => "question",
        }
    }

    /// 对应的通知类型
    pub fn notification_kind(&self) -> NotificationKind {
        match self {
            BatchKind::Permission => NotificationKind::Permission,
            BatchKind::Question => NotificationKind::Question,
        }
    }
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(format!("{}", NotificationKind::Idle), "idle");
        assert_eq!(format!("{}", NotificationKind::Error), "error");
        assert_eq!(format!("{}", BatchKind::Question), "question");
    }

    #[test]
    fn test_batch_kind_maps_to_notification_kind() {
        assert_eq!(
            BatchKind::Permission.notification_kind(),
            NotificationKind::Permission
        );
        assert_eq!(
            BatchKind::Question.notification_kind(),
            NotificationKind::Question
        );
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&NotificationKind::Permission).unwrap();
        assert_eq!(json, "\"permission\"");
        let kind: NotificationKind = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(kind, NotificationKind::Idle);
    }
}
