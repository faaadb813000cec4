//! 会话父子关系缓存
//!
//! 独立进程无法查询宿主的会话 API，只能从 `session.created` 事件中记录 `parentID`。

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::notification::backend::SessionQuery;

/// 会话 ID -> 父会话 ID
#[derive(Debug, Default)]
pub struct ParentCache {
    parents: Mutex<HashMap<String, String>>,
}

impl ParentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parents.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionQuery for ParentCache {
    async fn parent_of(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self
            .parents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned())
    }

    fn record_session(&self, session_id: &str, parent_id: Option<&str>) {
        if let Some(parent) = parent_id {
            self.parents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(session_id.to_string(), parent.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_only_sub_sessions() {
        let cache = ParentCache::new();
        cache.record_session("root", None);
        cache.record_session("child", Some("root"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.parent_of("child").await.unwrap().as_deref(), Some("root"));
        assert_eq!(cache.parent_of("root").await.unwrap(), None);
    }
}
