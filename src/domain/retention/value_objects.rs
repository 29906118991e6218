//! Retention Context - Value Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 保留句柄
///
/// 32 位十六进制字符串形式，可直接放进聊天回调数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetentionHandle(Uuid);

impl RetentionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RetentionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RetentionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for RetentionHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// 保留策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// 完整制品交付后即删除
    #[default]
    SingleUse,
    /// 交付后继续缓存，无引用且超过 TTL 后回收
    Ttl,
}

impl RetentionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPolicy::SingleUse => "single_use",
            RetentionPolicy::Ttl => "ttl",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_round_trips_through_text() {
        let handle = RetentionHandle::new();
        let text = handle.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text.parse::<RetentionHandle>().unwrap(), handle);
    }

    #[test]
    fn test_garbage_handle_is_rejected() {
        assert!("not-a-handle".parse::<RetentionHandle>().is_err());
    }
}
