use crate::domain::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 活動ログの1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    /// システムによる操作の場合は`None`
    pub user_id: Option<UserId>,
    pub actor: String,
    pub activity: String,
    pub recorded_at: DateTime<Utc>,
}

/// 活動ログポート
///
/// 記録の失敗は呼び出し元でログ出力のみ行い、確定済みの遷移は取り消さない。
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, entry: ActivityEntry) -> Result<()>;
}
