use crate::ports::activity_log::{ActivityEntry, ActivityLog as ActivityLogTrait, Result};
use async_trait::async_trait;
use sqlx::PgPool;

/// ActivityLogのPostgreSQL実装
///
/// 遷移のトランザクションとは別に、コミット後に書き込まれる。
pub struct ActivityLog {
    pool: PgPool,
}

impl ActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLogTrait for ActivityLog {
    async fn record(&self, entry: ActivityEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (user_id, actor, activity, recorded_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(entry.user_id.map(|id| id.value()))
        .bind(&entry.actor)
        .bind(&entry.activity)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
