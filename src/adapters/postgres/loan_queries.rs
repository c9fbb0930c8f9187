use crate::domain::{LoanId, UserId};
use crate::ports::loan_queries::{LoanListFilter, LoanQueries as LoanQueriesTrait, LoanView, Page, Result};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::rows::{LOAN_COLUMNS, fetch_equipment_summaries, load_loans};

/// 貸出記録の行から、明細と備品情報を添えたビューを組み立てる
async fn build_views(conn: &mut PgConnection, rows: &[PgRow]) -> Result<Vec<LoanView>> {
    let loans = load_loans(&mut *conn, rows).await?;

    let mut equipment_ids: Vec<Uuid> = loans
        .iter()
        .flat_map(|l| l.lines.iter().map(|line| line.equipment_id.value()))
        .collect();
    equipment_ids.sort();
    equipment_ids.dedup();

    let summaries = fetch_equipment_summaries(&mut *conn, &equipment_ids).await?;

    Ok(loans
        .into_iter()
        .map(|loan| {
            let equipment = loan
                .equipment_ids()
                .into_iter()
                .filter_map(|id| summaries.get(&id.value()).cloned())
                .collect();
            LoanView { loan, equipment }
        })
        .collect())
}

/// LoanQueriesのPostgreSQL実装
///
/// 読み取り専用。ロックは取得しない。
pub struct LoanQueries {
    pool: PgPool,
}

impl LoanQueries {
    /// PostgreSQLコネクションプールから新しいLoanQueriesを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanQueriesTrait for LoanQueries {
    /// 借用者本人の貸出一覧（新しい順）
    async fn find_by_borrower(&self, borrower_id: UserId) -> Result<Vec<LoanView>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            "SELECT {} FROM loans WHERE borrower_id = $1 ORDER BY created_at DESC",
            LOAN_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(borrower_id.value())
            .fetch_all(&mut *conn)
            .await?;

        build_views(&mut conn, &rows).await
    }

    /// 全貸出の一覧（管理者）
    ///
    /// ステータスの部分一致で絞り込み、新しい順にページ分割する。
    async fn list(&self, filter: &LoanListFilter) -> Result<Page<LoanView>> {
        let mut conn = self.pool.acquire().await?;
        let search = filter.status_contains.as_deref();

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM loans
            WHERE $1::TEXT IS NULL OR strpos(status, $1) > 0
            "#,
        )
        .bind(search)
        .fetch_one(&mut *conn)
        .await?
        .get("total");

        let sql = format!(
            r#"
            SELECT {}
            FROM loans
            WHERE $1::TEXT IS NULL OR strpos(status, $1) > 0
            ORDER BY created_at DESC, loan_id
            LIMIT $2 OFFSET $3
            "#,
            LOAN_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(search)
            .bind(i64::from(filter.per_page))
            .bind(filter.offset() as i64)
            .fetch_all(&mut *conn)
            .await?;

        let items = build_views(&mut conn, &rows).await?;

        Ok(Page {
            items,
            current_page: filter.page,
            per_page: filter.per_page,
            total: total.max(0) as u64,
        })
    }

    /// IDで貸出を取得
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("SELECT {} FROM loans WHERE loan_id = $1", LOAN_COLUMNS);
        let rows = sqlx::query(&sql)
            .bind(loan_id.value())
            .fetch_all(&mut *conn)
            .await?;

        let mut views = build_views(&mut conn, &rows).await?;
        Ok(views.pop())
    }
}
