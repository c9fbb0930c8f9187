use crate::domain::{Equipment, EquipmentId, Loan, LoanId};
use crate::ports::lending_store::{LendingStore as LendingStoreTrait, LendingTransaction, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::rows::{EQUIPMENT_COLUMNS, LOAN_COLUMNS, invalid_data, load_loans, map_equipment_row};

/// LendingStoreのPostgreSQL実装
///
/// ライフサイクル操作1回につきsqlxトランザクションを1つ使う。
/// 行ロックは`SELECT ... FOR UPDATE`で取得し、コミットまたはロールバックで解放される。
pub struct LendingStore {
    pool: PgPool,
}

impl LendingStore {
    /// PostgreSQLコネクションプールから新しいLendingStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLendingTransaction { tx }))
    }
}

/// 破棄時はsqlxがロールバックする
struct PgLendingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LendingTransaction for PgLendingTransaction {
    /// 備品行をID昇順にロック
    ///
    /// すべての操作が同じ順序でロックするため、ロック順序によるデッドロックは起きない。
    async fn lock_equipment(&mut self, ids: &[EquipmentId]) -> Result<Vec<Equipment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let uuids: Vec<Uuid> = ids.iter().map(|id| id.value()).collect();
        let sql = format!(
            "SELECT {} FROM equipment WHERE equipment_id = ANY($1) ORDER BY equipment_id FOR UPDATE",
            EQUIPMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&uuids)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(map_equipment_row).collect()
    }

    /// 申請中の記録の要求数量を合計
    ///
    /// 呼び出し時点で対象の備品行はロック済みのため、
    /// 同じ備品への並行申請はこの集計の前で待たされる。
    async fn pending_quantities(
        &mut self,
        ids: &[EquipmentId],
    ) -> Result<HashMap<EquipmentId, u32>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let uuids: Vec<Uuid> = ids.iter().map(|id| id.value()).collect();
        let rows = sqlx::query(
            r#"
            SELECT ll.equipment_id, SUM(ll.quantity)::BIGINT AS pending
            FROM loan_lines ll
            JOIN loans l ON l.loan_id = ll.loan_id
            WHERE l.status = 'requested' AND ll.equipment_id = ANY($1)
            GROUP BY ll.equipment_id
            "#,
        )
        .bind(&uuids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut pending = HashMap::new();
        for row in &rows {
            let total: i64 = row.get("pending");
            let total = u32::try_from(total)
                .map_err(|_| invalid_data(format!("pending quantity out of range: {}", total)))?;
            pending.insert(EquipmentId::from_uuid(row.get("equipment_id")), total);
        }
        Ok(pending)
    }

    async fn lock_loan(&mut self, loan_id: LoanId) -> Result<Option<Loan>> {
        let sql = format!("SELECT {} FROM loans WHERE loan_id = $1 FOR UPDATE", LOAN_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(loan_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut loans = load_loans(&mut *self.tx, std::slice::from_ref(&row)).await?;
        Ok(loans.pop())
    }

    async fn lock_stale_requests(&mut self, today: NaiveDate) -> Result<Vec<Loan>> {
        let sql = format!(
            "SELECT {} FROM loans WHERE status = 'requested' AND start_date < $1 ORDER BY loan_id FOR UPDATE",
            LOAN_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(today)
            .fetch_all(&mut *self.tx)
            .await?;

        load_loans(&mut *self.tx, &rows).await
    }

    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                loan_id,
                borrower_id,
                approver_id,
                receiver_id,
                start_date,
                planned_return_date,
                actual_return_date,
                return_requested_at,
                status,
                condition_before,
                photo_before,
                final_condition,
                photo_after,
                notes,
                rejection_reason,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.borrower_id.value())
        .bind(loan.approver_id.map(|id| id.value()))
        .bind(loan.receiver_id.map(|id| id.value()))
        .bind(loan.start_date)
        .bind(loan.planned_return_date)
        .bind(loan.actual_return_date)
        .bind(loan.return_requested_at)
        .bind(loan.status.as_str())
        .bind(loan.condition_before.as_deref())
        .bind(loan.photo_before.as_deref())
        .bind(loan.final_condition.map(|c| c.as_str()))
        .bind(loan.photo_after.as_deref())
        .bind(loan.notes.as_deref())
        .bind(loan.rejection_reason.as_deref())
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, line) in loan.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO loan_lines (line_id, loan_id, equipment_id, position, quantity, late_fee)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.line_id.value())
            .bind(loan.loan_id.value())
            .bind(line.equipment_id.value())
            .bind(position as i32)
            .bind(line.quantity.value() as i32)
            .bind(line.late_fee)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    /// 状態遷移で変わる列と明細の延滞料金のみ更新する
    async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans SET
                approver_id = $2,
                receiver_id = $3,
                actual_return_date = $4,
                return_requested_at = $5,
                status = $6,
                condition_before = $7,
                photo_before = $8,
                final_condition = $9,
                photo_after = $10,
                rejection_reason = $11,
                updated_at = $12
            WHERE loan_id = $1
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.approver_id.map(|id| id.value()))
        .bind(loan.receiver_id.map(|id| id.value()))
        .bind(loan.actual_return_date)
        .bind(loan.return_requested_at)
        .bind(loan.status.as_str())
        .bind(loan.condition_before.as_deref())
        .bind(loan.photo_before.as_deref())
        .bind(loan.final_condition.map(|c| c.as_str()))
        .bind(loan.photo_after.as_deref())
        .bind(loan.rejection_reason.as_deref())
        .bind(loan.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("loan {} not found", loan.loan_id.value()).into());
        }

        for line in &loan.lines {
            sqlx::query("UPDATE loan_lines SET late_fee = $2 WHERE line_id = $1")
                .bind(line.line_id.value())
                .bind(line.late_fee)
                .execute(&mut *self.tx)
                .await?;
        }

        Ok(())
    }

    async fn update_stock(&mut self, equipment: &[Equipment]) -> Result<()> {
        for item in equipment {
            let result = sqlx::query(
                r#"
                UPDATE equipment SET
                    units_available = $2,
                    units_loaned = $3,
                    updated_at = NOW()
                WHERE equipment_id = $1
                "#,
            )
            .bind(item.equipment_id.value())
            .bind(item.stock.available() as i32)
            .bind(item.stock.loaned() as i32)
            .execute(&mut *self.tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(format!("equipment {} not found", item.equipment_id.value()).into());
            }
        }
        Ok(())
    }

    /// 明細は外部キーのCASCADEで削除される
    async fn delete_loan(&mut self, loan_id: LoanId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM loans WHERE loan_id = $1")
            .bind(loan_id.value())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
