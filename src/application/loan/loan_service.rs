use crate::domain::{self, DomainEvent, LoanDeleted, ReturnCondition, commands::*, value_objects::*};
use crate::ports::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::activity;
use super::errors::{InvalidInput, LoanApplicationError, Result};

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、各ユースケース関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub lending_store: Arc<dyn LendingStore>,
    pub loan_queries: Arc<dyn LoanQueries>,
    pub activity_log: Arc<dyn ActivityLog>,
}

/// 返却確認の結果
#[derive(Debug, Clone)]
pub struct ReturnReceipt {
    pub loan: domain::Loan,
    pub late_days: u32,
    pub total_late_fee: Decimal,
}

fn require_text(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LoanApplicationError::Validation(InvalidInput::Required(field)));
    }
    Ok(())
}

async fn begin(deps: &ServiceDependencies) -> Result<Box<dyn LendingTransaction>> {
    deps.lending_store
        .begin()
        .await
        .map_err(LoanApplicationError::StoreError)
}

/// 貸出記録をロックして読み込むヘルパー関数
///
/// 存在しない記録への遷移は状態不正として扱う。
async fn lock_loan(tx: &mut Box<dyn LendingTransaction>, loan_id: LoanId) -> Result<domain::Loan> {
    tx.lock_loan(loan_id)
        .await
        .map_err(LoanApplicationError::StoreError)?
        .ok_or_else(|| {
            LoanApplicationError::InvalidLoanState(format!(
                "Loan {} does not exist",
                loan_id.value()
            ))
        })
}

/// 貸出を申請する
///
/// ビジネスルール：
/// - 明細の備品をID昇順でロックし、ロック中に在庫を確認する
/// - 割り当て可能数 = 貸出可能数 − 他の申請中記録の要求数
/// - 在庫数は変更しない（承認時に移動する）
///
/// # 戻り値
/// 作成された申請中の貸出記録
pub async fn submit_loan_request(
    deps: &ServiceDependencies,
    cmd: SubmitLoanRequest,
) -> Result<domain::Loan> {
    // 1. 明細の備品をロック（ID昇順）
    let ids: Vec<EquipmentId> = cmd
        .lines
        .iter()
        .map(|line| line.equipment_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut tx = begin(deps).await?;

    let equipment = tx
        .lock_equipment(&ids)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    let pending = tx
        .pending_quantities(&ids)
        .await
        .map_err(LoanApplicationError::StoreError)?;

    let availability: Vec<domain::EquipmentAvailability> = equipment
        .into_iter()
        .map(|e| {
            let pending = pending.get(&e.equipment_id).copied().unwrap_or(0);
            domain::EquipmentAvailability {
                equipment: e,
                pending,
            }
        })
        .collect();

    // 2. ドメイン層の純粋関数を呼び出し
    let (loan, event) = domain::submit_request(&cmd, &availability)?;

    // 3. 保存してコミット
    tx.insert_loan(&loan)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    tx.commit().await.map_err(LoanApplicationError::StoreError)?;

    tracing::info!(
        loan_id = %loan.loan_id.value(),
        borrower_id = %cmd.borrower.user_id.value(),
        lines = loan.lines.len(),
        "Loan requested"
    );

    activity::record_event(
        &deps.activity_log,
        Some(cmd.borrower.user_id),
        &cmd.borrower.name,
        &DomainEvent::LoanRequested(event),
    )
    .await;

    Ok(loan)
}

/// 貸出を承認する
///
/// ビジネスルール：
/// - 申請中の記録のみ
/// - 各明細の在庫を再確認し、1件でも不足すれば在庫は一切変更しない
/// - 成功時は貸出可能数から貸出中数へ移す
pub async fn approve_loan(deps: &ServiceDependencies, cmd: ApproveLoan) -> Result<domain::Loan> {
    require_text(&cmd.condition_before, "condition_before")?;
    require_text(&cmd.photo_before, "photo_before")?;

    let mut tx = begin(deps).await?;

    // 1. 貸出記録 → 備品の順でロック
    let loan = lock_loan(&mut tx, cmd.loan_id).await?;
    let equipment = tx
        .lock_equipment(&loan.equipment_ids())
        .await
        .map_err(LoanApplicationError::StoreError)?;

    // 2. ドメイン層の純粋関数を呼び出し
    let (approved, updated_equipment, event) = domain::approve(&loan, &equipment, &cmd)?;

    // 3. 在庫と記録を保存してコミット
    tx.update_stock(&updated_equipment)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    tx.update_loan(&approved)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    tx.commit().await.map_err(LoanApplicationError::StoreError)?;

    tracing::info!(
        loan_id = %approved.loan_id.value(),
        staff_id = %cmd.staff.user_id.value(),
        "Loan approved"
    );

    activity::record_event(
        &deps.activity_log,
        Some(cmd.staff.user_id),
        &cmd.staff.name,
        &DomainEvent::LoanApproved(event),
    )
    .await;

    Ok(approved)
}

/// 貸出を却下する
///
/// ビジネスルール：
/// - 申請中の記録のみ
/// - 却下理由は必須
/// - 在庫の変更はない
pub async fn reject_loan(deps: &ServiceDependencies, cmd: RejectLoan) -> Result<domain::Loan> {
    require_text(&cmd.reason, "reason")?;

    let mut tx = begin(deps).await?;
    let loan = lock_loan(&mut tx, cmd.loan_id).await?;

    let (rejected, event) = domain::reject(&loan, &cmd)?;

    tx.update_loan(&rejected)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    tx.commit().await.map_err(LoanApplicationError::StoreError)?;

    tracing::info!(
        loan_id = %rejected.loan_id.value(),
        staff_id = %cmd.staff.user_id.value(),
        "Loan rejected"
    );

    activity::record_event(
        &deps.activity_log,
        Some(cmd.staff.user_id),
        &cmd.staff.name,
        &DomainEvent::LoanRejected(event),
    )
    .await;

    Ok(rejected)
}

/// 返却を申し出る
///
/// ビジネスルール：
/// - 貸出中の記録のみ
/// - 借用者本人のみ（他人の記録は状態不正として扱う）
pub async fn request_return(
    deps: &ServiceDependencies,
    cmd: RequestReturn,
) -> Result<domain::Loan> {
    let mut tx = begin(deps).await?;
    let loan = lock_loan(&mut tx, cmd.loan_id).await?;

    let (pending, event) = domain::request_return(&loan, &cmd)?;

    tx.update_loan(&pending)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    tx.commit().await.map_err(LoanApplicationError::StoreError)?;

    tracing::info!(
        loan_id = %pending.loan_id.value(),
        borrower_id = %cmd.borrower.user_id.value(),
        "Return requested"
    );

    activity::record_event(
        &deps.activity_log,
        Some(cmd.borrower.user_id),
        &cmd.borrower.name,
        &DomainEvent::ReturnRequested(event),
    )
    .await;

    Ok(pending)
}

/// 返却を確認する
///
/// ビジネスルール：
/// - 返却確認待ちの記録のみ
/// - 明細ごとに延滞料金を確定する
/// - 良好なら在庫に戻し、損傷なら流通から外す
///
/// # 戻り値
/// 更新後の記録、延滞日数、延滞料金合計
pub async fn confirm_return(
    deps: &ServiceDependencies,
    cmd: ConfirmReturn,
) -> Result<ReturnReceipt> {
    require_text(&cmd.photo_after, "photo_after")?;

    let mut tx = begin(deps).await?;

    // 1. 貸出記録 → 備品の順でロック
    let loan = lock_loan(&mut tx, cmd.loan_id).await?;
    let equipment = tx
        .lock_equipment(&loan.equipment_ids())
        .await
        .map_err(LoanApplicationError::StoreError)?;

    // 2. ドメイン層の純粋関数を呼び出し
    let (returned, updated_equipment, event) = domain::confirm_return(&loan, &equipment, &cmd)?;

    // 3. 在庫と記録を保存してコミット
    tx.update_stock(&updated_equipment)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    tx.update_loan(&returned)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    tx.commit().await.map_err(LoanApplicationError::StoreError)?;

    if cmd.final_condition == ReturnCondition::Damaged {
        for line in &returned.lines {
            tracing::warn!(
                loan_id = %returned.loan_id.value(),
                equipment_id = %line.equipment_id.value(),
                quantity = line.quantity.value(),
                "Damaged units removed from circulation"
            );
        }
    }

    tracing::info!(
        loan_id = %returned.loan_id.value(),
        status = returned.status.as_str(),
        late_days = event.late_days,
        total_late_fee = %event.total_late_fee,
        "Return confirmed"
    );

    let receipt = ReturnReceipt {
        late_days: event.late_days,
        total_late_fee: event.total_late_fee,
        loan: returned,
    };

    activity::record_event(
        &deps.activity_log,
        Some(cmd.staff.user_id),
        &cmd.staff.name,
        &DomainEvent::ReturnConfirmed(event),
    )
    .await;

    Ok(receipt)
}

/// 貸出記録を削除する（管理者）
///
/// 状態に関係なく削除する。在庫は変更しない。
pub async fn delete_loan(deps: &ServiceDependencies, cmd: DeleteLoan) -> Result<()> {
    let mut tx = begin(deps).await?;

    let deleted = tx
        .delete_loan(cmd.loan_id)
        .await
        .map_err(LoanApplicationError::StoreError)?;
    if !deleted {
        return Err(LoanApplicationError::LoanNotFound);
    }
    tx.commit().await.map_err(LoanApplicationError::StoreError)?;

    tracing::info!(
        loan_id = %cmd.loan_id.value(),
        admin_id = %cmd.admin.user_id.value(),
        "Loan deleted"
    );

    let event = LoanDeleted {
        loan_id: cmd.loan_id,
        deleted_by: cmd.admin.user_id,
        deleted_at: cmd.deleted_at,
    };
    activity::record_event(
        &deps.activity_log,
        Some(cmd.admin.user_id),
        &cmd.admin.name,
        &DomainEvent::LoanDeleted(event),
    )
    .await;

    Ok(())
}

/// 借用者本人の貸出一覧
pub async fn list_borrower_loans(
    deps: &ServiceDependencies,
    borrower_id: UserId,
) -> Result<Vec<LoanView>> {
    deps.loan_queries
        .find_by_borrower(borrower_id)
        .await
        .map_err(LoanApplicationError::QueryError)
}

/// 全貸出の一覧（管理者）
pub async fn list_loans(deps: &ServiceDependencies, filter: LoanListFilter) -> Result<Page<LoanView>> {
    if filter.page == 0 || filter.per_page == 0 {
        return Err(LoanApplicationError::Validation(InvalidInput::InvalidPage));
    }

    deps.loan_queries
        .list(&filter)
        .await
        .map_err(LoanApplicationError::QueryError)
}
