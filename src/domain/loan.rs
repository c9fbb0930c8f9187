use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    ApproveLoan, ApproveLoanError, ConfirmReturn, ConfirmReturnError, Equipment, EquipmentId,
    LoanApproved, LoanId, LoanLineId, LoanRejected, LoanRequested, Quantity, RejectLoan,
    RejectLoanError, RequestReturn, RequestReturnError, ReturnConfirmed, ReturnRequested,
    SubmitLoanError, SubmitLoanRequest, UserId, late_fee,
};

/// 自動却下の理由
pub const AUTO_REJECTION_REASON: &str = "automatically rejected: start date passed";

/// 貸出ステータス
///
/// 状態遷移：
/// `Requested → {Rejected | Active} → PendingReturnConfirmation → {Returned | ReturnedDamaged}`
///
/// `Rejected`、`Returned`、`ReturnedDamaged`は終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// 申請中
    Requested,
    /// 却下
    Rejected,
    /// 貸出中
    Active,
    /// 返却確認待ち
    PendingReturnConfirmation,
    /// 返却済み（良好）
    Returned,
    /// 返却済み（損傷）
    ReturnedDamaged,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 6] = [
        LoanStatus::Requested,
        LoanStatus::Rejected,
        LoanStatus::Active,
        LoanStatus::PendingReturnConfirmation,
        LoanStatus::Returned,
        LoanStatus::ReturnedDamaged,
    ];

    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Active => "active",
            LoanStatus::PendingReturnConfirmation => "pending_return_confirmation",
            LoanStatus::Returned => "returned",
            LoanStatus::ReturnedDamaged => "returned_damaged",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoanStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid loan status: {}", s))
    }
}

/// 返却時の最終状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnCondition {
    Good,
    Damaged,
}

impl ReturnCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnCondition::Good => "good",
            ReturnCondition::Damaged => "damaged",
        }
    }
}

impl std::str::FromStr for ReturnCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(ReturnCondition::Good),
            "damaged" => Ok(ReturnCondition::Damaged),
            _ => Err(format!("Invalid return condition: {}", s)),
        }
    }
}

/// 貸出明細
///
/// 貸出記録と同時に作成され、延滞料金以外は変更されない。
/// 延滞料金は返却確認時に一度だけ設定される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanLine {
    pub line_id: LoanLineId,
    pub equipment_id: EquipmentId,
    pub quantity: Quantity,
    pub late_fee: Option<Decimal>,
}

/// Loan集約 - 1回の借用申請とその明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    // 識別子
    pub loan_id: LoanId,

    // 関係者（IDのみ）
    pub borrower_id: UserId,
    pub approver_id: Option<UserId>,
    pub receiver_id: Option<UserId>,

    // 期間
    pub start_date: NaiveDate,
    pub planned_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub return_requested_at: Option<DateTime<Utc>>,

    pub status: LoanStatus,

    // 状態記録
    pub condition_before: Option<String>,
    pub photo_before: Option<String>,
    pub final_condition: Option<ReturnCondition>,
    pub photo_after: Option<String>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,

    pub lines: Vec<LoanLine>,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// 明細の延滞料金合計（未確定の明細は0として扱う）
    pub fn total_late_fee(&self) -> Decimal {
        self.lines
            .iter()
            .filter_map(|line| line.late_fee)
            .sum()
    }

    /// 明細が参照する備品ID（重複なし・昇順）
    ///
    /// 行ロックはこの順序で取得する。
    pub fn equipment_ids(&self) -> Vec<EquipmentId> {
        let mut ids: Vec<EquipmentId> = self.lines.iter().map(|l| l.equipment_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// 申請時の在庫照会結果
///
/// `pending`は他の申請中記録がすでに求めている数量の合計。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentAvailability {
    pub equipment: Equipment,
    pub pending: u32,
}

impl EquipmentAvailability {
    /// 新たな申請に割り当て可能な数
    pub fn unclaimed(&self) -> u32 {
        self.equipment.stock.available().saturating_sub(self.pending)
    }
}

/// 純粋関数：貸出を申請する
///
/// ビジネスルール：
/// - 明細は1件以上
/// - 返却予定日は開始日より後
/// - 同じ備品を複数明細に分けない
/// - 各備品について：存在する、割り当て可能数 ≥ 数量、貸出日数 ≤ 最大貸出日数
///
/// いずれかの明細が失敗すれば申請全体が失敗する（全か無か）。
/// 在庫数は変更しない。副作用なし。新しいLoanとイベントを返す。
pub fn submit_request(
    cmd: &SubmitLoanRequest,
    availability: &[EquipmentAvailability],
) -> Result<(Loan, LoanRequested), SubmitLoanError> {
    if cmd.lines.is_empty() {
        return Err(SubmitLoanError::NoLineItems);
    }

    if cmd.planned_return_date <= cmd.start_date {
        return Err(SubmitLoanError::InvalidPeriod {
            start_date: cmd.start_date,
            planned_return_date: cmd.planned_return_date,
        });
    }

    let mut seen = HashSet::new();
    for line in &cmd.lines {
        if !seen.insert(line.equipment_id) {
            return Err(SubmitLoanError::DuplicateEquipment(line.equipment_id));
        }
    }

    let requested_days = (cmd.planned_return_date - cmd.start_date).num_days();

    for line in &cmd.lines {
        let entry = availability
            .iter()
            .find(|a| a.equipment.equipment_id == line.equipment_id)
            .ok_or(SubmitLoanError::EquipmentNotFound(line.equipment_id))?;

        let unclaimed = entry.unclaimed();
        if unclaimed < line.quantity.value() {
            return Err(SubmitLoanError::InsufficientStock {
                equipment_id: line.equipment_id,
                name: entry.equipment.name.clone(),
                available: unclaimed,
                requested: line.quantity.value(),
            });
        }

        if requested_days > i64::from(entry.equipment.max_loan_days) {
            return Err(SubmitLoanError::LoanPeriodExceeded {
                equipment_id: line.equipment_id,
                name: entry.equipment.name.clone(),
                max_days: entry.equipment.max_loan_days,
                requested_days,
            });
        }
    }

    let loan_id = LoanId::new();
    let lines: Vec<LoanLine> = cmd
        .lines
        .iter()
        .map(|line| LoanLine {
            line_id: LoanLineId::new(),
            equipment_id: line.equipment_id,
            quantity: line.quantity,
            late_fee: None,
        })
        .collect();

    let loan = Loan {
        loan_id,
        borrower_id: cmd.borrower.user_id,
        approver_id: None,
        receiver_id: None,
        start_date: cmd.start_date,
        planned_return_date: cmd.planned_return_date,
        actual_return_date: None,
        return_requested_at: None,
        status: LoanStatus::Requested,
        condition_before: None,
        photo_before: None,
        final_condition: None,
        photo_after: None,
        notes: cmd.purpose.clone(),
        rejection_reason: None,
        lines,
        created_at: cmd.requested_at,
        updated_at: cmd.requested_at,
    };

    let event = LoanRequested {
        loan_id,
        borrower_id: cmd.borrower.user_id,
        start_date: cmd.start_date,
        planned_return_date: cmd.planned_return_date,
        line_count: loan.lines.len(),
        requested_at: cmd.requested_at,
    };

    Ok((loan, event))
}

/// 純粋関数：貸出を承認する
///
/// ビジネスルール：
/// - 申請中の記録のみ承認できる
/// - 明細ごとに在庫を再確認する（申請後に在庫が変わっている可能性がある）
/// - 1件でも不足すれば在庫は一切変更しない（全か無か）
/// - 成功時：各備品の貸出可能数を減らし、貸出中数を増やす
///
/// 副作用なし。新しいLoan、更新後の備品（ID昇順）、イベントを返す。
pub fn approve(
    loan: &Loan,
    equipment: &[Equipment],
    cmd: &ApproveLoan,
) -> Result<(Loan, Vec<Equipment>, LoanApproved), ApproveLoanError> {
    if loan.status != LoanStatus::Requested {
        return Err(ApproveLoanError::InvalidState(loan.status));
    }

    let mut working: BTreeMap<EquipmentId, Equipment> = equipment
        .iter()
        .map(|e| (e.equipment_id, e.clone()))
        .collect();

    for line in &loan.lines {
        let item = working
            .get_mut(&line.equipment_id)
            .ok_or(ApproveLoanError::EquipmentNotFound(line.equipment_id))?;

        let available = item.stock.available();
        item.stock = item
            .stock
            .lend(line.quantity)
            .map_err(|_| ApproveLoanError::InsufficientStock {
                equipment_id: line.equipment_id,
                name: item.name.clone(),
                available,
                requested: line.quantity.value(),
            })?;
    }

    let touched: HashSet<EquipmentId> = loan.lines.iter().map(|l| l.equipment_id).collect();
    let updated_equipment: Vec<Equipment> = working
        .into_values()
        .filter(|e| touched.contains(&e.equipment_id))
        .collect();

    let new_loan = Loan {
        status: LoanStatus::Active,
        approver_id: Some(cmd.staff.user_id),
        condition_before: Some(cmd.condition_before.clone()),
        photo_before: Some(cmd.photo_before.clone()),
        updated_at: cmd.approved_at,
        ..loan.clone()
    };

    let event = LoanApproved {
        loan_id: loan.loan_id,
        approved_by: cmd.staff.user_id,
        approved_at: cmd.approved_at,
    };

    Ok((new_loan, updated_equipment, event))
}

/// 純粋関数：貸出を却下する
///
/// ビジネスルール：
/// - 申請中の記録のみ却下できる
/// - 申請時に在庫を確保していないので在庫の変更はない
pub fn reject(loan: &Loan, cmd: &RejectLoan) -> Result<(Loan, LoanRejected), RejectLoanError> {
    if loan.status != LoanStatus::Requested {
        return Err(RejectLoanError::InvalidState(loan.status));
    }

    let new_loan = Loan {
        status: LoanStatus::Rejected,
        approver_id: Some(cmd.staff.user_id),
        rejection_reason: Some(cmd.reason.clone()),
        updated_at: cmd.rejected_at,
        ..loan.clone()
    };

    let event = LoanRejected {
        loan_id: loan.loan_id,
        rejected_by: Some(cmd.staff.user_id),
        reason: cmd.reason.clone(),
        rejected_at: cmd.rejected_at,
    };

    Ok((new_loan, event))
}

/// 純粋関数：申請が放置されたまま開始日を過ぎたか
pub fn is_stale(loan: &Loan, today: NaiveDate) -> bool {
    loan.status == LoanStatus::Requested && loan.start_date < today
}

/// 純粋関数：開始日を過ぎた申請を自動却下する
///
/// 対象外（申請中でない、または開始日が今日以降）の場合は`None`。
/// 二度目の実行では対象が残っていないため冪等。
pub fn auto_reject(
    loan: &Loan,
    today: NaiveDate,
    rejected_at: DateTime<Utc>,
) -> Option<(Loan, LoanRejected)> {
    if !is_stale(loan, today) {
        return None;
    }

    let new_loan = Loan {
        status: LoanStatus::Rejected,
        rejection_reason: Some(AUTO_REJECTION_REASON.to_string()),
        updated_at: rejected_at,
        ..loan.clone()
    };

    let event = LoanRejected {
        loan_id: loan.loan_id,
        rejected_by: None,
        reason: AUTO_REJECTION_REASON.to_string(),
        rejected_at,
    };

    Some((new_loan, event))
}

/// 純粋関数：返却を申し出る
///
/// ビジネスルール：
/// - 貸出中の記録のみ
/// - 借用者本人のみ
pub fn request_return(
    loan: &Loan,
    cmd: &RequestReturn,
) -> Result<(Loan, ReturnRequested), RequestReturnError> {
    if loan.status != LoanStatus::Active {
        return Err(RequestReturnError::InvalidState(loan.status));
    }

    if loan.borrower_id != cmd.borrower.user_id {
        return Err(RequestReturnError::NotBorrower);
    }

    let new_loan = Loan {
        status: LoanStatus::PendingReturnConfirmation,
        return_requested_at: Some(cmd.requested_at),
        updated_at: cmd.requested_at,
        ..loan.clone()
    };

    let event = ReturnRequested {
        loan_id: loan.loan_id,
        borrower_id: loan.borrower_id,
        requested_at: cmd.requested_at,
    };

    Ok((new_loan, event))
}

/// 純粋関数：返却を確認する
///
/// ビジネスルール：
/// - 返却確認待ちの記録のみ
/// - 延滞日数 = max(0, 今日 − 返却予定日)
/// - 明細ごとの延滞料金 = 延滞日数 × (単価 × 0.001) × 数量
/// - 貸出中数は常に数量分減る
/// - 良好なら貸出可能数に戻し、損傷なら流通から外す（在庫補正は在庫管理の責務）
///
/// 副作用なし。新しいLoan、更新後の備品（ID昇順）、イベントを返す。
pub fn confirm_return(
    loan: &Loan,
    equipment: &[Equipment],
    cmd: &ConfirmReturn,
) -> Result<(Loan, Vec<Equipment>, ReturnConfirmed), ConfirmReturnError> {
    if loan.status != LoanStatus::PendingReturnConfirmation {
        return Err(ConfirmReturnError::InvalidState(loan.status));
    }

    let days_late = late_fee::late_days(loan.planned_return_date, cmd.today);
    let restock = cmd.final_condition == ReturnCondition::Good;

    let mut working: BTreeMap<EquipmentId, Equipment> = equipment
        .iter()
        .map(|e| (e.equipment_id, e.clone()))
        .collect();

    let mut lines = Vec::with_capacity(loan.lines.len());
    for line in &loan.lines {
        let item = working
            .get_mut(&line.equipment_id)
            .ok_or(ConfirmReturnError::EquipmentNotFound(line.equipment_id))?;

        let fee = late_fee::late_fee(item.unit_price, line.quantity, days_late);

        item.stock = item
            .stock
            .take_back(line.quantity, restock)
            .map_err(|source| ConfirmReturnError::Stock {
                equipment_id: line.equipment_id,
                source,
            })?;

        lines.push(LoanLine {
            late_fee: Some(fee),
            ..line.clone()
        });
    }

    let touched: HashSet<EquipmentId> = loan.lines.iter().map(|l| l.equipment_id).collect();
    let updated_equipment: Vec<Equipment> = working
        .into_values()
        .filter(|e| touched.contains(&e.equipment_id))
        .collect();

    let status = if restock {
        LoanStatus::Returned
    } else {
        LoanStatus::ReturnedDamaged
    };

    let new_loan = Loan {
        status,
        receiver_id: Some(cmd.staff.user_id),
        actual_return_date: Some(cmd.today),
        final_condition: Some(cmd.final_condition),
        photo_after: Some(cmd.photo_after.clone()),
        lines,
        updated_at: cmd.confirmed_at,
        ..loan.clone()
    };

    let event = ReturnConfirmed {
        loan_id: loan.loan_id,
        received_by: cmd.staff.user_id,
        final_condition: cmd.final_condition,
        status,
        returned_on: cmd.today,
        late_days: days_late,
        total_late_fee: new_loan.total_late_fee(),
        confirmed_at: cmd.confirmed_at,
    };

    Ok((new_loan, updated_equipment, event))
}
