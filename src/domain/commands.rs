use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Actor, EquipmentId, LoanId, Quantity, ReturnCondition};

/// 申請明細：どの備品を何個借りるか
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub equipment_id: EquipmentId,
    pub quantity: Quantity,
}

/// コマンド：貸出を申請する（借用者）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitLoanRequest {
    pub borrower: Actor,
    pub start_date: NaiveDate,
    pub planned_return_date: NaiveDate,
    pub purpose: Option<String>,
    pub lines: Vec<RequestedLine>,
    pub requested_at: DateTime<Utc>,
}

/// コマンド：貸出を承認する（職員）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveLoan {
    pub loan_id: LoanId,
    pub staff: Actor,
    pub condition_before: String,
    pub photo_before: String,
    pub approved_at: DateTime<Utc>,
}

/// コマンド：貸出を却下する（職員）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectLoan {
    pub loan_id: LoanId,
    pub staff: Actor,
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// コマンド：返却を申し出る（借用者本人）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReturn {
    pub loan_id: LoanId,
    pub borrower: Actor,
    pub requested_at: DateTime<Utc>,
}

/// コマンド：返却を確認する（職員）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmReturn {
    pub loan_id: LoanId,
    pub staff: Actor,
    pub final_condition: ReturnCondition,
    pub photo_after: String,
    /// 延滞日数の基準日
    pub today: NaiveDate,
    pub confirmed_at: DateTime<Utc>,
}

/// コマンド：貸出記録を削除する（管理者）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLoan {
    pub loan_id: LoanId,
    pub admin: Actor,
    pub deleted_at: DateTime<Utc>,
}
