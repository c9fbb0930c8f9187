use chrono::NaiveDate;
use thiserror::Error;

use super::{EquipmentId, LoanStatus, StockError};

/// 貸出申請のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitLoanError {
    /// 明細が1件もない
    #[error("a loan request needs at least one line item")]
    NoLineItems,
    /// 返却予定日が開始日より後でない
    #[error("planned return date {planned_return_date} must be after start date {start_date}")]
    InvalidPeriod {
        start_date: NaiveDate,
        planned_return_date: NaiveDate,
    },
    /// 同じ備品が複数の明細に現れた
    #[error("equipment {} appears in more than one line", .0.value())]
    DuplicateEquipment(EquipmentId),
    /// 備品が存在しない
    #[error("equipment {} not found", .0.value())]
    EquipmentNotFound(EquipmentId),
    /// 在庫不足（申請中の需要を差し引いた後）
    #[error("insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        equipment_id: EquipmentId,
        name: String,
        available: u32,
        requested: u32,
    },
    /// 備品ごとの最大貸出日数を超えた
    #[error("{name} can be borrowed for at most {max_days} day(s), {requested_days} requested")]
    LoanPeriodExceeded {
        equipment_id: EquipmentId,
        name: String,
        max_days: u32,
        requested_days: i64,
    },
}

/// 承認のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApproveLoanError {
    /// 申請中でない
    #[error("cannot approve a loan in status {}", .0.as_str())]
    InvalidState(LoanStatus),
    /// 明細の備品が見つからない
    #[error("equipment {} not found", .0.value())]
    EquipmentNotFound(EquipmentId),
    /// 承認時点で在庫不足
    #[error("insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        equipment_id: EquipmentId,
        name: String,
        available: u32,
        requested: u32,
    },
}

/// 却下のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectLoanError {
    /// 申請中でない
    #[error("cannot reject a loan in status {}", .0.as_str())]
    InvalidState(LoanStatus),
}

/// 返却申出のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestReturnError {
    /// 貸出中でない
    #[error("cannot request return of a loan in status {}", .0.as_str())]
    InvalidState(LoanStatus),
    /// 本人の貸出ではない
    #[error("loan belongs to another borrower")]
    NotBorrower,
}

/// 返却確認のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmReturnError {
    /// 返却確認待ちでない
    #[error("cannot confirm return of a loan in status {}", .0.as_str())]
    InvalidState(LoanStatus),
    /// 明細の備品が見つからない
    #[error("equipment {} not found", .0.value())]
    EquipmentNotFound(EquipmentId),
    /// 在庫数が貸出記録と矛盾している
    #[error("stock of equipment {} is inconsistent: {source}", .equipment_id.value())]
    Stock {
        equipment_id: EquipmentId,
        #[source]
        source: StockError,
    },
}
