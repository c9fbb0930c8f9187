use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LoanId, LoanStatus, ReturnCondition, UserId};

/// イベント：貸出が申請された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequested {
    pub loan_id: LoanId,
    pub borrower_id: UserId,
    pub start_date: NaiveDate,
    pub planned_return_date: NaiveDate,
    pub line_count: usize,
    pub requested_at: DateTime<Utc>,
}

/// イベント：貸出が承認された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApproved {
    pub loan_id: LoanId,
    pub approved_by: UserId,
    pub approved_at: DateTime<Utc>,
}

/// イベント：貸出が却下された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRejected {
    pub loan_id: LoanId,
    /// 自動却下の場合は`None`
    pub rejected_by: Option<UserId>,
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// イベント：返却が申し出られた
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequested {
    pub loan_id: LoanId,
    pub borrower_id: UserId,
    pub requested_at: DateTime<Utc>,
}

/// イベント：返却が確認された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnConfirmed {
    pub loan_id: LoanId,
    pub received_by: UserId,
    pub final_condition: ReturnCondition,
    pub status: LoanStatus,
    pub returned_on: NaiveDate,
    pub late_days: u32,
    pub total_late_fee: Decimal,
    pub confirmed_at: DateTime<Utc>,
}

/// イベント：貸出記録が削除された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDeleted {
    pub loan_id: LoanId,
    pub deleted_by: UserId,
    pub deleted_at: DateTime<Utc>,
}

/// ドメインイベント統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    LoanRequested(LoanRequested),
    LoanApproved(LoanApproved),
    LoanRejected(LoanRejected),
    ReturnRequested(ReturnRequested),
    ReturnConfirmed(ReturnConfirmed),
    LoanDeleted(LoanDeleted),
}

impl DomainEvent {
    pub fn loan_id(&self) -> LoanId {
        match self {
            DomainEvent::LoanRequested(e) => e.loan_id,
            DomainEvent::LoanApproved(e) => e.loan_id,
            DomainEvent::LoanRejected(e) => e.loan_id,
            DomainEvent::ReturnRequested(e) => e.loan_id,
            DomainEvent::ReturnConfirmed(e) => e.loan_id,
            DomainEvent::LoanDeleted(e) => e.loan_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::LoanRequested(e) => e.requested_at,
            DomainEvent::LoanApproved(e) => e.approved_at,
            DomainEvent::LoanRejected(e) => e.rejected_at,
            DomainEvent::ReturnRequested(e) => e.requested_at,
            DomainEvent::ReturnConfirmed(e) => e.confirmed_at,
            DomainEvent::LoanDeleted(e) => e.deleted_at,
        }
    }
}
