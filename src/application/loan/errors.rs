use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{
    ApproveLoanError, ConfirmReturnError, EquipmentId, RejectLoanError, RequestReturnError,
    SubmitLoanError,
};

/// 入力不正の内訳
///
/// API層が利用者向けの文言に変換できるよう、文字列ではなく種類で保持する。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("a loan request needs at least one line item")]
    NoLineItems,
    #[error("planned return date {planned_return_date} must be after start date {start_date}")]
    InvalidPeriod {
        start_date: NaiveDate,
        planned_return_date: NaiveDate,
    },
    #[error("equipment {} appears in more than one line", .0.value())]
    DuplicateEquipment(EquipmentId),
    #[error("equipment {} not found", .0.value())]
    UnknownEquipment(EquipmentId),
    /// 必須の文字列項目が空
    #[error("{0} must not be empty")]
    Required(&'static str),
    #[error("page and per_page must be at least 1")]
    InvalidPage,
}

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum LoanApplicationError {
    /// 入力が不正（明細なし、日付の順序、存在しない備品など）
    #[error("Validation failed: {0}")]
    Validation(InvalidInput),

    /// 申請時・承認時の在庫不足
    #[error("Insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        name: String,
        available: u32,
        requested: u32,
    },

    /// 備品の最大貸出日数を超えている
    #[error("{name} can be borrowed for at most {max_days} day(s)")]
    LoanPeriodExceeded { name: String, max_days: u32 },

    /// 貸出が見つからない
    #[error("Loan not found")]
    LoanNotFound,

    /// 貸出の状態が不正（例: 申請中を期待したが貸出中だった）
    #[error("Invalid loan state: {0}")]
    InvalidLoanState(String),

    /// ドメイン層の整合性エラー（在庫数と貸出記録の矛盾など）
    #[error("Domain error: {0}")]
    DomainError(String),

    /// LendingStoreのエラー
    #[error("Lending store error")]
    StoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// LoanQueriesのエラー
    #[error("Loan query error")]
    QueryError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LoanApplicationError>;

impl From<SubmitLoanError> for LoanApplicationError {
    fn from(e: SubmitLoanError) -> Self {
        match e {
            SubmitLoanError::InsufficientStock {
                name,
                available,
                requested,
                ..
            } => LoanApplicationError::InsufficientStock {
                name,
                available,
                requested,
            },
            SubmitLoanError::LoanPeriodExceeded { name, max_days, .. } => {
                LoanApplicationError::LoanPeriodExceeded { name, max_days }
            }
            SubmitLoanError::NoLineItems => {
                LoanApplicationError::Validation(InvalidInput::NoLineItems)
            }
            SubmitLoanError::InvalidPeriod {
                start_date,
                planned_return_date,
            } => LoanApplicationError::Validation(InvalidInput::InvalidPeriod {
                start_date,
                planned_return_date,
            }),
            SubmitLoanError::DuplicateEquipment(id) => {
                LoanApplicationError::Validation(InvalidInput::DuplicateEquipment(id))
            }
            SubmitLoanError::EquipmentNotFound(id) => {
                LoanApplicationError::Validation(InvalidInput::UnknownEquipment(id))
            }
        }
    }
}

impl From<ApproveLoanError> for LoanApplicationError {
    fn from(e: ApproveLoanError) -> Self {
        match e {
            ApproveLoanError::InvalidState(status) => LoanApplicationError::InvalidLoanState(
                format!("Cannot approve loan in status {}", status.as_str()),
            ),
            ApproveLoanError::InsufficientStock {
                name,
                available,
                requested,
                ..
            } => LoanApplicationError::InsufficientStock {
                name,
                available,
                requested,
            },
            other => LoanApplicationError::DomainError(other.to_string()),
        }
    }
}

impl From<RejectLoanError> for LoanApplicationError {
    fn from(e: RejectLoanError) -> Self {
        match e {
            RejectLoanError::InvalidState(status) => LoanApplicationError::InvalidLoanState(
                format!("Cannot reject loan in status {}", status.as_str()),
            ),
        }
    }
}

impl From<RequestReturnError> for LoanApplicationError {
    fn from(e: RequestReturnError) -> Self {
        match e {
            RequestReturnError::InvalidState(status) => LoanApplicationError::InvalidLoanState(
                format!("Cannot request return of loan in status {}", status.as_str()),
            ),
            // 他人の貸出の存在は明かさない
            RequestReturnError::NotBorrower => LoanApplicationError::InvalidLoanState(
                "Loan is not an active loan of this borrower".to_string(),
            ),
        }
    }
}

impl From<ConfirmReturnError> for LoanApplicationError {
    fn from(e: ConfirmReturnError) -> Self {
        match e {
            ConfirmReturnError::InvalidState(status) => LoanApplicationError::InvalidLoanState(
                format!("Cannot confirm return of loan in status {}", status.as_str()),
            ),
            other => LoanApplicationError::DomainError(other.to_string()),
        }
    }
}
