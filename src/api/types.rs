use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Actor, ApproveLoan, ConfirmReturn, EquipmentId, LoanId, Quantity, RejectLoan,
    RequestedLine, ReturnCondition, SubmitLoanRequest,
};
use crate::ports::{LoanView, Page};

use super::error::ApiError;

// ============================================================================
// Requests
// ============================================================================

/// 申請明細
#[derive(Debug, Deserialize)]
pub struct LoanLineRequest {
    pub equipment_id: Uuid,
    pub quantity: u32,
}

/// POST /peminjaman
#[derive(Debug, Deserialize)]
pub struct SubmitLoanBody {
    pub start_date: NaiveDate,
    pub planned_return_date: NaiveDate,
    #[serde(default)]
    pub purpose: Option<String>,
    pub items: Vec<LoanLineRequest>,
}

impl SubmitLoanBody {
    pub fn into_command(
        self,
        borrower: Actor,
        requested_at: DateTime<Utc>,
    ) -> Result<SubmitLoanRequest, ApiError> {
        let lines = self
            .items
            .into_iter()
            .map(|item| {
                Quantity::try_from(item.quantity)
                    .map(|quantity| RequestedLine {
                        equipment_id: EquipmentId::from_uuid(item.equipment_id),
                        quantity,
                    })
                    .map_err(|_| ApiError::InvalidRequest("jumlah alat minimal 1".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SubmitLoanRequest {
            borrower,
            start_date: self.start_date,
            planned_return_date: self.planned_return_date,
            purpose: self.purpose.filter(|p| !p.trim().is_empty()),
            lines,
            requested_at,
        })
    }
}

/// POST /peminjaman/:id/setujui
#[derive(Debug, Deserialize)]
pub struct ApproveLoanBody {
    pub condition_before: String,
    pub photo_before: String,
}

impl ApproveLoanBody {
    pub fn into_command(self, loan_id: Uuid, staff: Actor, now: DateTime<Utc>) -> ApproveLoan {
        ApproveLoan {
            loan_id: LoanId::from_uuid(loan_id),
            staff,
            condition_before: self.condition_before,
            photo_before: self.photo_before,
            approved_at: now,
        }
    }
}

/// POST /peminjaman/:id/tolak
#[derive(Debug, Deserialize)]
pub struct RejectLoanBody {
    pub reason: String,
}

impl RejectLoanBody {
    pub fn into_command(self, loan_id: Uuid, staff: Actor, now: DateTime<Utc>) -> RejectLoan {
        RejectLoan {
            loan_id: LoanId::from_uuid(loan_id),
            staff,
            reason: self.reason,
            rejected_at: now,
        }
    }
}

/// POST /peminjaman/:id/konfirmasi_pengembalian
#[derive(Debug, Deserialize)]
pub struct ConfirmReturnBody {
    pub final_condition: ReturnCondition,
    pub photo_after: String,
}

impl ConfirmReturnBody {
    pub fn into_command(self, loan_id: Uuid, staff: Actor, now: DateTime<Utc>) -> ConfirmReturn {
        ConfirmReturn {
            loan_id: LoanId::from_uuid(loan_id),
            staff,
            final_condition: self.final_condition,
            photo_after: self.photo_after,
            today: now.date_naive(),
            confirmed_at: now,
        }
    }
}

/// GET /peminjaman のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListLoansQuery {
    /// ステータスの部分一致
    pub search: Option<String>,
    /// 1始まり
    pub page: Option<u32>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct EquipmentResponse {
    pub name: String,
    pub code: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct LoanLineResponse {
    pub line_id: Uuid,
    pub equipment_id: Uuid,
    pub equipment: Option<EquipmentResponse>,
    pub quantity: u32,
    pub late_fee: Option<Decimal>,
}

/// 貸出レスポンス
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub borrower_id: Uuid,
    pub approver_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub planned_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub status: String,
    pub condition_before: Option<String>,
    pub photo_before: Option<String>,
    pub final_condition: Option<ReturnCondition>,
    pub photo_after: Option<String>,
    pub purpose: Option<String>,
    pub rejection_reason: Option<String>,
    pub total_late_fee: Decimal,
    pub lines: Vec<LoanLineResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LoanView> for LoanResponse {
    fn from(view: LoanView) -> Self {
        let lines = view
            .loan
            .lines
            .iter()
            .map(|line| LoanLineResponse {
                line_id: line.line_id.value(),
                equipment_id: line.equipment_id.value(),
                equipment: view.equipment_for(line.equipment_id).map(|e| EquipmentResponse {
                    name: e.name.clone(),
                    code: e.code.clone(),
                    unit_price: e.unit_price,
                }),
                quantity: line.quantity.value(),
                late_fee: line.late_fee,
            })
            .collect();

        let total_late_fee = view.loan.total_late_fee();
        let loan = view.loan;

        Self {
            loan_id: loan.loan_id.value(),
            borrower_id: loan.borrower_id.value(),
            approver_id: loan.approver_id.map(|id| id.value()),
            receiver_id: loan.receiver_id.map(|id| id.value()),
            start_date: loan.start_date,
            planned_return_date: loan.planned_return_date,
            actual_return_date: loan.actual_return_date,
            return_requested_at: loan.return_requested_at,
            status: loan.status.as_str().to_string(),
            condition_before: loan.condition_before,
            photo_before: loan.photo_before,
            final_condition: loan.final_condition,
            photo_after: loan.photo_after,
            purpose: loan.notes,
            rejection_reason: loan.rejection_reason,
            total_late_fee,
            lines,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

/// 返却確認レスポンス
#[derive(Debug, Serialize)]
pub struct ReturnConfirmedResponse {
    pub message: String,
    pub late_days: u32,
    pub total_late_fee: Decimal,
    pub loan: LoanResponse,
}

/// 一覧レスポンス
#[derive(Debug, Serialize)]
pub struct LoanListResponse {
    pub data: Vec<LoanResponse>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// ページ付き一覧レスポンス
#[derive(Debug, Serialize)]
pub struct LoanPageResponse {
    pub data: Vec<LoanResponse>,
    pub pagination: Pagination,
}

impl From<Page<LoanView>> for LoanPageResponse {
    fn from(page: Page<LoanView>) -> Self {
        let pagination = Pagination {
            current_page: page.current_page,
            last_page: page.last_page(),
            per_page: page.per_page,
            total: page.total,
        };
        Self {
            data: page.items.into_iter().map(LoanResponse::from).collect(),
            pagination,
        }
    }
}

/// メッセージのみのレスポンス
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
