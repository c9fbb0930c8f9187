use crate::application::loan::{
    LoanApplicationError, ServiceDependencies, approve_loan as execute_approve_loan,
    confirm_return as execute_confirm_return, delete_loan as execute_delete_loan,
    list_borrower_loans, list_loans as execute_list_loans, reject_loan as execute_reject_loan,
    request_return as execute_request_return, submit_loan_request,
};
use crate::domain::{DeleteLoan, LoanId, RequestReturn};
use crate::ports::{LoanListFilter, LoanView};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    auth::{AdminOnly, Authorized, BorrowerOnly, StaffOnly},
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery},
    types::{
        ApproveLoanBody, ConfirmReturnBody, ListLoansQuery, LoanListResponse, LoanPageResponse,
        LoanResponse, MessageResponse, RejectLoanBody, ReturnConfirmedResponse, SubmitLoanBody,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    /// HS256の検証鍵
    pub jwt_secret: String,
    /// 管理者一覧の1ページあたり件数
    pub page_size: u32,
}

/// 遷移後の記録を、備品情報を添えて読み直す
async fn load_view(state: &AppState, loan_id: LoanId) -> Result<LoanView, ApiError> {
    state
        .service_deps
        .loan_queries
        .get_by_id(loan_id)
        .await
        .map_err(|e| ApiError::from(LoanApplicationError::QueryError(e)))?
        .ok_or_else(|| ApiError::from(LoanApplicationError::LoanNotFound))
}

// ============================================================================
// Borrower handlers
// ============================================================================

/// POST /peminjaman - 貸出を申請
///
/// 強制されるビジネスルール:
/// - 明細が1件以上、返却予定日が開始日より後
/// - 各備品が存在し、割り当て可能数が足り、最大貸出日数以内であること
pub async fn submit_loan(
    Authorized { actor, .. }: Authorized<BorrowerOnly>,
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<SubmitLoanBody>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let cmd = body.into_command(actor, Utc::now())?;

    let loan = submit_loan_request(&state.service_deps, cmd).await?;
    let view = load_view(&state, loan.loan_id).await?;

    Ok((StatusCode::CREATED, Json(view.into())))
}

/// GET /peminjaman/saya - 自分の貸出一覧
pub async fn my_loans(
    Authorized { actor, .. }: Authorized<BorrowerOnly>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoanListResponse>, ApiError> {
    let views = list_borrower_loans(&state.service_deps, actor.user_id).await?;

    Ok(Json(LoanListResponse {
        data: views.into_iter().map(LoanResponse::from).collect(),
    }))
}

/// POST /peminjaman/:id/ajukan_pengembalian - 返却を申し出る
///
/// 本人の貸出中の記録のみ。
pub async fn request_return(
    Authorized { actor, .. }: Authorized<BorrowerOnly>,
    AppPath(loan_id): AppPath<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = RequestReturn {
        loan_id: LoanId::from_uuid(loan_id),
        borrower: actor,
        requested_at: Utc::now(),
    };

    let loan = execute_request_return(&state.service_deps, cmd).await?;
    let view = load_view(&state, loan.loan_id).await?;

    Ok(Json(view.into()))
}

// ============================================================================
// Staff handlers
// ============================================================================

/// POST /peminjaman/:id/setujui - 貸出を承認
///
/// 強制されるビジネスルール:
/// - 申請中であること
/// - 承認時点で全明細の在庫が足りること（1件でも不足すれば在庫は変更しない）
pub async fn approve_loan(
    Authorized { actor, .. }: Authorized<StaffOnly>,
    AppPath(loan_id): AppPath<Uuid>,
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<ApproveLoanBody>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = body.into_command(loan_id, actor, Utc::now());

    let loan = execute_approve_loan(&state.service_deps, cmd).await?;
    let view = load_view(&state, loan.loan_id).await?;

    Ok(Json(view.into()))
}

/// POST /peminjaman/:id/tolak - 貸出を却下
pub async fn reject_loan(
    Authorized { actor, .. }: Authorized<StaffOnly>,
    AppPath(loan_id): AppPath<Uuid>,
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<RejectLoanBody>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = body.into_command(loan_id, actor, Utc::now());

    let loan = execute_reject_loan(&state.service_deps, cmd).await?;
    let view = load_view(&state, loan.loan_id).await?;

    Ok(Json(view.into()))
}

/// POST /peminjaman/:id/konfirmasi_pengembalian - 返却を確認
///
/// 延滞日数と延滞料金を確定し、在庫を戻す（損傷品は流通から外す）。
pub async fn confirm_return(
    Authorized { actor, .. }: Authorized<StaffOnly>,
    AppPath(loan_id): AppPath<Uuid>,
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<ConfirmReturnBody>,
) -> Result<Json<ReturnConfirmedResponse>, ApiError> {
    let cmd = body.into_command(loan_id, actor, Utc::now());

    let receipt = execute_confirm_return(&state.service_deps, cmd).await?;
    let view = load_view(&state, receipt.loan.loan_id).await?;

    let message = if receipt.late_days > 0 {
        format!("Pengembalian dikonfirmasi. Terlambat {} hari", receipt.late_days)
    } else {
        "Pengembalian dikonfirmasi".to_string()
    };

    Ok(Json(ReturnConfirmedResponse {
        message,
        late_days: receipt.late_days,
        total_late_fee: receipt.total_late_fee,
        loan: view.into(),
    }))
}

// ============================================================================
// Admin handlers
// ============================================================================

/// GET /peminjaman - 全貸出の一覧（ページ付き）
///
/// `search`はステータスの部分一致、`page`は1始まり。
pub async fn list_loans(
    Authorized { .. }: Authorized<AdminOnly>,
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<ListLoansQuery>,
) -> Result<Json<LoanPageResponse>, ApiError> {
    let filter = LoanListFilter {
        status_contains: query.search.filter(|s| !s.trim().is_empty()),
        page: query.page.unwrap_or(1).max(1),
        per_page: state.page_size,
    };

    let page = execute_list_loans(&state.service_deps, filter).await?;

    Ok(Json(page.into()))
}

/// DELETE /peminjaman/:id - 貸出記録を削除
pub async fn delete_loan(
    Authorized { actor, .. }: Authorized<AdminOnly>,
    AppPath(loan_id): AppPath<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let cmd = DeleteLoan {
        loan_id: LoanId::from_uuid(loan_id),
        admin: actor,
        deleted_at: Utc::now(),
    };

    execute_delete_loan(&state.service_deps, cmd).await?;

    Ok(Json(MessageResponse::new("Peminjaman berhasil dihapus")))
}
