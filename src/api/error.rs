use crate::application::loan::{InvalidInput, LoanApplicationError};
use crate::domain::Role;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーと認可・入力形式のエラーを、HTTPレスポンスへマッピングする。
/// メッセージは利用者向けにインドネシア語で返す。
#[derive(Debug)]
pub enum ApiError {
    /// トークンがない、または検証に失敗した
    Unauthenticated,
    /// ロールが一致しない
    Forbidden(Role),
    /// リクエストの形式が不正（JSON、パス・クエリパラメータ）
    InvalidRequest(String),
    Application(LoanApplicationError),
}

impl From<LoanApplicationError> for ApiError {
    fn from(err: LoanApplicationError) -> Self {
        ApiError::Application(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

fn field_label(field: &str) -> &str {
    match field {
        "condition_before" => "Kondisi sebelum",
        "photo_before" => "Foto sebelum",
        "reason" => "Alasan penolakan",
        "photo_after" => "Foto sesudah",
        other => other,
    }
}

/// 入力不正の利用者向け文言
fn invalid_input_message(input: &InvalidInput) -> String {
    match input {
        InvalidInput::NoLineItems => "Minimal satu alat harus dipinjam".to_string(),
        InvalidInput::InvalidPeriod { .. } => {
            "Tanggal kembali harus setelah tanggal pinjam".to_string()
        }
        InvalidInput::DuplicateEquipment(id) => {
            format!("Alat {} dipilih lebih dari sekali", id.value())
        }
        InvalidInput::UnknownEquipment(id) => format!("Alat {} tidak ditemukan", id.value()),
        InvalidInput::Required(field) => format!("{} wajib diisi", field_label(field)),
        InvalidInput::InvalidPage => "Nomor halaman minimal 1".to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            // 403 Forbidden - 認証・認可
            ApiError::Unauthenticated => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Token tidak valid atau tidak ditemukan".to_string(),
            ),
            ApiError::Forbidden(role) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                format!("Hanya {} yang dapat melakukan aksi ini", role.as_str()),
            ),

            // 422 Unprocessable Entity - 入力不正
            ApiError::InvalidRequest(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                format!("Data tidak valid: {}", detail),
            ),
            ApiError::Application(LoanApplicationError::Validation(input)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                invalid_input_message(&input),
            ),

            // 400 Bad Request - ビジネスルール違反
            ApiError::Application(LoanApplicationError::InsufficientStock {
                name,
                available,
                requested,
            }) => (
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_STOCK",
                format!(
                    "Stok {} tidak mencukupi. Tersedia: {}, diminta: {}",
                    name, available, requested
                ),
            ),
            ApiError::Application(LoanApplicationError::LoanPeriodExceeded { name, max_days }) => (
                StatusCode::BAD_REQUEST,
                "LOAN_PERIOD_EXCEEDED",
                format!("Lama peminjaman {} maksimal {} hari", name, max_days),
            ),
            ApiError::Application(LoanApplicationError::InvalidLoanState(detail)) => {
                tracing::debug!("Invalid loan state: {}", detail);
                (
                    StatusCode::BAD_REQUEST,
                    "INVALID_LOAN_STATE",
                    "Peminjaman tidak ditemukan atau status tidak valid".to_string(),
                )
            }

            // 404 Not Found
            ApiError::Application(LoanApplicationError::LoanNotFound) => (
                StatusCode::NOT_FOUND,
                "LOAN_NOT_FOUND",
                "Peminjaman tidak ditemukan".to_string(),
            ),

            // 500 Internal Server Error - システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            ApiError::Application(LoanApplicationError::DomainError(detail)) => {
                tracing::error!("Domain consistency error: {}", detail);
                internal_error()
            }
            ApiError::Application(LoanApplicationError::StoreError(e)) => {
                tracing::error!("Lending store error: {}", e);
                internal_error()
            }
            ApiError::Application(LoanApplicationError::QueryError(e)) => {
                tracing::error!("Loan query error: {}", e);
                internal_error()
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}

fn internal_error() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Terjadi kesalahan pada server".to_string(),
    )
}
