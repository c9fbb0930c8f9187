use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, approve_loan, confirm_return, delete_loan, list_loans, my_loans, reject_loan,
    request_return, submit_loan,
};

/// Creates the API router with all lending endpoints
///
/// Borrower (peminjam):
/// - POST /peminjaman - Submit a loan request
/// - GET /peminjaman/saya - List own loans
/// - POST /peminjaman/:id/ajukan_pengembalian - Request return
///
/// Staff (petugas):
/// - POST /peminjaman/:id/setujui - Approve
/// - POST /peminjaman/:id/tolak - Reject
/// - POST /peminjaman/:id/konfirmasi_pengembalian - Confirm return
///
/// Admin:
/// - GET /peminjaman - Paginated list of all loans
/// - DELETE /peminjaman/:id - Delete a loan record
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/peminjaman", post(submit_loan).get(list_loans))
        .route("/peminjaman/saya", get(my_loans))
        .route("/peminjaman/:id", delete(delete_loan))
        .route("/peminjaman/:id/setujui", post(approve_loan))
        .route("/peminjaman/:id/tolak", post(reject_loan))
        .route("/peminjaman/:id/ajukan_pengembalian", post(request_return))
        .route("/peminjaman/:id/konfirmasi_pengembalian", post(confirm_return))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
