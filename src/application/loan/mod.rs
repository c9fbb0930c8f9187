mod activity;
mod errors;
mod loan_service;
mod stale_request_sweep;

pub use errors::{InvalidInput, LoanApplicationError, Result};
pub use loan_service::{
    ReturnReceipt, ServiceDependencies, approve_loan, confirm_return, delete_loan,
    list_borrower_loans, list_loans, reject_loan, request_return, submit_loan_request,
};
pub use stale_request_sweep::{SYSTEM_ACTOR_NAME, reject_stale_requests};
