pub mod activity_log;
pub mod lending_store;
pub mod loan_queries;
mod rows;

// パブリックに型を再エクスポート
pub use activity_log::ActivityLog as PostgresActivityLog;
pub use lending_store::LendingStore as PostgresLendingStore;
pub use loan_queries::LoanQueries as PostgresLoanQueries;
