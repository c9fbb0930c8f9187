pub mod activity_log;
pub mod lending_store;
pub mod loan_queries;

pub use activity_log::{ActivityEntry, ActivityLog};
pub use lending_store::{LendingStore, LendingTransaction};
pub use loan_queries::{EquipmentSummary, LoanListFilter, LoanQueries, LoanView, Page};
