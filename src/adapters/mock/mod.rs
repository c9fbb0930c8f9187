pub mod activity_log;
pub mod lending_store;

pub use activity_log::ActivityLog;
pub use lending_store::LendingStore;
