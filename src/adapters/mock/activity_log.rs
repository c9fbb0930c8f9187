use crate::ports::activity_log::{ActivityEntry, ActivityLog as ActivityLogTrait, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock implementation of ActivityLog
///
/// Keeps recorded entries in memory so tests can assert on them.
/// Can be switched into a failing mode to exercise error handling.
pub struct ActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
    failing: AtomicBool,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// All entries recorded so far, oldest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Make every following `record` call fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActivityLogTrait for ActivityLog {
    async fn record(&self, entry: ActivityEntry) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("activity log unavailable".into());
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}
