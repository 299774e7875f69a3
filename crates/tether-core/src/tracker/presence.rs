//! Presence check: is the tracked job still pending or running?

use super::CompletionTracker;
use crate::domain::JobNumber;
use crate::error::Result;

impl CompletionTracker {
    /// Point-in-time scan of the running map and the pending heap under the
    /// queue's real mutex. Read-only.
    ///
    /// Nothing tracked, or the queue already dropped, counts as absent.
    pub fn is_tracked_present(&self) -> Result<bool> {
        self.is_present(self.tracked())
    }

    pub(super) fn is_present(&self, job: Option<JobNumber>) -> Result<bool> {
        let Some(job) = job else {
            return Ok(false);
        };
        let Some(queue) = self.attached_queue()? else {
            return Ok(false);
        };
        Ok(queue.contains(job))
    }
}
