use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobNumber, PromptId};

/// One unit of work as it sits in the queue.
///
/// `payload` は opaque。キューも tracker も中身を見ずにそのまま運ぶ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub number: JobNumber,
    pub prompt_id: PromptId,
    pub payload: serde_json::Value,
}

impl QueueItem {
    pub fn new(number: impl Into<JobNumber>, payload: serde_json::Value) -> Self {
        Self {
            number: number.into(),
            prompt_id: PromptId::generate(),
            payload,
        }
    }

    pub fn identity(&self) -> u64 {
        self.number.identity()
    }
}

/// A finalized item and the outputs reported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub item: QueueItem,
    pub outputs: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}
