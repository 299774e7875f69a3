//! Domain model (identities, queue items, history).

pub mod ids;
pub mod item;

pub use ids::{ExecutionToken, JobNumber, PromptId};
pub use item::{HistoryEntry, QueueItem};
