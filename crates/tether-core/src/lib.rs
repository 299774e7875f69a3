//! tether-core
//!
//! Completion tracking for one job at a time on a shared execution queue.
//!
//! # モジュール構成
//! - **domain**: 識別子とキューアイテム（JobNumber, PromptId, ExecutionToken, QueueItem）
//! - **queue**: 共有実行キュー（ExecutionQueue）と割り込みポイント（MutationHook, HeldQueue）
//! - **signal**: set / wait / clear だけを持つ二値シグナル
//! - **tracker**: CompletionTracker と、キューに差し込む TrackingHook
//! - **route**: 別プロセスから tracker を呼ぶための async ポート
//! - **config / error / observability**: 周辺

pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod queue;
pub mod route;
pub mod signal;
pub mod tracker;

pub use config::TetherConfig;
pub use domain::{ExecutionToken, HistoryEntry, JobNumber, PromptId, QueueItem};
pub use error::{Result, TetherError};
pub use observability::QueueCounts;
pub use queue::{ExecutionQueue, HeldQueue, MutationHook};
pub use route::{LocalRoute, TrackerRoute, submit_and_wait};
pub use signal::{Event, Signal};
pub use tracker::{Completion, CompletionTracker, TrackingHook, instrument};
