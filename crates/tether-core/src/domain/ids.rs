//! Identifiers used by the queue and the tracker.
//!
//! # 3 種類の ID
//! - **JobNumber**: 投入時に振られる符号付き番号。符号は「先頭に割り込むか」を表すだけで、
//!   同一性は絶対値で比較する（`+7` と `-7` は同じジョブ）
//! - **PromptId**: アイテムに付く ULID。history のキー
//! - **ExecutionToken**: consumer がアイテムを取り出した時に振られる、running map のキー

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Signed job identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobNumber(i64);

impl JobNumber {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Identity with the sign stripped.
    pub fn identity(self) -> u64 {
        self.0.unsigned_abs()
    }

    /// The front-of-queue form of this number.
    pub fn front(self) -> Self {
        if self.0 > 0 { Self(-self.0) } else { self }
    }

    pub fn same_job(self, other: JobNumber) -> bool {
        self.identity() == other.identity()
    }
}

impl From<i64> for JobNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(Ulid);

impl PromptId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prompt-{}", self.0)
    }
}

/// Key of the running map. Never compared with a `JobNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionToken(u64);

impl ExecutionToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExecutionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec-{}", self.0)
    }
}
