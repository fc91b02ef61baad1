//! Core types for goes-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task
///
/// Transitions only move forward: `Pending → Taken → {Processed, Cancelled}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting to be claimed
    Pending,
    /// Claimed by exactly one worker
    Taken,
    /// Fetched and handled successfully
    Processed,
    /// Failed; `detail` carries the reason
    Cancelled,
}

impl TaskStatus {
    /// Every status, in lifecycle order
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Taken,
        TaskStatus::Processed,
        TaskStatus::Cancelled,
    ];

    /// Value stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Taken => "TAKEN",
            TaskStatus::Processed => "PROCESSED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse a stored status value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(TaskStatus::Pending),
            "TAKEN" => Some(TaskStatus::Taken),
            "PROCESSED" => Some(TaskStatus::Processed),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Processed | TaskStatus::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as seen by callers of the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique name, usually the object path of the dataset
    pub name: String,
    /// Current lifecycle state
    pub status: TaskStatus,
    /// Free-form diagnostic text (error message on cancellation)
    pub detail: Option<String>,
    /// When the task was created, or last claimed
    pub begin: Option<DateTime<Utc>>,
    /// When the task reached a terminal state
    pub end_process: Option<DateTime<Utc>>,
}

/// Per-status totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// Tasks waiting to be claimed
    pub pending: u64,
    /// Tasks currently claimed
    pub taken: u64,
    /// Tasks finished successfully
    pub processed: u64,
    /// Tasks finished with an error
    pub cancelled: u64,
}

impl TaskCounts {
    /// Total number of tasks in the store
    pub fn total(&self) -> u64 {
        self.pending + self.taken + self.processed + self.cancelled
    }

    /// Number of tasks in a terminal state
    pub fn finished(&self) -> u64 {
        self.processed + self.cancelled
    }
}

/// Events emitted by the orchestrator
///
/// Consumers subscribe via [`Orchestrator::subscribe`](crate::Orchestrator::subscribe).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch of tasks was claimed from the store
    BatchClaimed {
        /// 1-based round number
        round: u64,
        /// Claimed task names
        names: Vec<String>,
    },

    /// A task was fetched and marked processed
    TaskProcessed {
        /// Task name
        name: String,
    },

    /// A task failed and was marked cancelled
    TaskCancelled {
        /// Task name
        name: String,
        /// The recorded reason
        reason: String,
    },

    /// No pending task was left at the last claim
    Drained {
        /// Rounds executed by this run
        rounds: u64,
    },
}

/// Outcome totals of one orchestrator run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Batches fetched
    pub rounds: u64,
    /// Tasks marked processed
    pub processed: u64,
    /// Tasks marked cancelled
    pub cancelled: u64,
    /// Outcomes the store refused to record
    pub unrecorded: u64,
}
