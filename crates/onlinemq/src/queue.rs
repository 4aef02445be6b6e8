//! Queue metadata returned by the server.

use crate::message::{QueueId, QueueManagerId};
use std::time::Duration;

/// Read-only description of an OnlineMQ queue.
///
/// Instances only come from parsing a server reply. The `depth` is a snapshot
/// taken when the queue was fetched; it does not track later sends or receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    pub(crate) id: QueueId,
    pub(crate) name: String,
    pub(crate) queue_manager_id: QueueManagerId,
    pub(crate) max_depth: Option<u64>,
    pub(crate) max_message_length: Option<u64>,
    pub(crate) send_enabled: bool,
    pub(crate) receive_enabled: bool,
    pub(crate) description: Option<String>,
    pub(crate) depth: u64,
    pub(crate) visibility_timeout: Option<Duration>,
}

impl Queue {
    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue_manager_id(&self) -> QueueManagerId {
        self.queue_manager_id
    }

    /// Maximum number of messages the queue holds, if limited
    pub fn max_depth(&self) -> Option<u64> {
        self.max_depth
    }

    /// Maximum body length in bytes, if limited
    pub fn max_message_length(&self) -> Option<u64> {
        self.max_message_length
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    pub fn receive_enabled(&self) -> bool {
        self.receive_enabled
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Number of messages waiting at fetch time (0 means empty)
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// How long a received but uncommitted message stays hidden
    pub fn visibility_timeout(&self) -> Option<Duration> {
        self.visibility_timeout
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }
}
