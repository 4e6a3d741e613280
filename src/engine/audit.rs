// Audit entries: one immutable record per executed hop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::definition::{InstanceId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub instance_id: InstanceId,
    pub title: String,
    pub source_node_id: String,
    pub source_label: String,
    /// None for closing entries (ended, denied)
    pub target_node_id: Option<String>,
    pub edge_label: String,
    pub actor_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Time since the previous entry of the same instance
    pub elapsed: Duration,
    pub remarks: String,
}

impl AuditEntry {
    pub fn is_closing(&self) -> bool {
        self.target_node_id.is_none()
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed)
    }
}

/// Render as `1d 2h 3m 4s`, dropping leading zero units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60,
    );

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}
