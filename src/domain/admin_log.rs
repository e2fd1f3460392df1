use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACTION_UPDATE_APPLICATION: &str = "UPDATE_APPLICATION";

/// Append-only audit row for an administrator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminLogEntry {
    pub id: Uuid,
    pub action: String,
    pub details: serde_json::Value,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl AdminLogEntry {
    pub fn new(
        action: impl Into<String>,
        details: serde_json::Value,
        actor: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            details,
            actor: actor.into(),
            created_at,
        }
    }
}
