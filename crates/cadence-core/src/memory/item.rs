//! Learning Item - the atomic fact being memorized

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A prompt/answer pair owned by one account.
///
/// The engine never edits text and never removes items; logical deletion is
/// a timestamp set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningItem {
    /// Unique identifier (UUID v4)
    pub id: Uuid,
    /// Prompt shown to the learner
    pub front: String,
    /// Expected answer
    pub back: String,
    /// When the item was created
    pub created_at: DateTime<Utc>,
    /// Soft-deletion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LearningItem {
    /// Create a new item with a fresh id
    pub fn new(front: impl Into<String>, back: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            front: front.into(),
            back: back.into(),
            created_at,
            deleted_at: None,
        }
    }

    /// Whether the item has been logically deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating a new item
///
/// Uses `deny_unknown_fields` to prevent field injection attacks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewItem {
    /// Prompt text
    pub front: String,
    /// Answer text
    pub back: String,
}

impl NewItem {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}
