// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contributor identity for object attribution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a contributor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContributorId(pub Uuid);

impl ContributorId {
    /// Create a new random contributor ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil ID reserved for the default contributor
    pub const NIL: Self = Self(Uuid::nil());

    /// Whether this is the reserved nil ID
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ContributorId {
    fn default() -> Self {
        Self::new()
    }
}

/// A producer of storyboard objects, typically one script run.
///
/// `order` is the monotonic registration index within one coordinator;
/// `priority` is caller-set, smaller sorts earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Stable identity
    pub id: ContributorId,
    /// Display name
    pub name: String,
    /// Registration index, monotonic per coordinator
    pub order: u64,
    /// Caller-set priority, smaller sorts earlier
    pub priority: i32,
}

impl Contributor {
    /// Create a new contributor
    pub fn new(id: ContributorId, name: impl Into<String>, order: u64, priority: i32) -> Self {
        Self {
            id,
            name: name.into(),
            order,
            priority,
        }
    }

    /// Updated copy with a different priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The sentinel contributor objects fall back to when their producer is
    /// unknown; sorts after every registered contributor.
    pub fn fallback() -> Self {
        Self {
            id: ContributorId::NIL,
            name: "default".to_string(),
            order: u64::MAX,
            priority: i32::MAX,
        }
    }
}
