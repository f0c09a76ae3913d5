//! Window-control responses produced by the external ML process.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one inference: where the window should move and how sure the
/// model is.  The core only logs and records these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowControl {
    /// May be empty on the wire; the router fills it from the topic.
    #[serde(default)]
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    /// Target opening in percent, `0.0..=100.0`.
    pub position: f64,
    /// Model confidence, `0.0..=1.0`.
    pub confidence: f64,
    /// Feature values the model actually used, echoed back for auditing.
    #[serde(default)]
    pub features_used: BTreeMap<String, serde_json::Value>,
}

impl WindowControl {
    /// Returns `true` when position and confidence are inside their ranges.
    pub fn in_range(&self) -> bool {
        (0.0..=100.0).contains(&self.position) && (0.0..=1.0).contains(&self.confidence)
    }
}
