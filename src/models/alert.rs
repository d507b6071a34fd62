use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::MovementState;

/// Alert severity, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Alert payload published on the `FallAlert` topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: NaiveDateTime,
    pub state: MovementState,
    pub severity: Severity,
    pub human_description: String,
}

impl Alert {
    /// Whether the notification sink should dispatch this alert
    pub fn requires_notification(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Informational alerts carry no action for the operator
    pub fn is_actionable(&self) -> bool {
        self.severity >= Severity::Warning
    }
}
