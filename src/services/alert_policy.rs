use chrono::NaiveDateTime;

use crate::models::{Alert, MovementState, Severity};

/// Maps movement states to alert payloads
///
/// Stateless; dispatching notifications is left to whoever consumes the alerts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertPolicy;

impl AlertPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn severity(state: MovementState) -> Severity {
        match state {
            MovementState::Fallen => Severity::Critical,
            MovementState::AboutToFall => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn classify(&self, timestamp: NaiveDateTime, state: MovementState) -> Alert {
        let severity = Self::severity(state);
        let human_description = match severity {
            Severity::Critical => format!("FALL DETECTED: {}", state.description()),
            Severity::Warning => format!("Fall risk: {}", state.description()),
            Severity::Info => state.description().to_string(),
        };

        Alert {
            timestamp,
            state,
            severity,
            human_description,
        }
    }
}
