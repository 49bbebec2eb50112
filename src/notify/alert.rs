//! Human alert payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnosis::incident::{Incident, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanAlert {
    /// Display id of the incident behind the alert, if any.
    pub incident_id: Option<String>,
    /// Agent name; `None` for system-wide alerts.
    pub subject: Option<String>,
    /// Deduplication kind, usually the incident type.
    pub kind: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl HumanAlert {
    pub fn new(
        subject: Option<String>,
        kind: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            incident_id: None,
            subject,
            kind: kind.into(),
            severity,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Alert for an incident that automation will not handle.
    pub fn human_required(incident: &Incident, reason: &str) -> Self {
        let mut alert = Self::new(
            incident.subject.clone(),
            incident.incident_type.as_str(),
            Severity::Critical,
            "Human intervention required",
            format!("{}\n\nReason: {}", incident.description, reason),
        );
        alert.incident_id = Some(incident.id.to_string());
        alert
    }

    /// Subject label used for deduplication.
    pub fn subject_label(&self) -> &str {
        self.subject.as_deref().unwrap_or("system")
    }
}
