//! Quarantine item types.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kinds of externally supplied signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// A directly observed incident report.
    Incident,
    Threat,
    Pattern,
    OracleData,
    ExternalIntel,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Incident => "incident",
            DataType::Threat => "threat",
            DataType::Pattern => "pattern",
            DataType::OracleData => "oracle_data",
            DataType::ExternalIntel => "external_intel",
        }
    }

    /// Distinct confirmations needed before the item is trusted.
    pub fn required_confirmations(self) -> u32 {
        match self {
            DataType::Incident => 1,
            DataType::Threat => 2,
            DataType::Pattern => 3,
            DataType::OracleData => 2,
            DataType::ExternalIntel => 3,
        }
    }

    /// How long an item may stay pending before it expires.
    pub fn quarantine_duration(self) -> Duration {
        match self {
            DataType::Incident => Duration::hours(1),
            DataType::Threat => Duration::hours(6),
            DataType::Pattern => Duration::hours(24),
            DataType::OracleData => Duration::minutes(30),
            DataType::ExternalIntel => Duration::hours(12),
        }
    }

    /// Types that may raise a Tier0 anomaly once verified.
    pub fn is_actionable(self) -> bool {
        matches!(self, DataType::Incident | DataType::Threat)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = QuarantineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incident" => Ok(DataType::Incident),
            "threat" => Ok(DataType::Threat),
            "pattern" => Ok(DataType::Pattern),
            "oracle_data" => Ok(DataType::OracleData),
            "external_intel" => Ok(DataType::ExternalIntel),
            other => Err(QuarantineError::UnknownDataType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineStatus {
    Pending,
    Verified,
    Rejected,
    Expired,
}

impl QuarantineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuarantineStatus::Pending => "pending",
            QuarantineStatus::Verified => "verified",
            QuarantineStatus::Rejected => "rejected",
            QuarantineStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != QuarantineStatus::Pending
    }
}

/// One externally supplied signal held until corroborated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedItem {
    pub id: String,
    pub data_type: DataType,
    pub content: serde_json::Value,
    /// Distinct sources that submitted this content.
    pub sources: BTreeSet<String>,
    pub status: QuarantineStatus,
    pub confirmations: u32,
    pub required_confirmations: u32,
    pub submitted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub review_notes: Vec<String>,
    /// Set once the verified signal has been consumed by the scheduler.
    #[serde(default)]
    pub acted_on: bool,
}

impl QuarantinedItem {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineStats {
    pub total_items: usize,
    pub by_status: std::collections::BTreeMap<String, usize>,
    pub pending_count: usize,
    pub verified_count: usize,
    pub rejection_rate: f64,
}

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Unknown quarantine item '{0}'")]
    UnknownItem(String),

    #[error("Item '{id}' is {status:?}, not pending")]
    NotPending { id: String, status: QuarantineStatus },

    #[error("Unknown data type '{0}'")]
    UnknownDataType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_table() {
        assert_eq!(DataType::Incident.required_confirmations(), 1);
        assert_eq!(DataType::Threat.required_confirmations(), 2);
        assert_eq!(DataType::Pattern.required_confirmations(), 3);
        assert_eq!(DataType::OracleData.quarantine_duration(), Duration::minutes(30));
        assert_eq!(DataType::Pattern.quarantine_duration(), Duration::hours(24));
    }

    #[test]
    fn test_data_type_parse() {
        assert_eq!("oracle_data".parse::<DataType>().unwrap(), DataType::OracleData);
        assert!("rumour".parse::<DataType>().is_err());
    }
}
