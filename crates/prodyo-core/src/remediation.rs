//! Inputs for causes and remediation actions.
//!
//! Causes are immutable once written. Actions accept partial updates through
//! [`ActionChanges`], applied onto a snapshot of the stored row.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::indicator::IndicatorType;
use crate::level::ProductivityLevel;
use crate::status::WorkStatus;

/// Metric names used when recording a cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    WorkVelocity,
    ReworkIndex,
    InstabilityIndex,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkVelocity => "WorkVelocity",
            Self::ReworkIndex => "ReworkIndex",
            Self::InstabilityIndex => "InstabilityIndex",
        }
    }

    pub fn indicator_type(&self) -> IndicatorType {
        match self {
            Self::WorkVelocity => IndicatorType::SpeedPerIteration,
            Self::ReworkIndex => IndicatorType::ReworkPerIteration,
            Self::InstabilityIndex => IndicatorType::InstabilityIndex,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WorkVelocity" => Ok(Self::WorkVelocity),
            "ReworkIndex" => Ok(Self::ReworkIndex),
            "InstabilityIndex" => Ok(Self::InstabilityIndex),
            _ => Err(DomainError::UnknownMetric(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCause {
    pub indicator_range_id: Uuid,
    pub metric: MetricKind,
    pub description: String,
    pub productivity_level: ProductivityLevel,
}

impl NewCause {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::Empty {
                field: "description",
            });
        }
        if self.productivity_level == ProductivityLevel::Unclassified {
            return Err(DomainError::UnclassifiedCause);
        }
        Ok(())
    }
}

/// The mutable part of an action.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionFields {
    pub description: String,
    pub status: WorkStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
}

impl ActionFields {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::Empty {
                field: "description",
            });
        }
        if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
            if end < start {
                return Err(DomainError::InvertedWindow);
            }
        }
        Ok(())
    }
}

/// A partial update. `None` leaves the stored value untouched, so optional
/// fields cannot be cleared through a patch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionChanges {
    pub description: Option<String>,
    pub status: Option<WorkStatus>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
}

impl ActionChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.status.is_none()
            && self.start_at.is_none()
            && self.end_at.is_none()
            && self.assignee_id.is_none()
    }

    pub fn apply(self, fields: &mut ActionFields) {
        if let Some(description) = self.description {
            fields.description = description;
        }
        if let Some(status) = self.status {
            fields.status = status;
        }
        if self.start_at.is_some() {
            fields.start_at = self.start_at;
        }
        if self.end_at.is_some() {
            fields.end_at = self.end_at;
        }
        if self.assignee_id.is_some() {
            fields.assignee_id = self.assignee_id;
        }
    }
}
