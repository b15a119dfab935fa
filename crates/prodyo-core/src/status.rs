use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Progress of a task or a remediation action.
///
/// Transitions are not enforced: any status may be written over any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names plus case and separator variants
/// (`in_progress`, `in-progress`, `COMPLETED`).
impl FromStr for WorkStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "notstarted" => Ok(Self::NotStarted),
            "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_separator_and_case_variants() {
        assert_eq!("InProgress".parse(), Ok(WorkStatus::InProgress));
        assert_eq!("in_progress".parse(), Ok(WorkStatus::InProgress));
        assert_eq!("in-progress".parse(), Ok(WorkStatus::InProgress));
        assert_eq!("NOT_STARTED".parse(), Ok(WorkStatus::NotStarted));
        assert_eq!("completed".parse(), Ok(WorkStatus::Completed));
    }

    #[test]
    fn rejects_unknown_status() {
        assert_eq!(
            "done".parse::<WorkStatus>(),
            Err(DomainError::UnknownStatus("done".into()))
        );
    }

    #[test]
    fn default_is_not_started() {
        assert_eq!(WorkStatus::default(), WorkStatus::NotStarted);
        assert!(!WorkStatus::default().is_completed());
    }
}
