use thiserror::Error;

/// Validation failures raised by the engine's input types.
///
/// Every variant maps to a 400 at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Invalid indicator_type '{0}'. Must be SpeedPerIteration, ReworkPerIteration, or InstabilityIndex")]
    UnknownIndicatorType(String),

    #[error("Invalid metric '{0}'. Must be WorkVelocity, ReworkIndex, or InstabilityIndex")]
    UnknownMetric(String),

    #[error("Invalid status '{0}'. Must be NotStarted, InProgress, or Completed")]
    UnknownStatus(String),

    #[error("Invalid productivity_level '{0}'. Must be Ok, Alert, or Critical")]
    UnknownLevel(String),

    #[error("Band '{band}' has min {min} greater than max {max}")]
    InvertedBand { band: &'static str, min: f64, max: f64 },

    #[error("Band '{band}' contains a non-finite bound")]
    NonFiniteBand { band: &'static str },

    #[error("{field} must be a finite number")]
    NonFiniteValue { field: &'static str },

    #[error("A cause must record a degraded level, not Unclassified")]
    UnclassifiedCause,

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("end_at must not be before start_at")]
    InvertedWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_band_message_carries_bounds() {
        let err = DomainError::InvertedBand {
            band: "alert",
            min: 0.3,
            max: 0.1,
        };
        let msg = err.to_string();
        assert!(msg.contains("alert"));
        assert!(msg.contains("0.3"));
    }

    #[test]
    fn unknown_indicator_type_lists_valid_names() {
        let err = DomainError::UnknownIndicatorType("Velocity".into());
        assert!(err.to_string().contains("SpeedPerIteration"));
    }
}
