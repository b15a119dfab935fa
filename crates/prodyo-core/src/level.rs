//! Productivity levels and the band classifier.
//!
//! A `ProductivityRange` holds three inclusive `[min, max]` bands. The
//! classifier tests them in a fixed order:
//!
//! | Step | Test                              | Result     |
//! |------|-----------------------------------|------------|
//! | 1    | `ok.min <= v <= ok.max`           | `Ok`       |
//! | 2    | `alert.min <= v <= alert.max`     | `Alert`    |
//! | 3    | `critical.min <= v <= critical.max` | `Critical` |
//! | 4    | no band matched (gap, NaN)        | `Critical` |
//!
//! A value on a bound shared by two bands lands in whichever band is tested
//! first. Values outside every band are flagged rather than hidden.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Classification output. `Unclassified` is the zero value used when the
/// project has no range for an indicator type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProductivityLevel {
    #[default]
    Unclassified,
    Ok,
    Alert,
    Critical,
}

impl ProductivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassified => "Unclassified",
            Self::Ok => "Ok",
            Self::Alert => "Alert",
            Self::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for ProductivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductivityLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ok" => Ok(Self::Ok),
            "Alert" => Ok(Self::Alert),
            "Critical" => Ok(Self::Critical),
            "Unclassified" => Ok(Self::Unclassified),
            _ => Err(DomainError::UnknownLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeValues {
    pub min: f64,
    pub max: f64,
}

impl RangeValues {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, band: &'static str) -> Result<(), DomainError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(DomainError::NonFiniteBand { band });
        }
        if self.min > self.max {
            return Err(DomainError::InvertedBand {
                band,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// The three bands configured for one indicator type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductivityRange {
    pub ok: RangeValues,
    pub alert: RangeValues,
    pub critical: RangeValues,
}

impl ProductivityRange {
    pub fn classify(&self, value: f64) -> ProductivityLevel {
        if self.ok.contains(value) {
            ProductivityLevel::Ok
        } else if self.alert.contains(value) {
            ProductivityLevel::Alert
        } else {
            // Covers both the critical band and the no-band fallback.
            ProductivityLevel::Critical
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.ok.validate("ok")?;
        self.alert.validate("alert")?;
        self.critical.validate("critical")?;
        Ok(())
    }
}

/// Classify against an optional range; a missing range yields `Unclassified`.
pub fn classify(value: f64, range: Option<&ProductivityRange>) -> ProductivityLevel {
    match range {
        Some(range) => range.classify(value),
        None => ProductivityLevel::Unclassified,
    }
}
