use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::level::{ProductivityLevel, ProductivityRange, RangeValues};

/// The three productivity indicators tracked per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorType {
    /// Completed tasks per elapsed day.
    SpeedPerIteration,
    /// Bug points per task.
    ReworkPerIteration,
    /// Improvement points per task.
    InstabilityIndex,
}

impl IndicatorType {
    pub const ALL: [IndicatorType; 3] = [
        Self::SpeedPerIteration,
        Self::ReworkPerIteration,
        Self::InstabilityIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpeedPerIteration => "SpeedPerIteration",
            Self::ReworkPerIteration => "ReworkPerIteration",
            Self::InstabilityIndex => "InstabilityIndex",
        }
    }

    /// Bands seeded for a new project.
    pub fn default_range(&self) -> ProductivityRange {
        match self {
            Self::SpeedPerIteration => ProductivityRange {
                ok: RangeValues::new(10.0, 100.0),
                alert: RangeValues::new(5.0, 10.0),
                critical: RangeValues::new(0.0, 5.0),
            },
            Self::ReworkPerIteration => ProductivityRange {
                ok: RangeValues::new(0.0, 0.1),
                alert: RangeValues::new(0.1, 0.3),
                critical: RangeValues::new(0.3, 1.0),
            },
            Self::InstabilityIndex => ProductivityRange {
                ok: RangeValues::new(0.0, 0.15),
                alert: RangeValues::new(0.15, 0.4),
                critical: RangeValues::new(0.4, 1.0),
            },
        }
    }
}

impl std::fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SpeedPerIteration" => Ok(Self::SpeedPerIteration),
            "ReworkPerIteration" => Ok(Self::ReworkPerIteration),
            "InstabilityIndex" => Ok(Self::InstabilityIndex),
            _ => Err(DomainError::UnknownIndicatorType(s.to_string())),
        }
    }
}

/// A project's configured bands keyed by indicator type. Types without an
/// entry classify as `Unclassified`.
#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    ranges: HashMap<IndicatorType, ProductivityRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        IndicatorType::ALL
            .into_iter()
            .map(|t| (t, t.default_range()))
            .collect()
    }

    pub fn insert(&mut self, indicator_type: IndicatorType, range: ProductivityRange) {
        self.ranges.insert(indicator_type, range);
    }

    pub fn get(&self, indicator_type: IndicatorType) -> Option<&ProductivityRange> {
        self.ranges.get(&indicator_type)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn level(&self, indicator_type: IndicatorType, value: f64) -> ProductivityLevel {
        crate::level::classify(value, self.get(indicator_type))
    }
}

impl FromIterator<(IndicatorType, ProductivityRange)> for RangeSet {
    fn from_iter<I: IntoIterator<Item = (IndicatorType, ProductivityRange)>>(iter: I) -> Self {
        Self {
            ranges: iter.into_iter().collect(),
        }
    }
}

/// Stored aggregate values of one iteration's indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValues {
    pub speed: f64,
    pub rework: f64,
    pub instability: f64,
}

impl IndicatorValues {
    pub fn get(&self, indicator_type: IndicatorType) -> f64 {
        match indicator_type {
            IndicatorType::SpeedPerIteration => self.speed,
            IndicatorType::ReworkPerIteration => self.rework,
            IndicatorType::InstabilityIndex => self.instability,
        }
    }

    /// One entry per indicator type, in `IndicatorType::ALL` order.
    pub fn summary(&self, ranges: &RangeSet) -> Vec<MetricValue> {
        IndicatorType::ALL
            .into_iter()
            .map(|indicator_type| {
                let value = self.get(indicator_type);
                MetricValue {
                    indicator_type,
                    value,
                    productivity_level: ranges.level(indicator_type, value),
                }
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, v) in [
            ("speed_value", self.speed),
            ("rework_value", self.rework),
            ("instability_value", self.instability),
        ] {
            if !v.is_finite() {
                return Err(DomainError::NonFiniteValue { field });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub indicator_type: IndicatorType,
    pub value: f64,
    pub productivity_level: ProductivityLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_indicator_type() {
        let set = RangeSet::with_defaults();
        assert_eq!(set.len(), 3);
        for t in IndicatorType::ALL {
            assert_eq!(set.get(t), Some(&t.default_range()));
            assert!(t.default_range().validate().is_ok());
        }
    }

    #[test]
    fn default_bands_match_seeded_values() {
        let speed = IndicatorType::SpeedPerIteration.default_range();
        assert_eq!(speed.ok, RangeValues::new(10.0, 100.0));
        assert_eq!(speed.alert, RangeValues::new(5.0, 10.0));
        assert_eq!(speed.critical, RangeValues::new(0.0, 5.0));

        let instability = IndicatorType::InstabilityIndex.default_range();
        assert_eq!(instability.ok, RangeValues::new(0.0, 0.15));
        assert_eq!(instability.alert, RangeValues::new(0.15, 0.4));
        assert_eq!(instability.critical, RangeValues::new(0.4, 1.0));
    }

    #[test]
    fn empty_set_leaves_every_level_unclassified() {
        let values = IndicatorValues {
            speed: 3.0,
            rework: 0.5,
            instability: 0.9,
        };
        let summary = values.summary(&RangeSet::new());
        assert_eq!(summary.len(), 3);
        assert!(
            summary
                .iter()
                .all(|m| m.productivity_level == ProductivityLevel::Unclassified)
        );
    }

    #[test]
    fn partial_set_only_classifies_configured_types() {
        let mut set = RangeSet::new();
        set.insert(
            IndicatorType::ReworkPerIteration,
            IndicatorType::ReworkPerIteration.default_range(),
        );
        let values = IndicatorValues {
            speed: 50.0,
            rework: 0.2,
            instability: 0.0,
        };
        let summary = values.summary(&set);
        assert_eq!(summary[0].productivity_level, ProductivityLevel::Unclassified);
        assert_eq!(summary[1].productivity_level, ProductivityLevel::Alert);
        assert_eq!(summary[2].productivity_level, ProductivityLevel::Unclassified);
    }

    #[test]
    fn indicator_type_parse_is_exact() {
        assert_eq!(
            "ReworkPerIteration".parse::<IndicatorType>(),
            Ok(IndicatorType::ReworkPerIteration)
        );
        assert!(matches!(
            "speed".parse::<IndicatorType>(),
            Err(DomainError::UnknownIndicatorType(_))
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let values = IndicatorValues {
            speed: f64::NAN,
            rework: 0.0,
            instability: 0.0,
        };
        assert_eq!(
            values.validate(),
            Err(DomainError::NonFiniteValue { field: "speed_value" })
        );
    }
}
