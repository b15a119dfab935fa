//! Metric calculator.
//!
//! Two independent outputs come from an iteration's tasks:
//!
//! - **Series** (`IterationCalculator::analyse`): one point per completed
//!   task, ordered by `updated_at`, each classified on its own. Values are
//!   per-task raw figures (points per second of timer, bug points,
//!   improvement points).
//! - **Aggregates** (`aggregate_values`): one ratio per indicator type,
//!   persisted on the iteration's indicator row.
//!
//! The two use different normalizations on purpose; a series point is not a
//! partial of the aggregate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::indicator::{IndicatorType, IndicatorValues, RangeSet};
use crate::level::ProductivityLevel;
use crate::status::WorkStatus;

/// The slice of a task the calculator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSample {
    pub status: WorkStatus,
    pub points: i64,
    /// Elapsed seconds recorded on the task timer.
    pub timer_secs: i64,
    pub updated_at: DateTime<Utc>,
    pub bug_points: i64,
    pub improvement_points: i64,
}

impl TaskSample {
    /// Points per second of timer; zero when the timer never ran.
    pub fn speed(&self) -> f64 {
        if self.timer_secs > 0 {
            self.points as f64 / self.timer_secs as f64
        } else {
            0.0
        }
    }

    fn value_for(&self, indicator_type: IndicatorType) -> f64 {
        match indicator_type {
            IndicatorType::SpeedPerIteration => self.speed(),
            IndicatorType::ReworkPerIteration => self.bug_points as f64,
            IndicatorType::InstabilityIndex => self.improvement_points as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDefinition {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<String>,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// 1-based position in completion order.
    pub x: usize,
    pub y: f64,
    pub status: ProductivityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub x_axis: AxisDefinition,
    pub y_axis: AxisDefinition,
    pub points: Vec<DataPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationAnalysis {
    pub iteration_id: Uuid,
    /// Keyed by `IndicatorType::as_str()`.
    pub analysis: BTreeMap<String, IndicatorSeries>,
}

const X_AXIS_KIND: &str = "TASK_SEQUENCE";
const X_AXIS_LABEL: &str = "Completed tasks";

fn y_axis_label(indicator_type: IndicatorType) -> &'static str {
    match indicator_type {
        IndicatorType::SpeedPerIteration => "Points / time",
        IndicatorType::ReworkPerIteration => "Bug points / task",
        IndicatorType::InstabilityIndex => "Improvement points / task",
    }
}

/// Builds classified per-task series for one iteration.
pub struct IterationCalculator<'a> {
    completed: Vec<&'a TaskSample>,
    ranges: &'a RangeSet,
}

impl<'a> IterationCalculator<'a> {
    pub fn new(tasks: &'a [TaskSample], ranges: &'a RangeSet) -> Self {
        let mut completed: Vec<&TaskSample> =
            tasks.iter().filter(|t| t.status.is_completed()).collect();
        // Stable sort keeps input order for identical timestamps.
        completed.sort_by_key(|t| t.updated_at);
        Self { completed, ranges }
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Lazily yields classified points for one indicator type. Each call
    /// starts a fresh pass over the completed tasks.
    pub fn points(&self, indicator_type: IndicatorType) -> impl Iterator<Item = DataPoint> + '_ {
        let range = self.ranges.get(indicator_type);
        self.completed.iter().enumerate().map(move |(i, task)| {
            let y = task.value_for(indicator_type);
            DataPoint {
                x: i + 1,
                y,
                status: crate::level::classify(y, range),
            }
        })
    }

    pub fn series(&self, indicator_type: IndicatorType) -> IndicatorSeries {
        IndicatorSeries {
            indicator_type,
            x_axis: AxisDefinition {
                kind: Some(X_AXIS_KIND.to_string()),
                label: X_AXIS_LABEL.to_string(),
            },
            y_axis: AxisDefinition {
                kind: None,
                label: y_axis_label(indicator_type).to_string(),
            },
            points: self.points(indicator_type).collect(),
        }
    }

    pub fn analyse(&self, iteration_id: Uuid) -> IterationAnalysis {
        let analysis = IndicatorType::ALL
            .into_iter()
            .map(|t| (t.as_str().to_string(), self.series(t)))
            .collect();
        IterationAnalysis {
            iteration_id,
            analysis,
        }
    }
}

/// Ratio aggregates for the stored indicator:
/// speed = completed / elapsed_days, rework = bug points / tasks,
/// instability = improvement points / tasks. Zero denominators give 0.
pub fn aggregate_values(tasks: &[TaskSample], elapsed_days: f64) -> IndicatorValues {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.status.is_completed()).count();
    let bug_points: i64 = tasks.iter().map(|t| t.bug_points).sum();
    let improvement_points: i64 = tasks.iter().map(|t| t.improvement_points).sum();

    let speed = if elapsed_days > 0.0 && elapsed_days.is_finite() {
        completed as f64 / elapsed_days
    } else {
        0.0
    };
    let (rework, instability) = if total > 0 {
        (
            bug_points as f64 / total as f64,
            improvement_points as f64 / total as f64,
        )
    } else {
        (0.0, 0.0)
    };

    IndicatorValues {
        speed,
        rework,
        instability,
    }
}

/// Fractional days between two instants, floored at zero.
pub fn elapsed_days(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let secs = (end - start).num_seconds();
    if secs <= 0 {
        0.0
    } else {
        secs as f64 / 86_400.0
    }
}
