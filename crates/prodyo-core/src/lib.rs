//! Productivity indicator engine shared by the prodyo server.
//!
//! ## Module Map
//!
//! | Module        | Responsibility                                          |
//! |---------------|---------------------------------------------------------|
//! | `level`       | `ProductivityLevel`, band types and the classifier      |
//! | `indicator`   | `IndicatorType`, default bands, `RangeSet`, values      |
//! | `status`      | `WorkStatus` shared by tasks and actions                |
//! | `calculator`  | Per-task series and aggregate metric values             |
//! | `remediation` | Cause/action inputs, validation and partial updates     |
//! | `error`       | `DomainError` returned by validation helpers            |
//!
//! Nothing in this crate performs I/O. The server loads rows, converts them
//! into the types here, and persists whatever comes back.

pub mod calculator;
pub mod error;
pub mod indicator;
pub mod level;
pub mod remediation;
pub mod status;

pub use calculator::{
    DataPoint, IndicatorSeries, IterationAnalysis, IterationCalculator, TaskSample,
    aggregate_values, elapsed_days,
};
pub use error::DomainError;
pub use indicator::{IndicatorType, IndicatorValues, MetricValue, RangeSet};
pub use level::{ProductivityLevel, ProductivityRange, RangeValues, classify};
pub use remediation::{ActionChanges, ActionFields, MetricKind, NewCause};
pub use status::WorkStatus;
