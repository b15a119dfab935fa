use chrono::{DateTime, Utc};
use prodyo_core::{
    IndicatorType, IndicatorValues, MetricKind, MetricValue, ProductivityLevel, ProductivityRange,
    RangeSet, WorkStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn to_member(&self) -> Member {
        Member {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub color: String,
    pub members: Vec<Member>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project as listed for one of its members.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub iterations_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Iteration {
    pub id: Uuid,
    pub project_id: Uuid,
    pub number: i64,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub iteration_id: Uuid,
    pub name: String,
    pub description: String,
    pub assignee: Option<Member>,
    pub status: WorkStatus,
    /// Elapsed seconds.
    pub timer: i64,
    pub points: i64,
    pub bugs: Vec<WorkItem>,
    pub improvements: Vec<WorkItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn sample(&self) -> prodyo_core::TaskSample {
        prodyo_core::TaskSample {
            status: self.status,
            points: self.points,
            timer_secs: self.timer,
            updated_at: self.updated_at,
            bug_points: self.bugs.iter().map(|b| b.points).sum(),
            improvement_points: self.improvements.iter().map(|i| i.points).sum(),
        }
    }
}

/// Bugs and improvements share one shape and live in separate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemKind {
    Bug,
    Improvement,
}

impl WorkItemKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Bug => "bugs",
            Self::Improvement => "improvements",
        }
    }

    pub fn entity(&self) -> &'static str {
        match self {
            Self::Bug => "Bug",
            Self::Improvement => "Improvement",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub task_id: Uuid,
    pub assignee: Option<Member>,
    pub number: i64,
    pub description: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorRange {
    pub id: Uuid,
    pub project_id: Uuid,
    pub indicator_type: IndicatorType,
    pub range: ProductivityRange,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Builds the classifier's lookup table from a project's stored ranges.
pub fn range_set(ranges: &[IndicatorRange]) -> RangeSet {
    ranges.iter().map(|r| (r.indicator_type, r.range)).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Cause {
    pub id: Uuid,
    pub indicator_range_id: Uuid,
    pub metric: MetricKind,
    pub description: String,
    pub productivity_level: ProductivityLevel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub id: Uuid,
    pub indicator_range_id: Uuid,
    pub cause: Cause,
    pub description: String,
    pub status: WorkStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub assignee: Option<Member>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Action {
    pub fn fields(&self) -> prodyo_core::ActionFields {
        prodyo_core::ActionFields {
            description: self.description.clone(),
            status: self.status,
            start_at: self.start_at,
            end_at: self.end_at,
            assignee_id: self.assignee.as_ref().map(|m| m.id),
        }
    }
}

/// One iteration's stored metric values. Levels are filled in on read from
/// the project's current ranges and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Indicator {
    pub id: Uuid,
    pub iteration_id: Uuid,
    pub speed_value: f64,
    pub rework_value: f64,
    pub instability_value: f64,
    pub speed_level: ProductivityLevel,
    pub rework_level: ProductivityLevel,
    pub instability_level: ProductivityLevel,
    pub causes: Vec<Cause>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Indicator {
    pub fn values(&self) -> IndicatorValues {
        IndicatorValues {
            speed: self.speed_value,
            rework: self.rework_value,
            instability: self.instability_value,
        }
    }

    pub fn classify(&mut self, ranges: &RangeSet) {
        self.speed_level = ranges.level(IndicatorType::SpeedPerIteration, self.speed_value);
        self.rework_level = ranges.level(IndicatorType::ReworkPerIteration, self.rework_value);
        self.instability_level =
            ranges.level(IndicatorType::InstabilityIndex, self.instability_value);
    }

    pub fn summary(&self, ranges: &RangeSet) -> Vec<MetricValue> {
        self.values().summary(ranges)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CausesAndActions {
    pub iteration_id: Uuid,
    pub causes: Vec<Cause>,
    pub actions: Vec<Action>,
}

// ── Pagination ────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw `?page=&page_size=` query. Missing or zero values fall back to
/// defaults and oversized pages are clamped.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageRequest {
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn page_size(&self) -> u32 {
        match self.page_size {
            Some(0) | None => DEFAULT_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.page_size())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(req: &PageRequest, total: u64) -> Self {
        let page = req.page();
        let page_size = req.page_size();
        let total_pages = total.div_ceil(u64::from(page_size));
        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}
