//! Domain service for workflow entries and site progress.
//!
//! Status is never stored as current state: it is resolved from history by
//! taking the most recent entry for a (milestone, subtask[, site]) key.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt::Write;
use std::sync::OnceLock;
use thiserror::Error;

use crate::db::EntryFilter;
use crate::entities::{site_schedules, workflow_entries};
use crate::models::{Criticality, WorkflowStatus};
use crate::schedule::GanttRow;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown milestone: {0}")]
    UnknownMilestone(String),

    #[error("Subtask '{subtask}' does not belong to milestone '{milestone}'")]
    UnknownSubtask { milestone: String, subtask: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for WorkflowError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewWorkflowEntry {
    pub site_code: String,
    pub state: String,
    pub host_wire_centre: Option<String>,
    pub lata: Option<String>,
    pub equipment_type: Option<String>,
    pub milestone: String,
    pub subtask: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub actual_end: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtaskProgress {
    pub name: String,
    pub criticality: Criticality,
    pub status: Option<WorkflowStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MilestoneProgress {
    pub name: String,
    /// Latest milestone-level entry (recorded without a subtask).
    pub status: Option<WorkflowStatus>,
    pub complete: bool,
    pub subtasks: Vec<SubtaskProgress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteProgress {
    pub site_code: String,
    pub milestones: Vec<MilestoneProgress>,
    pub subtasks_total: usize,
    pub subtasks_done: usize,
    pub percent_done: f64,
}

impl SiteProgress {
    /// First milestone in sequence that is not complete yet.
    #[must_use]
    pub fn current_milestone(&self) -> Option<&MilestoneProgress> {
        self.milestones.iter().find(|m| !m.complete)
    }
}

/// One line of the all-sites report.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub site_code: String,
    pub percent_done: f64,
    pub milestones_complete: usize,
    pub milestones_total: usize,
    pub current_milestone: Option<String>,
}

impl From<&SiteProgress> for SiteSummary {
    fn from(progress: &SiteProgress) -> Self {
        Self {
            site_code: progress.site_code.clone(),
            percent_done: progress.percent_done,
            milestones_complete: progress.milestones.iter().filter(|m| m.complete).count(),
            milestones_total: progress.milestones.len(),
            current_milestone: progress.current_milestone().map(|m| m.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub generated_at: DateTime<Utc>,
    pub total_entries: u64,
    pub sites: Vec<SiteSummary>,
    /// Latest status per site and milestone, counted.
    pub status_counts: Vec<(WorkflowStatus, usize)>,
    /// Latest entry per site and milestone that is past its planned end and not Done.
    pub overdue: Vec<GanttRow>,
}

const CSV_HEADER: &str = "id,created_at,site_code,state,host_wire_centre,lata,equipment_type,\
milestone,subtask,status,planned_start,planned_end,actual_start,actual_end,notes,recorded_by";

fn csv_text(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_optional_text(value: Option<&str>) -> String {
    value.map(csv_text).unwrap_or_default()
}

fn csv_date(value: Option<NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}

/// Formats entries as CSV in the order given. Text columns are always quoted.
#[must_use]
pub fn entries_to_csv(entries: &[workflow_entries::Model]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for entry in entries {
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            csv_text(&entry.site_code),
            csv_text(&entry.state),
            csv_optional_text(entry.host_wire_centre.as_deref()),
            csv_optional_text(entry.lata.as_deref()),
            csv_optional_text(entry.equipment_type.as_deref()),
            csv_text(&entry.milestone),
            csv_optional_text(entry.subtask.as_deref()),
            csv_text(&entry.status),
            csv_date(entry.planned_start),
            csv_date(entry.planned_end),
            csv_date(entry.actual_start),
            csv_date(entry.actual_end),
            csv_optional_text(entry.notes.as_deref()),
            entry.recorded_by.map(|id| id.to_string()).unwrap_or_default()
        );
    }

    csv
}

/// Rows whose planned end is before `today` and whose latest status is not Done.
#[must_use]
pub fn overdue_rows(rows: &[GanttRow], today: NaiveDate) -> Vec<GanttRow> {
    rows.iter()
        .filter(|row| {
            row.status != WorkflowStatus::Done && row.planned_end.is_some_and(|end| end < today)
        })
        .cloned()
        .collect()
}

#[must_use]
pub fn count_statuses(rows: &[GanttRow]) -> Vec<(WorkflowStatus, usize)> {
    WorkflowStatus::ALL
        .iter()
        .map(|status| (*status, rows.iter().filter(|r| r.status == *status).count()))
        .collect()
}

/// Uppercases and checks a CLLI site code.
pub fn normalize_site_code(site_code: &str) -> Result<String, WorkflowError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Z0-9]{1,11}$").expect("Invalid regex"));

    let normalized = site_code.trim().to_uppercase();
    if re.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(WorkflowError::Validation(format!(
            "Site code must be 1-11 letters or digits, got '{site_code}'"
        )))
    }
}

pub fn check_date_range(
    label: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), WorkflowError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(WorkflowError::Validation(format!(
            "{label} end {end} is before start {start}"
        ))),
        _ => Ok(()),
    }
}

/// A milestone with "Must be complete" subtasks is complete when all of those
/// are Done; otherwise every subtask must be Done. A milestone without
/// subtasks follows its own milestone-level status.
#[must_use]
pub fn milestone_complete(
    milestone_status: Option<WorkflowStatus>,
    subtasks: &[SubtaskProgress],
) -> bool {
    let done = |s: &&SubtaskProgress| s.status == Some(WorkflowStatus::Done);

    if subtasks.is_empty() {
        return milestone_status == Some(WorkflowStatus::Done);
    }

    let required: Vec<&SubtaskProgress> = subtasks
        .iter()
        .filter(|s| s.criticality.blocks_milestone())
        .collect();

    if required.is_empty() {
        subtasks.iter().all(|s| done(&s))
    } else {
        required.iter().all(done)
    }
}

/// Domain service trait for workflow entries.
#[async_trait::async_trait]
pub trait WorkflowService: Send + Sync {
    /// Validates and appends an entry. `recorded_by` is audited when present.
    async fn record_entry(
        &self,
        entry: NewWorkflowEntry,
        recorded_by: Option<i32>,
    ) -> Result<workflow_entries::Model, WorkflowError>;

    async fn list_entries(
        &self,
        filter: &EntryFilter,
    ) -> Result<Vec<workflow_entries::Model>, WorkflowError>;

    /// Status of the most recent entry for the key; `None` when nothing was recorded.
    async fn current_status(
        &self,
        milestone: &str,
        subtask: Option<&str>,
        site_code: Option<&str>,
    ) -> Result<Option<WorkflowStatus>, WorkflowError>;

    async fn site_progress(&self, site_code: &str) -> Result<SiteProgress, WorkflowError>;

    async fn site_codes(&self) -> Result<Vec<String>, WorkflowError>;

    async fn set_site_schedule(
        &self,
        site_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        actor: Option<i32>,
    ) -> Result<site_schedules::Model, WorkflowError>;

    async fn site_schedule(
        &self,
        site_code: &str,
    ) -> Result<Option<site_schedules::Model>, WorkflowError>;

    async fn list_schedules(&self) -> Result<Vec<site_schedules::Model>, WorkflowError>;

    /// Latest entry per (site, milestone), ordered by site then catalog position.
    async fn gantt_rows(&self) -> Result<Vec<GanttRow>, WorkflowError>;

    /// Entries matching `filter` as CSV, newest first.
    async fn export_csv(&self, filter: &EntryFilter) -> Result<String, WorkflowError>;

    /// Progress of every site, status totals and overdue milestones.
    async fn report(&self) -> Result<WorkflowReport, WorkflowError>;
}
