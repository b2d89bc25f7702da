//! `SeaORM` implementation of the `WorkflowService` trait.

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::Set;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::clock::{self, SharedClock};
use crate::db::{EntryFilter, NewAuditEntry, Store};
use crate::entities::{site_schedules, workflow_entries};
use crate::models::{Criticality, WorkflowStatus};
use crate::schedule::GanttRow;
use crate::services::workflow_service::{
    MilestoneProgress, NewWorkflowEntry, SiteProgress, SiteSummary, SubtaskProgress,
    WorkflowError, WorkflowReport, WorkflowService, check_date_range, count_statuses,
    entries_to_csv, milestone_complete, normalize_site_code, overdue_rows,
};

pub struct SeaOrmWorkflowService {
    store: Store,
    clock: SharedClock,
}

fn parse_status(raw: &str) -> Result<WorkflowStatus, WorkflowError> {
    raw.parse::<WorkflowStatus>()
        .map_err(|e| WorkflowError::Internal(e.to_string()))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SeaOrmWorkflowService {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, clock::system())
    }

    #[must_use]
    pub fn with_clock(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    async fn audit(&self, actor: i32, action: &str, description: String) {
        let entry = NewAuditEntry {
            account_id: actor,
            session_token: None,
            action: action.to_string(),
            description,
            client_address: None,
        };
        if let Err(e) = self.store.audit().append(entry, self.clock.now()).await {
            warn!(action, error = %e, "Failed to write audit entry");
        }
    }
}

#[async_trait]
impl WorkflowService for SeaOrmWorkflowService {
    async fn record_entry(
        &self,
        entry: NewWorkflowEntry,
        recorded_by: Option<i32>,
    ) -> Result<workflow_entries::Model, WorkflowError> {
        let site_code = normalize_site_code(&entry.site_code)?;
        check_date_range("Planned", entry.planned_start, entry.planned_end)?;
        check_date_range("Actual", entry.actual_start, entry.actual_end)?;

        let catalog = self.store.catalog();
        let milestone = catalog
            .get_milestone_by_name(entry.milestone.trim())
            .await?
            .ok_or_else(|| WorkflowError::UnknownMilestone(entry.milestone.clone()))?;

        let subtask = blank_to_none(entry.subtask);
        if let Some(name) = &subtask
            && catalog.get_subtask(milestone.id, name).await?.is_none()
        {
            return Err(WorkflowError::UnknownSubtask {
                milestone: milestone.name,
                subtask: name.clone(),
            });
        }

        let status = entry.status.unwrap_or(WorkflowStatus::ToDo);
        let now = self.clock.now();

        let saved = self
            .store
            .workflow()
            .insert(workflow_entries::ActiveModel {
                site_code: Set(site_code),
                state: Set(entry.state.trim().to_uppercase()),
                host_wire_centre: Set(blank_to_none(entry.host_wire_centre)),
                lata: Set(blank_to_none(entry.lata)),
                equipment_type: Set(blank_to_none(entry.equipment_type)),
                milestone: Set(milestone.name),
                subtask: Set(subtask),
                status: Set(status.as_str().to_string()),
                planned_start: Set(entry.planned_start),
                actual_start: Set(entry.actual_start),
                planned_end: Set(entry.planned_end),
                actual_end: Set(entry.actual_end),
                notes: Set(blank_to_none(entry.notes)),
                recorded_by: Set(recorded_by),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            })
            .await?;

        info!(
            site = %saved.site_code,
            milestone = %saved.milestone,
            status = %saved.status,
            "Workflow entry recorded"
        );

        if let Some(actor) = recorded_by {
            let target = saved.subtask.as_deref().map_or_else(
                || saved.milestone.clone(),
                |s| format!("{} / {s}", saved.milestone),
            );
            self.audit(
                actor,
                "workflow_entry",
                format!("{}: {target} set to {}", saved.site_code, saved.status),
            )
            .await;
        }

        Ok(saved)
    }

    async fn list_entries(
        &self,
        filter: &EntryFilter,
    ) -> Result<Vec<workflow_entries::Model>, WorkflowError> {
        let mut filter = filter.clone();
        if let Some(site) = filter.site_code.take() {
            filter.site_code = Some(normalize_site_code(&site)?);
        }
        Ok(self.store.workflow().list(&filter).await?)
    }

    async fn current_status(
        &self,
        milestone: &str,
        subtask: Option<&str>,
        site_code: Option<&str>,
    ) -> Result<Option<WorkflowStatus>, WorkflowError> {
        let site_code = site_code.map(normalize_site_code).transpose()?;

        let latest = self
            .store
            .workflow()
            .latest_for(milestone, subtask, site_code.as_deref())
            .await?;

        latest.map(|entry| parse_status(&entry.status)).transpose()
    }

    async fn site_progress(&self, site_code: &str) -> Result<SiteProgress, WorkflowError> {
        let site_code = normalize_site_code(site_code)?;

        // History is newest first, so the first status seen per key wins.
        let history = self.store.workflow().history_for_site(&site_code).await?;
        let mut latest: HashMap<(String, Option<String>), WorkflowStatus> = HashMap::new();
        for entry in history {
            if let Entry::Vacant(slot) = latest.entry((entry.milestone, entry.subtask)) {
                slot.insert(parse_status(&entry.status)?);
            }
        }

        let catalog = self.store.catalog().list_with_subtasks().await?;

        let mut subtasks_total = 0;
        let mut subtasks_done = 0;
        let mut milestones = Vec::with_capacity(catalog.len());

        for (milestone, subtasks) in catalog {
            let subtasks: Vec<SubtaskProgress> = subtasks
                .into_iter()
                .map(|s| {
                    let status = latest
                        .get(&(milestone.name.clone(), Some(s.name.clone())))
                        .copied();
                    SubtaskProgress {
                        criticality: s.criticality.parse().unwrap_or_else(|_| {
                            debug!(subtask = %s.name, "Unknown criticality, treating as default");
                            Criticality::default()
                        }),
                        name: s.name,
                        status,
                    }
                })
                .collect();

            subtasks_total += subtasks.len();
            subtasks_done += subtasks
                .iter()
                .filter(|s| s.status == Some(WorkflowStatus::Done))
                .count();

            let status = latest.get(&(milestone.name.clone(), None)).copied();
            milestones.push(MilestoneProgress {
                complete: milestone_complete(status, &subtasks),
                name: milestone.name,
                status,
                subtasks,
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let percent_done = if subtasks_total == 0 {
            0.0
        } else {
            subtasks_done as f64 * 100.0 / subtasks_total as f64
        };

        Ok(SiteProgress {
            site_code,
            milestones,
            subtasks_total,
            subtasks_done,
            percent_done,
        })
    }

    async fn site_codes(&self) -> Result<Vec<String>, WorkflowError> {
        Ok(self.store.workflow().site_codes().await?)
    }

    async fn set_site_schedule(
        &self,
        site_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        actor: Option<i32>,
    ) -> Result<site_schedules::Model, WorkflowError> {
        let site_code = normalize_site_code(site_code)?;
        check_date_range("Schedule", Some(start), Some(end))?;

        let saved = self
            .store
            .workflow()
            .upsert_schedule(&site_code, start, end, self.clock.now())
            .await?;

        info!(site = %site_code, %start, %end, "Site schedule saved");
        if let Some(actor) = actor {
            self.audit(
                actor,
                "schedule_change",
                format!("{site_code}: scheduled {start} to {end}"),
            )
            .await;
        }

        Ok(saved)
    }

    async fn site_schedule(
        &self,
        site_code: &str,
    ) -> Result<Option<site_schedules::Model>, WorkflowError> {
        let site_code = normalize_site_code(site_code)?;
        Ok(self.store.workflow().get_schedule(&site_code).await?)
    }

    async fn list_schedules(&self) -> Result<Vec<site_schedules::Model>, WorkflowError> {
        Ok(self.store.workflow().list_schedules().await?)
    }

    async fn gantt_rows(&self) -> Result<Vec<GanttRow>, WorkflowError> {
        let positions: HashMap<String, i32> = self
            .store
            .catalog()
            .list_milestones()
            .await?
            .into_iter()
            .map(|m| (m.name, m.position))
            .collect();

        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for entry in self.store.workflow().all_latest_first().await? {
            if !seen.insert((entry.site_code.clone(), entry.milestone.clone())) {
                continue;
            }
            rows.push(GanttRow {
                status: parse_status(&entry.status)?,
                site_code: entry.site_code,
                milestone: entry.milestone,
                planned_start: entry.planned_start,
                planned_end: entry.planned_end,
                actual_start: entry.actual_start,
                actual_end: entry.actual_end,
            });
        }

        rows.sort_by(|a, b| {
            a.site_code.cmp(&b.site_code).then_with(|| {
                let pa = positions.get(&a.milestone).copied().unwrap_or(i32::MAX);
                let pb = positions.get(&b.milestone).copied().unwrap_or(i32::MAX);
                pa.cmp(&pb)
            })
        });

        Ok(rows)
    }

    async fn export_csv(&self, filter: &EntryFilter) -> Result<String, WorkflowError> {
        let entries = self.list_entries(filter).await?;
        debug!(count = entries.len(), "Exporting workflow entries");
        Ok(entries_to_csv(&entries))
    }

    async fn report(&self) -> Result<WorkflowReport, WorkflowError> {
        let now = self.clock.now();
        let rows = self.gantt_rows().await?;

        let mut sites = Vec::new();
        for code in self.site_codes().await? {
            let progress = self.site_progress(&code).await?;
            sites.push(SiteSummary::from(&progress));
        }

        Ok(WorkflowReport {
            generated_at: now,
            total_entries: self.store.workflow().count().await?,
            sites,
            status_counts: count_statuses(&rows),
            overdue: overdue_rows(&rows, now.date_naive()),
        })
    }
}
