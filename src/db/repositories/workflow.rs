use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};

use crate::entities::{prelude::*, site_schedules, workflow_entries};

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub site_code: Option<String>,
    pub milestone: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u64>,
}

pub struct WorkflowRepository {
    conn: DatabaseConnection,
}

/// Newest entry first. Ties on `created_at` fall back to insertion order.
fn latest_first(query: Select<WorkflowEntries>) -> Select<WorkflowEntries> {
    query
        .order_by_desc(workflow_entries::Column::CreatedAt)
        .order_by_desc(workflow_entries::Column::Id)
}

impl WorkflowRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(
        &self,
        entry: workflow_entries::ActiveModel,
    ) -> Result<workflow_entries::Model> {
        entry
            .insert(&self.conn)
            .await
            .context("Failed to insert workflow entry")
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<workflow_entries::Model>> {
        WorkflowEntries::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query workflow entry")
    }

    pub async fn list(&self, filter: &EntryFilter) -> Result<Vec<workflow_entries::Model>> {
        let mut query = latest_first(WorkflowEntries::find());

        if let Some(site) = &filter.site_code {
            query = query.filter(workflow_entries::Column::SiteCode.eq(site.as_str()));
        }

        if let Some(milestone) = &filter.milestone {
            query = query.filter(workflow_entries::Column::Milestone.eq(milestone.as_str()));
        }

        if let Some(status) = &filter.status {
            query = query.filter(workflow_entries::Column::Status.eq(status.as_str()));
        }

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        query
            .all(&self.conn)
            .await
            .context("Failed to list workflow entries")
    }

    /// Most recent entry for a milestone, or for one subtask of it when
    /// `subtask` is given. `site_code` narrows the search to one site.
    pub async fn latest_for(
        &self,
        milestone: &str,
        subtask: Option<&str>,
        site_code: Option<&str>,
    ) -> Result<Option<workflow_entries::Model>> {
        let mut query = latest_first(WorkflowEntries::find())
            .filter(workflow_entries::Column::Milestone.eq(milestone));

        query = match subtask {
            Some(name) => query.filter(workflow_entries::Column::Subtask.eq(name)),
            None => query.filter(workflow_entries::Column::Subtask.is_null()),
        };

        if let Some(site) = site_code {
            query = query.filter(workflow_entries::Column::SiteCode.eq(site));
        }

        query
            .one(&self.conn)
            .await
            .context("Failed to query latest workflow status")
    }

    /// Every entry recorded for a site, newest first.
    pub async fn history_for_site(&self, site_code: &str) -> Result<Vec<workflow_entries::Model>> {
        latest_first(WorkflowEntries::find())
            .filter(workflow_entries::Column::SiteCode.eq(site_code))
            .all(&self.conn)
            .await
            .context("Failed to query site history")
    }

    pub async fn all_latest_first(&self) -> Result<Vec<workflow_entries::Model>> {
        latest_first(WorkflowEntries::find())
            .all(&self.conn)
            .await
            .context("Failed to query workflow entries")
    }

    pub async fn site_codes(&self) -> Result<Vec<String>> {
        WorkflowEntries::find()
            .select_only()
            .column(workflow_entries::Column::SiteCode)
            .distinct()
            .order_by_asc(workflow_entries::Column::SiteCode)
            .into_tuple::<String>()
            .all(&self.conn)
            .await
            .context("Failed to list site codes")
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(WorkflowEntries::find().count(&self.conn).await?)
    }

    /// Inserts or replaces the planned window of a site.
    pub async fn upsert_schedule(
        &self,
        site_code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<site_schedules::Model> {
        let model = site_schedules::ActiveModel {
            site_code: Set(site_code.to_string()),
            start_date: Set(start_date),
            end_date: Set(end_date),
            updated_at: Set(now),
            ..Default::default()
        };

        SiteSchedules::insert(model)
            .on_conflict(
                OnConflict::column(site_schedules::Column::SiteCode)
                    .update_columns([
                        site_schedules::Column::StartDate,
                        site_schedules::Column::EndDate,
                        site_schedules::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to save site schedule")?;

        self.get_schedule(site_code)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Schedule for {site_code} vanished after save"))
    }

    pub async fn get_schedule(&self, site_code: &str) -> Result<Option<site_schedules::Model>> {
        SiteSchedules::find()
            .filter(site_schedules::Column::SiteCode.eq(site_code))
            .one(&self.conn)
            .await
            .context("Failed to query site schedule")
    }

    pub async fn list_schedules(&self) -> Result<Vec<site_schedules::Model>> {
        SiteSchedules::find()
            .order_by_asc(site_schedules::Column::StartDate)
            .order_by_asc(site_schedules::Column::SiteCode)
            .all(&self.conn)
            .await
            .context("Failed to list site schedules")
    }
}
