use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::{audit_log, prelude::*};

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub account_id: i32,
    pub session_token: Option<String>,
    pub action: String,
    pub description: String,
    pub client_address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub account_id: Option<i32>,
    pub action: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn append(
        &self,
        entry: NewAuditEntry,
        now: DateTime<Utc>,
    ) -> Result<audit_log::Model> {
        audit_log::ActiveModel {
            account_id: Set(entry.account_id),
            session_token: Set(entry.session_token),
            action: Set(entry.action),
            description: Set(entry.description),
            client_address: Set(entry.client_address),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to append audit entry")
    }

    /// Newest first.
    pub async fn list(&self, filter: &AuditFilter) -> Result<Vec<audit_log::Model>> {
        let mut query = AuditLog::find()
            .order_by_desc(audit_log::Column::CreatedAt)
            .order_by_desc(audit_log::Column::Id);

        if let Some(account_id) = filter.account_id {
            query = query.filter(audit_log::Column::AccountId.eq(account_id));
        }

        if let Some(action) = &filter.action {
            query = query.filter(audit_log::Column::Action.eq(action.as_str()));
        }

        if let Some(since) = filter.since {
            query = query.filter(audit_log::Column::CreatedAt.gte(since));
        }

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        query
            .all(&self.conn)
            .await
            .context("Failed to query audit log")
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(AuditLog::find().count(&self.conn).await?)
    }
}
