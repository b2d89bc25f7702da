use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::entities::{milestones, prelude::*, subtasks, workflow_entries};

pub struct CatalogRepository {
    conn: DatabaseConnection,
}

async fn renumber_milestones<C: ConnectionTrait>(
    db: &C,
    ordered: &[milestones::Model],
    now: DateTime<Utc>,
) -> Result<()> {
    for (position, milestone) in (0_i32..).zip(ordered) {
        if milestone.position != position {
            Milestones::update_many()
                .col_expr(milestones::Column::Position, Expr::value(position))
                .col_expr(milestones::Column::UpdatedAt, Expr::value(now))
                .filter(milestones::Column::Id.eq(milestone.id))
                .exec(db)
                .await?;
        }
    }
    Ok(())
}

async fn renumber_subtasks<C: ConnectionTrait>(
    db: &C,
    ordered: &[subtasks::Model],
    now: DateTime<Utc>,
) -> Result<()> {
    for (position, subtask) in (0_i32..).zip(ordered) {
        if subtask.position != position {
            Subtasks::update_many()
                .col_expr(subtasks::Column::Position, Expr::value(position))
                .col_expr(subtasks::Column::UpdatedAt, Expr::value(now))
                .filter(subtasks::Column::Id.eq(subtask.id))
                .exec(db)
                .await?;
        }
    }
    Ok(())
}

/// Moves the element at `from` to `to` (clamped to the list bounds).
fn reorder<T>(items: &mut Vec<T>, from: usize, to: usize) {
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
}

impl CatalogRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_milestones(&self) -> Result<Vec<milestones::Model>> {
        Milestones::find()
            .order_by_asc(milestones::Column::Position)
            .order_by_asc(milestones::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list milestones")
    }

    /// Milestones in sequence order, each with its subtasks in order.
    pub async fn list_with_subtasks(
        &self,
    ) -> Result<Vec<(milestones::Model, Vec<subtasks::Model>)>> {
        let milestones = self.list_milestones().await?;

        let all_subtasks = Subtasks::find()
            .order_by_asc(subtasks::Column::MilestoneId)
            .order_by_asc(subtasks::Column::Position)
            .order_by_asc(subtasks::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list subtasks")?;

        let mut grouped: HashMap<i32, Vec<subtasks::Model>> = HashMap::new();
        for subtask in all_subtasks {
            grouped.entry(subtask.milestone_id).or_default().push(subtask);
        }

        Ok(milestones
            .into_iter()
            .map(|m| {
                let subtasks = grouped.remove(&m.id).unwrap_or_default();
                (m, subtasks)
            })
            .collect())
    }

    pub async fn get_milestone_by_name(&self, name: &str) -> Result<Option<milestones::Model>> {
        Milestones::find()
            .filter(milestones::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query milestone")
    }

    pub async fn subtasks_for(&self, milestone_id: i32) -> Result<Vec<subtasks::Model>> {
        Subtasks::find()
            .filter(subtasks::Column::MilestoneId.eq(milestone_id))
            .order_by_asc(subtasks::Column::Position)
            .order_by_asc(subtasks::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list subtasks")
    }

    pub async fn get_subtask(
        &self,
        milestone_id: i32,
        name: &str,
    ) -> Result<Option<subtasks::Model>> {
        Subtasks::find()
            .filter(subtasks::Column::MilestoneId.eq(milestone_id))
            .filter(subtasks::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query subtask")
    }

    /// Appends a milestone to the end of the sequence.
    pub async fn add_milestone(
        &self,
        name: &str,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<milestones::Model> {
        let position = i32::try_from(self.list_milestones().await?.len())?;

        milestones::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert milestone")
    }

    /// Renames a milestone and every workflow entry that refers to it.
    pub async fn rename_milestone(
        &self,
        milestone: &milestones::Model,
        new_name: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let txn = self.conn.begin().await?;

        Milestones::update_many()
            .col_expr(milestones::Column::Name, Expr::value(new_name))
            .col_expr(milestones::Column::UpdatedAt, Expr::value(now))
            .filter(milestones::Column::Id.eq(milestone.id))
            .exec(&txn)
            .await?;

        let entries = WorkflowEntries::update_many()
            .col_expr(workflow_entries::Column::Milestone, Expr::value(new_name))
            .filter(workflow_entries::Column::Milestone.eq(milestone.name.as_str()))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(entries.rows_affected)
    }

    pub async fn set_milestone_description(
        &self,
        id: i32,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        Milestones::update_many()
            .col_expr(milestones::Column::Description, Expr::value(description))
            .col_expr(milestones::Column::UpdatedAt, Expr::value(now))
            .filter(milestones::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update milestone")?;
        Ok(())
    }

    /// Deletes a milestone with its subtasks and closes the gap in positions.
    pub async fn delete_milestone(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        let txn = self.conn.begin().await?;

        Subtasks::delete_many()
            .filter(subtasks::Column::MilestoneId.eq(id))
            .exec(&txn)
            .await?;
        Milestones::delete_by_id(id).exec(&txn).await?;

        let remaining = Milestones::find()
            .order_by_asc(milestones::Column::Position)
            .order_by_asc(milestones::Column::Id)
            .all(&txn)
            .await?;
        renumber_milestones(&txn, &remaining, now).await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn move_milestone(&self, id: i32, to: usize, now: DateTime<Utc>) -> Result<()> {
        let txn = self.conn.begin().await?;

        let mut ordered = Milestones::find()
            .order_by_asc(milestones::Column::Position)
            .order_by_asc(milestones::Column::Id)
            .all(&txn)
            .await?;

        let from = ordered
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| anyhow::anyhow!("Milestone {id} not found"))?;
        reorder(&mut ordered, from, to);
        renumber_milestones(&txn, &ordered, now).await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn add_subtask(
        &self,
        milestone_id: i32,
        name: &str,
        description: Option<String>,
        criticality: &str,
        now: DateTime<Utc>,
    ) -> Result<subtasks::Model> {
        let position = i32::try_from(self.subtasks_for(milestone_id).await?.len())?;

        subtasks::ActiveModel {
            milestone_id: Set(milestone_id),
            name: Set(name.to_string()),
            description: Set(description),
            criticality: Set(criticality.to_string()),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert subtask")
    }

    /// Renames a subtask and the workflow entries recorded against it.
    pub async fn rename_subtask(
        &self,
        milestone_name: &str,
        subtask: &subtasks::Model,
        new_name: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let txn = self.conn.begin().await?;

        Subtasks::update_many()
            .col_expr(subtasks::Column::Name, Expr::value(new_name))
            .col_expr(subtasks::Column::UpdatedAt, Expr::value(now))
            .filter(subtasks::Column::Id.eq(subtask.id))
            .exec(&txn)
            .await?;

        let entries = WorkflowEntries::update_many()
            .col_expr(workflow_entries::Column::Subtask, Expr::value(new_name))
            .filter(workflow_entries::Column::Milestone.eq(milestone_name))
            .filter(workflow_entries::Column::Subtask.eq(subtask.name.as_str()))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(entries.rows_affected)
    }

    pub async fn set_criticality(
        &self,
        subtask_id: i32,
        criticality: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        Subtasks::update_many()
            .col_expr(subtasks::Column::Criticality, Expr::value(criticality))
            .col_expr(subtasks::Column::UpdatedAt, Expr::value(now))
            .filter(subtasks::Column::Id.eq(subtask_id))
            .exec(&self.conn)
            .await
            .context("Failed to update criticality")?;
        Ok(())
    }

    pub async fn set_subtask_description(
        &self,
        subtask_id: i32,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        Subtasks::update_many()
            .col_expr(subtasks::Column::Description, Expr::value(description))
            .col_expr(subtasks::Column::UpdatedAt, Expr::value(now))
            .filter(subtasks::Column::Id.eq(subtask_id))
            .exec(&self.conn)
            .await
            .context("Failed to update subtask")?;
        Ok(())
    }

    pub async fn delete_subtask(&self, subtask: &subtasks::Model, now: DateTime<Utc>) -> Result<()> {
        let txn = self.conn.begin().await?;

        Subtasks::delete_by_id(subtask.id).exec(&txn).await?;

        let remaining = Subtasks::find()
            .filter(subtasks::Column::MilestoneId.eq(subtask.milestone_id))
            .order_by_asc(subtasks::Column::Position)
            .order_by_asc(subtasks::Column::Id)
            .all(&txn)
            .await?;
        renumber_subtasks(&txn, &remaining, now).await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn move_subtask(
        &self,
        subtask: &subtasks::Model,
        to: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let txn = self.conn.begin().await?;

        let mut ordered = Subtasks::find()
            .filter(subtasks::Column::MilestoneId.eq(subtask.milestone_id))
            .order_by_asc(subtasks::Column::Position)
            .order_by_asc(subtasks::Column::Id)
            .all(&txn)
            .await?;

        let from = ordered
            .iter()
            .position(|s| s.id == subtask.id)
            .ok_or_else(|| anyhow::anyhow!("Subtask {} not found", subtask.id))?;
        reorder(&mut ordered, from, to);
        renumber_subtasks(&txn, &ordered, now).await?;

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::reorder;

    #[test]
    fn test_reorder_moves_and_clamps() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        reorder(&mut items, 0, 2);
        assert_eq!(items, vec!['b', 'c', 'a', 'd']);

        reorder(&mut items, 1, 99);
        assert_eq!(items, vec!['b', 'a', 'd', 'c']);

        reorder(&mut items, 3, 0);
        assert_eq!(items, vec!['c', 'b', 'a', 'd']);
    }
}
