//! `SeaORM` implementation of the `CatalogService` trait.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::clock::{self, SharedClock};
use crate::db::{NewAuditEntry, Store};
use crate::entities::{milestones, subtasks};
use crate::models::Criticality;
use crate::services::catalog_service::{
    CatalogError, CatalogService, Direction, Milestone, Subtask, SubtaskUpdate, clean_name, step,
};

pub struct SeaOrmCatalogService {
    store: Store,
    clock: SharedClock,
}

impl SeaOrmCatalogService {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, clock::system())
    }

    #[must_use]
    pub fn with_clock(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    async fn audit(&self, actor: Option<i32>, action: &str, description: String) {
        let Some(account_id) = actor else {
            return;
        };
        let entry = NewAuditEntry {
            account_id,
            session_token: None,
            action: action.to_string(),
            description,
            client_address: None,
        };
        if let Err(e) = self.store.audit().append(entry, self.clock.now()).await {
            warn!(action, error = %e, "Failed to write audit entry");
        }
    }

    async fn find_milestone(&self, name: &str) -> Result<milestones::Model, CatalogError> {
        self.store
            .catalog()
            .get_milestone_by_name(name.trim())
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("milestone '{}'", name.trim())))
    }

    async fn find_subtask(
        &self,
        milestone: &milestones::Model,
        name: &str,
    ) -> Result<subtasks::Model, CatalogError> {
        self.store
            .catalog()
            .get_subtask(milestone.id, name.trim())
            .await?
            .ok_or_else(|| {
                CatalogError::NotFound(format!(
                    "subtask '{}' in milestone '{}'",
                    name.trim(),
                    milestone.name
                ))
            })
    }

    async fn subtask_by_id(
        &self,
        milestone_id: i32,
        id: i32,
    ) -> Result<subtasks::Model, CatalogError> {
        self.store
            .catalog()
            .subtasks_for(milestone_id)
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CatalogError::NotFound(format!("subtask {id}")))
    }
}

#[async_trait]
impl CatalogService for SeaOrmCatalogService {
    async fn list_milestones(&self) -> Result<Vec<Milestone>, CatalogError> {
        let catalog = self.store.catalog().list_with_subtasks().await?;
        Ok(catalog
            .into_iter()
            .map(|(m, s)| Milestone::from_parts(m, s))
            .collect())
    }

    async fn milestone_with_subtasks(&self, name: &str) -> Result<Milestone, CatalogError> {
        let milestone = self.find_milestone(name).await?;
        let subtasks = self.store.catalog().subtasks_for(milestone.id).await?;
        Ok(Milestone::from_parts(milestone, subtasks))
    }

    async fn add_milestone(
        &self,
        name: &str,
        description: Option<String>,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError> {
        let name = clean_name("Milestone", name)?;
        let catalog = self.store.catalog();

        if catalog.get_milestone_by_name(&name).await?.is_some() {
            return Err(CatalogError::Conflict(format!("milestone '{name}'")));
        }

        let created = catalog
            .add_milestone(&name, description, self.clock.now())
            .await?;

        info!(milestone = %created.name, position = created.position, "Milestone added");
        self.audit(actor, "milestone_added", format!("Added milestone {name}"))
            .await;

        Ok(Milestone::from_parts(created, Vec::new()))
    }

    async fn rename_milestone(
        &self,
        name: &str,
        new_name: &str,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError> {
        let milestone = self.find_milestone(name).await?;
        let new_name = clean_name("Milestone", new_name)?;

        if new_name == milestone.name {
            return self.milestone_with_subtasks(&new_name).await;
        }

        let catalog = self.store.catalog();
        if catalog.get_milestone_by_name(&new_name).await?.is_some() {
            return Err(CatalogError::Conflict(format!("milestone '{new_name}'")));
        }

        let updated = catalog
            .rename_milestone(&milestone, &new_name, self.clock.now())
            .await?;

        info!(from = %milestone.name, to = %new_name, entries = updated, "Milestone renamed");
        self.audit(
            actor,
            "milestone_renamed",
            format!("Renamed milestone {} to {new_name}", milestone.name),
        )
        .await;

        self.milestone_with_subtasks(&new_name).await
    }

    async fn set_milestone_description(
        &self,
        name: &str,
        description: Option<String>,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError> {
        let milestone = self.find_milestone(name).await?;

        self.store
            .catalog()
            .set_milestone_description(milestone.id, description, self.clock.now())
            .await?;

        self.audit(
            actor,
            "milestone_updated",
            format!("Updated description of milestone {}", milestone.name),
        )
        .await;

        self.milestone_with_subtasks(&milestone.name).await
    }

    async fn delete_milestone(&self, name: &str, actor: Option<i32>) -> Result<(), CatalogError> {
        let milestone = self.find_milestone(name).await?;

        self.store
            .catalog()
            .delete_milestone(milestone.id, self.clock.now())
            .await?;

        info!(milestone = %milestone.name, "Milestone deleted");
        self.audit(
            actor,
            "milestone_deleted",
            format!("Deleted milestone {}", milestone.name),
        )
        .await;

        Ok(())
    }

    async fn move_milestone(
        &self,
        name: &str,
        direction: Direction,
        actor: Option<i32>,
    ) -> Result<Vec<Milestone>, CatalogError> {
        let milestone = self.find_milestone(name).await?;
        let catalog = self.store.catalog();

        let ordered = catalog.list_milestones().await?;
        let index = ordered
            .iter()
            .position(|m| m.id == milestone.id)
            .ok_or_else(|| CatalogError::NotFound(format!("milestone '{}'", milestone.name)))?;

        if let Some(target) = step(index, ordered.len(), direction) {
            catalog
                .move_milestone(milestone.id, target, self.clock.now())
                .await?;
            self.audit(
                actor,
                "milestone_moved",
                format!("Moved milestone {} {direction}", milestone.name),
            )
            .await;
        }

        self.list_milestones().await
    }

    async fn add_subtask(
        &self,
        milestone: &str,
        name: &str,
        description: Option<String>,
        criticality: Criticality,
        actor: Option<i32>,
    ) -> Result<Subtask, CatalogError> {
        let milestone = self.find_milestone(milestone).await?;
        let name = clean_name("Subtask", name)?;
        let catalog = self.store.catalog();

        if catalog.get_subtask(milestone.id, &name).await?.is_some() {
            return Err(CatalogError::Conflict(format!(
                "subtask '{name}' in milestone '{}'",
                milestone.name
            )));
        }

        let created = catalog
            .add_subtask(
                milestone.id,
                &name,
                description,
                criticality.as_str(),
                self.clock.now(),
            )
            .await?;

        info!(milestone = %milestone.name, subtask = %name, "Subtask added");
        self.audit(
            actor,
            "subtask_added",
            format!("Added subtask {name} to {} ({criticality})", milestone.name),
        )
        .await;

        Ok(Subtask::from(created))
    }

    async fn update_subtask(
        &self,
        milestone: &str,
        name: &str,
        update: SubtaskUpdate,
        actor: Option<i32>,
    ) -> Result<Subtask, CatalogError> {
        let milestone = self.find_milestone(milestone).await?;
        let subtask = self.find_subtask(&milestone, name).await?;
        let catalog = self.store.catalog();
        let now = self.clock.now();

        let mut changes = Vec::new();

        if let Some(new_name) = update.name {
            let new_name = clean_name("Subtask", &new_name)?;
            if new_name != subtask.name {
                if catalog.get_subtask(milestone.id, &new_name).await?.is_some() {
                    return Err(CatalogError::Conflict(format!(
                        "subtask '{new_name}' in milestone '{}'",
                        milestone.name
                    )));
                }
                catalog
                    .rename_subtask(&milestone.name, &subtask, &new_name, now)
                    .await?;
                changes.push(format!("renamed to {new_name}"));
            }
        }

        if let Some(description) = update.description {
            catalog
                .set_subtask_description(subtask.id, description, now)
                .await?;
            changes.push("description updated".to_string());
        }

        if let Some(criticality) = update.criticality {
            catalog
                .set_criticality(subtask.id, criticality.as_str(), now)
                .await?;
            changes.push(format!("criticality {criticality}"));
        }

        if !changes.is_empty() {
            self.audit(
                actor,
                "subtask_updated",
                format!(
                    "Subtask {} in {}: {}",
                    subtask.name,
                    milestone.name,
                    changes.join(", ")
                ),
            )
            .await;
        }

        Ok(Subtask::from(
            self.subtask_by_id(milestone.id, subtask.id).await?,
        ))
    }

    async fn set_criticality(
        &self,
        milestone: &str,
        name: &str,
        criticality: Criticality,
        actor: Option<i32>,
    ) -> Result<Subtask, CatalogError> {
        self.update_subtask(
            milestone,
            name,
            SubtaskUpdate {
                criticality: Some(criticality),
                ..SubtaskUpdate::default()
            },
            actor,
        )
        .await
    }

    async fn delete_subtask(
        &self,
        milestone: &str,
        name: &str,
        actor: Option<i32>,
    ) -> Result<(), CatalogError> {
        let milestone = self.find_milestone(milestone).await?;
        let subtask = self.find_subtask(&milestone, name).await?;

        self.store
            .catalog()
            .delete_subtask(&subtask, self.clock.now())
            .await?;

        info!(milestone = %milestone.name, subtask = %subtask.name, "Subtask deleted");
        self.audit(
            actor,
            "subtask_deleted",
            format!("Deleted subtask {} from {}", subtask.name, milestone.name),
        )
        .await;

        Ok(())
    }

    async fn move_subtask(
        &self,
        milestone: &str,
        name: &str,
        direction: Direction,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError> {
        let milestone = self.find_milestone(milestone).await?;
        let subtask = self.find_subtask(&milestone, name).await?;
        let catalog = self.store.catalog();

        let ordered = catalog.subtasks_for(milestone.id).await?;
        let index = ordered
            .iter()
            .position(|s| s.id == subtask.id)
            .ok_or_else(|| CatalogError::NotFound(format!("subtask '{}'", subtask.name)))?;

        if let Some(target) = step(index, ordered.len(), direction) {
            catalog
                .move_subtask(&subtask, target, self.clock.now())
                .await?;
            self.audit(
                actor,
                "subtask_moved",
                format!(
                    "Moved subtask {} in {} {direction}",
                    subtask.name, milestone.name
                ),
            )
            .await;
        }

        self.milestone_with_subtasks(&milestone.name).await
    }
}
