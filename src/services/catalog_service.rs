//! Domain service for the milestone/subtask catalog.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::entities::{milestones, subtasks};
use crate::models::Criticality;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CatalogError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(CatalogError::Validation(format!(
                "Direction must be up or down, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

/// Index after moving the item at `index` one step, or `None` at the boundary.
#[must_use]
pub const fn step(index: usize, len: usize, direction: Direction) -> Option<usize> {
    match direction {
        Direction::Up if index > 0 => Some(index - 1),
        Direction::Down if index + 1 < len => Some(index + 1),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subtask {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub criticality: Criticality,
    pub position: i32,
}

impl From<subtasks::Model> for Subtask {
    fn from(model: subtasks::Model) -> Self {
        Self {
            criticality: model.criticality.parse().unwrap_or_default(),
            id: model.id,
            name: model.name,
            description: model.description,
            position: model.position,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Milestone {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub subtasks: Vec<Subtask>,
}

impl Milestone {
    #[must_use]
    pub fn from_parts(model: milestones::Model, subtasks: Vec<subtasks::Model>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            position: model.position,
            subtasks: subtasks.into_iter().map(Subtask::from).collect(),
        }
    }
}

/// Partial update of a subtask. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct SubtaskUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub criticality: Option<Criticality>,
}

/// Catalog names are trimmed and must be non-empty.
pub fn clean_name(kind: &str, name: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::Validation(format!("{kind} name cannot be empty")));
    }
    if name.chars().count() > 255 {
        return Err(CatalogError::Validation(format!(
            "{kind} name is longer than 255 characters"
        )));
    }
    Ok(name.to_string())
}

/// Domain service trait for catalog editing. Milestones and subtasks are addressed by name.
#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    /// All milestones in sequence order, each with its ordered subtasks.
    async fn list_milestones(&self) -> Result<Vec<Milestone>, CatalogError>;

    async fn milestone_with_subtasks(&self, name: &str) -> Result<Milestone, CatalogError>;

    /// Appends a milestone at the end of the sequence.
    async fn add_milestone(
        &self,
        name: &str,
        description: Option<String>,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError>;

    /// Renames a milestone. Recorded workflow entries follow the new name.
    async fn rename_milestone(
        &self,
        name: &str,
        new_name: &str,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError>;

    async fn set_milestone_description(
        &self,
        name: &str,
        description: Option<String>,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError>;

    /// Deletes a milestone and its subtasks. Recorded entries are kept.
    async fn delete_milestone(&self, name: &str, actor: Option<i32>) -> Result<(), CatalogError>;

    /// Swaps with the neighbour; no-op at either end.
    async fn move_milestone(
        &self,
        name: &str,
        direction: Direction,
        actor: Option<i32>,
    ) -> Result<Vec<Milestone>, CatalogError>;

    async fn add_subtask(
        &self,
        milestone: &str,
        name: &str,
        description: Option<String>,
        criticality: Criticality,
        actor: Option<i32>,
    ) -> Result<Subtask, CatalogError>;

    async fn update_subtask(
        &self,
        milestone: &str,
        name: &str,
        update: SubtaskUpdate,
        actor: Option<i32>,
    ) -> Result<Subtask, CatalogError>;

    async fn set_criticality(
        &self,
        milestone: &str,
        name: &str,
        criticality: Criticality,
        actor: Option<i32>,
    ) -> Result<Subtask, CatalogError>;

    async fn delete_subtask(
        &self,
        milestone: &str,
        name: &str,
        actor: Option<i32>,
    ) -> Result<(), CatalogError>;

    async fn move_subtask(
        &self,
        milestone: &str,
        name: &str,
        direction: Direction,
        actor: Option<i32>,
    ) -> Result<Milestone, CatalogError>;
}
