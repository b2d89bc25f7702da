//! Milestone and subtask catalog command handlers

use anyhow::Result;

use crate::cli::{App, prompt};
use crate::models::{Account, Criticality, Role};
use crate::services::{
    CatalogService, Direction, Milestone, SubtaskUpdate, authorize,
};

fn print_milestone(index: usize, milestone: &Milestone) {
    println!("{:>2}. {}", index + 1, milestone.name);
    if let Some(description) = &milestone.description {
        println!("    {description}");
    }
    for subtask in &milestone.subtasks {
        println!("      - {:<30} {}", subtask.name, subtask.criticality);
    }
}

pub async fn cmd_milestone_list(app: &App, actor: &Account) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let milestones = app.catalog.list_milestones().await?;
    if milestones.is_empty() {
        println!("The milestone catalog is empty.");
        return Ok(());
    }

    println!("Milestones ({} total)", milestones.len());
    println!("{:-<70}", "");
    for (index, milestone) in milestones.iter().enumerate() {
        print_milestone(index, milestone);
    }
    Ok(())
}

pub async fn cmd_milestone_show(app: &App, actor: &Account, name: &str) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let milestone = app.catalog.milestone_with_subtasks(name).await?;
    let index = usize::try_from(milestone.position).unwrap_or_default();
    print_milestone(index, &milestone);
    Ok(())
}

pub async fn cmd_milestone_add(
    app: &App,
    actor: &Account,
    name: &str,
    description: Option<String>,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let milestone = app
        .catalog
        .add_milestone(name, description, Some(actor.id))
        .await?;
    println!(
        "✓ Added milestone {} at position {}",
        milestone.name,
        milestone.position + 1
    );
    Ok(())
}

pub async fn cmd_milestone_rename(
    app: &App,
    actor: &Account,
    name: &str,
    new_name: &str,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let milestone = app
        .catalog
        .rename_milestone(name, new_name, Some(actor.id))
        .await?;
    println!("✓ Renamed {name} to {}", milestone.name);
    Ok(())
}

pub async fn cmd_milestone_describe(
    app: &App,
    actor: &Account,
    name: &str,
    description: Option<String>,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let milestone = app
        .catalog
        .set_milestone_description(name, description, Some(actor.id))
        .await?;
    println!("✓ Updated {}", milestone.name);
    Ok(())
}

pub async fn cmd_milestone_delete(app: &App, actor: &Account, name: &str, yes: bool) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let milestone = app.catalog.milestone_with_subtasks(name).await?;
    if !yes
        && !prompt::confirm(&format!(
            "Delete milestone {} and its {} subtasks?",
            milestone.name,
            milestone.subtasks.len()
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    app.catalog
        .delete_milestone(&milestone.name, Some(actor.id))
        .await?;
    println!("✓ Deleted milestone {}", milestone.name);
    Ok(())
}

pub async fn cmd_milestone_move(
    app: &App,
    actor: &Account,
    name: &str,
    direction: &str,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let direction: Direction = direction.parse()?;
    let milestones = app
        .catalog
        .move_milestone(name, direction, Some(actor.id))
        .await?;

    for (index, milestone) in milestones.iter().enumerate() {
        let marker = if milestone.name == name.trim() { ">" } else { " " };
        println!("{marker}{:>2}. {}", index + 1, milestone.name);
    }
    Ok(())
}

pub async fn cmd_subtask_add(
    app: &App,
    actor: &Account,
    milestone: &str,
    name: &str,
    criticality: &str,
    description: Option<String>,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let criticality: Criticality = criticality.parse()?;
    let subtask = app
        .catalog
        .add_subtask(milestone, name, description, criticality, Some(actor.id))
        .await?;
    println!(
        "✓ Added subtask {} to {milestone} ({})",
        subtask.name, subtask.criticality
    );
    Ok(())
}

pub async fn cmd_subtask_update(
    app: &App,
    actor: &Account,
    milestone: &str,
    name: &str,
    update: SubtaskUpdate,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let subtask = app
        .catalog
        .update_subtask(milestone, name, update, Some(actor.id))
        .await?;
    println!(
        "✓ {milestone} / {}: {}",
        subtask.name, subtask.criticality
    );
    Ok(())
}

pub async fn cmd_subtask_criticality(
    app: &App,
    actor: &Account,
    milestone: &str,
    name: &str,
    criticality: &str,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let criticality: Criticality = criticality.parse()?;
    let subtask = app
        .catalog
        .set_criticality(milestone, name, criticality, Some(actor.id))
        .await?;
    println!(
        "✓ {milestone} / {} is now '{}'",
        subtask.name, subtask.criticality
    );
    Ok(())
}

pub async fn cmd_subtask_delete(
    app: &App,
    actor: &Account,
    milestone: &str,
    name: &str,
    yes: bool,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    if !yes && !prompt::confirm(&format!("Delete subtask {name} from {milestone}?"))? {
        println!("Cancelled.");
        return Ok(());
    }

    app.catalog
        .delete_subtask(milestone, name, Some(actor.id))
        .await?;
    println!("✓ Deleted subtask {name}");
    Ok(())
}

pub async fn cmd_subtask_move(
    app: &App,
    actor: &Account,
    milestone: &str,
    name: &str,
    direction: &str,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let direction: Direction = direction.parse()?;
    let milestone = app
        .catalog
        .move_subtask(milestone, name, direction, Some(actor.id))
        .await?;

    let index = usize::try_from(milestone.position).unwrap_or_default();
    print_milestone(index, &milestone);
    Ok(())
}
