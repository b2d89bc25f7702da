//! Workflow entry and progress command handlers

use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::{App, EntryArgs};
use crate::db::EntryFilter;
use crate::models::{Account, Role, WorkflowStatus, parse_optional_date};
use crate::services::{NewWorkflowEntry, SiteProgress, WorkflowService, authorize};

impl EntryArgs {
    pub fn into_new_entry(self) -> Result<NewWorkflowEntry> {
        Ok(NewWorkflowEntry {
            status: Some(self.status.parse::<WorkflowStatus>()?),
            planned_start: parse_optional_date(self.planned_start.as_deref())?,
            planned_end: parse_optional_date(self.planned_end.as_deref())?,
            actual_start: parse_optional_date(self.actual_start.as_deref())?,
            actual_end: parse_optional_date(self.actual_end.as_deref())?,
            site_code: self.site,
            state: self.state,
            host_wire_centre: self.host_wire_centre,
            lata: self.lata,
            equipment_type: self.equipment_type,
            milestone: self.milestone,
            subtask: self.subtask,
            notes: self.notes,
        })
    }
}

fn date_or_dash(date: Option<chrono::NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

pub async fn cmd_entry_add(app: &App, actor: &Account, args: EntryArgs) -> Result<()> {
    authorize(actor, Role::User)?;

    let entry = app
        .workflow
        .record_entry(args.into_new_entry()?, Some(actor.id))
        .await?;

    let target = entry.subtask.as_deref().map_or_else(
        || entry.milestone.clone(),
        |s| format!("{} / {s}", entry.milestone),
    );
    println!(
        "✓ Recorded #{}: {} {} -> {}",
        entry.id, entry.site_code, target, entry.status
    );
    Ok(())
}

pub async fn cmd_entry_list(
    app: &App,
    actor: &Account,
    site: Option<&str>,
    milestone: Option<&str>,
    status: Option<&str>,
    limit: u64,
) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let status = status.map(str::parse::<WorkflowStatus>).transpose()?;
    let entries = app
        .workflow
        .list_entries(&EntryFilter {
            site_code: site.map(str::to_string),
            milestone: milestone.map(str::to_string),
            status: status.map(|s| s.as_str().to_string()),
            limit: Some(limit),
        })
        .await?;

    if entries.is_empty() {
        println!("No workflow entries found.");
        println!();
        println!("Record one with: degrow entry add <SITE> --milestone \"<name>\" --status Done");
        return Ok(());
    }

    println!("Workflow entries ({} shown, newest first)", entries.len());
    println!("{:-<110}", "");

    for entry in entries {
        println!(
            "#{:<5} {} {:<11} {:<12} {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.site_code,
            entry.status,
            entry.subtask.as_deref().map_or_else(
                || entry.milestone.clone(),
                |s| format!("{} / {s}", entry.milestone)
            )
        );
        println!(
            "       planned {} .. {} | actual {} .. {}",
            date_or_dash(entry.planned_start),
            date_or_dash(entry.planned_end),
            date_or_dash(entry.actual_start),
            date_or_dash(entry.actual_end)
        );
        if let Some(notes) = &entry.notes {
            println!("       {notes}");
        }
    }

    Ok(())
}

pub async fn cmd_entry_export(
    app: &App,
    actor: &Account,
    site: Option<&str>,
    milestone: Option<&str>,
    status: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let status = status.map(str::parse::<WorkflowStatus>).transpose()?;
    let csv = app
        .workflow
        .export_csv(&EntryFilter {
            site_code: site.map(str::to_string),
            milestone: milestone.map(str::to_string),
            status: status.map(|s| s.as_str().to_string()),
            limit: None,
        })
        .await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &csv)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let rows = csv.lines().count().saturating_sub(1);
            println!("✓ Exported {rows} entries to {}", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

pub async fn cmd_entry_status(
    app: &App,
    actor: &Account,
    milestone: &str,
    subtask: Option<&str>,
    site: Option<&str>,
) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let status = app.workflow.current_status(milestone, subtask, site).await?;
    let target = subtask.map_or_else(|| milestone.to_string(), |s| format!("{milestone} / {s}"));
    let scope = site.map_or_else(|| "all sites".to_string(), str::to_uppercase);

    match status {
        Some(status) => println!("{target} ({scope}): {status}"),
        None => println!("{target} ({scope}): no entries recorded"),
    }
    Ok(())
}

pub fn print_progress(progress: &SiteProgress) {
    println!(
        "Site {}: {}/{} subtasks done ({:.0}%)",
        progress.site_code, progress.subtasks_done, progress.subtasks_total, progress.percent_done
    );
    if let Some(current) = progress.current_milestone() {
        println!("Current milestone: {}", current.name);
    } else {
        println!("All milestones complete");
    }
    println!("{:-<70}", "");

    for milestone in &progress.milestones {
        let mark = if milestone.complete { "✓" } else { " " };
        println!("[{mark}] {}", milestone.name);
        for subtask in &milestone.subtasks {
            let status = subtask
                .status
                .map_or_else(|| "not recorded".to_string(), |s| s.to_string());
            println!(
                "      {} {:<28} {:<14} ({})",
                subtask.status.map_or(' ', WorkflowStatus::marker),
                subtask.name,
                status,
                subtask.criticality
            );
        }
    }
}

pub async fn cmd_report(app: &App, actor: &Account, json: bool) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let report = app.workflow.report().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Workflow report ({})",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!("{:-<70}", "");
    println!("  Entries recorded: {}", report.total_entries);
    println!("  Sites:            {}", report.sites.len());
    for (status, count) in &report.status_counts {
        println!("  {:<17} {count}", format!("{status}:"));
    }

    println!();
    println!("Sites:");
    for site in &report.sites {
        println!(
            "  {:<11} {:>5.1}%  {}/{} milestones  {}",
            site.site_code,
            site.percent_done,
            site.milestones_complete,
            site.milestones_total,
            site.current_milestone.as_deref().unwrap_or("complete")
        );
    }
    if report.sites.is_empty() {
        println!("  (none)");
    }

    println!();
    println!("Overdue ({}):", report.overdue.len());
    for row in &report.overdue {
        println!(
            "  {:<11} {:<28} {:<12} planned end {}",
            row.site_code,
            row.milestone,
            row.status,
            date_or_dash(row.planned_end)
        );
    }

    Ok(())
}

pub async fn cmd_progress(app: &App, actor: &Account, site: Option<&str>) -> Result<()> {
    authorize(actor, Role::Guest)?;

    if let Some(site) = site {
        let progress = app.workflow.site_progress(site).await?;
        print_progress(&progress);
        return Ok(());
    }

    let sites = app.workflow.site_codes().await?;
    if sites.is_empty() {
        println!("No sites recorded yet.");
        return Ok(());
    }

    println!("Site progress ({} sites)", sites.len());
    println!("{:-<70}", "");
    for site in sites {
        let progress = app.workflow.site_progress(&site).await?;
        let current = progress
            .current_milestone()
            .map_or("complete", |m| m.name.as_str());
        println!(
            "{:<11} {:>5.1}%  {}",
            progress.site_code, progress.percent_done, current
        );
    }

    Ok(())
}
