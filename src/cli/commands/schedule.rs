//! Site schedule and Gantt command handlers

use anyhow::Result;
use chrono::Utc;

use crate::cli::App;
use crate::models::{Account, Role, parse_date};
use crate::schedule::{build_week_chart, iso_week_of, render_text};
use crate::services::{WorkflowService, authorize};

pub async fn cmd_schedule_set(
    app: &App,
    actor: &Account,
    site: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    authorize(actor, Role::Manager)?;

    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let schedule = app
        .workflow
        .set_site_schedule(site, start, end, Some(actor.id))
        .await?;

    println!(
        "✓ {} scheduled {} to {}",
        schedule.site_code, schedule.start_date, schedule.end_date
    );
    Ok(())
}

pub async fn cmd_schedule_show(app: &App, actor: &Account, site: Option<&str>) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let schedules: Vec<_> = match site {
        Some(site) => app.workflow.site_schedule(site).await?.into_iter().collect(),
        None => app.workflow.list_schedules().await?,
    };

    if schedules.is_empty() {
        println!("No site schedules recorded.");
        return Ok(());
    }

    println!("{:<11} {:<10}   {:<10} {:>5}", "Site", "Start", "End", "Days");
    println!("{:-<45}", "");
    for schedule in schedules {
        let days = (schedule.end_date - schedule.start_date).num_days() + 1;
        println!(
            "{:<11} {}   {} {days:>5}",
            schedule.site_code, schedule.start_date, schedule.end_date
        );
    }
    Ok(())
}

pub async fn cmd_gantt(
    app: &App,
    actor: &Account,
    year: Option<i32>,
    week: Option<u32>,
) -> Result<()> {
    authorize(actor, Role::Guest)?;

    let (current_year, current_week) = iso_week_of(Utc::now().date_naive());
    let year = year.unwrap_or(current_year);
    let week = week.unwrap_or(current_week);

    let rows = app.workflow.gantt_rows().await?;
    let chart = build_week_chart(&rows, year, week)?;
    print!("{}", render_text(&chart));
    Ok(())
}
