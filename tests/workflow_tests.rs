//! Workflow entries, progress and schedules against a real SQLite database.

mod common;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use degrow::clock::{Clock, ManualClock, SharedClock};
use degrow::db::{EntryFilter, Store};
use degrow::models::WorkflowStatus;
use degrow::schedule::{build_week_chart, render_text};
use degrow::services::{NewWorkflowEntry, SeaOrmWorkflowService, WorkflowError, WorkflowService};
use std::sync::Arc;

use common::TempDatabase;

const FIRST: &str = "Create Grooming Workbook Tool";
const SECOND: &str = "Restrict CM";

struct TestContext {
    clock: ManualClock,
    workflow: SeaOrmWorkflowService,
    _db: TempDatabase,
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn setup() -> TestContext {
    let db = TempDatabase::new("workflow");
    let store = Store::open_sqlite(db.path())
        .await
        .expect("failed to open test database");

    let clock = ManualClock::new(start_time());
    let shared: SharedClock = Arc::new(clock.clone());

    TestContext {
        workflow: SeaOrmWorkflowService::with_clock(store, shared),
        clock,
        _db: db,
    }
}

fn entry(site: &str, milestone: &str, subtask: Option<&str>, status: WorkflowStatus) -> NewWorkflowEntry {
    NewWorkflowEntry {
        site_code: site.to_string(),
        state: "tx".to_string(),
        milestone: milestone.to_string(),
        subtask: subtask.map(str::to_string),
        status: Some(status),
        ..NewWorkflowEntry::default()
    }
}

#[tokio::test]
async fn test_record_entry_normalizes_and_defaults() {
    let ctx = setup().await;

    let saved = ctx
        .workflow
        .record_entry(
            NewWorkflowEntry {
                site_code: "  dllstx01 ".to_string(),
                state: "tx".to_string(),
                milestone: FIRST.to_string(),
                subtask: Some("   ".to_string()),
                notes: Some("".to_string()),
                ..NewWorkflowEntry::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(saved.site_code, "DLLSTX01");
    assert_eq!(saved.state, "TX");
    assert_eq!(saved.status, "To Do");
    assert!(saved.subtask.is_none());
    assert!(saved.notes.is_none());
    assert_eq!(saved.created_at, start_time());
}

#[tokio::test]
async fn test_record_entry_validation() {
    let ctx = setup().await;

    let err = ctx
        .workflow
        .record_entry(entry("NOT-A-CLLI", FIRST, None, WorkflowStatus::Done), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let err = ctx
        .workflow
        .record_entry(entry("ABCDEFGHIJKL", FIRST, None, WorkflowStatus::Done), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let err = ctx
        .workflow
        .record_entry(entry("SITE1", "No Such Milestone", None, WorkflowStatus::Done), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownMilestone(_)));

    let err = ctx
        .workflow
        .record_entry(entry("SITE1", FIRST, Some("Nope"), WorkflowStatus::Done), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownSubtask { .. }));

    let mut backwards = entry("SITE1", FIRST, None, WorkflowStatus::InProgress);
    backwards.planned_start = Some(date(2025, 3, 10));
    backwards.planned_end = Some(date(2025, 3, 5));
    let err = ctx.workflow.record_entry(backwards, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let mut backwards = entry("SITE1", FIRST, None, WorkflowStatus::InProgress);
    backwards.actual_start = Some(date(2025, 3, 10));
    backwards.actual_end = Some(date(2025, 3, 9));
    assert!(ctx.workflow.record_entry(backwards, None).await.is_err());

    let entries = ctx.workflow.list_entries(&EntryFilter::default()).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_current_status_follows_latest_timestamp_not_insert_order() {
    let ctx = setup().await;

    // Inserted first but stamped later.
    ctx.clock.set(start_time() + Duration::hours(2));
    ctx.workflow
        .record_entry(entry("SITE1", FIRST, Some("Site Survey"), WorkflowStatus::Done), None)
        .await
        .unwrap();

    ctx.clock.set(start_time());
    ctx.workflow
        .record_entry(
            entry("SITE1", FIRST, Some("Site Survey"), WorkflowStatus::InProgress),
            None,
        )
        .await
        .unwrap();

    let status = ctx
        .workflow
        .current_status(FIRST, Some("Site Survey"), Some("site1"))
        .await
        .unwrap();
    assert_eq!(status, Some(WorkflowStatus::Done));

    ctx.clock.set(start_time() + Duration::hours(3));
    ctx.workflow
        .record_entry(entry("SITE1", FIRST, Some("Site Survey"), WorkflowStatus::Blocked), None)
        .await
        .unwrap();

    let status = ctx
        .workflow
        .current_status(FIRST, Some("Site Survey"), None)
        .await
        .unwrap();
    assert_eq!(status, Some(WorkflowStatus::Blocked));
}

#[tokio::test]
async fn test_current_status_keys_are_distinct() {
    let ctx = setup().await;

    ctx.workflow
        .record_entry(entry("SITE1", FIRST, None, WorkflowStatus::InProgress), None)
        .await
        .unwrap();
    ctx.clock.advance(Duration::minutes(1));
    ctx.workflow
        .record_entry(entry("SITE2", FIRST, None, WorkflowStatus::Done), None)
        .await
        .unwrap();

    let workflow = &ctx.workflow;
    assert_eq!(
        workflow.current_status(FIRST, None, Some("SITE1")).await.unwrap(),
        Some(WorkflowStatus::InProgress)
    );
    assert_eq!(
        workflow.current_status(FIRST, None, None).await.unwrap(),
        Some(WorkflowStatus::Done)
    );
    assert_eq!(
        workflow.current_status(FIRST, Some("Site Survey"), None).await.unwrap(),
        None
    );
    assert_eq!(
        workflow.current_status(SECOND, None, Some("SITE1")).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_site_progress_uses_must_complete_subtasks() {
    let ctx = setup().await;
    let required = [
        "CLLI Validation",
        "Site Survey",
        "Network Analysis",
        "Risk Assessment",
        "Approval Process",
        "Testing Protocol",
        "Go-Live Support",
    ];

    for name in required {
        ctx.clock.advance(Duration::minutes(1));
        ctx.workflow
            .record_entry(entry("SITE1", FIRST, Some(name), WorkflowStatus::Done), None)
            .await
            .unwrap();
    }
    ctx.clock.advance(Duration::minutes(1));
    ctx.workflow
        .record_entry(
            entry("SITE1", SECOND, Some("Site Survey"), WorkflowStatus::InProgress),
            None,
        )
        .await
        .unwrap();

    let progress = ctx.workflow.site_progress("site1").await.unwrap();
    assert_eq!(progress.site_code, "SITE1");
    assert_eq!(progress.milestones.len(), 12);
    assert_eq!(progress.subtasks_total, 144);
    assert_eq!(progress.subtasks_done, 7);
    assert!((progress.percent_done - 700.0 / 144.0).abs() < 1e-9);

    assert!(progress.milestones[0].complete);
    assert!(!progress.milestones[1].complete);
    assert_eq!(progress.current_milestone().map(|m| m.name.as_str()), Some(SECOND));

    let survey = progress.milestones[1]
        .subtasks
        .iter()
        .find(|s| s.name == "Site Survey")
        .unwrap();
    assert_eq!(survey.status, Some(WorkflowStatus::InProgress));

    // A later regression reopens the milestone.
    ctx.clock.advance(Duration::minutes(1));
    ctx.workflow
        .record_entry(entry("SITE1", FIRST, Some("Site Survey"), WorkflowStatus::Blocked), None)
        .await
        .unwrap();
    let progress = ctx.workflow.site_progress("SITE1").await.unwrap();
    assert!(!progress.milestones[0].complete);
    assert_eq!(progress.subtasks_done, 6);
}

#[tokio::test]
async fn test_site_progress_of_unknown_site_is_empty() {
    let ctx = setup().await;

    let progress = ctx.workflow.site_progress("NEWSITE").await.unwrap();
    assert_eq!(progress.subtasks_done, 0);
    assert!(progress.milestones.iter().all(|m| !m.complete));
    assert_eq!(progress.current_milestone().map(|m| m.name.as_str()), Some(FIRST));
    assert!(ctx.workflow.site_progress("bad code!").await.is_err());
}

#[tokio::test]
async fn test_list_entries_filters_newest_first() {
    let ctx = setup().await;

    for (site, status) in [
        ("SITE1", WorkflowStatus::ToDo),
        ("SITE2", WorkflowStatus::Done),
        ("SITE1", WorkflowStatus::Done),
    ] {
        ctx.clock.advance(Duration::minutes(1));
        ctx.workflow
            .record_entry(entry(site, FIRST, None, status), None)
            .await
            .unwrap();
    }

    let site1 = ctx
        .workflow
        .list_entries(&EntryFilter {
            site_code: Some("site1".to_string()),
            ..EntryFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(site1.len(), 2);
    assert_eq!(site1[0].status, "Done");
    assert_eq!(site1[1].status, "To Do");

    let done = ctx
        .workflow
        .list_entries(&EntryFilter {
            status: Some("Done".to_string()),
            limit: Some(1),
            ..EntryFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].site_code, "SITE1");

    assert_eq!(ctx.workflow.site_codes().await.unwrap(), vec!["SITE1", "SITE2"]);
}

#[tokio::test]
async fn test_site_schedule_upsert() {
    let ctx = setup().await;

    ctx.workflow
        .set_site_schedule("site1", date(2025, 3, 3), date(2025, 3, 28), None)
        .await
        .unwrap();
    ctx.clock.advance(Duration::days(1));
    let updated = ctx
        .workflow
        .set_site_schedule("SITE1", date(2025, 3, 10), date(2025, 4, 4), None)
        .await
        .unwrap();

    assert_eq!(updated.site_code, "SITE1");
    assert_eq!(updated.start_date, date(2025, 3, 10));
    assert_eq!(updated.end_date, date(2025, 4, 4));

    let schedules = ctx.workflow.list_schedules().await.unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(
        ctx.workflow.site_schedule("site1").await.unwrap().map(|s| s.end_date),
        Some(date(2025, 4, 4))
    );
    assert!(ctx.workflow.site_schedule("SITE9").await.unwrap().is_none());

    let err = ctx
        .workflow
        .set_site_schedule("SITE1", date(2025, 4, 4), date(2025, 4, 1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn test_gantt_rows_take_latest_entry_per_site_and_milestone() {
    let ctx = setup().await;

    let mut planned = entry("SITE2", SECOND, None, WorkflowStatus::ToDo);
    planned.planned_start = Some(date(2025, 3, 4));
    planned.planned_end = Some(date(2025, 3, 6));
    ctx.workflow.record_entry(planned, None).await.unwrap();

    ctx.clock.advance(Duration::minutes(1));
    let mut old = entry("SITE2", FIRST, None, WorkflowStatus::InProgress);
    old.actual_start = Some(date(2025, 3, 3));
    ctx.workflow.record_entry(old, None).await.unwrap();

    ctx.clock.advance(Duration::minutes(1));
    let mut newer = entry("SITE2", FIRST, Some("Site Survey"), WorkflowStatus::Done);
    newer.actual_start = Some(date(2025, 3, 3));
    newer.actual_end = Some(date(2025, 3, 5));
    ctx.workflow.record_entry(newer, None).await.unwrap();

    ctx.clock.advance(Duration::minutes(1));
    ctx.workflow
        .record_entry(entry("SITE1", SECOND, None, WorkflowStatus::Blocked), None)
        .await
        .unwrap();

    let rows = ctx.workflow.gantt_rows().await.unwrap();
    let keys: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.site_code.as_str(), r.milestone.as_str()))
        .collect();
    assert_eq!(keys, vec![("SITE1", SECOND), ("SITE2", FIRST), ("SITE2", SECOND)]);
    assert_eq!(rows[1].status, WorkflowStatus::Done);
    assert_eq!(rows[1].actual_end, Some(date(2025, 3, 5)));

    // 2025-03-03 is the Monday of ISO week 10.
    let chart = build_week_chart(&rows, 2025, 10).unwrap();
    assert_eq!(chart.rows.len(), 2);
    assert_eq!(chart.rows[0].actual, Some((0, 2)));
    assert_eq!(chart.rows[1].planned, Some((1, 3)));

    let text = render_text(&chart);
    assert!(text.contains("SITE2 / Create Grooming Workbook Tool"));
    assert!(!text.contains("SITE1"));
}

#[tokio::test]
async fn test_export_csv_follows_filter() {
    let ctx = setup().await;

    let mut first = entry("site1", FIRST, Some("Site Survey"), WorkflowStatus::Done);
    first.notes = Some("Walked the \"east\" frame, all clear".to_string());
    first.planned_end = Some(date(2025, 3, 7));
    ctx.workflow.record_entry(first, Some(1)).await.unwrap();

    ctx.clock.advance(Duration::minutes(1));
    ctx.workflow
        .record_entry(entry("SITE2", SECOND, None, WorkflowStatus::Blocked), None)
        .await
        .unwrap();

    let all = ctx.workflow.export_csv(&EntryFilter::default()).await.unwrap();
    let lines: Vec<&str> = all.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("id,created_at,site_code,"));
    assert!(lines[1].contains("\"SITE2\""));
    assert!(lines[2].contains("\"SITE1\""));
    assert!(lines[2].contains("\"Walked the \"\"east\"\" frame, all clear\""));
    assert!(lines[2].contains(",2025-03-07,"));
    assert!(lines[2].ends_with(",1"));

    let site1 = ctx
        .workflow
        .export_csv(&EntryFilter {
            site_code: Some("site1".to_string()),
            ..EntryFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(site1.lines().count(), 2);

    let none = ctx
        .workflow
        .export_csv(&EntryFilter {
            status: Some("In Progress".to_string()),
            ..EntryFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(none.lines().count(), 1);
}

#[tokio::test]
async fn test_report_summarises_sites_and_overdue_milestones() {
    let ctx = setup().await;

    let mut late = entry("SITE1", SECOND, None, WorkflowStatus::ToDo);
    late.planned_end = Some(date(2025, 2, 28));
    ctx.workflow.record_entry(late, None).await.unwrap();

    ctx.clock.advance(Duration::minutes(1));
    let mut finished = entry("SITE2", FIRST, None, WorkflowStatus::Done);
    finished.planned_end = Some(date(2025, 2, 20));
    ctx.workflow.record_entry(finished, None).await.unwrap();

    ctx.clock.advance(Duration::minutes(1));
    let mut upcoming = entry("SITE2", SECOND, None, WorkflowStatus::InProgress);
    upcoming.planned_end = Some(date(2025, 3, 14));
    ctx.workflow.record_entry(upcoming, None).await.unwrap();

    let report = ctx.workflow.report().await.unwrap();

    assert_eq!(report.generated_at, ctx.clock.now());
    assert_eq!(report.total_entries, 3);

    let sites: Vec<&str> = report.sites.iter().map(|s| s.site_code.as_str()).collect();
    assert_eq!(sites, vec!["SITE1", "SITE2"]);
    assert!(report.sites.iter().all(|s| s.milestones_total > 0));

    let count_of = |status: WorkflowStatus| {
        report
            .status_counts
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, count)| *count)
    };
    assert_eq!(count_of(WorkflowStatus::ToDo), 1);
    assert_eq!(count_of(WorkflowStatus::Done), 1);
    assert_eq!(count_of(WorkflowStatus::InProgress), 1);
    assert_eq!(count_of(WorkflowStatus::Blocked), 0);

    assert_eq!(report.overdue.len(), 1);
    assert_eq!(report.overdue[0].site_code, "SITE1");
    assert_eq!(report.overdue[0].milestone, SECOND);
}
