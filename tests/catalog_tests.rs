//! Milestone and subtask catalog editing against a real SQLite database.

mod common;

use degrow::db::Store;
use degrow::models::catalog::{DEFAULT_MILESTONES, DEFAULT_SUBTASKS};
use degrow::models::{Criticality, WorkflowStatus};
use degrow::services::{
    CatalogError, CatalogService, Direction, NewWorkflowEntry, SeaOrmCatalogService,
    SeaOrmWorkflowService, SubtaskUpdate, WorkflowService,
};

use common::TempDatabase;

struct TestContext {
    catalog: SeaOrmCatalogService,
    workflow: SeaOrmWorkflowService,
    _db: TempDatabase,
}

async fn setup() -> TestContext {
    let db = TempDatabase::new("catalog");
    let store = Store::open_sqlite(db.path())
        .await
        .expect("failed to open test database");

    TestContext {
        catalog: SeaOrmCatalogService::new(store.clone()),
        workflow: SeaOrmWorkflowService::new(store),
        _db: db,
    }
}

async fn names(ctx: &TestContext) -> Vec<String> {
    ctx.catalog
        .list_milestones()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect()
}

#[tokio::test]
async fn test_fresh_database_has_default_catalog() {
    let ctx = setup().await;

    let milestones = ctx.catalog.list_milestones().await.unwrap();
    assert_eq!(milestones.len(), DEFAULT_MILESTONES.len());

    for (index, (milestone, expected)) in milestones.iter().zip(DEFAULT_MILESTONES).enumerate() {
        assert_eq!(milestone.name, expected);
        assert_eq!(milestone.position, i32::try_from(index).unwrap());
        assert_eq!(milestone.subtasks.len(), DEFAULT_SUBTASKS.len());
    }

    let first = &milestones[0].subtasks[0];
    assert_eq!(first.name, DEFAULT_SUBTASKS[0].0);
    assert_eq!(first.criticality, Criticality::MustComplete);
}

#[tokio::test]
async fn test_add_milestone_appends_and_rejects_duplicates() {
    let ctx = setup().await;

    let added = ctx
        .catalog
        .add_milestone("  Final Walkthrough ", Some("Last check".to_string()), None)
        .await
        .unwrap();
    assert_eq!(added.name, "Final Walkthrough");
    assert_eq!(added.position, 12);
    assert!(added.subtasks.is_empty());

    assert!(matches!(
        ctx.catalog.add_milestone("Final Walkthrough", None, None).await,
        Err(CatalogError::Conflict(_))
    ));
    assert!(matches!(
        ctx.catalog.add_milestone("   ", None, None).await,
        Err(CatalogError::Validation(_))
    ));
}

#[tokio::test]
async fn test_rename_milestone_carries_workflow_entries() {
    let ctx = setup().await;

    ctx.workflow
        .record_entry(
            NewWorkflowEntry {
                site_code: "SITE1".to_string(),
                state: "TX".to_string(),
                milestone: "Restrict CM".to_string(),
                status: Some(WorkflowStatus::Done),
                ..NewWorkflowEntry::default()
            },
            None,
        )
        .await
        .unwrap();

    let renamed = ctx
        .catalog
        .rename_milestone("Restrict CM", "Restrict Change Management", None)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Restrict Change Management");
    assert_eq!(renamed.position, 1);
    assert_eq!(renamed.subtasks.len(), 12);

    assert_eq!(
        ctx.workflow
            .current_status("Restrict Change Management", None, Some("SITE1"))
            .await
            .unwrap(),
        Some(WorkflowStatus::Done)
    );
    assert_eq!(
        ctx.workflow
            .current_status("Restrict CM", None, Some("SITE1"))
            .await
            .unwrap(),
        None
    );

    assert!(matches!(
        ctx.catalog
            .rename_milestone("Restrict Change Management", "Complete Pre-Cut", None)
            .await,
        Err(CatalogError::Conflict(_))
    ));
    assert!(matches!(
        ctx.catalog.rename_milestone("Missing", "Whatever", None).await,
        Err(CatalogError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_move_milestone_swaps_neighbours_and_stops_at_ends() {
    let ctx = setup().await;

    let moved = ctx
        .catalog
        .move_milestone("Restrict CM", Direction::Up, None)
        .await
        .unwrap();
    assert_eq!(moved[0].name, "Restrict CM");
    assert_eq!(moved[1].name, "Create Grooming Workbook Tool");
    assert!(moved.iter().enumerate().all(|(i, m)| m.position == i32::try_from(i).unwrap()));

    let before = names(&ctx).await;
    ctx.catalog
        .move_milestone("Restrict CM", Direction::Up, None)
        .await
        .unwrap();
    assert_eq!(names(&ctx).await, before);

    ctx.catalog
        .move_milestone("Complete Special Orders", Direction::Down, None)
        .await
        .unwrap();
    assert_eq!(names(&ctx).await, before);
}

#[tokio::test]
async fn test_delete_milestone_renumbers() {
    let ctx = setup().await;

    ctx.catalog.delete_milestone("Complete Pre-Cut", None).await.unwrap();

    let milestones = ctx.catalog.list_milestones().await.unwrap();
    assert_eq!(milestones.len(), 11);
    assert!(milestones.iter().all(|m| m.name != "Complete Pre-Cut"));
    assert!(milestones.iter().enumerate().all(|(i, m)| m.position == i32::try_from(i).unwrap()));
    assert_eq!(milestones[2].name, "Collect Switch Device Info");

    assert!(matches!(
        ctx.catalog.delete_milestone("Complete Pre-Cut", None).await,
        Err(CatalogError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_subtask_lifecycle() {
    let ctx = setup().await;
    let milestone = "Complete Pre-Cut";

    let added = ctx
        .catalog
        .add_subtask(milestone, "Power Audit", None, Criticality::NonBlocking, None)
        .await
        .unwrap();
    assert_eq!(added.position, 12);
    assert_eq!(added.criticality, Criticality::NonBlocking);

    assert!(matches!(
        ctx.catalog
            .add_subtask(milestone, "Power Audit", None, Criticality::MustComplete, None)
            .await,
        Err(CatalogError::Conflict(_))
    ));

    let updated = ctx
        .catalog
        .update_subtask(
            milestone,
            "Power Audit",
            SubtaskUpdate {
                name: Some("Power and Cooling Audit".to_string()),
                description: Some(Some("Check DC plant".to_string())),
                criticality: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Power and Cooling Audit");
    assert_eq!(updated.description.as_deref(), Some("Check DC plant"));
    assert_eq!(updated.criticality, Criticality::NonBlocking);

    let updated = ctx
        .catalog
        .set_criticality(milestone, "Power and Cooling Audit", Criticality::MustComplete, None)
        .await
        .unwrap();
    assert_eq!(updated.criticality, Criticality::MustComplete);

    let reordered = ctx
        .catalog
        .move_subtask(milestone, "Power and Cooling Audit", Direction::Up, None)
        .await
        .unwrap();
    assert_eq!(reordered.subtasks[11].name, "Power and Cooling Audit");
    assert_eq!(reordered.subtasks[12].name, "Go-Live Support");

    ctx.catalog
        .delete_subtask(milestone, "Site Survey", None)
        .await
        .unwrap();
    let after = ctx.catalog.milestone_with_subtasks(milestone).await.unwrap();
    assert_eq!(after.subtasks.len(), 12);
    assert!(after.subtasks.iter().all(|s| s.name != "Site Survey"));
    assert!(
        after
            .subtasks
            .iter()
            .enumerate()
            .all(|(i, s)| s.position == i32::try_from(i).unwrap())
    );

    // Other milestones keep their own copy.
    let other = ctx.catalog.milestone_with_subtasks("Restrict CM").await.unwrap();
    assert!(other.subtasks.iter().any(|s| s.name == "Site Survey"));
}

#[tokio::test]
async fn test_rename_subtask_carries_workflow_entries() {
    let ctx = setup().await;
    let milestone = "Restrict CM";

    ctx.workflow
        .record_entry(
            NewWorkflowEntry {
                site_code: "SITE1".to_string(),
                state: "TX".to_string(),
                milestone: milestone.to_string(),
                subtask: Some("Site Survey".to_string()),
                status: Some(WorkflowStatus::InProgress),
                ..NewWorkflowEntry::default()
            },
            None,
        )
        .await
        .unwrap();

    ctx.catalog
        .update_subtask(
            milestone,
            "Site Survey",
            SubtaskUpdate {
                name: Some("Site Walk".to_string()),
                ..SubtaskUpdate::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        ctx.workflow
            .current_status(milestone, Some("Site Walk"), Some("SITE1"))
            .await
            .unwrap(),
        Some(WorkflowStatus::InProgress)
    );
}
