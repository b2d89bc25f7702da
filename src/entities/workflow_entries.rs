use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workflow_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// CLLI code of the site.
    pub site_code: String,

    pub state: String,

    pub host_wire_centre: Option<String>,

    pub lata: Option<String>,

    pub equipment_type: Option<String>,

    pub milestone: String,

    pub subtask: Option<String>,

    pub status: String,

    pub planned_start: Option<Date>,

    pub actual_start: Option<Date>,

    pub planned_end: Option<Date>,

    pub actual_end: Option<Date>,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub recorded_by: Option<i32>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
