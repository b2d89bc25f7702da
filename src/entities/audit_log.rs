use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Append-only. `account_id` is not a foreign key so entries outlive deleted accounts.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub account_id: i32,
    pub session_token: Option<String>,
    pub action: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub client_address: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
