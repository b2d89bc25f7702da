use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    /// PHC string carrying algorithm, iteration count, salt and hash.
    pub password_hash: String,

    pub role: String,

    pub is_active: bool,

    /// Set for bootstrap accounts and after an administrative reset.
    pub must_change_password: bool,

    pub failed_login_attempts: i32,

    pub locked_until: Option<DateTimeUtc>,

    pub last_login_at: Option<DateTimeUtc>,

    pub password_changed_at: Option<DateTimeUtc>,

    /// Set while an administrator has suspended the account.
    pub suspended_at: Option<DateTimeUtc>,

    /// End of the suspension; `None` suspends until lifted by hand.
    pub suspended_until: Option<DateTimeUtc>,

    pub suspension_reason: Option<String>,

    pub suspended_by: Option<i32>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sessions::Entity")]
    Sessions,
    #[sea_orm(has_many = "super::password_history::Entity")]
    PasswordHistory,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::password_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PasswordHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
