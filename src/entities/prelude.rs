pub use super::accounts::Entity as Accounts;
pub use super::audit_log::Entity as AuditLog;
pub use super::milestones::Entity as Milestones;
pub use super::password_history::Entity as PasswordHistory;
pub use super::sessions::Entity as Sessions;
pub use super::site_schedules::Entity as SiteSchedules;
pub use super::subtasks::Entity as Subtasks;
pub use super::workflow_entries::Entity as WorkflowEntries;
