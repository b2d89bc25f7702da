pub mod prelude;

pub mod accounts;
pub mod audit_log;
pub mod milestones;
pub mod password_history;
pub mod sessions;
pub mod site_schedules;
pub mod subtasks;
pub mod workflow_entries;
