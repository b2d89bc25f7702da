pub mod account;
pub mod catalog;
pub mod role;
pub mod workflow;

pub use account::{Account, normalize_identifier};
pub use role::Role;
pub use workflow::{Criticality, WorkflowStatus, parse_date, parse_optional_date};
