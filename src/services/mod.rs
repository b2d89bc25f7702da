pub mod password;

pub mod auth_service;
pub use auth_service::{AuthError, AuthService, Authenticated, authorize};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod account_service;
pub use account_service::{AccountError, AccountService, AccountStatistics, CreateAccountRequest};

pub mod account_service_impl;
pub use account_service_impl::SeaOrmAccountService;

pub mod workflow_service;
pub use workflow_service::{
    MilestoneProgress, NewWorkflowEntry, SiteProgress, SiteSummary, SubtaskProgress,
    WorkflowError, WorkflowReport, WorkflowService,
};

pub mod workflow_service_impl;
pub use workflow_service_impl::SeaOrmWorkflowService;

pub mod catalog_service;
pub use catalog_service::{
    CatalogError, CatalogService, Direction, Milestone, Subtask, SubtaskUpdate,
};

pub mod catalog_service_impl;
pub use catalog_service_impl::SeaOrmCatalogService;
