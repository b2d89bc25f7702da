pub mod account;
pub mod audit;
pub mod catalog;
pub mod session;
pub mod workflow;
