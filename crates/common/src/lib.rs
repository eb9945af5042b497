pub mod compare;
pub mod config;
pub mod debank;
pub mod driver;
pub mod observability;
pub mod orchestrator;
pub mod page;
pub mod store;
pub mod types;
