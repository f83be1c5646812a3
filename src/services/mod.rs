//! Caller-facing services

pub mod admin;
pub mod query;

pub use admin::{AdminService, MaintenanceReport};
pub use query::{CollectionPage, Navigation, QueryService, Siblings};
