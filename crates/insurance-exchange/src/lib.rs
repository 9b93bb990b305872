//! Insurance marketplace: companies publish insurance services, visitors
//! search them and respond, and owners are notified by email out of band.

pub mod auth;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod notifications;
pub mod search;
pub mod telemetry;
pub mod views;
