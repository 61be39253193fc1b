//! SigNoz provider: keeps dashboards, alert rules and notification channels
//! in a SigNoz instance in line with declarative records.

pub mod apis;
pub mod clients;
pub mod controller;
pub mod credentials;
pub mod drift;
pub mod error;
pub mod reconciler;
pub mod references;
pub mod secrets;
pub mod store;

pub use error::{Error, ErrorClass, Result};
