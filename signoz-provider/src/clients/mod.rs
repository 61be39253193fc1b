//! Client for the SigNoz REST API.
//!
//! One [`SignozClient`] per connect; typed CRUD for dashboards, alert rules
//! and notification channels through [`ResourceApi`].

pub mod signoz;
pub mod types;

pub use signoz::{
    is_not_found, ApiError, Config, ResourceApi, SignozClient, API_KEY_HEADER, DEFAULT_ENDPOINT,
};
pub use types::{
    ChannelData, ChannelPayload, ChannelSettings, DashboardData, DashboardPayload, RemoteResource,
    RuleData, RulePayload,
};
