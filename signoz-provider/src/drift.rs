//! Drift detection between desired parameters and the remote resource.
//!
//! Only top-level fields are compared. Changes confined to nested queries,
//! conditions, layout or widgets are not detected.

use crate::apis::{AlertParameters, DashboardParameters, NotificationChannelParameters};
use crate::clients::{ChannelData, DashboardData, RuleData};

pub fn dashboard_up_to_date(desired: &DashboardParameters, observed: &DashboardData) -> bool {
    desired.title == observed.title
        && desired.description.as_deref().unwrap_or_default() == observed.description
        && desired.tags == observed.tags
}

pub fn alert_up_to_date(desired: &AlertParameters, observed: &RuleData) -> bool {
    desired.alert_name == observed.alert_name
        && desired.alert_type == observed.alert_type
        && desired.eval_window == observed.eval_window
        && desired.frequency == observed.frequency
        && desired.disabled == observed.disabled
        && desired.effective_labels() == observed.labels
        && desired.annotations == observed.annotations
}

pub fn channel_up_to_date(desired: &NotificationChannelParameters, observed: &ChannelData) -> bool {
    desired.name == observed.name && desired.channel_type == observed.channel_type
}
