//! Dashboard records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DuplicateKind, KindRegistration, Managed, Parameters, Registry, ResourceKind};

pub type Dashboard = Managed<DashboardParameters>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardParameters {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout: Vec<Layout>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Variable>,
}

impl Parameters for DashboardParameters {
    const KIND: ResourceKind = ResourceKind::Dashboard;
    type Observation = DashboardObservation;
}

/// Grid position of one widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub i: String,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    #[serde(default)]
    pub moved: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub panel_type: String,
    pub query: WidgetQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_stacked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_zero_values: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_preference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetQuery {
    pub query_type: i32,
    #[serde(default, rename = "promQL")]
    pub prom_ql: Vec<TextQuery>,
    #[serde(default)]
    pub click_house: Vec<TextQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<MetricsBuilder>,
}

/// A PromQL or ClickHouse query given as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBuilder {
    #[serde(default)]
    pub query_builder: Vec<MetricQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQuery {
    pub name: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textbox_value: Option<String>,
    #[serde(default)]
    pub multi_select: bool,
    #[serde(default)]
    pub show_all_option: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn register(registry: &mut Registry) -> Result<(), DuplicateKind> {
    registry.register(KindRegistration {
        kind: ResourceKind::Dashboard,
        managed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_from_manifest_json() {
        let json = serde_json::json!({
            "metadata": { "name": "overview" },
            "spec": {
                "providerConfigRef": { "name": "default" },
                "forProvider": {
                    "title": "Overview",
                    "tags": ["prod"],
                    "layout": [{ "i": "w1", "x": 0, "y": 0, "w": 6, "h": 2, "static": true }],
                    "widgets": [{
                        "id": "w1",
                        "title": "Latency",
                        "panelType": "graph",
                        "query": { "queryType": 1, "promQL": [{ "query": "up" }] }
                    }]
                }
            }
        });

        let dashboard: Dashboard = serde_json::from_value(json).unwrap();
        let params = dashboard.params();
        assert_eq!(params.title, "Overview");
        assert_eq!(params.description, None);
        assert!(params.layout[0].is_static);
        assert_eq!(params.widgets[0].query.prom_ql[0].query, "up");
        assert_eq!(
            dashboard.spec.provider_config_ref.as_ref().map(|r| r.name.as_str()),
            Some("default")
        );
        assert!(dashboard.status.conditions.is_empty());
    }
}
