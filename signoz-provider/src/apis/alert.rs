//! Alert rule records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    DuplicateKind, KindRegistration, LabelSelector, Managed, Parameters, Reference, Registry,
    ResourceKind,
};

/// Label key the severity is published under.
pub const SEVERITY_LABEL: &str = "severity";

pub type Alert = Managed<AlertParameters>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertParameters {
    pub alert_name: String,
    pub alert_type: String,
    pub condition: RuleCondition,
    pub eval_window: String,
    pub frequency: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Channel names used verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_channels: Vec<String>,
    /// NotificationChannel records whose external names are used.
    #[serde(default, rename = "channelIdsRef", skip_serializing_if = "Vec::is_empty")]
    pub channel_ids_ref: Vec<Reference>,
    #[serde(default, rename = "channelIdsSelector", skip_serializing_if = "Option::is_none")]
    pub channel_ids_selector: Option<LabelSelector>,
    #[serde(default)]
    pub disabled: bool,
}

impl AlertParameters {
    /// Labels as published to SigNoz: the declared labels plus the severity,
    /// unless a `severity` label was declared explicitly.
    pub fn effective_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.labels.clone();
        if !self.severity.is_empty() {
            labels
                .entry(SEVERITY_LABEL.to_string())
                .or_insert_with(|| self.severity.clone());
        }
        labels
    }
}

impl Parameters for AlertParameters {
    const KIND: ResourceKind = ResourceKind::Alert;
    type Observation = AlertObservation;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub composite_query: CompositeQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeQuery {
    pub query_type: i32,
    #[serde(default, rename = "promQL", skip_serializing_if = "Vec::is_empty")]
    pub prom_ql: Vec<AlertQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub click_house: Vec<AlertQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<QueryBuilder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertQuery {
    pub query: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub legend: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBuilder {
    pub data_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_attribute: Option<KeyAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<KeyAttribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub having: Vec<Having>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAttribute {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub operator: String,
    #[serde(default)]
    pub items: Vec<FilterItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    pub key: KeyAttribute,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Having {
    pub column_name: String,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub column_name: String,
    pub order: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Channel identifiers the rule was last published with.
    #[serde(default, rename = "resolvedChannelIds", skip_serializing_if = "Vec::is_empty")]
    pub resolved_channel_ids: Vec<String>,
}

pub fn register(registry: &mut Registry) -> Result<(), DuplicateKind> {
    registry.register(KindRegistration {
        kind: ResourceKind::Alert,
        managed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(severity: &str, labels: &[(&str, &str)]) -> AlertParameters {
        AlertParameters {
            severity: severity.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_effective_labels_adds_severity() {
        let labels = params("critical", &[("team", "sre")]).effective_labels();
        assert_eq!(labels.get("severity").map(String::as_str), Some("critical"));
        assert_eq!(labels.get("team").map(String::as_str), Some("sre"));
    }

    #[test]
    fn test_effective_labels_keeps_explicit_severity() {
        let labels = params("critical", &[("severity", "page")]).effective_labels();
        assert_eq!(labels.get("severity").map(String::as_str), Some("page"));
    }

    #[test]
    fn test_effective_labels_without_severity() {
        let labels = params("", &[]).effective_labels();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_channel_reference_field_names() {
        let json = serde_json::json!({
            "alertName": "High CPU",
            "alertType": "METRIC_BASED_ALERT",
            "condition": { "compositeQuery": { "queryType": 2, "promQL": [{ "query": "cpu > 0.9" }] } },
            "evalWindow": "5m0s",
            "frequency": "1m0s",
            "preferredChannels": ["c1"],
            "channelIdsRef": [{ "name": "ops" }],
            "channelIdsSelector": { "matchLabels": { "team": "sre" } }
        });

        let params: AlertParameters = serde_json::from_value(json).unwrap();
        assert_eq!(params.preferred_channels, vec!["c1"]);
        assert_eq!(params.channel_ids_ref[0].name, "ops");
        assert_eq!(
            params
                .channel_ids_selector
                .unwrap()
                .match_labels
                .get("team")
                .map(String::as_str),
            Some("sre")
        );
        assert_eq!(params.condition.composite_query.prom_ql[0].name, "");
    }
}
