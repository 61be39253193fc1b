//! Wire types of the SigNoz API.
//!
//! Responses keep nested structures as raw JSON; payloads are fully typed.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::apis::alert::RuleCondition;
use crate::apis::dashboard::{Layout, Variable, Widget};

/// A resource collection under `/api/v1`.
pub trait RemoteResource: DeserializeOwned + Send {
    const COLLECTION: &'static str;
}

/// `{status, data}` wrapper around every response. Only `data` is read.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
}

/// Ids come back as strings for dashboards and rules and as integers for
/// channels.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// Null and missing both decode to the default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub layout: Vec<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub widgets: Vec<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub variables: BTreeMap<String, Value>,
    #[serde(default, rename = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, rename = "updated_at")]
    pub updated_at: Option<String>,
}

impl RemoteResource for DashboardData {
    const COLLECTION: &'static str = "dashboards";
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleData {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, rename = "alert", deserialize_with = "nullable")]
    pub alert_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub alert_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub eval_window: String,
    #[serde(default, deserialize_with = "nullable")]
    pub frequency: String,
    #[serde(default)]
    pub condition: Value,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub preferred_channels: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub disabled: bool,
    #[serde(default, rename = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, rename = "updated_at")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
}

impl RemoteResource for RuleData {
    const COLLECTION: &'static str = "rules";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelData {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "nullable")]
    pub channel_type: String,
    #[serde(default)]
    pub data: Value,
}

impl RemoteResource for ChannelData {
    const COLLECTION: &'static str = "channels";
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layout: Vec<Layout>,
    pub widgets: Vec<Widget>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePayload {
    #[serde(rename = "alert")]
    pub alert_name: String,
    pub alert_type: String,
    pub eval_window: String,
    pub frequency: String,
    pub condition: RuleCondition,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preferred_channels: Vec<String>,
    pub disabled: bool,
}

/// `{name, type, data}` body for channel create, update and test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub data: ChannelSettings,
}

/// Type-specific channel settings. The `type` lives on [`ChannelPayload`];
/// each variant serializes as the bare `data` object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelSettings {
    Slack(SlackData),
    Webhook(WebhookData),
    PagerDuty(PagerDutyData),
    Email(EmailData),
    OpsGenie(OpsGenieData),
    MsTeams(MsTeamsData),
    Sns(SnsData),
    /// A supported type declared without any configuration.
    Empty(EmptyData),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmptyData {}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlackData {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebhookData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alerts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PagerDutyData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmailData {
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpsGenieData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MsTeamsData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnsData {
    pub topic_arn: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_id_normalized_to_string() {
        let ch: ChannelData =
            serde_json::from_value(json!({ "id": 42, "name": "ops", "type": "slack" })).unwrap();
        assert_eq!(ch.id, "42");

        let rule: RuleData = serde_json::from_value(json!({ "id": "r-1", "alert": "cpu" })).unwrap();
        assert_eq!(rule.id, "r-1");
        assert_eq!(rule.alert_name, "cpu");
    }

    #[test]
    fn test_null_collections_decode_as_empty() {
        let dash: DashboardData = serde_json::from_value(json!({
            "id": "d1",
            "title": "Overview",
            "tags": null,
            "widgets": null,
            "description": null
        }))
        .unwrap();
        assert!(dash.tags.is_empty());
        assert!(dash.widgets.is_empty());
        assert_eq!(dash.description, "");
    }

    #[test]
    fn test_channel_payload_shape() {
        let payload = ChannelPayload {
            name: "ops".to_string(),
            channel_type: "slack".to_string(),
            data: ChannelSettings::Slack(SlackData {
                channel: "#ops".to_string(),
                webhook_url: Some("https://hooks/x".to_string()),
                ..Default::default()
            }),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "name": "ops",
                "type": "slack",
                "data": { "channel": "#ops", "webhook_url": "https://hooks/x" }
            })
        );

        let empty = ChannelPayload {
            name: "hooks".to_string(),
            channel_type: "webhook".to_string(),
            data: ChannelSettings::Empty(EmptyData {}),
        };
        assert_eq!(serde_json::to_value(&empty).unwrap()["data"], json!({}));
    }
}
