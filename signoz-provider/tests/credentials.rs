//! Credential resolution and client behaviour against a mock SigNoz API.

mod common;

use std::sync::Arc;

use common::{get, seed_provider_config, seed_provider_config_with, MockSignoz, API_KEY, PROVIDER_CONFIG};
use signoz_provider::apis::{
    CredentialsSource, Dashboard, DashboardParameters, EnvSelector, FsSelector, Managed,
    ProviderConfig, ProviderCredentials,
};
use signoz_provider::clients::{is_not_found, ApiError, Config, SignozClient};
use signoz_provider::credentials::CredentialResolver;
use signoz_provider::error::{Error, ErrorClass};
use signoz_provider::secrets::SecretResolver;
use signoz_provider::store::{MemoryStore, ResourceStore};

fn resolver(store: &Arc<MemoryStore>) -> CredentialResolver {
    CredentialResolver::new(store.clone(), SecretResolver::new(store.clone()))
}

fn dashboard(provider_config: Option<&str>) -> Dashboard {
    Managed::new(
        "overview",
        provider_config,
        DashboardParameters {
            title: "Overview".to_string(),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_resolves_endpoint_and_key() {
    let store = Arc::new(MemoryStore::new());
    seed_provider_config(&store, "http://signoz.local:3301/").await;

    let config = resolver(&store)
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap();
    assert_eq!(config.base_url, "http://signoz.local:3301");
    assert_eq!(config.api_key, API_KEY);
}

#[tokio::test]
async fn test_missing_endpoint_defaults_to_cloud() {
    let store = Arc::new(MemoryStore::new());
    seed_provider_config(&store, "").await;

    let config = resolver(&store)
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap();
    assert_eq!(config.base_url, "https://api.signoz.cloud");
}

#[tokio::test]
async fn test_missing_reference() {
    let store = Arc::new(MemoryStore::new());
    let err = resolver(&store).resolve(&dashboard(None)).await.unwrap_err();
    assert!(matches!(err, Error::NoProviderConfig));
    assert_eq!(err.class(), ErrorClass::Configuration);
}

#[tokio::test]
async fn test_missing_provider_config() {
    let store = Arc::new(MemoryStore::new());
    let err = resolver(&store)
        .resolve(&dashboard(Some("elsewhere")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderConfigNotFound(ref name) if name == "elsewhere"));
}

#[tokio::test]
async fn test_credentials_not_json() {
    let store = Arc::new(MemoryStore::new());
    seed_provider_config_with(&store, "http://signoz.local", "not json").await;

    let err = resolver(&store)
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CredentialDecode(_)));
    assert_eq!(err.class(), ErrorClass::Credential);
}

#[tokio::test]
async fn test_missing_secret() {
    let store = Arc::new(MemoryStore::new());
    store
        .apply(ProviderConfig::new(
            PROVIDER_CONFIG,
            None,
            ProviderCredentials {
                secret_ref: Some(common::selector("crossplane-system", "absent", "credentials")),
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    let err = resolver(&store)
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CredentialExtraction(_)));
    assert!(err.to_string().contains("absent"));
}

#[tokio::test]
async fn test_filesystem_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, r#"{"apiKey":"from-file"}"#).unwrap();

    let store = Arc::new(MemoryStore::new());
    store
        .apply(ProviderConfig::new(
            PROVIDER_CONFIG,
            Some("http://signoz.local"),
            ProviderCredentials {
                source: CredentialsSource::Filesystem,
                fs: Some(FsSelector {
                    path: path.display().to_string(),
                }),
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    let config = resolver(&store)
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap();
    assert_eq!(config.api_key, "from-file");
}

#[tokio::test]
async fn test_environment_source_unset() {
    let store = Arc::new(MemoryStore::new());
    store
        .apply(ProviderConfig::new(
            PROVIDER_CONFIG,
            None,
            ProviderCredentials {
                source: CredentialsSource::Environment,
                env: Some(EnvSelector {
                    name: "SIGNOZ_PROVIDER_TEST_UNSET_CREDENTIALS".to_string(),
                }),
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    let err = resolver(&store)
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CredentialExtraction(_)));
}

#[tokio::test]
async fn test_client_sends_api_key() {
    let mock = MockSignoz::spawn().await;
    let client = SignozClient::new(Config {
        base_url: mock.url(),
        api_key: API_KEY.to_string(),
    })
    .unwrap();

    let dashboards = client.dashboards().list().await.unwrap();
    assert!(dashboards.is_empty());

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/v1/dashboards");
    assert_eq!(requests[0].api_key.as_deref(), Some(API_KEY));
}

#[tokio::test]
async fn test_client_surfaces_status_and_body() {
    let mock = MockSignoz::spawn().await;
    let client = SignozClient::new(Config {
        base_url: mock.url(),
        api_key: API_KEY.to_string(),
    })
    .unwrap();

    mock.fail_with(500, "database is locked");
    let err = client.rules().get("7").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 500, ref body } if body == "database is locked"));
    assert!(!is_not_found(&err));

    mock.fail_with(400, "rule not found");
    let err = client.rules().get("7").await.unwrap_err();
    assert!(is_not_found(&err));
}

#[tokio::test]
async fn test_client_not_found_status() {
    let mock = MockSignoz::spawn().await;
    let client = SignozClient::new(Config {
        base_url: mock.url(),
        api_key: API_KEY.to_string(),
    })
    .unwrap();

    let err = client.channels().get("12").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(is_not_found(&err));
}

#[tokio::test]
async fn test_credentials_are_read_on_every_resolve() {
    let store = Arc::new(MemoryStore::new());
    seed_provider_config(&store, "http://signoz.local").await;
    let resolver = resolver(&store);

    let first = resolver
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap();
    assert_eq!(first.api_key, API_KEY);

    seed_provider_config_with(&store, "http://signoz.local", r#"{"apiKey":"rotated"}"#).await;
    let second = resolver
        .resolve(&dashboard(Some(PROVIDER_CONFIG)))
        .await
        .unwrap();
    assert_eq!(second.api_key, "rotated");

    let pc: ProviderConfig = get(&store, PROVIDER_CONFIG).await.unwrap();
    assert_eq!(pc.spec.endpoint.as_deref(), Some("http://signoz.local"));
}

#[tokio::test]
async fn test_channel_test_endpoint() {
    use signoz_provider::clients::types::{ChannelSettings, EmailData};
    use signoz_provider::clients::ChannelPayload;

    let mock = MockSignoz::spawn().await;
    let client = SignozClient::new(Config {
        base_url: mock.url(),
        api_key: API_KEY.to_string(),
    })
    .unwrap();

    let payload = ChannelPayload {
        name: "mail".to_string(),
        channel_type: "email".to_string(),
        data: ChannelSettings::Email(EmailData {
            to: vec!["ops@example.com".to_string()],
            send_resolved: None,
        }),
    };
    client.test_channel(&payload).await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/api/v1/testChannel");
    assert_eq!(requests[0].body["data"]["to"][0], "ops@example.com");
}
