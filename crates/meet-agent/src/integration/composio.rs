use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use strum_macros::{Display, EnumString};

use super::base::{
    ConnectedAccount, ConnectionRequest, IntegrationClient, IntegrationError,
    IntegrationErrorKind, IntegrationResult,
};
use super::schema;
use crate::models::tool::Tool;

pub const COMPOSIO_HOST: &str = "https://backend.composio.dev";

/// Generation of the platform API. Picked once when the client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApiVersion {
    /// Toolkit/user based API (`/api/v3`)
    V3,
    /// App/entity based API (`/api/v1`, `/api/v2`)
    Legacy,
}

#[derive(Debug, Clone)]
pub struct ComposioConfig {
    pub host: String,
    pub api_key: String,
    /// Skip the capability probe and use this version
    pub api_version: Option<ApiVersion>,
}

impl ComposioConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: COMPOSIO_HOST.to_string(),
            api_key: api_key.into(),
            api_version: None,
        }
    }
}

pub struct ComposioClient {
    client: Client,
    config: ComposioConfig,
    version: ApiVersion,
}

impl ComposioClient {
    /// Build a client, probing the platform for its API version unless one is pinned
    pub async fn connect(config: ComposioConfig) -> IntegrationResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        let version = match config.api_version {
            Some(version) => version,
            None => Self::probe(&client, &config).await?,
        };
        tracing::info!("Using integration platform API version: {}", version);

        Ok(Self {
            client,
            config,
            version,
        })
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    async fn probe(client: &Client, config: &ComposioConfig) -> IntegrationResult<ApiVersion> {
        let url = format!("{}/api/v3/toolkits", config.host.trim_end_matches('/'));
        let response = client
            .get(&url)
            .header("x-api-key", &config.api_key)
            .query(&[("limit", "1")])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(ApiVersion::V3),
            StatusCode::NOT_FOUND => Ok(ApiVersion::Legacy),
            _ => Err(Self::error_from_response(response).await),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> IntegrationResult<Value> {
        let response = self
            .client
            .get(self.url(path))
            .header("x-api-key", &self.config.api_key)
            .query(query)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn post(&self, path: &str, payload: Value) -> IntegrationResult<Value> {
        let response = self
            .client
            .post(self.url(path))
            .header("x-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> IntegrationResult<Value> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            IntegrationError::new(
                IntegrationErrorKind::Api,
                format!("Invalid JSON from integration platform: {}", e),
            )
        })
    }

    async fn error_from_response(response: Response) -> IntegrationError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        IntegrationError::from_status(
            status.as_u16(),
            format!("Request failed: {} - {}", status, error_message(&body)),
            retry_after,
        )
    }
}

/// Best human-readable message from an error body
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("error"))
        })
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl IntegrationClient for ComposioClient {
    async fn list_tools(&self, toolkit: &str, user_id: &str) -> IntegrationResult<Vec<Tool>> {
        let response = match self.version {
            ApiVersion::V3 => {
                self.get(
                    "/api/v3/tools",
                    &[("toolkit_slug", toolkit), ("user_id", user_id)],
                )
                .await?
            }
            ApiVersion::Legacy => self.get("/api/v2/actions", &[("apps", toolkit)]).await?,
        };
        Ok(schema::tools_from_catalog(response))
    }

    async fn execute(
        &self,
        tool: &str,
        user_id: &str,
        connected_account_id: &str,
        arguments: &Value,
    ) -> IntegrationResult<Value> {
        match self.version {
            ApiVersion::V3 => {
                self.post(
                    &format!("/api/v3/tools/execute/{}", tool),
                    json!({
                        "user_id": user_id,
                        "connected_account_id": connected_account_id,
                        "arguments": arguments,
                    }),
                )
                .await
            }
            ApiVersion::Legacy => {
                self.post(
                    &format!("/api/v2/actions/{}/execute", tool),
                    json!({
                        "entityId": user_id,
                        "connectedAccountId": connected_account_id,
                        "input": arguments,
                    }),
                )
                .await
            }
        }
    }

    async fn list_connected_accounts(
        &self,
        user_id: &str,
        toolkit: Option<&str>,
    ) -> IntegrationResult<Vec<ConnectedAccount>> {
        let response = match self.version {
            ApiVersion::V3 => {
                let mut query = vec![("user_ids", user_id), ("statuses", "ACTIVE")];
                if let Some(toolkit) = toolkit {
                    query.push(("toolkit_slugs", toolkit));
                }
                self.get("/api/v3/connected_accounts", &query).await?
            }
            ApiVersion::Legacy => {
                let mut query = vec![("user_uuid", user_id), ("showActiveOnly", "true")];
                if let Some(toolkit) = toolkit {
                    query.push(("appNames", toolkit));
                }
                self.get("/api/v1/connectedAccounts", &query).await?
            }
        };

        // Filters are applied again locally since older deployments ignore them
        Ok(schema::accounts_from_response(response)
            .into_iter()
            .filter(|account| account.status.is_none() || account.is_active())
            .filter(|account| toolkit.map_or(true, |t| account.belongs_to(t)))
            .collect())
    }

    async fn find_auth_config(&self, toolkit: &str) -> IntegrationResult<Option<String>> {
        let response = match self.version {
            ApiVersion::V3 => {
                self.get("/api/v3/auth_configs", &[("toolkit_slug", toolkit)])
                    .await?
            }
            ApiVersion::Legacy => {
                self.get("/api/v1/integrations", &[("appName", toolkit)])
                    .await?
            }
        };

        let config_id = schema::extract_items(response).into_iter().find_map(|item| {
            let matches = item
                .pointer("/toolkit/slug")
                .or_else(|| item.get("appName"))
                .and_then(Value::as_str)
                .map_or(true, |slug| slug.eq_ignore_ascii_case(toolkit));
            if matches {
                item.get("id").and_then(Value::as_str).map(str::to_string)
            } else {
                None
            }
        });
        Ok(config_id)
    }

    async fn initiate_connection(
        &self,
        user_id: &str,
        toolkit: &str,
        auth_config_id: &str,
    ) -> IntegrationResult<ConnectionRequest> {
        let response = match self.version {
            ApiVersion::V3 => {
                self.post(
                    "/api/v3/connected_accounts",
                    json!({
                        "auth_config": {"id": auth_config_id},
                        "connection": {"user_id": user_id},
                    }),
                )
                .await?
            }
            ApiVersion::Legacy => {
                self.post(
                    "/api/v1/connectedAccounts",
                    json!({
                        "integrationId": auth_config_id,
                        "entityId": user_id,
                    }),
                )
                .await?
            }
        };

        schema::connection_request_from_value(&response).ok_or_else(|| {
            IntegrationError::new(
                IntegrationErrorKind::Api,
                format!("Could not get OAuth URL for {} from the platform", toolkit),
            )
        })
    }

    async fn get_connected_account(&self, id: &str) -> IntegrationResult<ConnectedAccount> {
        let path = match self.version {
            ApiVersion::V3 => format!("/api/v3/connected_accounts/{}", id),
            ApiVersion::Legacy => format!("/api/v1/connectedAccounts/{}", id),
        };
        let response = self.get(&path, &[]).await?;

        schema::account_from_value(&response).ok_or_else(|| {
            IntegrationError::new(
                IntegrationErrorKind::Api,
                format!("Connected account {} missing from response", id),
            )
        })
    }
}
