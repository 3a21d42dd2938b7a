//! OAuth connection management for the toolkits the agent uses.
//!
//! A user needs an active connected account per toolkit before its tools can run. When
//! none exists we start a connection on the platform, send the user to the returned
//! redirect URL and poll until the grant becomes active.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::errors::{AgentError, AgentResult};
use crate::integration::{
    ConnectedAccount, ConnectionRequest, ConnectionStatus, IntegrationClient,
    IntegrationErrorKind, GOOGLEDRIVE, GOOGLEMEET,
};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Human readable name of a toolkit
pub fn toolkit_label(toolkit: &str) -> &str {
    match toolkit {
        GOOGLEMEET => "Google Meet",
        GOOGLEDRIVE => "Google Drive",
        other => other,
    }
}

pub struct AuthManager {
    client: Arc<dyn IntegrationClient>,
    toolkit: String,
    poll_interval: Duration,
}

impl AuthManager {
    pub fn new<S: Into<String>>(client: Arc<dyn IntegrationClient>, toolkit: S) -> Self {
        Self {
            client,
            toolkit: toolkit.into(),
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The user's active account for this toolkit. Lookup failures count as "none".
    pub async fn existing_connection(&self, user_id: &str) -> Option<ConnectedAccount> {
        match self
            .client
            .list_connected_accounts(user_id, Some(&self.toolkit))
            .await
        {
            Ok(accounts) => {
                let account = accounts.into_iter().find(|a| a.belongs_to(&self.toolkit));
                match &account {
                    Some(a) => {
                        tracing::info!("Found existing {} connection: {}", self.toolkit, a.id)
                    }
                    None => tracing::debug!("No {} connection for user {}", self.toolkit, user_id),
                }
                account
            }
            Err(e) => {
                tracing::error!("Error checking for existing {} connection: {}", self.toolkit, e);
                None
            }
        }
    }

    async fn auth_config_id(&self) -> AgentResult<String> {
        let found = self.client.find_auth_config(&self.toolkit).await.map_err(|e| {
            AgentError::AuthConfigNotFound(format!(
                "Failed to find {} auth config: {}",
                self.toolkit, e
            ))
        })?;

        match found {
            Some(id) => {
                tracing::info!("Found {} auth config: {}", self.toolkit, id);
                Ok(id)
            }
            None if self.toolkit == GOOGLEMEET => Err(AgentError::auth_config_not_found()),
            None => Err(AgentError::AuthConfigNotFound(format!(
                "No {} auth config found. Create one at https://app.composio.dev",
                toolkit_label(&self.toolkit)
            ))),
        }
    }

    /// Start a new OAuth connection, optionally opening the redirect URL in a browser
    pub async fn initiate(
        &self,
        user_id: &str,
        open_browser: bool,
    ) -> AgentResult<ConnectionRequest> {
        let auth_config_id = self.auth_config_id().await?;
        tracing::info!("Initiating OAuth for {}, user {}", self.toolkit, user_id);

        let request = self
            .client
            .initiate_connection(user_id, &self.toolkit, &auth_config_id)
            .await
            .map_err(|e| {
                AgentError::AuthConfigNotFound(format!("Failed to initiate OAuth: {}", e))
            })?;

        if Url::parse(&request.redirect_url).is_err() {
            return Err(AgentError::AuthConfigNotFound(format!(
                "Could not get a valid OAuth URL for {}: {}",
                self.toolkit, request.redirect_url
            )));
        }

        if open_browser && webbrowser::open(&request.redirect_url).is_err() {
            tracing::warn!("Could not open a browser for the OAuth redirect");
        }

        Ok(request)
    }

    /// Poll the pending connection until it is active, fails, or `timeout` elapses
    pub async fn wait_for_connection(
        &self,
        request: &ConnectionRequest,
        timeout: Duration,
    ) -> AgentResult<ConnectedAccount> {
        tracing::info!("Waiting up to {}s for OAuth completion", timeout.as_secs());
        let deadline = Instant::now() + timeout;

        loop {
            match self.client.get_connected_account(&request.id).await {
                Ok(account) if account.is_active() => {
                    tracing::info!("OAuth completed for {}", self.toolkit);
                    return Ok(account);
                }
                Ok(account) => match account.status {
                    Some(ConnectionStatus::Expired) | Some(ConnectionStatus::Failed) => {
                        return Err(AgentError::connection_expired());
                    }
                    status => tracing::debug!("Connection {} is {:?}", request.id, status),
                },
                Err(e) if e.kind == IntegrationErrorKind::Connection => {
                    tracing::debug!("Transient error while polling connection: {}", e);
                }
                Err(e) if e.message.to_lowercase().contains("expired") => {
                    return Err(AgentError::connection_expired());
                }
                Err(e) => {
                    return Err(AgentError::Connection(format!(
                        "Failed while waiting for OAuth: {}",
                        e
                    )));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AgentError::OAuthTimeout {
                    timeout: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Return the user's active account for `toolkit`, running the OAuth flow if there is none
pub async fn ensure_connection(
    client: Arc<dyn IntegrationClient>,
    toolkit: &str,
    user_id: &str,
    timeout: Duration,
    open_browser: bool,
) -> AgentResult<ConnectedAccount> {
    let manager = AuthManager::new(client, toolkit);
    if let Some(account) = manager.existing_connection(user_id).await {
        return Ok(account);
    }

    let label = toolkit_label(toolkit);
    let rule = "=".repeat(60);
    println!("\n{}\n{} Authentication Required\n{}", rule, label, rule);
    println!("\nA browser window will open for you to authorize access.");
    println!("Please sign in with your Google Workspace account.\n");

    let request = manager.initiate(user_id, open_browser).await?;

    println!("If the browser didn't open, visit this URL:\n\n  {}\n", request.redirect_url);
    println!("Waiting for authentication...\n{}\n", rule);

    let account = manager.wait_for_connection(&request, timeout).await?;
    println!("\n{} authentication successful!", label);
    Ok(account)
}

/// Whether the user already has an active account for `toolkit`
pub async fn has_connection(
    client: Arc<dyn IntegrationClient>,
    toolkit: &str,
    user_id: &str,
) -> bool {
    AuthManager::new(client, toolkit)
        .existing_connection(user_id)
        .await
        .is_some()
}
