use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use super::base::{
    ConnectedAccount, ConnectionRequest, IntegrationClient, IntegrationError,
    IntegrationErrorKind, IntegrationResult,
};
use crate::models::tool::Tool;

/// One recorded `execute` call
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteCall {
    pub tool: String,
    pub user_id: String,
    pub connected_account_id: String,
    pub arguments: Value,
}

/// Scripted integration platform for tests.
///
/// Every scripted queue hands out its entries in order and then keeps repeating the last one.
#[derive(Default)]
pub struct MockIntegration {
    tools: Mutex<HashMap<String, Vec<IntegrationResult<Vec<Tool>>>>>,
    list_tools_calls: Mutex<Vec<String>>,
    accounts: Mutex<Vec<IntegrationResult<Vec<ConnectedAccount>>>>,
    execute_results: Mutex<Vec<IntegrationResult<Value>>>,
    execute_calls: Mutex<Vec<ExecuteCall>>,
    auth_config: Option<String>,
    connection_request: Option<ConnectionRequest>,
    initiated: Mutex<Vec<(String, String, String)>>,
    account_statuses: Mutex<Vec<IntegrationResult<ConnectedAccount>>>,
}

fn next<T: Clone>(queue: &Mutex<Vec<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    match queue.len() {
        0 => None,
        1 => Some(queue[0].clone()),
        _ => Some(queue.remove(0)),
    }
}

impl MockIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(self, toolkit: &str, tools: Vec<Tool>) -> Self {
        self.with_tools_results(toolkit, vec![Ok(tools)])
    }

    pub fn with_tools_results(
        self,
        toolkit: &str,
        results: Vec<IntegrationResult<Vec<Tool>>>,
    ) -> Self {
        self.tools
            .lock()
            .unwrap()
            .insert(toolkit.to_string(), results);
        self
    }

    pub fn with_accounts(self, accounts: Vec<ConnectedAccount>) -> Self {
        self.with_accounts_results(vec![Ok(accounts)])
    }

    pub fn with_accounts_results(
        self,
        results: Vec<IntegrationResult<Vec<ConnectedAccount>>>,
    ) -> Self {
        *self.accounts.lock().unwrap() = results;
        self
    }

    pub fn with_execute_results(self, results: Vec<IntegrationResult<Value>>) -> Self {
        *self.execute_results.lock().unwrap() = results;
        self
    }

    pub fn with_auth_config(mut self, id: &str) -> Self {
        self.auth_config = Some(id.to_string());
        self
    }

    pub fn with_connection_request(mut self, request: ConnectionRequest) -> Self {
        self.connection_request = Some(request);
        self
    }

    pub fn with_account_statuses(self, statuses: Vec<IntegrationResult<ConnectedAccount>>) -> Self {
        *self.account_statuses.lock().unwrap() = statuses;
        self
    }

    pub fn execute_calls(&self) -> Vec<ExecuteCall> {
        self.execute_calls.lock().unwrap().clone()
    }

    pub fn list_tools_calls(&self) -> Vec<String> {
        self.list_tools_calls.lock().unwrap().clone()
    }

    pub fn initiated(&self) -> Vec<(String, String, String)> {
        self.initiated.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntegrationClient for MockIntegration {
    async fn list_tools(&self, toolkit: &str, _user_id: &str) -> IntegrationResult<Vec<Tool>> {
        self.list_tools_calls
            .lock()
            .unwrap()
            .push(toolkit.to_string());

        let mut tools = self.tools.lock().unwrap();
        match tools.get_mut(toolkit) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Ok(Vec::new()),
        }
    }

    async fn execute(
        &self,
        tool: &str,
        user_id: &str,
        connected_account_id: &str,
        arguments: &Value,
    ) -> IntegrationResult<Value> {
        self.execute_calls.lock().unwrap().push(ExecuteCall {
            tool: tool.to_string(),
            user_id: user_id.to_string(),
            connected_account_id: connected_account_id.to_string(),
            arguments: arguments.clone(),
        });
        next(&self.execute_results)
            .unwrap_or_else(|| Ok(json!({"data": {}, "error": null, "successful": true})))
    }

    async fn list_connected_accounts(
        &self,
        _user_id: &str,
        toolkit: Option<&str>,
    ) -> IntegrationResult<Vec<ConnectedAccount>> {
        let accounts = next(&self.accounts).unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(accounts
            .into_iter()
            .filter(|account| toolkit.map_or(true, |t| account.belongs_to(t)))
            .collect())
    }

    async fn find_auth_config(&self, _toolkit: &str) -> IntegrationResult<Option<String>> {
        Ok(self.auth_config.clone())
    }

    async fn initiate_connection(
        &self,
        user_id: &str,
        toolkit: &str,
        auth_config_id: &str,
    ) -> IntegrationResult<ConnectionRequest> {
        self.initiated.lock().unwrap().push((
            user_id.to_string(),
            toolkit.to_string(),
            auth_config_id.to_string(),
        ));
        self.connection_request.clone().ok_or_else(|| {
            IntegrationError::new(IntegrationErrorKind::Api, "no connection request scripted")
        })
    }

    async fn get_connected_account(&self, id: &str) -> IntegrationResult<ConnectedAccount> {
        next(&self.account_statuses).unwrap_or_else(|| {
            Err(IntegrationError::from_status(
                404,
                format!("Connected account {} not found", id),
                None,
            ))
        })
    }
}
