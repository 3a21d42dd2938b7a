//! Translation from the integration platform's response shapes into our models.
//!
//! The platform has shipped several generations of its API. Catalogs arrive either
//! as an object wrapping an `items` (or `data`) array or as a bare array, and each
//! item is either an already provider-formatted `{"type": "function", "function": {..}}`
//! descriptor or a flat record whose field names vary by generation.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::base::{ConnectedAccount, ConnectionRequest, ConnectionStatus};
use crate::models::tool::Tool;

lazy_static! {
    static ref TOOL_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").unwrap();
}

/// Pull the list of records out of a collection response
pub fn extract_items(response: Value) -> Vec<Value> {
    match response {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["items", "data"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn first_object(value: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| v.is_object())
        .cloned()
}

pub fn is_valid_tool_name(name: &str) -> bool {
    TOOL_NAME.is_match(name)
}

/// Normalize one catalog item. Items without a usable name are dropped.
pub fn tool_from_value(item: &Value) -> Option<Tool> {
    let (name, description, schema) = match item.get("function") {
        Some(function) if function.is_object() => (
            first_str(function, &["name"])?,
            first_str(function, &["description"]).unwrap_or_default(),
            first_object(function, &["parameters"]),
        ),
        _ => (
            first_str(item, &["slug", "name", "action"])?,
            first_str(item, &["description", "desc"]).unwrap_or_default(),
            first_object(
                item,
                &["input_schema", "inputSchema", "input_parameters", "parameters"],
            ),
        ),
    };

    if !is_valid_tool_name(name) {
        tracing::warn!("Skipping tool with unusable name: {}", name);
        return None;
    }

    Some(Tool::with_normalized_schema(
        name,
        description,
        schema.unwrap_or(Value::Null),
    ))
}

/// Normalize a whole catalog response, preserving catalog order
pub fn tools_from_catalog(response: Value) -> Vec<Tool> {
    extract_items(response)
        .iter()
        .filter_map(tool_from_value)
        .collect()
}

pub fn account_from_value(value: &Value) -> Option<ConnectedAccount> {
    let id = first_str(value, &["id", "connectedAccountId", "connected_account_id"])?;
    let toolkit = value
        .get("toolkit")
        .and_then(|toolkit| first_str(toolkit, &["slug"]))
        .or_else(|| first_str(value, &["appName", "app_name", "appUniqueId"]))
        .unwrap_or_default();
    let status = first_str(value, &["status", "connectionStatus"])
        .and_then(|status| status.parse::<ConnectionStatus>().ok());

    Some(ConnectedAccount::new(id, toolkit, status))
}

/// Accounts from a list response. A single account object is accepted too.
pub fn accounts_from_response(response: Value) -> Vec<ConnectedAccount> {
    if response.is_object() && response.get("id").is_some() {
        return account_from_value(&response).into_iter().collect();
    }
    extract_items(response)
        .iter()
        .filter_map(account_from_value)
        .collect()
}

pub fn connection_request_from_value(value: &Value) -> Option<ConnectionRequest> {
    let id = first_str(value, &["id", "connectedAccountId", "connected_account_id"])?;
    let redirect_url = first_str(value, &["redirect_url", "redirectUrl", "redirect_uri"])?;
    Some(ConnectionRequest {
        id: id.to_string(),
        redirect_url: redirect_url.to_string(),
    })
}
