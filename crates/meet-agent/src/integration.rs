//! Access to the remote integration platform that holds the user's OAuth grants
//! and executes toolkit operations on their behalf.
//!
//! The rest of the crate only sees the [`base::IntegrationClient`] contract. All
//! knowledge of the platform's wire shapes lives in [`composio`] and [`schema`].
pub mod base;
pub mod composio;
pub mod schema;

#[cfg(test)]
pub mod mock;

pub use base::{
    classify_message, ConnectedAccount, ConnectionRequest, ConnectionStatus, IntegrationClient,
    IntegrationError, IntegrationErrorKind, IntegrationResult, GOOGLEDRIVE, GOOGLEMEET,
};
