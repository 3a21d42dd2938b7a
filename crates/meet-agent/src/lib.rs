pub mod agent;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod integration;
pub mod invoker;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod retry;

pub use agent::{Agent, AgentResponse};
pub use config::Settings;
pub use errors::{AgentError, AgentResult};
