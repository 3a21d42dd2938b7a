//! These models represent the objects passed around by the agent
//!
//! The reasoning model, the integration platform and the CLI each speak their own
//! format. We always immediately convert those into the internal structs here using
//! to/from helpers, so the conversation loop only ever deals with one representation.
pub mod message;
pub mod role;
pub mod tool;
