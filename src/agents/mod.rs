//! Client side of the remote agent service: wire types, the [`AgentsApi`]
//! boundary trait, and the HTTP implementation.

pub mod api;
pub mod http;
pub mod types;

pub use api::AgentsApi;
pub use http::HttpAgentsClient;
pub use types::{Agent, MessageRole, Run, RunError, RunStatus, SortOrder, Thread, ThreadMessage};
