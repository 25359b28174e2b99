//! Network layer: wire types, the shared HTTP client, and REST services.

pub mod auth_api;
pub mod http;
pub mod todo_api;
pub mod types;
