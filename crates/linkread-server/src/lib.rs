pub mod configuration;
pub mod error;
pub mod mcp;
pub mod routes;
pub mod rpc;
pub mod sessions;
pub mod state;
