pub mod classifier;
pub mod config;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod providers;
