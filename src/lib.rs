pub mod agent;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod schema;
pub mod state;
pub mod tool_server;
