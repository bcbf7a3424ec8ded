pub mod config;
pub mod errors;
pub mod routes;
pub mod server;
pub mod state;
