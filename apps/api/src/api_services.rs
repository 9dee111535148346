mod database;
mod redis;
mod state_builder;

pub use state_builder::{ApiServices, build_api_services};
