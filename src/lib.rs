pub mod app;
pub mod authz;
pub mod certification;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod events;
pub mod jwt;
pub mod models;
pub mod notify;
pub mod response;
pub mod routes;
pub mod utils;
pub mod validation;

// Re-export commonly used items for tests
pub use app::{create_app, AppState};
