// Library exports for Groundwork
// This allows integration tests and the binary to share the same modules

pub mod admin;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod forms;
pub mod routes;
pub mod state;
pub mod uploads;
