pub mod analytics;
pub mod auth;
pub mod config;
pub mod domain;
pub mod output;
pub mod seed;
pub mod server;
pub mod store;
