pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod outbox;
pub mod routes;
pub mod services;
pub mod store;
pub mod transport;
