pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod i18n;
pub mod lifecycle;
pub mod memory;
pub mod server;
