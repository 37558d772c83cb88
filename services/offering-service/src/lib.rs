pub mod config;
pub mod db;
pub mod domain;
pub mod events;
pub mod handlers;
pub mod models;
pub mod saga;
pub mod service;

pub use config::Config;
