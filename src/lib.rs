pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod messaging;
pub mod models;
pub mod services;
pub mod state;
pub mod view;
