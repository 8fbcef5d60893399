pub mod api;
pub mod browser;
pub mod config;
pub mod geo;
pub mod matcher;
pub mod models;
pub mod storage;
