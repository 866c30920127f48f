// Library exports for testing
pub mod audit;
pub mod config;
pub mod directory;
pub mod metrics;
pub mod models;
pub mod service;
