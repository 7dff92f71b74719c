pub mod config;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod startup;
