pub mod audit;
pub mod config;
pub mod health;
pub mod task;
pub mod token;
pub mod user;
