pub mod config;
pub mod error;
pub mod models;
pub mod payments;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
pub mod workflows;
