pub mod cache;
pub mod error;
pub mod http;
pub mod models;
pub mod retry;
pub mod settings;
