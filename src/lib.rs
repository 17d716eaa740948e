pub mod config;
pub mod error;
pub mod file_types;
pub mod http;
pub mod models;
pub mod name_check;
pub mod notify;
pub mod scope;
pub mod services;
pub mod upload;
pub mod utils;
