pub mod assignment;
pub mod auth;
pub mod configuration;
pub mod error_handling;
pub mod import;
pub mod storage;
pub mod web_interface;
