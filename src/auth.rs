pub mod passwords;
pub mod service;
pub mod tokens;
