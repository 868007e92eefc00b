pub mod schema;
pub mod store;
pub mod types;
