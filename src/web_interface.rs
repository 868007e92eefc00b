pub mod routes;
pub mod types;
pub mod web_server;

/// API error payload
#[derive(serde::Serialize)]
pub struct ApiError {
    pub message: String,
}
