use serde::{Deserialize, Serialize};

/// POST /token form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// GET /users/me payload. The password hash never leaves the store layer.
#[derive(Debug, Serialize)]
pub struct OwnerResponse {
    pub username: String,
    pub full_name: String,
}

/// A threat joined with its integral rating for the threats listing.
#[derive(Debug, Serialize)]
pub struct ThreatResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub threat_type: String,
    pub scenario: String,
    pub integral_risk_level: String,
    pub highest_risk_level: String,
    pub process_sid: String,
    pub threat_rating: String,
    pub threat_rating_color: String,
}

/// Optional filters accepted by the detail endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct RiskFilter {
    pub threat_type: Option<String>,
    pub threat_scenario: Option<String>,
}

/// GET /import-data outcome payload.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}
