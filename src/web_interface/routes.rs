//! One filter function per endpoint, sharing the store and auth service
//! behind `Arc`s. Every data endpoint authenticates the bearer token, and
//! process-scoped endpoints resolve the SID through the owner-scoped lookup
//! so a foreign process answers exactly like a missing one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::error;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{
    LoginForm, OwnerResponse, RiskFilter, StatusResponse, ThreatResponse, TokenResponse,
};
use super::ApiError;
use crate::auth::service::AuthService;
use crate::configuration::config::Config;
use crate::error_handling::types::AuthError;
use crate::import::importer::run_import;
use crate::import::rows::DEFAULT_COLOR;
use crate::storage::store::RiskStore;
use crate::storage::types::Process;

fn unauthorized() -> warp::reply::Response {
    reply::with_header(
        reply::with_status(
            reply::json(&ApiError {
                message: "Could not validate credentials".to_string(),
            }),
            StatusCode::UNAUTHORIZED,
        ),
        "WWW-Authenticate",
        "Bearer",
    )
    .into_response()
}

fn not_found(message: &str) -> warp::reply::Response {
    reply::with_status(
        reply::json(&ApiError {
            message: message.to_string(),
        }),
        StatusCode::NOT_FOUND,
    )
    .into_response()
}

fn server_error(detail: String) -> warp::reply::Response {
    error!("Request failed: {}", detail);
    reply::with_status(
        reply::json(&ApiError { message: detail }),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .into_response()
}

fn json_ok<T: serde::Serialize>(value: &T) -> warp::reply::Response {
    reply::with_status(reply::json(value), StatusCode::OK).into_response()
}

/// Owner-scoped SID resolution shared by all process-scoped endpoints.
async fn owned_process(
    store: &RiskStore,
    sid: &str,
    owner_id: i64,
) -> Result<Process, warp::reply::Response> {
    match store.process_owned(sid, owner_id).await {
        Ok(Some(process)) => Ok(process),
        Ok(None) => Err(not_found("Process not found")),
        Err(e) => Err(server_error(e.to_string())),
    }
}

fn auth_header() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
}

/// GET / -> liveness
pub fn root_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).and_then(|| async move {
        Ok::<_, Rejection>(reply::json(&StatusResponse {
            status: "ok".to_string(),
            message: "riskboard is running".to_string(),
        }))
    })
}

/// POST /token -> bearer token for form credentials
pub fn token_route(
    auth: Arc<AuthService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("token")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::form::<LoginForm>())
        .and_then(move |form: LoginForm| {
            let auth = auth.clone();
            async move {
                match auth.login(&form.username, &form.password).await {
                    Ok(token) => Ok::<_, Rejection>(json_ok(&TokenResponse {
                        access_token: token,
                        token_type: "bearer".to_string(),
                    })),
                    Err(AuthError::StorageError(e)) => Ok(server_error(e.to_string())),
                    Err(_) => Ok(unauthorized()),
                }
            }
        })
}

/// GET /users/me -> identity of the token owner
pub fn me_route(
    auth: Arc<AuthService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users" / "me")
        .and(warp::get())
        .and(auth_header())
        .and_then(move |header: Option<String>| {
            let auth = auth.clone();
            async move {
                match auth.authenticate(header.as_deref()).await {
                    Ok(owner) => Ok::<_, Rejection>(json_ok(&OwnerResponse {
                        username: owner.username,
                        full_name: owner.full_name,
                    })),
                    Err(_) => Ok(unauthorized()),
                }
            }
        })
}

/// GET /users/me/processes and GET /processes -> caller's processes
pub fn processes_routes(
    auth: Arc<AuthService>,
    store: Arc<RiskStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    process_listing(warp::path!("users" / "me" / "processes"), auth.clone(), store.clone())
        .or(process_listing(warp::path!("processes"), auth, store))
}

/// Both listing paths answer identically, differing only in their prefix.
fn process_listing<P>(
    prefix: P,
    auth: Arc<AuthService>,
    store: Arc<RiskStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone
where
    P: Filter<Extract = (), Error = Rejection> + Clone + Send + Sync + 'static,
{
    prefix
        .and(warp::get())
        .and(auth_header())
        .and_then(move |header: Option<String>| {
            let auth = auth.clone();
            let store = store.clone();
            async move {
                let owner = match auth.authenticate(header.as_deref()).await {
                    Ok(owner) => owner,
                    Err(_) => return Ok::<_, Rejection>(unauthorized()),
                };
                match store.processes_for_owner(owner.id).await {
                    Ok(list) => Ok(json_ok(&list)),
                    Err(e) => Ok(server_error(e.to_string())),
                }
            }
        })
}

/// GET /process/:sid -> one owned process
pub fn process_route(
    auth: Arc<AuthService>,
    store: Arc<RiskStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("process" / String)
        .and(warp::get())
        .and(auth_header())
        .and_then(move |sid: String, header: Option<String>| {
            let auth = auth.clone();
            let store = store.clone();
            async move {
                let owner = match auth.authenticate(header.as_deref()).await {
                    Ok(owner) => owner,
                    Err(_) => return Ok::<_, Rejection>(unauthorized()),
                };
                match owned_process(&store, &sid, owner.id).await {
                    Ok(process) => Ok(json_ok(&process)),
                    Err(resp) => Ok(resp),
                }
            }
        })
}

/// GET /threats/:sid -> deduplicated threats joined with their ratings
pub fn threats_route(
    auth: Arc<AuthService>,
    store: Arc<RiskStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("threats" / String)
        .and(warp::get())
        .and(auth_header())
        .and_then(move |sid: String, header: Option<String>| {
            let auth = auth.clone();
            let store = store.clone();
            async move {
                let owner = match auth.authenticate(header.as_deref()).await {
                    Ok(owner) => owner,
                    Err(_) => return Ok::<_, Rejection>(unauthorized()),
                };
                if let Err(resp) = owned_process(&store, &sid, owner.id).await {
                    return Ok(resp);
                }

                let threats = match store.threats_for_process(&sid).await {
                    Ok(threats) => threats,
                    Err(e) => return Ok(server_error(e.to_string())),
                };
                let ratings = match store.ratings_for_process(&sid).await {
                    Ok(ratings) => ratings,
                    Err(e) => return Ok(server_error(e.to_string())),
                };

                // Ratings are looked up case-insensitively; the threat list
                // itself deduplicates on the raw (type, scenario) pair.
                let mut rating_index = HashMap::new();
                for rating in &ratings {
                    rating_index.insert(
                        (
                            rating.threat_type.to_lowercase(),
                            rating.threat_scenario.to_lowercase(),
                        ),
                        rating,
                    );
                }

                let mut seen = HashSet::new();
                let mut result = Vec::new();
                for threat in &threats {
                    let raw_key = (threat.threat_type.clone(), threat.scenario.clone());
                    if !seen.insert(raw_key) {
                        continue;
                    }
                    let rating = rating_index.get(&(
                        threat.threat_type.to_lowercase(),
                        threat.scenario.to_lowercase(),
                    ));
                    result.push(ThreatResponse {
                        id: threat.id,
                        threat_type: threat.threat_type.clone(),
                        scenario: threat.scenario.clone(),
                        integral_risk_level: threat.integral_risk_level.clone(),
                        highest_risk_level: threat.highest_risk_level.clone(),
                        process_sid: threat.process_sid.clone(),
                        threat_rating: rating
                            .map(|r| r.threat_rating.clone())
                            .unwrap_or_default(),
                        threat_rating_color: rating
                            .map(|r| r.color.clone())
                            .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
                    });
                }
                Ok(json_ok(&result))
            }
        })
}

/// GET /risk-details/:sid -> first matching risk detail row
pub fn risk_details_route(
    auth: Arc<AuthService>,
    store: Arc<RiskStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("risk-details" / String)
        .and(warp::get())
        .and(warp::query::<RiskFilter>())
        .and(auth_header())
        .and_then(move |sid: String, filter: RiskFilter, header: Option<String>| {
            let auth = auth.clone();
            let store = store.clone();
            async move {
                let owner = match auth.authenticate(header.as_deref()).await {
                    Ok(owner) => owner,
                    Err(_) => return Ok::<_, Rejection>(unauthorized()),
                };
                if let Err(resp) = owned_process(&store, &sid, owner.id).await {
                    return Ok(resp);
                }
                match store
                    .risk_details_filtered(
                        &sid,
                        filter.threat_type.as_deref(),
                        filter.threat_scenario.as_deref(),
                    )
                    .await
                {
                    Ok(rows) => match rows.first() {
                        Some(first) => Ok(json_ok(first)),
                        None => Ok(not_found("Risk details not found")),
                    },
                    Err(e) => Ok(server_error(e.to_string())),
                }
            }
        })
}

/// GET /detailed-risk-report/:sid -> all matching report rows
pub fn detailed_report_route(
    auth: Arc<AuthService>,
    store: Arc<RiskStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("detailed-risk-report" / String)
        .and(warp::get())
        .and(warp::query::<RiskFilter>())
        .and(auth_header())
        .and_then(move |sid: String, filter: RiskFilter, header: Option<String>| {
            let auth = auth.clone();
            let store = store.clone();
            async move {
                let owner = match auth.authenticate(header.as_deref()).await {
                    Ok(owner) => owner,
                    Err(_) => return Ok::<_, Rejection>(unauthorized()),
                };
                if let Err(resp) = owned_process(&store, &sid, owner.id).await {
                    return Ok(resp);
                }
                match store
                    .detailed_reports_filtered(
                        &sid,
                        filter.threat_type.as_deref(),
                        filter.threat_scenario.as_deref(),
                    )
                    .await
                {
                    Ok(rows) if rows.is_empty() => Ok(not_found("Reports not found")),
                    Ok(rows) => Ok(json_ok(&rows)),
                    Err(e) => Ok(server_error(e.to_string())),
                }
            }
        })
}

/// GET /integral-threat-ratings/:sid -> all rating rows
pub fn ratings_route(
    auth: Arc<AuthService>,
    store: Arc<RiskStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("integral-threat-ratings" / String)
        .and(warp::get())
        .and(auth_header())
        .and_then(move |sid: String, header: Option<String>| {
            let auth = auth.clone();
            let store = store.clone();
            async move {
                let owner = match auth.authenticate(header.as_deref()).await {
                    Ok(owner) => owner,
                    Err(_) => return Ok::<_, Rejection>(unauthorized()),
                };
                if let Err(resp) = owned_process(&store, &sid, owner.id).await {
                    return Ok(resp);
                }
                match store.ratings_for_process(&sid).await {
                    Ok(ratings) => Ok(json_ok(&ratings)),
                    Err(e) => Ok(server_error(e.to_string())),
                }
            }
        })
}

/// GET /import-data -> synchronous destructive-replace import
pub fn import_route(
    store: Arc<RiskStore>,
    config: Arc<Config>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("import-data")
        .and(warp::get())
        .and_then(move || {
            let store = store.clone();
            let config = config.clone();
            async move {
                match run_import(&store, &config).await {
                    Ok(stats) => Ok::<_, Rejection>(json_ok(&StatusResponse {
                        status: "success".to_string(),
                        message: format!(
                            "Data imported successfully: {} processes, {} threats",
                            stats.processes, stats.threats
                        ),
                    })),
                    Err(e) => Ok(server_error(e.to_string())),
                }
            }
        })
}
