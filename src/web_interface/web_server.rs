use std::sync::Arc;

use log::info;
use warp::{Filter, Rejection, Reply};

use crate::auth::service::AuthService;
use crate::configuration::config::Config;
use crate::error_handling::types::ConfigError;
use crate::storage::store::RiskStore;
use crate::web_interface::routes;

/// HTTP server for the risk reporting API.
pub struct WebServer {
    store: Arc<RiskStore>,
    auth: Arc<AuthService>,
    config: Arc<Config>,
}

/// CORS policy for the configured front-end origin: standard methods, any
/// request header, credentials allowed.
pub fn cors_policy(origin: &str) -> warp::filters::cors::Builder {
    warp::cors()
        .allow_origin(origin)
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .allow_credentials(true)
}

/// Full API route tree, CORS excluded so tests can drive it directly.
pub fn api_routes(
    store: Arc<RiskStore>,
    auth: Arc<AuthService>,
    config: Arc<Config>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    routes::root_route()
        .or(routes::token_route(auth.clone()))
        .or(routes::me_route(auth.clone()))
        .or(routes::processes_routes(auth.clone(), store.clone()))
        .or(routes::process_route(auth.clone(), store.clone()))
        .or(routes::threats_route(auth.clone(), store.clone()))
        .or(routes::risk_details_route(auth.clone(), store.clone()))
        .or(routes::detailed_report_route(auth.clone(), store.clone()))
        .or(routes::ratings_route(auth, store.clone()))
        .or(routes::import_route(store, config))
}

impl WebServer {
    pub fn new(store: Arc<RiskStore>, auth: Arc<AuthService>, config: Arc<Config>) -> Self {
        Self { store, auth, config }
    }

    /// Starts the server and runs until the process exits.
    pub async fn start(&self) -> Result<(), ConfigError> {
        let addr = self.config.listen_addr()?;

        let routes = api_routes(self.store.clone(), self.auth.clone(), self.config.clone())
            .with(cors_policy(&self.config.cors_origin));

        info!("Listening on {} (CORS origin {})", addr, self.config.cors_origin);
        warp::serve(routes).run(addr).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::passwords::hash_password;
    use crate::auth::tokens::TokenSigner;
    use crate::storage::types::{ImportBatch, NewProcess, NewRating, NewThreat};
    use tempfile::TempDir;

    struct TestApp {
        _dir: TempDir,
        store: Arc<RiskStore>,
        auth: Arc<AuthService>,
        config: Arc<Config>,
    }

    impl TestApp {
        fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
            api_routes(self.store.clone(), self.auth.clone(), self.config.clone())
        }
    }

    async fn test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            RiskStore::open(dir.path().join("web.sqlite3")).await.unwrap(),
        );
        let auth = Arc::new(AuthService::new(
            store.clone(),
            TokenSigner::new("test-secret", 30),
        ));
        TestApp {
            _dir: dir,
            store,
            auth,
            config: Arc::new(Config::default()),
        }
    }

    fn two_process_batch() -> ImportBatch {
        ImportBatch {
            processes: vec![
                NewProcess {
                    sid: "P1".into(),
                    name: "Payments".into(),
                    risk_label: "1/3".into(),
                    owner_block: "Operations".into(),
                    department: "Back office".into(),
                    rating: 4.5,
                },
                NewProcess {
                    sid: "P2".into(),
                    name: "Settlements".into(),
                    risk_label: "0/2".into(),
                    owner_block: "Operations".into(),
                    department: "Treasury".into(),
                    rating: 2.0,
                },
            ],
            threats: vec![NewThreat {
                id: 1,
                threat_type: "Отказ ИТ-систем".into(),
                scenario: "Отказ ЦОД".into(),
                integral_risk_level: "Высокий риск".into(),
                highest_risk_level: "Высокий риск".into(),
                process_sid: "P1".into(),
            }],
            ratings: vec![NewRating {
                process_sid: "P1".into(),
                // Rating key only matches the threat case-insensitively.
                threat_type: "отказ ит-систем".into(),
                threat_scenario: "отказ цод".into(),
                threat_rating: "Высокий риск".into(),
                color: "#ffc107".into(),
            }],
            risk_details: Vec::new(),
            detailed_reports: Vec::new(),
        }
    }

    async fn login(app: &TestApp, username: &str, password: &str) -> String {
        let routes = app.routes();
        let response = warp::test::request()
            .method("POST")
            .path("/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("username={}&password={}", username, password))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_root_is_public() {
        let app = test_app().await;
        let response = warp::test::request().path("/").reply(&app.routes()).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_token_rejects_bad_credentials() {
        let app = test_app().await;
        app.store
            .insert_owner("ivanov_ii", "Иванов И.И.", &hash_password("ivanov123"))
            .await
            .unwrap();
        let response = warp::test::request()
            .method("POST")
            .path("/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("username=ivanov_ii&password=wrong")
            .reply(&app.routes())
            .await;
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = test_app().await;
        let response = warp::test::request().path("/users/me").reply(&app.routes()).await;
        assert_eq!(response.status(), 401);
        assert_eq!(
            response.headers().get("WWW-Authenticate").unwrap(),
            "Bearer"
        );

        let response = warp::test::request()
            .path("/users/me")
            .header("authorization", "Bearer forged-token")
            .reply(&app.routes())
            .await;
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn test_me_returns_identity() {
        let app = test_app().await;
        app.store
            .insert_owner("ivanov_ii", "Иванов Иван Иванович", &hash_password("ivanov123"))
            .await
            .unwrap();
        let token = login(&app, "ivanov_ii", "ivanov123").await;

        let response = warp::test::request()
            .path("/users/me")
            .header("authorization", format!("Bearer {}", token))
            .reply(&app.routes())
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["username"], "ivanov_ii");
        assert_eq!(body["full_name"], "Иванов Иван Иванович");
    }

    #[tokio::test]
    async fn test_owner_scoping_end_to_end() {
        let app = test_app().await;
        app.store.replace_report_data(&two_process_batch()).await.unwrap();
        app.store
            .insert_owner("a", "Owner A", &hash_password("pass-a"))
            .await
            .unwrap();
        app.store
            .insert_owner("b", "Owner B", &hash_password("pass-b"))
            .await
            .unwrap();
        let owner_a = app.store.owner_by_username("a").await.unwrap().unwrap();
        for process in app.store.processes_all().await.unwrap() {
            app.store.set_process_owner(process.id, owner_a.id).await.unwrap();
        }

        let token_a = login(&app, "a", "pass-a").await;
        let token_b = login(&app, "b", "pass-b").await;

        // Owner A sees both processes on either listing path.
        for path in ["/processes", "/users/me/processes"] {
            let response = warp::test::request()
                .path(path)
                .header("authorization", format!("Bearer {}", token_a))
                .reply(&app.routes())
                .await;
            assert_eq!(response.status(), 200);
            let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
            assert_eq!(body.as_array().unwrap().len(), 2);
        }

        // Owner B sees an empty list and 404 on direct access, even though
        // the process exists under owner A.
        let response = warp::test::request()
            .path("/processes")
            .header("authorization", format!("Bearer {}", token_b))
            .reply(&app.routes())
            .await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body.as_array().unwrap().is_empty());

        let response = warp::test::request()
            .path("/process/P1")
            .header("authorization", format!("Bearer {}", token_b))
            .reply(&app.routes())
            .await;
        assert_eq!(response.status(), 404);

        let response = warp::test::request()
            .path("/process/P1")
            .header("authorization", format!("Bearer {}", token_a))
            .reply(&app.routes())
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["sid"], "P1");
        assert_eq!(body["name"], "Payments");
    }

    #[tokio::test]
    async fn test_threats_join_ratings_case_insensitively() {
        let app = test_app().await;
        app.store.replace_report_data(&two_process_batch()).await.unwrap();
        app.store
            .insert_owner("a", "Owner A", &hash_password("pass-a"))
            .await
            .unwrap();
        let owner = app.store.owner_by_username("a").await.unwrap().unwrap();
        for process in app.store.processes_all().await.unwrap() {
            app.store.set_process_owner(process.id, owner.id).await.unwrap();
        }
        let token = login(&app, "a", "pass-a").await;

        let response = warp::test::request()
            .path("/threats/P1")
            .header("authorization", format!("Bearer {}", token))
            .reply(&app.routes())
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        let threats = body.as_array().unwrap();
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0]["type"], "Отказ ИТ-систем");
        assert_eq!(threats[0]["threat_rating"], "Высокий риск");
        assert_eq!(threats[0]["threat_rating_color"], "#ffc107");

        // P2 has no threats, the listing is empty rather than 404.
        let response = warp::test::request()
            .path("/threats/P2")
            .header("authorization", format!("Bearer {}", token))
            .reply(&app.routes())
            .await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detail_endpoints_404_when_no_rows_match() {
        let app = test_app().await;
        app.store.replace_report_data(&two_process_batch()).await.unwrap();
        app.store
            .insert_owner("a", "Owner A", &hash_password("pass-a"))
            .await
            .unwrap();
        let owner = app.store.owner_by_username("a").await.unwrap().unwrap();
        for process in app.store.processes_all().await.unwrap() {
            app.store.set_process_owner(process.id, owner.id).await.unwrap();
        }
        let token = login(&app, "a", "pass-a").await;

        for path in [
            "/risk-details/P1",
            "/detailed-risk-report/P1",
            "/risk-details/P1?threat_type=x",
        ] {
            let response = warp::test::request()
                .path(path)
                .header("authorization", format!("Bearer {}", token))
                .reply(&app.routes())
                .await;
            assert_eq!(response.status(), 404, "{}", path);
        }

        // Ratings endpoint returns the rows that exist.
        let response = warp::test::request()
            .path("/integral-threat-ratings/P1")
            .header("authorization", format!("Bearer {}", token))
            .reply(&app.routes())
            .await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_preflight_accepts_arbitrary_request_headers() {
        let app = test_app().await;
        let routes = app.routes().with(cors_policy(&app.config.cors_origin));

        let response = warp::test::request()
            .method("OPTIONS")
            .path("/users/me")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "GET")
            .header("access-control-request-headers", "authorization, x-requested-with")
            .reply(&routes)
            .await;
        // 200 means the preflight accepted the extra header; a disallowed
        // header would have been refused outright.
        assert_eq!(response.status(), 200);
        let allowed = response
            .headers()
            .get("access-control-allow-headers")
            .unwrap()
            .to_str()
            .unwrap()
            .to_lowercase();
        assert!(allowed == "*" || allowed.contains("x-requested-with"), "{}", allowed);

        // A request from an unknown origin is still refused.
        let response = warp::test::request()
            .method("OPTIONS")
            .path("/users/me")
            .header("origin", "http://evil.example")
            .header("access-control-request-method", "GET")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), 403);
    }

    #[tokio::test]
    async fn test_import_endpoint_reports_failure() {
        let app = test_app().await;
        // Default config points at report files that do not exist.
        let response = warp::test::request().path("/import-data").reply(&app.routes()).await;
        assert_eq!(response.status(), 500);
    }
}
