use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::require_login;
use crate::state::AppState;

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    // ログイン必須のルート
    let account_routes = Router::new()
        .route("/account", get(handlers::account))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        // パスワードリセット
        .route("/account/forgot", post(handlers::forgot))
        .route(
            "/account/reset/{token}",
            get(handlers::reset_form).post(handlers::update_password),
        )
        .merge(account_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode, header::COOKIE};
    use tower::ServiceExt;

    use crate::services::SessionGate;
    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_account_requires_login() {
        let app = TestApp::with_env(&[]);
        let router = create_router(app.state.clone());

        let response = router
            .oneshot(Request::get("/account").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_account_with_session() {
        let app = TestApp::with_env(&[]);
        let user = app.directory.insert_user("test@example.com", None);
        let session = app.session_gate.establish(&user).await.unwrap();
        let router = create_router(app.state.clone());

        let request = Request::get("/account")
            .header(COOKIE, format!("relock_session={}", session.cookie_value))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reset_form_rejects_unknown_token() {
        let app = TestApp::with_env(&[]);
        let router = create_router(app.state.clone());

        let response = router
            .oneshot(
                Request::get("/account/reset/not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forgot_json_body() {
        let app = TestApp::with_env(&[]);
        let router = create_router(app.state.clone());

        let request = Request::post("/account/forgot")
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::HOST, "localhost:3000")
            .body(Body::from(r#"{"email":"nobody@example.com"}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
