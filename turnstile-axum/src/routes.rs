use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use turnstile::{
    AuthOutcome, ClientId, CounterStore, Credentials, Error, IpLockFilter, LimitKind, Page,
    RepositoryProvider, SessionProbe, TokenExchangeError, Turnstile, UserDirectory,
};

use crate::{
    error::{ApiError, Result, STALE_SESSION_LOGOUT_MESSAGE, exchange_failure_message},
    types::*,
};

/// Shared state handed to every handler.
pub struct AppState<R, D, P, C>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    pub turnstile: Arc<Turnstile<R, D, P, C>>,
}

impl<R, D, P, C> Clone for AppState<R, D, P, C>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    fn clone(&self) -> Self {
        Self {
            turnstile: self.turnstile.clone(),
        }
    }
}

/// Build the router: health, login, the token exchange, and the
/// operator lock endpoints behind a bearer token.
pub fn create_router<R, D, P, C>(
    turnstile: Arc<Turnstile<R, D, P, C>>,
    cookie_config: CookieConfig,
    admin_config: AdminAuthConfig,
) -> Router
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    let state = AppState { turnstile };

    let admin_routes = Router::new()
        .route("/admin/ip_locks", get(list_ip_locks_handler::<R, D, P, C>))
        .route(
            "/admin/ip_locks/{ip}",
            delete(reset_ip_lock_handler::<R, D, P, C>),
        )
        .route(
            "/admin/account_locks",
            get(list_account_locks_handler::<R, D, P, C>),
        )
        .route(
            "/admin/account_locks/{user_id}",
            delete(clear_account_lock_handler::<R, D, P, C>),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            admin_config,
            require_admin,
        ));

    Router::new()
        .route("/health", get(health_handler::<R, D, P, C>))
        .route("/login", post(login_handler::<R, D, P, C>))
        .route("/access_token", post(access_token_handler::<R, D, P, C>))
        .merge(admin_routes)
        .with_state(state)
        .layer(axum::Extension(cookie_config))
}

async fn require_admin(
    State(config): State<AdminAuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == config.token);

    if !authorized {
        return ApiError::Unauthorized.into_response();
    }

    next.run(request).await
}

async fn health_handler<R, D, P, C>(State(state): State<AppState<R, D, P, C>>) -> Result<Response>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    state
        .turnstile
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
    .into_response())
}

async fn login_handler<R, D, P, C>(
    State(state): State<AppState<R, D, P, C>>,
    connection_info: ConnectionInfo,
    Json(payload): Json<LoginRequest>,
) -> Result<Response>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    let client = ClientId::from_parts(
        connection_info.ip.as_deref().unwrap_or(""),
        Some(payload.username.as_str()),
    );
    let credentials = Credentials::new(payload.username.as_str(), payload.password.as_str());

    let outcome = state
        .turnstile
        .authenticate(&credentials, &client)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match outcome {
        AuthOutcome::Authenticated(user) => Ok(Json(LoginResponse { user }).into_response()),
        AuthOutcome::Failure => Err(ApiError::InvalidCredentials),
        AuthOutcome::RateLimited(LimitKind::IpWindow) => Err(ApiError::IpRateLimited),
        AuthOutcome::RateLimited(LimitKind::AccountCooldown) => Err(ApiError::AccountLocked),
    }
}

async fn access_token_handler<R, D, P, C>(
    State(state): State<AppState<R, D, P, C>>,
    axum::Extension(cookie_config): axum::Extension<CookieConfig>,
    jar: CookieJar,
    axum::Form(payload): axum::Form<AccessTokenRequest>,
) -> Response
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    let Some(request_token) = payload.request_access_token else {
        tracing::info!("Access token request missing request_access_token field");
        return bad_request(exchange_failure_message(&TokenExchangeError::MissingInput));
    };

    match state.turnstile.exchange(&request_token).await {
        Ok(token) => (StatusCode::OK, Json(AccessTokenResponse { token })).into_response(),

        Err(Error::Token(TokenExchangeError::StaleSession)) => {
            // If the caller holds a live session of their own, the stale
            // token logs them out as a side effect.
            let session_cookie = jar.get(&cookie_config.name).map(|c| c.value().to_string());
            let authenticated = match &session_cookie {
                Some(key) => state.turnstile.session_exists(key).await,
                None => false,
            };

            if authenticated {
                let jar = jar.remove(Cookie::from(cookie_config.name.clone()));
                (
                    StatusCode::BAD_REQUEST,
                    jar,
                    Json(MessageResponse {
                        message: STALE_SESSION_LOGOUT_MESSAGE.to_string(),
                    }),
                )
                    .into_response()
            } else {
                bad_request(exchange_failure_message(&TokenExchangeError::StaleSession))
            }
        }

        Err(Error::Token(e)) => bad_request(exchange_failure_message(&e)),

        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

async fn list_ip_locks_handler<R, D, P, C>(
    State(state): State<AppState<R, D, P, C>>,
    Query(query): Query<IpLockListQuery>,
) -> Result<Response>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    let filter = IpLockFilter {
        ip_address: query.ip,
        latest_username: query.username,
    };
    let mut page = Page::default();
    if let Some(limit) = query.limit {
        page.limit = limit;
    }
    if let Some(offset) = query.offset {
        page.offset = offset;
    }

    let window = state.turnstile.rate_limit_config().window;
    let records = state
        .turnstile
        .list_ip_locks(&filter, page)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let summaries: Vec<IpLockSummary> = records
        .into_iter()
        .map(|record| IpLockSummary::from_record(record, window))
        .collect();

    Ok(Json(summaries).into_response())
}

async fn reset_ip_lock_handler<R, D, P, C>(
    State(state): State<AppState<R, D, P, C>>,
    Path(ip): Path<String>,
) -> Result<Response>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    state
        .turnstile
        .reset_ip_lock(&ip)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("Reset rate limit for {ip}"),
    })
    .into_response())
}

async fn list_account_locks_handler<R, D, P, C>(
    State(state): State<AppState<R, D, P, C>>,
    Query(query): Query<AccountLockListQuery>,
) -> Result<Response>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    let mut page = Page::default();
    if let Some(limit) = query.limit {
        page.limit = limit;
    }
    if let Some(offset) = query.offset {
        page.offset = offset;
    }

    let records = state
        .turnstile
        .list_account_locks(page)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let summaries: Vec<AccountLockSummary> =
        records.into_iter().map(AccountLockSummary::from).collect();

    Ok(Json(summaries).into_response())
}

async fn clear_account_lock_handler<R, D, P, C>(
    State(state): State<AppState<R, D, P, C>>,
    Path(user_id): Path<String>,
) -> Result<Response>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    state
        .turnstile
        .clear_account_lock(&user_id.as_str().into())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("Cleared account lock for {user_id}"),
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request as HttpRequest;
    use chrono::{Duration, Utc};
    use sqlx::SqlitePool;
    use tower::ServiceExt;
    use turnstile::{
        AccountLockConfig, RateLimitConfig, TokenConfig, User,
        token::{self, TYPE_ACCESS, TokenClaims},
    };
    use turnstile_storage_sqlite::{SqliteRepositoryProvider, SqliteSessionProbe};

    const ADMIN_TOKEN: &str = "operator-secret";

    struct TestDirectory;

    #[async_trait]
    impl UserDirectory for TestDirectory {
        async fn find_by_username(&self, username: &str) -> Result2<Option<User>> {
            if username == "bob" {
                Ok(Some(User {
                    id: "usr_bob".into(),
                    username: "bob".to_string(),
                    email: "bob@example.com".to_string(),
                }))
            } else {
                Ok(None)
            }
        }

        async fn verify_password(&self, _user: &User, password: &str) -> Result2<bool> {
            Ok(password == "correct horse")
        }
    }

    type Result2<T> = std::result::Result<T, Error>;
    type TestTurnstile =
        Turnstile<SqliteRepositoryProvider, TestDirectory, SqliteSessionProbe>;

    async fn setup(max_requests: u64) -> (SqlitePool, Arc<TestTurnstile>, Router) {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        let turnstile = Arc::new(
            Turnstile::new(
                Arc::new(SqliteRepositoryProvider::new(pool.clone())),
                Arc::new(TestDirectory),
                Arc::new(SqliteSessionProbe::new(pool.clone())),
                TokenConfig::new(b"router-test-secret".to_vec())
                    .with_access_ttl(Duration::minutes(5)),
            )
            .with_rate_limit_config(RateLimitConfig {
                window: Duration::minutes(1),
                max_requests,
                ..RateLimitConfig::default()
            })
            .with_account_lock_config(AccountLockConfig::disabled()),
        );
        turnstile.migrate().await.expect("Failed to migrate");

        let router = create_router(
            Arc::clone(&turnstile),
            CookieConfig::default(),
            AdminAuthConfig::new(ADMIN_TOKEN),
        );

        (pool, turnstile, router)
    }

    async fn create_session(pool: &SqlitePool, key: &str) {
        let expires = (Utc::now() + Duration::hours(1)).timestamp();
        sqlx::query("INSERT INTO sessions (session_key, expires_at) VALUES (?1, ?2)")
            .bind(key)
            .bind(expires)
            .execute(pool)
            .await
            .expect("Failed to create session");
    }

    fn access_token_request(token: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/access_token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("request_access_token={token}")))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_access_token_happy_path() {
        let (pool, turnstile, router) = setup(100).await;
        create_session(&pool, "sess-A").await;

        let user = User {
            id: "usr_alice".into(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        let refresh = turnstile.issue_refresh(&user, "sess-A").unwrap();
        let request = turnstile.seal_request(&refresh).unwrap();

        let response = router.oneshot(access_token_request(&request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let claims: TokenClaims =
            token::verify(body["token"].as_str().unwrap(), turnstile.token_config()).unwrap();
        assert_eq!(claims.token_type, TYPE_ACCESS);
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn test_stale_session_message_without_caller_session() {
        let (_pool, turnstile, router) = setup(100).await;

        let user = User {
            id: "usr_alice".into(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        let refresh = turnstile.issue_refresh(&user, "sess-gone").unwrap();
        let request = turnstile.seal_request(&refresh).unwrap();

        let response = router.oneshot(access_token_request(&request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Old Refresh-token used");
    }

    #[tokio::test]
    async fn test_stale_session_logs_out_authenticated_caller() {
        let (pool, turnstile, router) = setup(100).await;
        // The caller's own session is live; the token's session is gone.
        create_session(&pool, "sess-live").await;

        let user = User {
            id: "usr_alice".into(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        let refresh = turnstile.issue_refresh(&user, "sess-gone").unwrap();
        let sealed = turnstile.seal_request(&refresh).unwrap();

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/access_token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, "session_id=sess-live")
            .body(Body::from(format!("request_access_token={sealed}")))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The session cookie is cleared in the response.
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(set_cookie.starts_with("session_id="));

        let body = body_json(response).await;
        assert_eq!(body["message"], "Logging out because of an old Refresh-token");
    }

    #[tokio::test]
    async fn test_expired_refresh_message() {
        let (pool, turnstile, router) = setup(100).await;
        create_session(&pool, "sess-A").await;

        let user = User {
            id: "usr_alice".into(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        let issued = Utc::now() - Duration::seconds(30);
        let claims = TokenClaims::refresh(&user, "sess-A", issued, Duration::seconds(10));
        let refresh = token::sign(&claims, turnstile.token_config()).unwrap();
        let sealed = turnstile.seal_request(&refresh).unwrap();

        let response = router.oneshot(access_token_request(&sealed)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Expired Refresh-token used");
    }

    #[tokio::test]
    async fn test_missing_token_field() {
        let (_pool, _turnstile, router) = setup(100).await;

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/access_token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid request");
    }

    #[tokio::test]
    async fn test_login_messages() {
        let (_pool, _turnstile, router) = setup(2).await;

        let login = |password: &str| {
            HttpRequest::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(
                    r#"{{"username": "bob", "password": "{password}"}}"#
                )))
                .unwrap()
        };

        // Two credential failures, then the window trips.
        for _ in 0..2 {
            let response = router.clone().oneshot(login("wrong")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = body_json(response).await;
            assert_eq!(body["message"], "Email or password is incorrect.");
        }

        let response = router.clone().oneshot(login("wrong")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(
            body["message"],
            "Too many failed login attempts. Try again later."
        );
    }

    #[tokio::test]
    async fn test_successful_login_returns_user() {
        let (_pool, _turnstile, router) = setup(100).await;

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"username": "bob", "password": "correct horse"}"#,
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["user"]["username"], "bob");
    }

    #[tokio::test]
    async fn test_admin_endpoints_require_bearer_token() {
        let (_pool, _turnstile, router) = setup(100).await;

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/admin/ip_locks")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/admin/ip_locks")
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_reset_lifts_the_limit() {
        let (_pool, _turnstile, router) = setup(1).await;

        let login = || {
            HttpRequest::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"username": "bob", "password": "wrong"}"#))
                .unwrap()
        };

        router.clone().oneshot(login()).await.unwrap();
        let response = router.clone().oneshot(login()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Without ConnectInfo the handler sees the unparseable sentinel.
        let request = HttpRequest::builder()
            .method("DELETE")
            .uri("/admin/ip_locks/unparseable")
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router.clone().oneshot(login()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // The listing shows the audit row is gone too.
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/admin/ip_locks")
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 0);
    }
}
