//! Cookie-tracking client that drives the full router with `oneshot`.

#![allow(dead_code)]

use std::collections::HashMap;

use accountgate::{config::SessionConfig, routes, test_utils::test_helpers, AppState};
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use sqlx::SqlitePool;
use tower::ServiceExt;
use tower_sessions_sqlx_store::SqliteStore;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn assert_redirect(&self, to: &str) {
        assert!(
            self.status.is_redirection(),
            "expected redirect to {}, got {}",
            to,
            self.status
        );
        assert_eq!(self.location(), Some(to));
    }

    pub fn csrf_token(&self) -> String {
        let marker = r#"name="csrf_token" value=""#;
        let start = self
            .body
            .find(marker)
            .expect("page should contain a csrf field")
            + marker.len();
        let end = self.body[start..]
            .find('"')
            .expect("csrf value should be quoted");
        self.body[start..start + end].to_string()
    }
}

pub struct TestClient {
    app: Router,
    cookies: HashMap<String, String>,
}

impl TestClient {
    pub async fn new(state: AppState, pool: SqlitePool) -> Self {
        let session_store = SqliteStore::new(pool)
            .with_table_name("sessions")
            .expect("valid session table name");
        session_store
            .migrate()
            .await
            .expect("session table migration to succeed");

        let session_layer =
            SessionConfig::from_app_config(&test_helpers::test_config()).create_layer(session_store);

        Self {
            app: routes::build_router(state).layer(session_layer),
            cookies: HashMap::new(),
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header(header::COOKIE, self.cookie_header())
            .body(Body::empty())
            .expect("request to build");
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = serde_urlencoded::to_string(fields).expect("form to encode");
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, self.cookie_header())
            .body(Body::from(body))
            .expect("request to build");
        self.send(request).await
    }

    /// Loads `page` for a fresh CSRF token, then submits `fields` to `action`.
    pub async fn submit(
        &mut self,
        page: &str,
        action: &str,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let token = self.get(page).await.csrf_token();
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post_form(action, &fields).await
    }

    pub async fn register(&mut self, email: &str, password: &str) -> TestResponse {
        self.submit(
            "/register",
            "/register",
            &[("email", email), ("password", password)],
        )
        .await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.submit(
            "/login",
            "/login",
            &[("email", email), ("password", password)],
        )
        .await
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router to respond");

        for value in response.headers().get_all(header::SET_COOKIE) {
            let raw = value.to_str().expect("cookie header to be ASCII");
            let cookie = tower_sessions::cookie::Cookie::parse(raw).expect("cookie to parse");
            let removed = cookie.value().is_empty()
                || cookie.max_age().is_some_and(|age| age.is_zero());
            if removed {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body to be readable");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
