//! Shared infrastructure for router tests
//!
//! Builds the full router on the in-memory backend with the `INVENTORY`
//! and `CRM` modules seeded, and offers JSON request helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use erp_api::app::{build_router, AppState};
use erp_api::config::{Config, JwtConfig};
use erp_shared::auth::jwt::{create_token, Claims};
use erp_shared::data::{DataBackend, MemoryBackend, Repository};
use erp_shared::db::pool::DatabaseConfig;
use erp_shared::models::Module;
use serde_json::{json, Value};
use tower::Service as _;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

pub struct TestApp {
    pub app: Router,
    pub backend: MemoryBackend,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Test app with adjusted configuration
    pub async fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let backend = MemoryBackend::new();
        let modules = [("INVENTORY", "Inventory"), ("CRM", "Customer Relations")]
            .iter()
            .map(|(code, name)| Module::new(code, name, None).unwrap())
            .collect::<Vec<_>>();
        backend.master().modules().add_range(&modules).await.unwrap();

        let mut config = Config {
            master_database: DatabaseConfig {
                url: "postgresql://localhost/unused".to_string(),
                ..Default::default()
            },
            jwt: JwtConfig {
                secret: JWT_SECRET.to_string(),
            },
            ..Default::default()
        };
        config.retry.max_retries = 0;
        configure(&mut config);
        config.validate().unwrap();

        let state = AppState::new(backend.clone(), config).unwrap();
        Self {
            app: build_router(state),
            backend,
        }
    }

    pub async fn send(
        &mut self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.call(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&mut self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.send(Method::GET, uri, headers, None).await
    }

    pub async fn post(&mut self, uri: &str, headers: &[(&str, &str)], body: Value) -> TestResponse {
        self.send(Method::POST, uri, headers, Some(body)).await
    }

    /// Registers, configures and activates a tenant, then subscribes it to
    /// the given modules
    pub async fn active_tenant(&mut self, code: &str, modules: &[&str]) -> Value {
        self.register_active(json!({ "code": code, "name": format!("{code} Corp") }), modules)
            .await
    }

    /// Like [`active_tenant`](Self::active_tenant) with a full registration body
    pub async fn register_active(&mut self, registration: Value, modules: &[&str]) -> Value {
        let code = registration["code"].as_str().unwrap().to_string();
        let response = self.post("/api/tenants/register", &[], registration).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        let response = self
            .post(
                &format!("/api/tenants/{code}/database"),
                &[],
                json!({
                    "database_name": format!("erp_{}", code.to_ascii_lowercase()),
                    "server": "localhost",
                    "username": "erp",
                    "password": "s3cret"
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        let response = self
            .send(Method::POST, &format!("/api/tenants/{code}/activate"), &[], None)
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        for module in modules {
            let response = self
                .post(
                    &format!("/api/tenants/{code}/subscriptions"),
                    &[],
                    json!({ "module_code": module }),
                )
                .await;
            assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        }

        self.get(&format!("/api/tenants/{code}"), &[]).await.body
    }
}

/// Bearer token for a user bound to a tenant
pub fn bearer_for(tenant_id: Uuid, tenant_code: &str) -> String {
    let claims = Claims::new(Uuid::new_v4()).for_tenant(tenant_id, tenant_code);
    format!("Bearer {}", create_token(&claims, JWT_SECRET).unwrap())
}
