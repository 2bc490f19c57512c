//! Router tests on the in-memory backend
//!
//! Drive the complete middleware stack: JWT, tenant resolution, access
//! validation, module checks and the error mapping.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{bearer_for, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_health_reports_master_and_connections() {
    let mut app = TestApp::new().await;
    let response = app.get("/health", &[]).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["database"], "connected");
    assert_eq!(response.body["connections"]["pools_created"], 0);
    assert_eq!(
        response.headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn test_register_normalizes_code_and_rejects_duplicates() {
    let mut app = TestApp::new().await;
    let response = app
        .post(
            "/api/tenants/register",
            &[],
            json!({ "code": "acme", "name": "Acme Corp" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["code"], "ACME");
    assert_eq!(response.body["status"], "pending");

    let response = app
        .post(
            "/api/tenants/register",
            &[],
            json!({ "code": "ACME", "name": "Acme Again" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "duplicate_tenant_code");
}

#[tokio::test]
async fn test_register_validation_errors() {
    let mut app = TestApp::new().await;
    let response = app
        .post(
            "/api/tenants/register",
            &[],
            json!({ "code": "TEST001", "name": "", "contact_email": "nope" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "validation_error");
    let fields: Vec<&str> = response.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["contact_email", "name"]);
}

#[tokio::test]
async fn test_activation_requires_database_info() {
    let mut app = TestApp::new().await;
    app.post(
        "/api/tenants/register",
        &[],
        json!({ "code": "TEST001", "name": "Test Tenant" }),
    )
    .await;

    let response = app
        .send(Method::POST, "/api/tenants/TEST001/activate", &[], None)
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "database_info_required");

    let response = app
        .post(
            "/api/tenants/TEST001/database",
            &[],
            json!({
                "database_name": "erp_test001",
                "server": "db.internal",
                "username": "erp",
                "password": "s3cret"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["database"]["port"], 5432);
    assert!(!response.body.to_string().contains("s3cret"));

    let response = app
        .post(
            "/api/tenants/TEST001/activate",
            &[],
            json!({ "actor": "ops@erp.test" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "active");
    assert_eq!(response.body["status_changed_by"], "ops@erp.test");
}

#[tokio::test]
async fn test_unknown_tenant_is_not_found() {
    let mut app = TestApp::new().await;
    let response = app.get("/api/tenants/NOPE", &[]).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "tenant_not_found");
}

#[tokio::test]
async fn test_list_tenants_filters_and_pages() {
    let mut app = TestApp::new().await;
    app.active_tenant("ALPHA", &[]).await;
    for code in ["BETA", "GAMMA"] {
        app.post(
            "/api/tenants/register",
            &[],
            json!({ "code": code, "name": format!("{code} Corp") }),
        )
        .await;
    }

    let response = app.get("/api/tenants?status=pending&page_size=1", &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_count"], 2);
    assert_eq!(response.body["total_pages"], 2);
    assert_eq!(response.body["items"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["has_next"], true);

    let response = app.get("/api/tenants?status=active", &[]).await;
    assert_eq!(response.body["total_count"], 1);
    assert_eq!(response.body["items"][0]["code"], "ALPHA");

    let response = app.get("/api/tenants?status=sleeping", &[]).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_modules_catalog() {
    let mut app = TestApp::new().await;
    let response = app.get("/api/modules", &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_subscribing_unknown_module_is_not_found() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &["INVENTORY"]).await;

    let response = app
        .post(
            "/api/tenants/ACME/subscriptions",
            &[],
            json!({ "module_code": "PAYROLL" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .post(
            "/api/tenants/ACME/subscriptions",
            &[],
            json!({ "module_code": "inventory" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "already_subscribed");
}

#[tokio::test]
async fn test_add_user_is_idempotent() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &[]).await;

    let body = json!({ "email": "Jane@Acme.test", "display_name": "Jane" });
    let first = app.post("/api/tenants/ACME/users", &[], body.clone()).await;
    let second = app.post("/api/tenants/ACME/users", &[], body).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["email"], "jane@acme.test");
    assert_eq!(first.body["id"], second.body["id"]);

    let detail = app.get("/api/tenants/ACME", &[]).await;
    assert_eq!(detail.body["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tenant_scoped_route_requires_identification() {
    let mut app = TestApp::new().await;
    let response = app.get("/api/products", &[]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "tenant_identification_required");
    assert!(response.body["details"].is_string());
}

#[tokio::test]
async fn test_unknown_tenant_header_is_rejected() {
    let mut app = TestApp::new().await;
    let response = app.get("/api/products", &[("x-tenant-id", "GHOST")]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "tenant_not_found");
}

#[tokio::test]
async fn test_module_subscription_is_required() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &["CRM"]).await;

    let response = app.get("/api/products", &[("x-tenant-id", "ACME")]).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "module_not_subscribed");

    let response = app.get("/api/customers", &[("x-tenant-id", "ACME")]).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_products_flow_through_header() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &["INVENTORY"]).await;
    let tenant = [("x-tenant-id", "acme")];

    for (sku, price) in [("SKU-3", "30.00"), ("SKU-1", "10.00"), ("SKU-2", "20.00")] {
        let response = app
            .post(
                "/api/products",
                &tenant,
                json!({ "sku": sku, "name": format!("Product {sku}"), "unit_price": price }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    }

    let response = app
        .post(
            "/api/products",
            &tenant,
            json!({ "sku": "SKU-1", "name": "Duplicate", "unit_price": "1.00" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .get("/api/products?min_price=15&max_price=30", &tenant)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let skus: Vec<&str> = response.body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["sku"].as_str().unwrap())
        .collect();
    assert_eq!(skus, ["SKU-2", "SKU-3"]);
    assert_eq!(response.headers.get("x-tenant-identifier").unwrap(), "acme");
    assert_eq!(
        response.headers.get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=300"
    );

    let response = app
        .get("/api/products?min_price=50&max_price=10", &tenant)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_route_and_query_identifiers() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &["INVENTORY"]).await;

    let response = app.get("/api/t/ACME/products", &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get("x-tenant-identifier").unwrap(), "ACME");

    let response = app.get("/api/products?tenant=ACME", &[]).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .get("/api/products", &[(header::HOST.as_str(), "acme.erp.example")])
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_customers_are_isolated_per_tenant() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &["CRM"]).await;
    app.active_tenant("GLOBEX", &["CRM"]).await;

    for code in ["C-2", "C-1"] {
        let response = app
            .post(
                "/api/customers",
                &[("x-tenant-id", "ACME")],
                json!({ "code": code, "name": "Customer", "credit_limit": "100" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    }

    let acme = app.get("/api/customers", &[("x-tenant-id", "ACME")]).await;
    assert_eq!(acme.body["total_count"], 2);
    assert_eq!(acme.body["items"][0]["code"], "C-1");

    let globex = app.get("/api/customers", &[("x-tenant-id", "GLOBEX")]).await;
    assert_eq!(globex.body["total_count"], 0);

    let exceeded = app
        .get(
            "/api/customers?credit_exceeded=true",
            &[("x-tenant-id", "ACME")],
        )
        .await;
    assert_eq!(exceeded.status, StatusCode::OK);
    assert_eq!(exceeded.body["total_count"], 0);
}

#[tokio::test]
async fn test_suspended_tenant_is_forbidden() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &["INVENTORY"]).await;
    let tenant = [("x-tenant-id", "ACME")];
    assert_eq!(app.get("/api/products", &tenant).await.status, StatusCode::OK);

    let response = app
        .post(
            "/api/tenants/ACME/suspend",
            &[],
            json!({ "reason": "Unpaid invoices" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "suspended");

    let response = app.get("/api/products", &tenant).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "tenant_inactive");
}

#[tokio::test]
async fn test_token_for_other_tenant_is_rejected() {
    let mut app = TestApp::new().await;
    let acme = app.active_tenant("ACME", &["INVENTORY"]).await;
    let acme_id: Uuid = acme["id"].as_str().unwrap().parse().unwrap();
    app.active_tenant("GLOBEX", &["INVENTORY"]).await;

    let token = bearer_for(acme_id, "ACME");
    let response = app
        .get(
            "/api/products",
            &[("authorization", token.as_str()), ("x-tenant-id", "GLOBEX")],
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "tenant_mismatch");

    let response = app
        .get(
            "/api/products",
            &[("authorization", token.as_str()), ("x-tenant-id", "ACME")],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let mut app = TestApp::new().await;
    let response = app
        .get("/health", &[("authorization", "Bearer not-a-jwt")])
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "unauthenticated");
    assert!(response.body["message"].is_string());

    let response = app
        .get("/api/products", &[("authorization", "Basic abc"), ("x-tenant-id", "ACME")])
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "invalid_credentials");
}

#[tokio::test]
async fn test_terminated_tenant_cannot_be_reactivated() {
    let mut app = TestApp::new().await;
    app.active_tenant("ACME", &[]).await;

    let response = app
        .post(
            "/api/tenants/ACME/terminate",
            &[],
            json!({ "reason": "Contract ended", "actor": "ops" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "terminated");

    let response = app
        .send(Method::POST, "/api/tenants/ACME/activate", &[], None)
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "invalid_status_transition");
}

#[tokio::test]
async fn test_custom_domain_host_is_not_a_tenant_signal() {
    let mut app = TestApp::new().await;
    app.register_active(
        json!({ "code": "ACME", "name": "Acme Corp", "domain": "acme-corp.com" }),
        &["INVENTORY"],
    )
    .await;

    let response = app
        .get("/api/products", &[(header::HOST.as_str(), "acme-corp.com")])
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "tenant_identification_required");
    assert!(response.headers.get("x-tenant-identifier").is_none());
}

#[tokio::test]
async fn test_excluded_path_skips_resolution() {
    let mut app = TestApp::with_config(|config| {
        config.tenancy.excluded_paths = vec!["/api/customers".to_string()];
    })
    .await;
    let acme = app.active_tenant("ACME", &["CRM"]).await;
    let acme_id: Uuid = acme["id"].as_str().unwrap().parse().unwrap();

    // No resolution error from the layer; the handler finds no tenant either
    let response = app.get("/api/customers", &[]).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "tenant_identification_required");
    assert!(response.body["message"].is_string());
    assert!(response.body.get("details").is_none());

    let token = bearer_for(acme_id, "ACME");
    let response = app
        .get("/api/customers", &[("authorization", token.as_str())])
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert!(response.headers.get("x-tenant-identifier").is_none());
    assert!(response.headers.get(header::CACHE_CONTROL).is_none());

    let response = app.get("/api/products", &[]).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["details"].is_string());
}

#[tokio::test]
async fn test_configured_tenant_header() {
    let mut app = TestApp::with_config(|config| {
        config.tenancy.header_name = "X-Org".to_string();
    })
    .await;
    app.active_tenant("ACME", &["INVENTORY"]).await;

    let response = app.get("/api/products", &[("x-org", "ACME")]).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.headers.get("x-tenant-identifier").unwrap(), "ACME");

    let response = app.get("/api/products", &[("x-tenant-id", "ACME")]).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "tenant_identification_required");
}
