mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use common::*;
use equipment_lending::api::{AppState, Claims, create_router};
use equipment_lending::domain::{Actor, Equipment, LoanStatus, Stock};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "api-test-secret";

struct TestApp {
    router: Router,
    ctx: MockContext,
}

fn test_app(page_size: u32) -> TestApp {
    let ctx = mock_context();
    let state = Arc::new(AppState {
        service_deps: ctx.deps.clone(),
        jwt_secret: SECRET.to_string(),
        page_size,
    });

    TestApp {
        router: create_router(state),
        ctx,
    }
}

fn token_for(actor: &Actor) -> String {
    Claims::new(actor, Utc::now(), Duration::hours(1))
        .create_token(SECRET)
        .unwrap()
}

impl TestApp {
    async fn register(&self, code: &str, available: u32) -> Equipment {
        let item = equipment(code, available);
        self.ctx.store.add_equipment(item.clone()).await;
        item
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        actor: Option<&Actor>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(actor)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

/// 明日から3日間の申請本文
fn submit_body(item: &Equipment, quantity: u32) -> Value {
    let today = Utc::now().date_naive();
    json!({
        "start_date": (today + Duration::days(1)).to_string(),
        "planned_return_date": (today + Duration::days(3)).to_string(),
        "purpose": "Praktikum",
        "items": [{ "equipment_id": item.equipment_id.value(), "quantity": quantity }]
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app(10);

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_forbidden() {
    let app = test_app(10);
    let item = app.register("API-01", 2).await;

    let (status, body) = app
        .send("POST", "/peminjaman", None, Some(submit_body(&item, 1)))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
    assert_eq!(app.ctx.store.loan_count().await, 0);
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let app = test_app(10);
    let item = app.register("API-02", 2).await;

    let (status, _) = app
        .send("POST", "/peminjaman", Some(&staff()), Some(submit_body(&item, 1)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", "/peminjaman", Some(&borrower()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_forbidden() {
    let app = test_app(10);
    let token = Claims::new(&admin(), Utc::now(), Duration::hours(1))
        .create_token("another-secret")
        .unwrap();

    let request = Request::get("/peminjaman")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_submit_returns_created_loan() {
    let app = test_app(10);
    let item = app.register("API-03", 3).await;

    let (status, body) = app
        .send("POST", "/peminjaman", Some(&borrower()), Some(submit_body(&item, 2)))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "requested");
    assert_eq!(body["purpose"], "Praktikum");
    assert_eq!(body["lines"][0]["quantity"], 2);
    assert_eq!(body["lines"][0]["equipment"]["code"], "API-03");
    assert_eq!(
        app.ctx.store.equipment(item.equipment_id).await.unwrap().stock,
        Stock::new(3, 0)
    );
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let app = test_app(10);
    let item = app.register("API-04", 3).await;
    let borrower = borrower();

    let (status, body) = app
        .send("POST", "/peminjaman", Some(&borrower), Some(submit_body(&item, 0)))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, body) = app
        .send(
            "POST",
            "/peminjaman",
            Some(&borrower),
            Some(json!({ "start_date": "bukan-tanggal" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    assert_eq!(app.ctx.store.loan_count().await, 0);
}

#[tokio::test]
async fn test_submit_insufficient_stock_is_bad_request() {
    let app = test_app(10);
    let item = app.register("API-05", 1).await;

    let (status, body) = app
        .send("POST", "/peminjaman", Some(&borrower()), Some(submit_body(&item, 2)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INSUFFICIENT_STOCK");
    assert!(body["message"].as_str().unwrap().contains("Tersedia: 1"));
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let app = test_app(10);
    let item = app.register("API-06", 4).await;
    let borrower = borrower();
    let staff = staff();

    let (_, created) = app
        .send("POST", "/peminjaman", Some(&borrower), Some(submit_body(&item, 2)))
        .await;
    let loan_id = created["loan_id"].as_str().unwrap().to_string();

    let (status, approved) = app
        .send(
            "POST",
            &format!("/peminjaman/{}/setujui", loan_id),
            Some(&staff),
            Some(json!({ "condition_before": "Lengkap", "photo_before": "foto/awal.jpg" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "active");
    assert_eq!(
        app.ctx.store.equipment(item.equipment_id).await.unwrap().stock,
        Stock::new(2, 2)
    );

    let (status, again) = app
        .send(
            "POST",
            &format!("/peminjaman/{}/setujui", loan_id),
            Some(&staff),
            Some(json!({ "condition_before": "Lengkap", "photo_before": "foto/awal.jpg" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["error"], "INVALID_LOAN_STATE");

    let (status, pending) = app
        .send(
            "POST",
            &format!("/peminjaman/{}/ajukan_pengembalian", loan_id),
            Some(&borrower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["status"], "pending_return_confirmation");

    let (status, confirmed) = app
        .send(
            "POST",
            &format!("/peminjaman/{}/konfirmasi_pengembalian", loan_id),
            Some(&staff),
            Some(json!({ "final_condition": "good", "photo_after": "foto/akhir.jpg" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["late_days"], 0);
    assert_eq!(confirmed["message"], "Pengembalian dikonfirmasi");
    assert_eq!(confirmed["loan"]["status"], "returned");
    assert_eq!(
        app.ctx.store.equipment(item.equipment_id).await.unwrap().stock,
        Stock::new(4, 0)
    );

    let (status, mine) = app.send("GET", "/peminjaman/saya", Some(&borrower), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reject_over_http() {
    let app = test_app(10);
    let item = app.register("API-07", 2).await;

    let (_, created) = app
        .send("POST", "/peminjaman", Some(&borrower()), Some(submit_body(&item, 1)))
        .await;
    let loan_id = created["loan_id"].as_str().unwrap().to_string();

    let (status, rejected) = app
        .send(
            "POST",
            &format!("/peminjaman/{}/tolak", loan_id),
            Some(&staff()),
            Some(json!({ "reason": "Alat sedang dikalibrasi" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["rejection_reason"], "Alat sedang dikalibrasi");
}

#[tokio::test]
async fn test_request_return_of_other_borrower_is_bad_request() {
    let app = test_app(10);
    let item = app.register("API-08", 2).await;

    let (_, created) = app
        .send("POST", "/peminjaman", Some(&borrower()), Some(submit_body(&item, 1)))
        .await;
    let loan_id = created["loan_id"].as_str().unwrap().to_string();
    app.send(
        "POST",
        &format!("/peminjaman/{}/setujui", loan_id),
        Some(&staff()),
        Some(json!({ "condition_before": "Lengkap", "photo_before": "foto/awal.jpg" })),
    )
    .await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/peminjaman/{}/ajukan_pengembalian", loan_id),
            Some(&borrower()),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_LOAN_STATE");
}

#[tokio::test]
async fn test_delete_loan_over_http() {
    let app = test_app(10);
    let item = app.register("API-09", 2).await;
    let admin = admin();

    let (_, created) = app
        .send("POST", "/peminjaman", Some(&borrower()), Some(submit_body(&item, 1)))
        .await;
    let uri = format!("/peminjaman/{}", created["loan_id"].as_str().unwrap());

    let (status, body) = app.send("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Peminjaman berhasil dihapus");

    let (status, body) = app.send("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "LOAN_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_path_id_is_validation_error() {
    let app = test_app(10);

    let (status, body) = app
        .send("DELETE", "/peminjaman/bukan-uuid", Some(&admin()), None)
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_list_is_paginated_and_searchable() {
    let app = test_app(2);
    let item = app.register("API-10", 10).await;
    let borrower = borrower();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, created) = app
            .send("POST", "/peminjaman", Some(&borrower), Some(submit_body(&item, 1)))
            .await;
        ids.push(created["loan_id"].as_str().unwrap().to_string());
    }
    app.send(
        "POST",
        &format!("/peminjaman/{}/tolak", ids[0]),
        Some(&staff()),
        Some(json!({ "reason": "Penuh" })),
    )
    .await;

    let (status, page) = app.send("GET", "/peminjaman?page=2", Some(&admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["pagination"]["current_page"], 2);
    assert_eq!(page["pagination"]["last_page"], 2);
    assert_eq!(page["pagination"]["per_page"], 2);
    assert_eq!(page["pagination"]["total"], 3);

    let (_, filtered) = app
        .send("GET", "/peminjaman?search=reject", Some(&admin()), None)
        .await;
    let data = filtered["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["status"], LoanStatus::Rejected.as_str());
}

#[tokio::test]
async fn test_malformed_query_is_validation_error() {
    let app = test_app(10);

    let (status, body) = app
        .send("GET", "/peminjaman?page=abc", Some(&admin()), None)
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_unknown_equipment_message_is_localized() {
    let app = test_app(10);
    let missing = equipment("API-11", 1);

    let (status, body) = app
        .send("POST", "/peminjaman", Some(&borrower()), Some(submit_body(&missing, 1)))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(
        body["message"],
        format!("Alat {} tidak ditemukan", missing.equipment_id.value())
    );
}

#[tokio::test]
async fn test_empty_rejection_reason_names_field() {
    let app = test_app(10);
    let item = app.register("API-12", 1).await;

    let (_, created) = app
        .send("POST", "/peminjaman", Some(&borrower()), Some(submit_body(&item, 1)))
        .await;
    let (status, body) = app
        .send(
            "POST",
            &format!("/peminjaman/{}/tolak", created["loan_id"].as_str().unwrap()),
            Some(&staff()),
            Some(json!({ "reason": " " })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Alasan penolakan wajib diisi");
}
