//! Testes ponta a ponta das rotas de onboarding, passando pelo router
//! com a store de registros em memória.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use onboarding_backend::{
    build_router,
    common::error::AppError,
    config::RecordStoreKind,
    db::{MemoryRecordStore, OnboardingRecordStore, ProvisionRequest},
    models::{
        auth::Claims,
        onboarding::OnboardingStatus,
        store::{BackendRecord, IdentityAttributes},
    },
    services::state_store::SourceTimeouts,
    AppConfig, AppState,
};

const SECRET: &str = "test-secret";

fn config() -> AppConfig {
    AppConfig {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        record_store: RecordStoreKind::Memory,
        timeouts: SourceTimeouts::default(),
    }
}

fn app(records: Arc<dyn OnboardingRecordStore>) -> Router {
    build_router(AppState::with_records(config(), None, records))
}

fn token(user_id: Uuid, plan: Option<&str>, attributes: IdentityAttributes) -> String {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        exp: now + 3600,
        iat: now,
        email: Some("owner@example.com".to_string()),
        plan: plan.map(str::to_string),
        attributes,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_ref())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn business_info_done() -> BackendRecord {
    BackendRecord {
        business_name: Some("Acme Bakery".into()),
        business_type: Some("food".into()),
        country: Some("BR".into()),
        legal_structure: Some("llc".into()),
        ..Default::default()
    }
}

fn subscription_done(plan: &str, status: &str) -> BackendRecord {
    BackendRecord {
        status: Some(status.into()),
        selected_plan: Some(plan.into()),
        billing_cycle: Some("monthly".into()),
        ..business_info_done()
    }
}

#[tokio::test]
async fn unified_profile_requires_credential() {
    let app = app(Arc::new(MemoryRecordStore::new()));

    let request = Request::builder()
        .uri("/api/onboarding/unified-profile")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token de autenticação inválido ou ausente.");

    let (status, _) = send(&app, get("/api/onboarding/unified-profile", "not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn new_user_needs_onboarding() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let token = token(Uuid::new_v4(), None, IdentityAttributes::default());

    let (status, body) = send(&app, get("/api/onboarding/unified-profile", &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["needsOnboarding"], true);
    assert_eq!(body["onboardingCompleted"], false);
    assert_eq!(body["onboardingStatus"], "NOT_STARTED");
    assert_eq!(body["currentStep"], "business-info");
    assert_eq!(body["nextStep"], "subscription");
    assert_eq!(body["businessRule"], "NO_TENANT_INCOMPLETE");
    assert_eq!(body["tenantId"], Value::Null);
    assert_eq!(body["backendSources"].as_array().unwrap().len(), 3);
    assert_eq!(body["backendSources"][2]["available"], false);
}

#[tokio::test]
async fn tenant_binding_overrides_stale_flag() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    store
        .seed(
            user,
            BackendRecord {
                tenant_id: Some(tenant),
                status: Some("business_info".into()),
                ..business_info_done()
            },
        )
        .await;
    let app = app(Arc::new(store));

    let (status, body) = send(
        &app,
        get("/api/onboarding/unified-profile", &token(user, None, Default::default())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["onboardingCompleted"], true);
    assert_eq!(body["needsOnboarding"], false);
    assert_eq!(body["businessRule"], "HAS_TENANT_COMPLETE");
    assert_eq!(body["tenantId"], tenant.to_string());
    assert_eq!(body["businessName"], "Acme Bakery");
}

#[tokio::test]
async fn cookie_credential_is_accepted() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let token = token(Uuid::new_v4(), None, Default::default());

    let request = Request::builder()
        .uri("/api/onboarding/unified-profile")
        .header(header::COOKIE, format!("theme=dark; access_token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "owner@example.com");
}

#[tokio::test]
async fn identity_attributes_outrank_client_cache() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let attributes = IdentityAttributes {
        onboarding: Some("SETUP".into()),
        ..Default::default()
    };
    let token = token(Uuid::new_v4(), Some("basic"), attributes);

    let request = Request::builder()
        .uri("/api/onboarding/unified-profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header("x-onboarding-snapshot", r#"{"onboardingStatus":"completed"}"#)
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&app, request).await;

    assert_eq!(body["onboardingStatus"], "SETUP");
    assert_eq!(body["currentStep"], "setup");
    assert_eq!(body["onboardingCompleted"], false);
    assert_eq!(body["businessRule"], "FLAG_DERIVED");
    assert_eq!(body["subscriptionPlan"], "basic");
}

#[tokio::test]
async fn malformed_snapshot_degrades_gracefully() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let token = token(Uuid::new_v4(), None, Default::default());

    let request = Request::builder()
        .uri("/api/onboarding/unified-profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header("x-onboarding-snapshot", "{not json")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backendSources"][2]["available"], false);
    assert!(body["backendSources"][2]["reason"].as_str().unwrap().contains("malformados"));
}

#[tokio::test]
async fn verify_state_requires_step() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let token = token(Uuid::new_v4(), None, Default::default());

    let (status, _) = send(&app, get("/api/onboarding/verify-state", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/api/onboarding/verify-state?step=", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_state_allows_universal_entry() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let token = token(Uuid::new_v4(), None, Default::default());

    let (status, body) =
        send(&app, get("/api/onboarding/verify-state?step=business-info", &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], true);
    assert_eq!(body["userData"]["currentStep"], "business-info");
}

#[tokio::test]
async fn verify_state_redirects_skips() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let token = token(Uuid::new_v4(), None, Default::default());

    let (status, body) = send(&app, get("/api/onboarding/verify-state?step=setup", &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], false);
    assert_eq!(body["redirectUrl"], "/onboarding/business-info");
    assert_eq!(body["paymentSatisfied"], false);
}

#[tokio::test]
async fn free_plan_payment_redirects_to_setup() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store.seed(user, subscription_done("free", "subscription")).await;
    let app = app(Arc::new(store));
    let token = token(user, None, Default::default());

    let (_, body) = send(&app, get("/api/onboarding/verify-state?step=payment", &token)).await;
    assert_eq!(body["isValid"], false);
    assert_eq!(body["redirectUrl"], "/onboarding/setup");
    assert_eq!(body["paymentSatisfied"], true);

    let (_, body) = send(&app, get("/api/onboarding/verify-state?step=setup", &token)).await;
    assert_eq!(body["isValid"], true);
}

#[tokio::test]
async fn paid_plan_goes_through_payment() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store.seed(user, subscription_done("professional", "subscription")).await;
    let app = app(Arc::new(store));
    let token = token(user, None, Default::default());

    let (_, body) = send(&app, get("/api/onboarding/verify-state?step=payment", &token)).await;
    assert_eq!(body["isValid"], true);

    let (_, body) = send(&app, get("/api/onboarding/verify-state?step=setup", &token)).await;
    assert_eq!(body["isValid"], false);
    assert_eq!(body["redirectUrl"], "/onboarding/subscription");
}

#[tokio::test]
async fn advance_moves_forward_only() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store
        .seed(user, BackendRecord { status: Some("business_info".into()), ..business_info_done() })
        .await;
    let app = app(Arc::new(store));
    let token = token(user, None, Default::default());

    let (status, body) = send(
        &app,
        post("/api/onboarding/advance", &token, json!({ "status": "subscription" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previousStatus"], "BUSINESS_INFO");
    assert_eq!(body["status"], "SUBSCRIPTION");

    let (status, _) = send(
        &app,
        post("/api/onboarding/advance", &token, json!({ "status": "business-info" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn advance_refuses_skips_and_completion() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store.seed(user, business_info_done()).await;
    let app = app(Arc::new(store));
    let token = token(user, None, Default::default());

    let (status, body) =
        send(&app, post("/api/onboarding/advance", &token, json!({ "status": "setup" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["redirectUrl"], "/onboarding/business-info");

    let (status, body) =
        send(&app, post("/api/onboarding/advance", &token, json!({ "status": "complete" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["redirectUrl"], "/onboarding/setup");

    let (status, _) =
        send(&app, post("/api/onboarding/advance", &token, json!({ "status": "wizard" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&app, post("/api/onboarding/advance", &token, json!({ "status": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn setup_trigger_provisions_once() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store.seed(user, subscription_done("free", "setup")).await;
    let app = app(Arc::new(store.clone()));
    let token = token(user, None, Default::default());

    let (status, first) =
        send(&app, post("/api/onboarding/setup/trigger", &token, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "provisioned");
    assert!(first["requestId"].is_string());

    let (status, second) =
        send(&app, post("/api/onboarding/setup/trigger", &token, json!({ "force_setup": false })))
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "complete");
    assert_eq!(second["tenantId"], first["tenantId"]);
    assert_eq!(store.tenant_count().await, 1);

    let (_, profile) = send(&app, get("/api/onboarding/unified-profile", &token)).await;
    assert_eq!(profile["businessRule"], "HAS_TENANT_COMPLETE");
    assert_eq!(profile["tenantId"], first["tenantId"]);
    assert_eq!(profile["currentStep"], "complete");
    assert_eq!(profile["nextStep"], "dashboard");
}

#[tokio::test]
async fn forced_setup_keeps_existing_binding() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    store
        .seed(user, BackendRecord { tenant_id: Some(tenant), ..subscription_done("free", "complete") })
        .await;
    let app = app(Arc::new(store.clone()));
    let token = token(user, None, Default::default());

    let (status, body) = send(
        &app,
        post("/api/onboarding/setup/trigger", &token, json!({ "force_setup": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "provisioned");
    assert_eq!(body["tenantId"], tenant.to_string());
    assert_eq!(store.tenant_count().await, 1);

    let (status, _) = send(
        &app,
        post(
            "/api/onboarding/setup/trigger",
            &token,
            json!({ "tenant_id": Uuid::new_v4().to_string() }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn setup_trigger_before_setup_step_is_refused() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let token = token(Uuid::new_v4(), None, Default::default());

    let (status, body) =
        send(&app, post("/api/onboarding/setup/trigger", &token, json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["redirectUrl"], "/onboarding/business-info");

    let (status, _) = send(
        &app,
        post("/api/onboarding/setup/trigger", &token, json!({ "tenant_id": "t-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn with_snapshot(mut request: Request<Body>, snapshot: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-onboarding-snapshot", snapshot.parse().unwrap());
    request
}

#[tokio::test]
async fn client_snapshot_cannot_unlock_writes() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store
        .seed(user, BackendRecord { selected_plan: Some("professional".into()), ..business_info_done() })
        .await;
    let app = app(Arc::new(store.clone()));
    let token = token(user, None, Default::default());
    let forged = r#"{"onboardingStatus":"setup","fields":["billing_cycle","payment_method","payment_status"]}"#;

    // Leitura ainda mostra o que o cliente tem em cache.
    let (_, profile) = send(
        &app,
        with_snapshot(get("/api/onboarding/unified-profile", &token), forged),
    )
    .await;
    assert_eq!(profile["onboardingStatus"], "SETUP");

    let (status, body) = send(
        &app,
        with_snapshot(post("/api/onboarding/setup/trigger", &token, json!({})), forged),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["redirectUrl"], "/onboarding/business-info");
    assert_eq!(store.tenant_count().await, 0);

    for target in ["payment", "setup"] {
        let (status, _) = send(
            &app,
            with_snapshot(
                post("/api/onboarding/advance", &token, json!({ "status": target })),
                forged,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "{target}");
    }

    let record = store.find_record(user).await.unwrap().unwrap();
    assert_eq!(record.status, None);
}

#[tokio::test]
async fn setup_trigger_echoes_session_request_id() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store.seed(user, subscription_done("free", "setup")).await;
    let app = app(Arc::new(store));
    let token = token(user, None, Default::default());
    let request_id = Uuid::new_v4();

    let mut request = post("/api/onboarding/setup/trigger", &token, json!({}));
    request
        .headers_mut()
        .insert("x-request-id", request_id.to_string().parse().unwrap());
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requestId"], request_id.to_string());
    assert_eq!(body["message"], "Tenant provisionado.");
}

// Store de registros cujo provisionamento é recusado pelo backend.
struct RejectingProvisioner(MemoryRecordStore);

#[async_trait]
impl OnboardingRecordStore for RejectingProvisioner {
    async fn find_record(&self, user_id: Uuid) -> Result<Option<BackendRecord>, AppError> {
        self.0.find_record(user_id).await
    }

    async fn advance_status(
        &self,
        user_id: Uuid,
        to: OnboardingStatus,
    ) -> Result<OnboardingStatus, AppError> {
        self.0.advance_status(user_id, to).await
    }

    async fn provision_tenant(&self, _request: ProvisionRequest) -> Result<Uuid, AppError> {
        Err(AppError::ProvisioningFailed("tenant quota exceeded".to_string()))
    }
}

#[tokio::test]
async fn provisioning_failure_is_surfaced() {
    let store = MemoryRecordStore::new();
    let user = Uuid::new_v4();
    store.seed(user, subscription_done("professional", "setup")).await;
    let app = app(Arc::new(RejectingProvisioner(store)));
    let token = token(user, None, Default::default());

    let (status, body) =
        send(&app, post("/api/onboarding/setup/trigger", &token, json!({}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["detail"], "tenant quota exceeded");
}

#[tokio::test]
async fn health_is_public() {
    let app = app(Arc::new(MemoryRecordStore::new()));
    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
