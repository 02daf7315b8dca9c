//! Web服务器

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use collex_admin::{CorsConfig, ServerConfig};
use collex_core::{CollexError, Result};
use collex_workflow::CollexEngine;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn};

use crate::auth::{auth_middleware, TokenService};
use crate::handlers::{appointments, cart, health, orders, payments};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CollexEngine>,
    pub tokens: Arc<dyn TokenService>,
}

pub struct WebServer {
    addr: String,
    app: Router,
}

impl WebServer {
    pub fn new(server: &ServerConfig, cors: &CorsConfig, state: AppState) -> Self {
        let app = create_app(state, cors, server.request_timeout());
        Self {
            addr: server.bind_address(),
            app,
        }
    }

    /// 启动服务，收到 Ctrl-C 后优雅退出
    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| CollexError::Internal(format!("Failed to bind {}: {}", self.addr, e)))?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| CollexError::Internal(format!("Web server error: {}", e)))?;

        info!("Web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// 构建完整路由
pub fn create_app(state: AppState, cors: &CorsConfig, request_timeout: Duration) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .nest("/api", api_routes(state.clone()))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors_layer(cors)),
        )
}

/// 需要认证的API路由
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // 患者
        .route("/user/book-appointment", post(appointments::book_appointment))
        .route("/user/consultations", get(appointments::patient_consultations))
        .route("/user/confirmed-appiontment-slot", get(appointments::confirmed_slots))
        .route("/user/orders", get(orders::list_user_orders))
        .route("/user/orders/:id", get(orders::get_user_order))
        .route(
            "/user/cart",
            get(cart::get_cart)
                .post(cart::add_to_cart)
                .put(cart::update_cart)
                .delete(cart::clear_cart),
        )
        .route("/user/cart/:medicine_id", delete(cart::remove_from_cart))
        // 医生
        .route("/doctor/cancel-appointment", delete(appointments::cancel_appointment))
        .route("/doctor/confirm-appointment", put(appointments::confirm_appointment))
        .route("/doctor/schedule-appointment", post(appointments::publish_availability))
        .route("/doctor/availability", get(appointments::availability))
        .route("/doctor/schedule", get(appointments::doctor_schedule))
        .route("/doctor/consultations", get(appointments::doctor_consultations))
        .route("/doctor/complete-consultation", post(appointments::complete_consultation))
        // 支付
        .route("/payment/create-order", post(payments::create_order))
        .route("/payment/verify", post(payments::verify))
        .route("/payment/status/:order_id", get(payments::status))
        // 药房
        .route("/pharmacy/orders", get(orders::list_pharmacy_orders))
        .route("/pharmacy/orders/:id", put(orders::update_order_status))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == "*")
}

/// 按配置构造CORS层；携带凭证时通配符改为回显请求值
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let credentials = config.allow_credentials;

    let origins = if is_wildcard(&config.allowed_origins) {
        if credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::from(Any)
        }
    } else {
        let list: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    let methods = if is_wildcard(&config.allowed_methods) {
        if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::from(Any)
        }
    } else {
        let list: Vec<Method> = config
            .allowed_methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
            .collect();
        AllowMethods::list(list)
    };

    let headers = if is_wildcard(&config.allowed_headers) {
        if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::from(Any)
        }
    } else {
        AllowHeaders::list(parse_header_names(&config.allowed_headers))
    };

    let mut layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(credentials)
        .max_age(Duration::from_secs(config.max_age_secs));

    if !is_wildcard(&config.exposed_headers) {
        layer = layer.expose_headers(ExposeHeaders::list(parse_header_names(&config.exposed_headers)));
    } else if !credentials {
        layer = layer.expose_headers(Any);
    }
    layer
}

fn parse_header_names(values: &[String]) -> Vec<HeaderName> {
    values
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.trim().to_ascii_lowercase().as_bytes()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HmacTokenService;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
    };
    use chrono::{TimeZone, Utc};
    use collex_core::{Doctor, FixedClock, Medicine, Pharmacy, Role};
    use collex_database::MemoryStore;
    use collex_integration::{
        PaymentProvider, RemoteOrder, RemoteOrderRequest, RemotePayment, SignatureVerifier,
    };
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const PAYMENT_SECRET: &str = "payment-secret";

    struct StubProvider;

    #[async_trait]
    impl PaymentProvider for StubProvider {
        fn public_key(&self) -> &str {
            "rzp_test_key"
        }

        async fn create_remote_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder> {
            Ok(RemoteOrder {
                id: format!("order_{}", request.receipt),
                amount: request.amount,
                currency: request.currency.clone(),
                receipt: Some(request.receipt.clone()),
                status: Some("created".to_string()),
            })
        }

        async fn fetch_payment(&self, id: &str) -> Result<RemotePayment> {
            Ok(RemotePayment {
                id: id.to_string(),
                method: Some("card".to_string()),
                status: Some("captured".to_string()),
            })
        }

        async fn find_order_by_receipt(&self, _receipt: &str) -> Result<Option<RemoteOrder>> {
            Ok(None)
        }
    }

    struct Harness {
        app: Router,
        tokens: Arc<HmacTokenService>,
        patient: Uuid,
        doctor_user: Uuid,
        doctor_id: Uuid,
        pharmacy_user: Uuid,
        medicine_id: Uuid,
    }

    impl Harness {
        fn token(&self, user: Uuid, role: Role) -> String {
            format!("Bearer {}", self.tokens.issue(user, role).unwrap())
        }

        async fn call(&self, method: &str, uri: &str, auth: Option<String>, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = HttpRequest::builder().method(method).uri(uri);
            if let Some(auth) = auth {
                builder = builder.header(header::AUTHORIZATION, auth);
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap());

        let doctor_user = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();
        store
            .insert_doctor(Doctor {
                id: doctor_id,
                user_id: doctor_user,
                first_name: "Meera".to_string(),
                last_name: "Iyer".to_string(),
                specialization: Some("Cardiology".to_string()),
                consultation_fee: Decimal::new(50000, 2),
                is_active: true,
            })
            .await;

        let pharmacy_user = Uuid::new_v4();
        let pharmacy_id = Uuid::new_v4();
        store
            .insert_pharmacy(Pharmacy {
                id: pharmacy_id,
                user_id: pharmacy_user,
                name: "Green Cross".to_string(),
                is_active: true,
            })
            .await;
        let medicine_id = Uuid::new_v4();
        store
            .insert_medicine(Medicine {
                id: medicine_id,
                pharmacy_id,
                name: "Cetirizine".to_string(),
                price: Decimal::new(12500, 2),
                stock: 20,
                is_active: true,
            })
            .await;

        let clock: Arc<FixedClock> = Arc::new(clock);
        let engine = CollexEngine::new(
            collex_core::Stores::from_single(store),
            Arc::new(StubProvider),
            SignatureVerifier::new(PAYMENT_SECRET),
            clock.clone(),
        );
        let tokens = Arc::new(HmacTokenService::new(
            "token-secret",
            chrono::Duration::minutes(15),
            clock,
        ));
        let state = AppState {
            engine: Arc::new(engine),
            tokens: tokens.clone(),
        };

        Harness {
            app: create_app(state, &CorsConfig::default(), Duration::from_secs(5)),
            tokens,
            patient: Uuid::new_v4(),
            doctor_user,
            doctor_id,
            pharmacy_user,
            medicine_id,
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let h = harness().await;
        let (status, body) = h.call("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_request_id_is_returned() {
        let h = harness().await;
        let request = HttpRequest::builder().uri("/health").body(Body::empty()).unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_identity_errors() {
        let h = harness().await;
        let (status, body) = h.call("GET", "/api/user/cart", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "MISSING_TOKEN");

        let (status, body) = h
            .call("GET", "/api/user/cart", Some("Bearer nonsense".to_string()), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");

        let doctor = h.token(h.doctor_user, Role::Doctor);
        let (status, body) = h.call("GET", "/api/user/cart", Some(doctor), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_booking_conflict_and_schedule() {
        let h = harness().await;
        let booking = json!({
            "doctorId": h.doctor_id,
            "reason": "Chest pain",
            "mode": "online",
            "slots": [
                { "date": "2030-06-02", "time": "10:00" },
                { "date": "2030-06-02", "time": "10:30" }
            ]
        });

        let patient = h.token(h.patient, Role::Normal);
        let (status, body) = h
            .call("POST", "/api/user/book-appointment", Some(patient), Some(booking.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][0]["status"], "pending");

        let other = h.token(Uuid::new_v4(), Role::Normal);
        let (status, body) = h
            .call("POST", "/api/user/book-appointment", Some(other), Some(booking))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "SLOT_UNAVAILABLE");

        let doctor = h.token(h.doctor_user, Role::Doctor);
        let (status, body) = h.call("GET", "/api/doctor/schedule", Some(doctor), None).await;
        assert_eq!(status, StatusCode::OK);
        let groups = body["data"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["selectedSlots"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_doctor_cancels_confirmed_appointment() {
        let h = harness().await;
        let patient = h.token(h.patient, Role::Normal);
        let (status, body) = h
            .call(
                "POST",
                "/api/user/book-appointment",
                Some(patient),
                Some(json!({
                    "doctorId": h.doctor_id,
                    "reason": "Palpitations",
                    "mode": "offline",
                    "slots": [{ "date": "2030-06-04", "time": "11:00" }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let appointment_id = body["data"][0]["id"].as_str().unwrap().to_string();

        let doctor = h.token(h.doctor_user, Role::Doctor);
        let (status, body) = h
            .call(
                "PUT",
                "/api/doctor/confirm-appointment",
                Some(doctor.clone()),
                Some(json!({ "appointmentId": appointment_id })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "confirmed");

        let cancel = json!({ "appointmentId": appointment_id, "reason": "Clinic closed" });
        let (status, body) = h
            .call(
                "DELETE",
                "/api/doctor/cancel-appointment",
                Some(doctor.clone()),
                Some(cancel.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "cancelled");
        assert_eq!(body["data"]["cancelledBy"], h.doctor_user.to_string());

        let (status, body) = h
            .call("DELETE", "/api/doctor/cancel-appointment", Some(doctor), Some(cancel))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "ALREADY_CANCELLED");
    }

    #[tokio::test]
    async fn test_past_slot_is_bad_request() {
        let h = harness().await;
        let patient = h.token(h.patient, Role::Normal);
        let (status, body) = h
            .call(
                "POST",
                "/api/user/book-appointment",
                Some(patient),
                Some(json!({
                    "doctorId": h.doctor_id,
                    "reason": "Follow-up",
                    "mode": "offline",
                    "slots": [{ "date": "2000-01-01", "time": "10:00" }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "PAST_SLOT");
    }

    #[tokio::test]
    async fn test_malformed_json_uses_envelope() {
        let h = harness().await;
        let patient = h.token(h.patient, Role::Normal);
        let (status, body) = h
            .call("POST", "/api/user/cart", Some(patient), Some(json!({ "quantity": "many" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_cart_payment_and_pharmacy_flow() {
        let h = harness().await;
        let patient = h.token(h.patient, Role::Normal);

        let (status, body) = h
            .call(
                "POST",
                "/api/user/cart",
                Some(patient.clone()),
                Some(json!({ "medicineId": h.medicine_id, "quantity": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalAmount"], 250.0);
        let cart_id = body["data"]["cartId"].as_str().unwrap().to_string();

        let (status, body) = h
            .call(
                "POST",
                "/api/payment/create-order",
                Some(patient.clone()),
                Some(json!({
                    "amount": 250.0,
                    "cartId": cart_id,
                    "deliveryAddress": "42 Lake View"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["key"], "rzp_test_key");
        let order_id = body["data"]["orderId"].as_str().unwrap().to_string();
        let provider_order = body["data"]["razorpayOrderId"].as_str().unwrap().to_string();

        let signature = SignatureVerifier::new(PAYMENT_SECRET).sign(&provider_order, "pay_1");
        let (status, body) = h
            .call(
                "POST",
                "/api/payment/verify",
                Some(patient.clone()),
                Some(json!({
                    "orderId": order_id,
                    "razorpayOrderId": provider_order,
                    "razorpayPaymentId": "pay_1",
                    "razorpaySignature": signature
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["payment"]["status"], "success");
        assert_eq!(body["data"]["order"]["items"].as_array().unwrap().len(), 1);

        let (status, body) = h
            .call("GET", &format!("/api/payment/status/{}", order_id), Some(patient.clone()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["method"], "card");

        let (_, body) = h.call("GET", "/api/user/cart", Some(patient.clone()), None).await;
        assert!(body["data"]["items"].as_array().unwrap().is_empty());

        let pharmacy = h.token(h.pharmacy_user, Role::Pharmacy);
        let (status, body) = h
            .call("GET", "/api/pharmacy/orders?page=1&limit=5", Some(pharmacy.clone()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["meta"]["totalPages"], 1);
        let order = body["data"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = h
            .call(
                "PUT",
                &format!("/api/pharmacy/orders/{}", order),
                Some(pharmacy.clone()),
                Some(json!({ "status": "shipped" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "shipped");

        let (status, body) = h
            .call("GET", "/api/pharmacy/orders?limit=500", Some(pharmacy), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_PAGINATION");

        let (status, body) = h.call("GET", "/api/user/orders", Some(patient), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_cors_layer_accepts_credentials_with_wildcards() {
        let mut config = CorsConfig::default();
        config.allow_credentials = true;
        config.allowed_headers = vec!["*".to_string()];
        config.exposed_headers = vec!["*".to_string()];
        let _ = cors_layer(&config);

        let mut config = CorsConfig::default();
        config.allowed_origins = vec!["https://collex.example".to_string()];
        let _ = cors_layer(&config);
    }
}
