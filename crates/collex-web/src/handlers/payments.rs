//! 支付接口

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use collex_core::Payment;
use collex_workflow::{CreateIntentRequest, PaymentIntent, VerificationResult, VerifyRequest};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::response::{created, ok, ApiJson, ApiResponse, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub cart_id: Option<Uuid>,
    #[serde(default)]
    pub delivery_address: String,
    pub notes: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub order_id: String,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// POST /api/payment/create-order
pub async fn create_order(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CreateOrderBody>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PaymentIntent>>)> {
    let intent = state
        .engine
        .payments()
        .create_intent(CreateIntentRequest {
            user_id: identity.user_id,
            amount: body.amount,
            currency: body.currency,
            cart_id: body.cart_id,
            delivery_address: body.delivery_address,
            notes: body.notes,
        })
        .await?;
    Ok(created(intent, "Payment order created"))
}

/// POST /api/payment/verify
pub async fn verify(
    State(state): State<AppState>,
    _identity: Identity,
    ApiJson(body): ApiJson<VerifyBody>,
) -> ApiResult<Json<ApiResponse<VerificationResult>>> {
    let result = state
        .engine
        .payments()
        .verify(VerifyRequest {
            order_id: body.order_id,
            provider_order_id: body.razorpay_order_id,
            provider_payment_id: body.razorpay_payment_id,
            provider_signature: body.razorpay_signature,
        })
        .await?;
    Ok(Json(ApiResponse::ok(result).with_message("Payment verified successfully")))
}

/// GET /api/payment/status/:orderId
pub async fn status(
    State(state): State<AppState>,
    identity: Identity,
    Path(order_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Payment>>> {
    let payment = state.engine.payments().status(&order_id, identity.user_id).await?;
    Ok(ok(payment))
}
