//! 购物车接口

use axum::{
    extract::{Path, State},
    Json,
};
use collex_core::{CartView, Role};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::response::{ok, parse_id, ApiJson, ApiResponse, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemBody {
    pub medicine_id: Uuid,
    pub quantity: i32,
}

/// GET /api/user/cart
pub async fn get_cart(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<ApiResponse<CartView>>> {
    identity.require(Role::Normal)?;
    let view = state.engine.carts().get(identity.user_id).await?;
    Ok(ok(view))
}

/// POST /api/user/cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CartItemBody>,
) -> ApiResult<Json<ApiResponse<CartView>>> {
    identity.require(Role::Normal)?;
    let view = state
        .engine
        .carts()
        .add(identity.user_id, body.medicine_id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::ok(view).with_message("Item added to cart")))
}

/// PUT /api/user/cart
pub async fn update_cart(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CartItemBody>,
) -> ApiResult<Json<ApiResponse<CartView>>> {
    identity.require(Role::Normal)?;
    let view = state
        .engine
        .carts()
        .update(identity.user_id, body.medicine_id, body.quantity)
        .await?;
    Ok(ok(view))
}

/// DELETE /api/user/cart/:medicineId
pub async fn remove_from_cart(
    State(state): State<AppState>,
    identity: Identity,
    Path(medicine_id): Path<String>,
) -> ApiResult<Json<ApiResponse<CartView>>> {
    identity.require(Role::Normal)?;
    let medicine_id = parse_id(&medicine_id, "medicine id")?;
    let view = state.engine.carts().remove(identity.user_id, medicine_id).await?;
    Ok(ok(view))
}

/// DELETE /api/user/cart
pub async fn clear_cart(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<ApiResponse<CartView>>> {
    identity.require(Role::Normal)?;
    let view = state.engine.carts().clear(identity.user_id).await?;
    Ok(Json(ApiResponse::ok(view).with_message("Cart cleared")))
}
