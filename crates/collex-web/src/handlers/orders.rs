//! 订单接口

use axum::{
    extract::{Path, State},
    Json,
};
use collex_core::{Order, PageRequest, PharmacyOrderView, Role};
use serde::Deserialize;

use crate::auth::Identity;
use crate::response::{ok, parse_id, ApiJson, ApiQuery, ApiResponse, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct PharmacyOrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusBody {
    pub status: String,
}

/// GET /api/user/orders
pub async fn list_user_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<ApiResponse<Vec<Order>>>> {
    identity.require(Role::Normal)?;
    let orders = state.engine.orders().list(identity.user_id).await?;
    Ok(ok(orders))
}

/// GET /api/user/orders/:id
pub async fn get_user_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    identity.require(Role::Normal)?;
    let order_id = parse_id(&id, "order id")?;
    let order = state.engine.orders().get(identity.user_id, order_id).await?;
    Ok(ok(order))
}

/// GET /api/pharmacy/orders
pub async fn list_pharmacy_orders(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<PharmacyOrdersQuery>,
) -> ApiResult<Json<ApiResponse<Vec<PharmacyOrderView>>>> {
    identity.require(Role::Pharmacy)?;
    let page = PageRequest::new(query.page, query.limit)?;
    let status = query.status.as_deref().filter(|s| !s.is_empty());

    let orders = state
        .engine
        .orders()
        .pharmacy_orders(identity.user_id, status, page)
        .await?;
    Ok(Json(ApiResponse::paged(orders)))
}

/// PUT /api/pharmacy/orders/:id
pub async fn update_order_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateOrderStatusBody>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    identity.require(Role::Pharmacy)?;
    let order_id = parse_id(&id, "order id")?;
    let order = state
        .engine
        .orders()
        .update_status(identity.user_id, order_id, &body.status)
        .await?;
    Ok(Json(ApiResponse::ok(order).with_message("Order status updated")))
}
