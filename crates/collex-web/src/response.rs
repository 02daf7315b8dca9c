//! 统一响应格式与错误映射

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use collex_core::{codes, CollexError, ErrorKind, Page};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{error, warn};
use uuid::Uuid;

/// 错误体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// 分页信息
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// 响应信封
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// 分页列表
    pub fn paged(page: Page<T>) -> Self {
        let meta = PageMeta {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
        };
        Self {
            success: true,
            message: None,
            data: Some(page.items),
            error: None,
            meta: Some(meta),
        }
    }
}

/// 200 响应
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}

/// 201 响应
pub fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::ok(data).with_message(message)))
}

/// HTTP边界上的错误
#[derive(Debug)]
pub struct ApiError(pub CollexError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<CollexError> for ApiError {
    fn from(err: CollexError) -> Self {
        Self(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(err.kind());
        // 原始错误只进日志，客户端只看到映射后的错误码
        if status.is_server_error() {
            error!("Request failed: {}", err);
        } else {
            warn!("Request rejected with {}: {}", err.code(), err);
        }

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            message: None,
            data: None,
            error: Some(ErrorBody {
                code: err.code(),
                message: err.public_message(),
                details: err.details().cloned(),
            }),
            meta: None,
        };
        (status, Json(body)).into_response()
    }
}

/// JSON请求体；解析失败时返回信封格式的 `INVALID_INPUT`
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(CollexError::invalid(codes::INVALID_INPUT, rejection.body_text()).into()),
        }
    }
}

/// 查询参数；解析失败时返回信封格式的 `INVALID_INPUT`
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(CollexError::invalid(codes::INVALID_INPUT, rejection.body_text()).into()),
        }
    }
}

/// 解析路径中的ID
pub fn parse_id(value: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| CollexError::invalid(codes::INVALID_INPUT, format!("Invalid {} '{}'", what, value)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_envelope_hides_internal_cause() {
        let response = ApiError(CollexError::Database("relation \"payments\" does not exist".to_string()))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], codes::INTERNAL_ERROR);
        assert!(!body.to_string().contains("payments"));
    }

    #[tokio::test]
    async fn test_conflict_carries_details() {
        let err = CollexError::conflict_with(
            codes::SLOT_UNAVAILABLE,
            "Slot taken",
            serde_json::json!({ "date": "2099-01-02", "time": "10:00" }),
        );
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], codes::SLOT_UNAVAILABLE);
        assert_eq!(body["error"]["details"]["time"], "10:00");
    }

    #[test]
    fn test_paged_meta() {
        let page = Page {
            items: vec![1, 2],
            page: 2,
            limit: 2,
            total: 5,
        };
        let response = ApiResponse::paged(page);
        assert_eq!(
            response.meta,
            Some(PageMeta {
                page: 2,
                limit: 2,
                total: 5,
                total_pages: 3
            })
        );
    }
}
