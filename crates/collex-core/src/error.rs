//! 错误定义模块

use serde_json::Value;
use thiserror::Error;

/// 错误类别，HTTP边界据此确定状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Internal,
}

/// 稳定的错误码
pub mod codes {
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const INVALID_DATE: &str = "INVALID_DATE";
    pub const INVALID_TIME: &str = "INVALID_TIME";
    pub const INVALID_MODE: &str = "INVALID_MODE";
    pub const INVALID_SLOT_COUNT: &str = "INVALID_SLOT_COUNT";
    pub const PAST_SLOT: &str = "PAST_SLOT";
    pub const SLOT_UNAVAILABLE: &str = "SLOT_UNAVAILABLE";
    pub const SLOT_ALREADY_EXISTS: &str = "SLOT_ALREADY_EXISTS";
    pub const ALREADY_CANCELLED: &str = "ALREADY_CANCELLED";
    pub const ALREADY_COMPLETED: &str = "ALREADY_COMPLETED";
    pub const INVALID_STATUS_TRANSITION: &str = "INVALID_STATUS_TRANSITION";
    pub const DOCTOR_NOT_FOUND: &str = "DOCTOR_NOT_FOUND";
    pub const DOCTOR_INACTIVE: &str = "DOCTOR_INACTIVE";
    pub const PHARMACY_NOT_FOUND: &str = "PHARMACY_NOT_FOUND";
    pub const APPOINTMENT_NOT_FOUND: &str = "APPOINTMENT_NOT_FOUND";
    pub const NOT_APPOINTMENT_PARTICIPANT: &str = "NOT_APPOINTMENT_PARTICIPANT";
    pub const INVALID_AMOUNT: &str = "INVALID_AMOUNT";
    pub const PAYMENT_NOT_FOUND: &str = "PAYMENT_NOT_FOUND";
    pub const INVALID_SIGNATURE: &str = "INVALID_SIGNATURE";
    pub const PAYMENT_ALREADY_FAILED: &str = "PAYMENT_ALREADY_FAILED";
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
    pub const CART_NOT_FOUND: &str = "CART_NOT_FOUND";
    pub const ITEM_NOT_IN_CART: &str = "ITEM_NOT_IN_CART";
    pub const MEDICINE_NOT_FOUND: &str = "MEDICINE_NOT_FOUND";
    pub const MEDICINE_INACTIVE: &str = "MEDICINE_INACTIVE";
    pub const INVALID_QUANTITY: &str = "INVALID_QUANTITY";
    pub const INSUFFICIENT_STOCK: &str = "INSUFFICIENT_STOCK";
    pub const ORDER_NOT_FOUND: &str = "ORDER_NOT_FOUND";
    pub const INVALID_ORDER_STATUS: &str = "INVALID_ORDER_STATUS";
    pub const ORDER_TERMINAL: &str = "ORDER_TERMINAL";
    pub const INVALID_PAGINATION: &str = "INVALID_PAGINATION";
    pub const MISSING_TOKEN: &str = "MISSING_TOKEN";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Collex系统统一错误类型
#[derive(Error, Debug)]
pub enum CollexError {
    #[error("{message}")]
    InvalidInput {
        code: &'static str,
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("{message}")]
    Forbidden { code: &'static str, message: String },

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("支付服务错误: {0}")]
    Provider(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl CollexError {
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_with(code: &'static str, message: impl Into<String>, details: Value) -> Self {
        Self::InvalidInput {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict_with(code: &'static str, message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: codes::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Database(_)
            | Self::Provider(_)
            | Self::Config(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { code, .. }
            | Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::Unauthorized { code, .. }
            | Self::Forbidden { code, .. } => code,
            Self::Provider(_) => codes::PROVIDER_ERROR,
            _ => codes::INTERNAL_ERROR,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::InvalidInput { details, .. } | Self::Conflict { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// 可以原样返回给客户端的消息；内部错误只给出通用描述
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => match self {
                Self::Provider(_) => "Payment provider is unavailable".to_string(),
                _ => "Internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

/// Collex系统统一结果类型
pub type Result<T> = std::result::Result<T, CollexError>;
