//! Typed errors for the order pipeline.
//!
//! `OrderError` is the single error type returned by the store, the
//! mutation engine, the generation adapters and every `OrderService`
//! operation. CLI and configuration glue use `anyhow` on top of it.

use automata_common::{OrderStage, UnknownValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order {id} not found")]
    NotFound { id: String },

    #[error("Page {page} not found on order {order_id}")]
    PageNotFound { order_id: String, page: u32 },

    #[error("Invalid {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Order {order_id} is in stage {stage}: {message}")]
    InvalidState {
        order_id: String,
        stage: OrderStage,
        message: String,
    },

    #[error("Precondition failed for order {order_id}: {message}")]
    PreconditionFailed { order_id: String, message: String },

    #[error("Generation failed for order {order_id}: {message}")]
    GenerationFailed { order_id: String, message: String },

    #[error("Generation for {target} on order {order_id} was superseded")]
    Cancelled { order_id: String, target: String },

    #[error("Order store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrderError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    pub fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_state(order_id: &str, stage: OrderStage, message: impl Into<String>) -> Self {
        Self::InvalidState {
            order_id: order_id.to_string(),
            stage,
            message: message.into(),
        }
    }

    pub fn precondition(order_id: &str, message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            order_id: order_id.to_string(),
            message: message.into(),
        }
    }

    pub fn generation(order_id: &str, message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            order_id: order_id.to_string(),
            message: message.into(),
        }
    }

    /// Stable snake_case code for the event feed and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::PageNotFound { .. } => "not_found",
            Self::InvalidValue { .. } => "invalid_value",
            Self::InvalidState { .. } => "invalid_state",
            Self::PreconditionFailed { .. } => "precondition_failed",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::Cancelled { .. } => "cancelled",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Other(_) => "internal",
        }
    }
}

impl From<UnknownValue> for OrderError {
    fn from(err: UnknownValue) -> Self {
        Self::InvalidValue {
            field: err.field.to_string(),
            message: format!("'{}' is not a recognised value", err.value),
        }
    }
}

pub type Result<T, E = OrderError> = std::result::Result<T, E>;
