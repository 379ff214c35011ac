//! Request and response bodies of the HTTP API.

pub mod chat;
pub mod etf;
pub mod notification;
pub mod portfolio;
pub mod user;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `{"message": "..."}` acknowledgement used by most mutating endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
