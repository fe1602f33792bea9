//! Custom Extractors
//!
//! Body extractors whose rejections go through [`AppError`], so a malformed
//! body gets the same JSON error shape as every other failure.

use axum::{
    extract::FromRequest,
    response::{IntoResponse, Response},
};

use crate::shared::error::AppError;

pub use crate::presentation::middleware::CurrentSession;

/// JSON body; malformed input is a `BadRequest`.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

impl<T: serde::Serialize> IntoResponse for JsonBody<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// URL-encoded form body; malformed input is a `BadRequest`.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct FormBody<T>(pub T);
