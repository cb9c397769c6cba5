//! Request extractors whose rejections use the API error body.
//!
//! Plain `axum::Json` rejects with a text body; these wrappers turn the
//! rejection into an [`AppError::Validation`] so malformed input gets the
//! same `{"success": false, "message": ...}` shape as every other failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
