//! Request extractors that report rejections in the API's error envelope.

use axum::extract::{FromRequest, Request};
use axum::Json;
use gateway_core::error::CoreError;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON request body.
///
/// Behaves like [`axum::Json`] but turns every rejection (wrong content
/// type, syntax error, wrong field types) into a 400 `VALIDATION_ERROR`
/// instead of axum's plain-text 415/422.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                tracing::debug!(status = %rejection.status(), "Rejected request body");
                Err(AppError::Core(CoreError::Validation(rejection.body_text())))
            }
        }
    }
}
