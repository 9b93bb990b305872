//! Request extractors whose rejections answer with the marketplace's JSON
//! error bodies.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::domain::ServiceId;
use crate::search::ListingParams;

pub(crate) const FORM_ERROR: &str = "Please correct the errors below.";

/// JSON form body. Bodies that do not deserialize into `T` are reported as
/// an invalid form.
#[derive(Debug)]
pub struct JsonForm<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(form)) => Ok(Self(form)),
            Err(rejection) => Err(form_rejection(rejection)),
        }
    }
}

fn form_rejection(rejection: JsonRejection) -> Response {
    match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            let payload = json!({
                "error": FORM_ERROR,
                "fields": [{ "field": "form", "message": rejection.body_text() }],
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.body_text() });
            (other.status(), Json(payload)).into_response()
        }
    }
}

/// Service id taken from the `:id` path segment. A segment that is not an
/// integer cannot name a service, so it is answered as not found.
#[derive(Debug, Clone, Copy)]
pub struct ServicePath(pub ServiceId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ServicePath
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Self(ServiceId(id))),
            Err(PathRejection::FailedToDeserializePathParams(_)) => {
                let payload = json!({ "error": "service not found" });
                Err((StatusCode::NOT_FOUND, Json(payload)).into_response())
            }
            Err(other) => {
                let payload = json!({ "error": other.body_text() });
                Err((other.status(), Json(payload)).into_response())
            }
        }
    }
}

/// Listing parameters from the query string.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery(pub ListingParams);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ListingQuery
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<ListingParams>::from_request_parts(parts, state)
            .await
            .map(|Query(params)| Self(params))
            .map_err(|rejection: QueryRejection| {
                let payload = json!({ "error": rejection.body_text() });
                (StatusCode::BAD_REQUEST, Json(payload)).into_response()
            })
    }
}
