//! Validating extractors.
//!
//! JSON bodies and query strings share one contract: deserialize into a typed
//! value, run its `validator` rules, and reject with a structured 400 before
//! the handler body runs.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use execboard_models::PageRequest;

use crate::error::ApiError;

/// JSON body that passed deserialization and validation.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string that passed deserialization and validation.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Single `:id` path segment parsed as a UUID.
#[derive(Debug, Clone, Copy)]
pub struct PathId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state).await?;
        Ok(Self(id))
    }
}

/// Page request from optional `page` / `per_page` query values.
pub fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    let defaults = PageRequest::default();
    PageRequest::new(
        page.unwrap_or(defaults.page),
        per_page.unwrap_or(defaults.per_page),
    )
}

/// Reject a salary range whose minimum exceeds its maximum.
pub fn check_salary_range(min: Option<i32>, max: Option<i32>) -> Result<(), ApiError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ApiError::field(
            "salary_min",
            "salary_min must not exceed salary_max",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use axum::response::IntoResponse;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Input {
        #[validate(length(min = 1, max = 5, message = "must be 1-5 characters"))]
        name: String,
        #[validate(range(min = 1, max = 10))]
        count: u32,
    }

    fn json_request(body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        let ValidatedJson(input) =
            ValidatedJson::<Input>::from_request(json_request(r#"{"name":"ok","count":3}"#), &())
                .await
                .unwrap();
        assert_eq!(input.name, "ok");
        assert_eq!(input.count, 3);
    }

    #[tokio::test]
    async fn test_rule_violation_lists_fields() {
        let err = ValidatedJson::<Input>::from_request(
            json_request(r#"{"name":"toolong","count":0}"#),
            &(),
        )
        .await
        .unwrap_err();
        match &err {
            ApiError::Validation { details: Some(details), .. } => {
                assert_eq!(details["name"][0], "must be 1-5 characters");
                assert!(details.get("count").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let err = ValidatedJson::<Input>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_validation() {
        let req = HttpRequest::builder()
            .uri("/?name=abc&count=99")
            .body(Body::empty())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let err = ValidatedQuery::<Input>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_page_request_defaults_and_clamps() {
        assert_eq!(page_request(None, None), PageRequest::default());
        let clamped = page_request(Some(0), Some(1_000));
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.per_page, 100);
    }

    #[test]
    fn test_salary_range() {
        assert!(check_salary_range(Some(200_000), Some(150_000)).is_err());
        assert!(check_salary_range(Some(150_000), Some(200_000)).is_ok());
        assert!(check_salary_range(None, Some(1)).is_ok());
    }
}
