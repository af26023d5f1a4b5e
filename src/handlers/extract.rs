// handlers/extract.rs - request body extractors shared by the handlers

use axum::{
    async_trait,
    extract::{multipart::Field, rejection::JsonRejection, FromRequest, Multipart, Request},
    http::header,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::services::validation::{ImageUpload, RecipeDraft};

/// `Json` whose rejection is an `ApiError` (400 INVALID_JSON) instead of plain text
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
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::invalid_json(rejection.body_text())
}

/// A recipe submission: a JSON body, or a multipart form carrying text
/// fields plus up to N files under `images`.
pub struct RecipeSubmission {
    pub draft: RecipeDraft,
    pub images: Vec<ImageUpload>,
}

#[async_trait]
impl<S> FromRequest<S> for RecipeSubmission
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let ApiJson(draft) = ApiJson::<RecipeDraft>::from_request(req, state).await?;
            return Ok(Self {
                draft,
                images: Vec::new(),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        let mut draft = RecipeDraft::default();
        let mut images = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" || field.file_name().is_some() {
                images.push(read_image(field).await?);
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            match name.as_str() {
                "name" => draft.name = Some(text),
                "description" => draft.description = Some(text),
                // JSON-encoded in forms; decoded during validation
                "ingredients" => draft.ingredients = Some(Value::String(text)),
                "instructions" => draft.instructions = Some(Value::String(text)),
                "difficulty" => draft.difficulty = Some(Value::String(text)),
                "time" => draft.time = Some(Value::String(text)),
                _ => {}
            }
        }

        Ok(Self { draft, images })
    }
}

async fn read_image(field: Field<'_>) -> Result<ImageUpload, ApiError> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;

    Ok(ImageUpload {
        file_name,
        content_type,
        data,
    })
}
