//! HTTP surface: the upload form and the multipart enrollment endpoint.

use crate::engine::EngineHandle;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use lookout_core::{Embedding, PersonRecord};
use lookout_store::EnrollmentStore;
use serde_json::json;
use std::sync::Arc;

/// Shared application state, constructed once in `main`.
pub struct AppState {
    pub engine: EngineHandle,
    pub store: EnrollmentStore,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .with_state(state)
}

const UPLOAD_FORM_HTML: &str = r#"<!doctype html>
<html>
<head><title>Lookout enrollment</title></head>
<body>
  <h1>Enroll a person</h1>
  <form action="/upload" method="post" enctype="multipart/form-data">
    <label>Name: <input type="text" name="name" required></label><br>
    <label>Age: <input type="text" name="age" required></label><br>
    <label>Nationality: <input type="text" name="nationality" required></label><br>
    <label>Photos: <input type="file" name="images" accept="image/*" multiple required></label><br>
    <button type="submit">Upload</button>
  </form>
</body>
</html>
"#;

async fn index() -> Html<&'static str> {
    Html(UPLOAD_FORM_HTML)
}

/// Structured error response: validation problems map to 400 with a
/// JSON body instead of surfacing as a bare 500.
pub enum ApiError {
    Validation(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "upload failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

/// Collected multipart form contents.
#[derive(Default)]
struct UploadForm {
    name: String,
    age: String,
    nationality: String,
    images: Vec<Vec<u8>>,
}

impl UploadForm {
    fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("name", &self.name),
            ("age", &self.age),
            ("nationality", &self.nationality),
        ] {
            if value.trim().is_empty() {
                return Err(format!("missing form field: {field}"));
            }
        }
        if self.images.is_empty() {
            return Err("at least one image is required".to_string());
        }
        Ok(())
    }
}

async fn collect_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" | "age" | "nationality" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("unreadable field {name}: {e}")))?;
                match name.as_str() {
                    "name" => form.name = value,
                    "age" => form.age = value,
                    _ => form.nationality = value,
                }
            }
            "images" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("unreadable image part: {e}")))?;
                if !bytes.is_empty() {
                    form.images.push(bytes.to_vec());
                }
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown form field");
            }
        }
    }

    Ok(form)
}

/// `POST /upload` — enroll one person from a multipart form submission.
///
/// Each image goes through the embedding engine; an image that fails to
/// decode or yields no face is logged and skipped, and the record keeps
/// whatever embeddings succeeded. The caller gets a plain success
/// acknowledgment either way — per-image outcomes are not reported.
async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = collect_form(multipart).await?;
    form.validate().map_err(ApiError::Validation)?;

    let identifier = EnrollmentStore::identifier_for(&form.name);
    tracing::info!(
        identifier,
        name = %form.name,
        images = form.images.len(),
        "processing upload"
    );

    let mut embeddings: Vec<Embedding> = Vec::new();
    for (i, bytes) in form.images.iter().enumerate() {
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img.to_rgb8(),
            Err(err) => {
                tracing::warn!(image = i + 1, error = %err, "undecodable image, skipping");
                continue;
            }
        };
        match state.engine.represent(decoded).await {
            Ok(embedding) => embeddings.push(embedding),
            Err(err) => {
                tracing::warn!(image = i + 1, error = %err, "embedding extraction failed, skipping");
            }
        }
    }

    let record = PersonRecord {
        name: form.name,
        age: form.age,
        nationality: form.nationality,
        embeddings,
        created_at: Utc::now().to_rfc3339(),
    };

    let store = state.store.clone();
    let id = identifier.clone();
    tokio::task::spawn_blocking(move || store.put(&id, &record, &form.images))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(Json(json!({
        "message": "Images and details uploaded successfully",
        "identifier": identifier,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, age: &str, nat: &str, images: usize) -> UploadForm {
        UploadForm {
            name: name.into(),
            age: age.into(),
            nationality: nat.into(),
            images: vec![vec![0u8]; images],
        }
    }

    #[test]
    fn test_validate_complete_form() {
        assert!(form("alice", "30", "FR", 2).validate().is_ok());
    }

    #[test]
    fn test_validate_missing_name() {
        let err = form("  ", "30", "FR", 1).validate().unwrap_err();
        assert!(err.contains("name"));
    }

    #[test]
    fn test_validate_missing_age() {
        let err = form("alice", "", "FR", 1).validate().unwrap_err();
        assert!(err.contains("age"));
    }

    #[test]
    fn test_validate_no_images() {
        let err = form("alice", "30", "FR", 0).validate().unwrap_err();
        assert!(err.contains("image"));
    }

    #[test]
    fn test_upload_form_page_has_required_fields() {
        for needle in ["name=\"name\"", "name=\"age\"", "name=\"nationality\"", "name=\"images\"", "multipart/form-data"] {
            assert!(UPLOAD_FORM_HTML.contains(needle), "form page missing {needle}");
        }
    }
}
