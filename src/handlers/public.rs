use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::error::SiteError;
use crate::router::SiteState;
use crate::service::booking::{BookingRequest, record_booking};
use crate::storage::{GalleryItem, SiteConfig};

/// GET /api/config
pub async fn get_config(State(state): State<SiteState>) -> Json<SiteConfig> {
    Json(state.storage.get_config().await)
}

/// GET /api/gallery
pub async fn get_gallery(State(state): State<SiteState>) -> Json<Vec<GalleryItem>> {
    let gallery = state
        .storage
        .get_gallery()
        .await
        .into_iter()
        .map(|mut item| {
            item.image = normalize_image_path(&item.image);
            item
        })
        .collect();
    Json(gallery)
}

/// Absolute URLs and rooted paths are kept; bare names are rooted.
pub fn normalize_image_path(image: &str) -> String {
    if image.starts_with("http") || image.starts_with('/') {
        image.to_string()
    } else {
        format!("/{image}")
    }
}

/// POST /api/booking
pub async fn submit_booking(
    State(state): State<SiteState>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<Value>, SiteError> {
    let Json(booking) = payload?;
    booking.validate().map_err(SiteError::BadRequest)?;

    let config = state.storage.get_config().await;
    record_booking(&booking, &config.email);

    Ok(Json(json!({
        "success": true,
        "message": "Booking request submitted successfully!"
    })))
}

/// GET /uploads/{name}
pub async fn serve_upload(
    State(state): State<SiteState>,
    Path(name): Path<String>,
) -> Result<Response, SiteError> {
    let (bytes, content_type) = state
        .storage
        .read_upload(&name)
        .await
        .ok_or_else(|| SiteError::NotFound(format!("Upload `{name}`")))?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_paths_are_rooted() {
        assert_eq!(normalize_image_path("uploads/a.jpg"), "/uploads/a.jpg");
        assert_eq!(normalize_image_path("/uploads/a.jpg"), "/uploads/a.jpg");
        assert_eq!(
            normalize_image_path("https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
    }
}
