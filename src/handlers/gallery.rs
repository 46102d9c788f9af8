use axum::{
    Json,
    extract::{Multipart, Path, State, rejection::JsonRejection},
};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::error::SiteError;
use crate::handlers::upload::read_image_form;
use crate::middleware::auth::RequireAdmin;
use crate::router::SiteState;
use crate::storage::GalleryItem;
use crate::storage::naming::{generate_filename, next_gallery_id};

const DEFAULT_CATEGORY: &str = "all";
const DEFAULT_TITLE: &str = "Gallery Item";

/// GET /api/admin/gallery
pub async fn list_items(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
) -> Json<Vec<GalleryItem>> {
    Json(state.storage.get_gallery().await)
}

/// POST /api/admin/gallery: multipart `image` plus optional `category` and `title`.
pub async fn add_item(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
    multipart: Multipart,
) -> Result<Json<Value>, SiteError> {
    let mut form = read_image_form(multipart, "image", state.max_upload_bytes).await?;
    let image = form.take_image()?;
    let mut gallery = state.storage.load_gallery().await?;

    let filename = generate_filename("gallery", &image.file_name);
    let url = state
        .storage
        .upload_file(&image.bytes, &filename, image.content_type.as_deref())
        .await?;

    let item = GalleryItem {
        id: next_gallery_id(&gallery),
        image: url.clone(),
        category: form.field("category").unwrap_or(DEFAULT_CATEGORY).to_string(),
        title: form.field("title").unwrap_or(DEFAULT_TITLE).to_string(),
        order: gallery.len() as i64,
        extra: Map::new(),
    };
    gallery.push(item.clone());

    if let Err(e) = state.storage.save_gallery(&gallery).await {
        state.storage.delete_file(&url).await;
        return Err(e.into());
    }
    info!(id = %item.id, %url, "gallery item added");
    Ok(Json(json!({ "success": true, "item": item })))
}

/// PUT /api/admin/gallery/{id}
pub async fn update_item(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, SiteError> {
    let Json(body) = payload?;
    let Value::Object(patch) = body else {
        return Err(SiteError::BadRequest(
            "Gallery item update must be a JSON object".to_string(),
        ));
    };

    let mut gallery = state.storage.load_gallery().await?;
    let slot = gallery
        .iter_mut()
        .find(|item| item.id == id)
        .ok_or_else(|| SiteError::NotFound("Gallery item".to_string()))?;
    let updated = slot.merged_with(patch)?;
    *slot = updated.clone();

    state.storage.save_gallery(&gallery).await?;
    info!(%id, "gallery item updated");
    Ok(Json(json!({ "success": true, "item": updated })))
}

/// DELETE /api/admin/gallery/{id}
pub async fn delete_item(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, SiteError> {
    let mut gallery = state.storage.load_gallery().await?;
    let index = gallery
        .iter()
        .position(|item| item.id == id)
        .ok_or_else(|| SiteError::NotFound("Gallery item".to_string()))?;
    let removed = gallery.remove(index);

    state.storage.save_gallery(&gallery).await?;
    state.storage.delete_file(&removed.image).await;
    info!(%id, "gallery item deleted");
    Ok(Json(json!({ "success": true })))
}

/// POST /api/admin/gallery/reorder: `{items: [...]}` replaces the sequence.
pub async fn reorder_items(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, SiteError> {
    let Json(mut body) = payload?;
    let items = body
        .get_mut("items")
        .map(Value::take)
        .unwrap_or(Value::Null);
    let gallery = state.storage.parse_gallery(items)?;

    state.storage.save_gallery(&gallery).await?;
    info!(count = gallery.len(), "gallery reordered");
    Ok(Json(json!({ "success": true })))
}
