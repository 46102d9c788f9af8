use axum::{
    Json,
    extract::{Multipart, State, rejection::JsonRejection},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::SiteError;
use crate::handlers::upload::read_image_form;
use crate::middleware::auth::{
    AdminSession, RequireAdmin, clear_session_cookie, session_cookie, session_from_jar,
};
use crate::router::SiteState;
use crate::service::password::{hash_password, validate_new_password, verify_password};
use crate::storage::naming::generate_filename;
use crate::storage::{SiteConfig, StoreError};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub new_password: String,
}

/// POST /api/admin/login
pub async fn login(
    State(state): State<SiteState>,
    jar: PrivateCookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(PrivateCookieJar, Json<Value>), SiteError> {
    let Json(req) = payload?;
    if req.password.is_empty() {
        return Err(SiteError::BadRequest("Password is required".to_string()));
    }
    if state.login_limiter.check().is_err() {
        warn!("admin login rate limit exhausted");
        return Err(SiteError::TooManyRequests);
    }

    let hash = state.storage.get_password_hash().await?;
    if !verify_password(&req.password, &hash).await? {
        warn!("admin login rejected");
        return Err(SiteError::InvalidPassword);
    }

    let cookie = session_cookie(&AdminSession::issue(), state.secure_cookie)
        .map_err(StoreError::from)?;
    info!("admin logged in");
    Ok((jar.add(cookie), Json(json!({ "success": true }))))
}

/// POST /api/admin/logout
pub async fn logout(
    State(state): State<SiteState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Json<Value>) {
    (
        jar.remove(clear_session_cookie(state.secure_cookie)),
        Json(json!({ "success": true })),
    )
}

/// GET /api/admin/session
pub async fn session(jar: PrivateCookieJar) -> Json<Value> {
    Json(json!({ "authenticated": session_from_jar(&jar).is_some() }))
}

/// GET /api/admin/config
pub async fn get_config(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
) -> Json<SiteConfig> {
    Json(state.storage.get_config().await)
}

/// POST /api/admin/config: fields present in the body replace the stored ones.
pub async fn update_config(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, SiteError> {
    let Json(body) = payload?;
    let Value::Object(patch) = body else {
        return Err(SiteError::BadRequest(
            "Config must be a JSON object".to_string(),
        ));
    };

    let config = state.storage.load_config().await?.merged_with(patch)?;
    state.storage.save_config(&config).await?;
    info!("site config updated");
    Ok(Json(json!({ "success": true, "config": config })))
}

/// POST /api/admin/hero-image
pub async fn upload_hero_image(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
    multipart: Multipart,
) -> Result<Json<Value>, SiteError> {
    let mut form = read_image_form(multipart, "heroImage", state.max_upload_bytes).await?;
    let image = form.take_image()?;
    let mut config = state.storage.load_config().await?;

    let filename = generate_filename("hero", &image.file_name);
    let url = state
        .storage
        .upload_file(&image.bytes, &filename, image.content_type.as_deref())
        .await?;

    let previous = std::mem::replace(&mut config.hero_image, url.clone());
    if let Err(e) = state.storage.save_config(&config).await {
        state.storage.delete_file(&url).await;
        return Err(e.into());
    }
    if !previous.is_empty() && previous != url {
        state.storage.delete_file(&previous).await;
    }

    info!(%url, "hero image replaced");
    Ok(Json(json!({ "success": true, "heroImage": url })))
}

/// POST /api/admin/password
pub async fn change_password(
    _admin: RequireAdmin,
    State(state): State<SiteState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, SiteError> {
    let Json(req) = payload?;
    validate_new_password(&req.new_password).map_err(SiteError::BadRequest)?;

    let hash = hash_password(&req.new_password, state.storage.password_cost()).await?;
    state.storage.save_password_hash(&hash).await?;
    info!("admin password changed");
    Ok(Json(json!({
        "success": true,
        "message": "Password updated successfully"
    })))
}
