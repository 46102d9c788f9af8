use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::Key;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::handlers::{admin, gallery, public};
use crate::storage::Storage;

/// Room for multipart framing and text fields on top of the file itself.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

#[derive(Clone)]
pub struct SiteState {
    pub storage: Arc<Storage>,
    pub cookie_key: Key,
    pub secure_cookie: bool,
    pub login_limiter: Arc<DefaultDirectRateLimiter>,
    pub max_upload_bytes: usize,
}

impl FromRef<SiteState> for Key {
    fn from_ref(state: &SiteState) -> Self {
        state.cookie_key.clone()
    }
}

impl SiteState {
    pub fn new(storage: Arc<Storage>, cookie_key: Key) -> Self {
        let defaults = Config::default();
        Self {
            storage,
            cookie_key,
            secure_cookie: false,
            login_limiter: login_limiter(defaults.login_attempts_per_minute),
            max_upload_bytes: defaults.max_upload_bytes,
        }
    }

    pub fn from_config(cfg: &Config, storage: Arc<Storage>) -> Self {
        Self {
            storage,
            cookie_key: cookie_key(cfg.session_secret.as_deref()),
            secure_cookie: cfg.secure_cookies(),
            login_limiter: login_limiter(cfg.login_attempts_per_minute),
            max_upload_bytes: cfg.max_upload_bytes,
        }
    }

    pub fn with_login_limit(mut self, per_minute: u32) -> Self {
        self.login_limiter = login_limiter(per_minute);
        self
    }

    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }
}

fn login_limiter(per_minute: u32) -> Arc<DefaultDirectRateLimiter> {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Cookie encryption key from `SESSION_SECRET`, or a random one.
pub fn cookie_key(secret: Option<&str>) -> Key {
    match secret.map(|s| Key::try_from(s.as_bytes())) {
        Some(Ok(key)) => key,
        Some(Err(_)) => {
            warn!("SESSION_SECRET shorter than 64 bytes; using a random key, sessions end on restart");
            Key::generate()
        }
        None => {
            warn!("SESSION_SECRET not set; using a random key, sessions end on restart");
            Key::generate()
        }
    }
}

pub fn site_router(state: SiteState) -> Router {
    let body_limit = state.max_upload_bytes + BODY_LIMIT_HEADROOM;

    Router::new()
        .route("/api/config", get(public::get_config))
        .route("/api/gallery", get(public::get_gallery))
        .route("/api/booking", post(public::submit_booking))
        .route("/uploads/{name}", get(public::serve_upload))
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/admin/session", get(admin::session))
        .route(
            "/api/admin/config",
            get(admin::get_config).post(admin::update_config),
        )
        .route("/api/admin/hero-image", post(admin::upload_hero_image))
        .route("/api/admin/password", post(admin::change_password))
        .route(
            "/api/admin/gallery",
            get(gallery::list_items).post(gallery::add_item),
        )
        .route("/api/admin/gallery/reorder", post(gallery::reorder_items))
        .route(
            "/api/admin/gallery/{id}",
            put(gallery::update_item).delete(gallery::delete_item),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
