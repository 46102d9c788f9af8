use chrono::Utc;
use rand::Rng;
use std::path::Path;

use super::models::GalleryItem;

/// `<purpose>-<epoch-ms>-<random><ext>`, with the extension of `original_name`.
pub fn generate_filename(purpose: &str, original_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{purpose}-{millis}-{suffix}{}", extension_of(original_name))
}

/// Lower-cased extension including the dot, or empty.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Content type for a stored file, from its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// A creation-time id not yet used in `gallery`.
pub fn next_gallery_id(gallery: &[GalleryItem]) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    while gallery.iter().any(|item| item.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}
