use axum::body::Bytes;
use axum::extract::Multipart;
use std::collections::HashMap;
use tracing::debug;

use crate::error::SiteError;
use crate::storage::naming::extension_of;

const ALLOWED_IMAGE_TYPES: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// An image file taken from a multipart form.
#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Parsed multipart body: at most one image plus plain text fields.
#[derive(Debug, Default)]
pub struct ImageForm {
    pub image: Option<UploadedImage>,
    pub fields: HashMap<String, String>,
}

impl ImageForm {
    /// A non-blank text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_image(&mut self) -> Result<UploadedImage, SiteError> {
        self.image
            .take()
            .ok_or_else(|| SiteError::BadRequest("No file uploaded".to_string()))
    }
}

/// Read a multipart body whose file part is named `file_field`.
pub async fn read_image_form(
    mut multipart: Multipart,
    file_field: &str,
    max_bytes: usize,
) -> Result<ImageForm, SiteError> {
    let mut form = ImageForm::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name != file_field {
            if field.file_name().is_none() {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_owned);
        validate_image(&file_name, content_type.as_deref())?;

        let bytes = field.bytes().await?;
        if bytes.len() > max_bytes {
            return Err(SiteError::BadRequest(format!(
                "File too large. Maximum size is {}MB",
                max_bytes / (1024 * 1024)
            )));
        }
        debug!(field = %name, file_name = %file_name, size = bytes.len(), "image received");
        form.image = Some(UploadedImage {
            file_name,
            content_type,
            bytes,
        });
    }
    Ok(form)
}

/// Both the extension and, when sent, the MIME type must name an image format.
pub fn validate_image(file_name: &str, content_type: Option<&str>) -> Result<(), SiteError> {
    let ext = extension_of(file_name);
    let ext_ok = ALLOWED_IMAGE_TYPES.contains(&ext.trim_start_matches('.'));
    let mime_ok = content_type.is_none_or(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.strip_prefix("image/")
            .is_some_and(|sub| ALLOWED_IMAGE_TYPES.contains(&sub))
    });
    if ext_ok && mime_ok {
        Ok(())
    } else {
        Err(SiteError::BadRequest(
            "Only image files are allowed (jpeg, jpg, png, gif, webp)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_image_types() {
        assert!(validate_image("look.JPG", Some("image/jpeg")).is_ok());
        assert!(validate_image("look.webp", Some("image/webp")).is_ok());
        assert!(validate_image("look.png", None).is_ok());
    }

    #[test]
    fn rejects_other_files() {
        assert!(validate_image("notes.txt", Some("text/plain")).is_err());
        assert!(validate_image("fake.png", Some("application/pdf")).is_err());
        assert!(validate_image("noext", Some("image/png")).is_err());
        assert!(validate_image("vector.svg", Some("image/svg+xml")).is_err());
    }

    #[test]
    fn blank_fields_are_absent() {
        let mut form = ImageForm::default();
        form.fields.insert("title".into(), "  ".into());
        form.fields.insert("category".into(), "bridal".into());
        assert_eq!(form.field("title"), None);
        assert_eq!(form.field("category"), Some("bridal"));
        assert!(form.take_image().is_err());
    }
}
