//! Multipart form collection for the upload endpoints

use axum::extract::Multipart;
use bytes::Bytes;

use crate::api::models::{bad_request, ErrorResponse};

/// Fields the gateway's multipart endpoints understand.
#[derive(Debug, Default)]
pub struct FormData {
    pub file: Option<Bytes>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub question: Option<String>,
    pub session_id: Option<String>,
}

/// Drain a multipart body into a [`FormData`]. Unknown fields are ignored.
pub async fn collect(mut multipart: Multipart) -> Result<FormData, ErrorResponse> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        match field.name() {
            Some("file") | Some("image") => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                form.file = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| bad_request(format!("Failed to read file: {}", e)))?,
                );
            }
            Some("question") => {
                form.question = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("Failed to read question: {}", e)))?,
                );
            }
            Some("session_id") => {
                form.session_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("Failed to read session_id: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Sniff the image type from magic bytes.
pub fn detect_image_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Resolve the image mime type: sniffed magic bytes win, then the declared
/// multipart content type when it claims to be an image.
pub fn resolve_image_mime<'a>(data: &[u8], declared: Option<&'a str>) -> Option<&'a str> {
    if let Some(sniffed) = detect_image_mime(data) {
        return Some(sniffed);
    }
    declared.filter(|ct| ct.starts_with("image/"))
}
