//! Structured field extraction from screenshots
//!
//! OCRs an uploaded image, then asks the model to reshape the OCR text into
//! key-value JSON. An optional HTML layout template is included in the prompt
//! as structure-only context.

use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::json;
use std::fmt::Write;
use std::time::Instant;
use tracing::{error, info};

use crate::api::documents::acquire_generation_permit;
use crate::api::form;
use crate::api::models::{bad_request, service_error_response, ErrorResponse};
use crate::gemini::{ModelJson, Part};
use crate::metrics::METRICS;
use crate::state::AppState;

/// Characters of layout template included in the prompt.
const TEMPLATE_CONTEXT_CHARS: usize = 3000;

/// Extract structured key-value fields from a screenshot
///
/// POST /api/v1/extract
pub async fn extract_fields(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ErrorResponse> {
    let start = Instant::now();
    let result = extract_fields_inner(&state, multipart).await;
    METRICS.record_extract(result.is_ok());
    METRICS
        .request_duration
        .with_label_values(&["extract"])
        .observe(start.elapsed().as_secs_f64());
    result
}

async fn extract_fields_inner(
    state: &AppState,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ErrorResponse> {
    let form = form::collect(multipart).await?;

    let data = form.file.ok_or_else(|| bad_request("Image file required"))?;
    if data.is_empty() {
        return Err(bad_request("No image selected"));
    }

    let mime = form::resolve_image_mime(&data, form.content_type.as_deref())
        .ok_or_else(|| bad_request("Invalid image"))?;

    let _permit = acquire_generation_permit(state).await?;

    let ocr_text = state.gemini.extract_text(&data, mime).await.map_err(|e| {
        error!("OCR failed: {}", e);
        service_error_response(&e)
    })?;

    info!("Extract: {} OCR chars", ocr_text.len());

    let prompt = build_extract_prompt(state.extract_template.as_deref().map(String::as_str), &ocr_text);

    let output = state
        .gemini
        .generate(vec![Part::text(prompt)])
        .await
        .map_err(|e| {
            error!("Field extraction failed: {}", e);
            service_error_response(&e)
        })?;

    // Unparseable model output is returned explicitly as raw payload.
    let body = match ModelJson::parse(&output) {
        ModelJson::Parsed(value) => value,
        ModelJson::Raw(raw) => json!({ "raw_output": raw }),
    };

    Ok(Json(body))
}

fn build_extract_prompt(template: Option<&str>, ocr_text: &str) -> String {
    let mut prompt = String::from("You are given:\n\n");

    if let Some(template) = template {
        let clipped = clip_chars(template, TEMPLATE_CONTEXT_CHARS);
        let _ = write!(
            prompt,
            "1) HTML template of the page (context only):\n\
             --------------------------\n\
             {clipped}\n\
             --------------------------\n\n\
             IMPORTANT:\n\
             The HTML is ONLY for understanding page structure.\n\
             DO NOT extract any values from it.\n\n\
             2) "
        );
    }

    let _ = write!(
        prompt,
        "OCR text extracted from the screenshot:\n\
         --------------------------\n\
         {ocr_text}\n\
         --------------------------\n\n\
         TASK:\n\
         From the OCR text, identify meaningful key-value pairs.\n\n\
         Rules:\n\
         - Extract only real data fields\n\
         - Ignore menus, buttons, sidebar labels\n\
         - Detect patterns like \"Label : Value\"\n\
         - Return ONLY valid JSON\n\
         - No explanation"
    );

    prompt
}

/// Clip to at most `max_chars` characters on a char boundary.
fn clip_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
