//! Streamed question answering over an image
//!
//! OCRs the uploaded image, then streams the model's answer back as plain
//! text. The stream is finite and not restartable; a mid-stream upstream
//! failure terminates the response body.

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use std::time::Instant;
use tracing::{error, info};

use crate::api::form;
use crate::api::models::{bad_request, service_error_response, ErrorResponse};
use crate::gemini::Part;
use crate::metrics::METRICS;
use crate::state::AppState;

/// Answer a question about an uploaded image, streaming the reply
///
/// POST /api/v1/ask
pub async fn ask(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ErrorResponse> {
    let start = Instant::now();
    let result = ask_inner(&state, multipart).await;
    // Success means the stream started; mid-stream failures surface in-band.
    METRICS.record_ask(result.is_ok());
    METRICS
        .request_duration
        .with_label_values(&["ask"])
        .observe(start.elapsed().as_secs_f64());
    result
}

async fn ask_inner(
    state: &AppState,
    multipart: Multipart,
) -> Result<Response, ErrorResponse> {
    let form = form::collect(multipart).await?;

    let question = form
        .question
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| bad_request("Question is required"))?
        .to_string();

    let data = form.file.ok_or_else(|| bad_request("Image file is required"))?;
    if data.is_empty() {
        return Err(bad_request("No image selected"));
    }

    let mime = form::resolve_image_mime(&data, form.content_type.as_deref())
        .ok_or_else(|| bad_request("Invalid image"))?;

    // Held through OCR and the whole answer stream.
    let permit = state
        .generation_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            service_error_response(&crate::error::ServiceError::Internal(
                "generation semaphore closed".to_string(),
            ))
        })?;

    let extracted = state.gemini.extract_text(&data, mime).await.map_err(|e| {
        error!("OCR failed: {}", e);
        service_error_response(&e)
    })?;

    info!("Ask: question {:?}, {} OCR chars", question, extracted.len());

    let prompt = build_answer_prompt(&extracted, &question);

    let stream = state
        .gemini
        .generate_stream(vec![Part::text(prompt)])
        .await
        .map_err(|e| {
            error!("Answer stream failed to start: {}", e);
            service_error_response(&e)
        })?;

    let body_stream = stream.map(move |fragment| {
        let _permit = &permit;
        fragment.map(Bytes::from)
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body_stream),
    )
        .into_response())
}

fn build_answer_prompt(extracted: &str, question: &str) -> String {
    format!(
        "Based on the following text extracted from the image:\n\n\
         {extracted}\n\n\
         Answer this question: {question}\n\n\
         If the answer is not present in the text, respond exactly:\n\
         Not found in the image.\n"
    )
}
