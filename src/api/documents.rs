//! Document upload and retrieval-backed query handlers

use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::json;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::form;
use crate::api::models::{
    bad_request, not_found, service_error_response, ErrorResponse, QueryRequest, UploadResponse,
};
use crate::gemini::{ModelJson, Part};
use crate::metrics::METRICS;
use crate::normalize;
use crate::retrieval::{chunk, ChunkIndex, SessionId};
use crate::state::AppState;

/// Upper bound on per-request `top_k`.
const MAX_TOP_K: usize = 50;

/// Upload an HTML document, normalize and index it
///
/// POST /api/v1/documents/html
pub async fn upload_html(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ErrorResponse> {
    let start = Instant::now();
    let result = upload_html_inner(&state, multipart).await;
    METRICS.record_upload("html", result.is_ok());
    METRICS
        .request_duration
        .with_label_values(&["upload_html"])
        .observe(start.elapsed().as_secs_f64());
    result
}

async fn upload_html_inner(
    state: &AppState,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ErrorResponse> {
    let form = form::collect(multipart).await?;
    let session_id = parse_session_id(form.session_id.as_deref())?;

    let data = form.file.ok_or_else(|| bad_request("HTML file required"))?;
    if data.is_empty() {
        return Err(bad_request("No file selected"));
    }

    let html = String::from_utf8(data.to_vec()).map_err(|_| bad_request("Invalid encoding"))?;

    let text = normalize::html_to_text(&html);
    if text.is_empty() {
        return Err(bad_request("No readable text found"));
    }

    info!(
        "HTML upload {:?}: {} normalized chars",
        form.file_name.as_deref().unwrap_or("unnamed"),
        text.len()
    );
    index_text(state, text, session_id, "Document indexed").await
}

/// Upload an image, OCR it, and index the extracted text
///
/// POST /api/v1/documents/image
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ErrorResponse> {
    let start = Instant::now();
    let result = upload_image_inner(&state, multipart).await;
    METRICS.record_upload("image", result.is_ok());
    METRICS
        .request_duration
        .with_label_values(&["upload_image"])
        .observe(start.elapsed().as_secs_f64());
    result
}

async fn upload_image_inner(
    state: &AppState,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ErrorResponse> {
    let form = form::collect(multipart).await?;
    let session_id = parse_session_id(form.session_id.as_deref())?;

    let data = form.file.ok_or_else(|| bad_request("Image file required"))?;
    if data.is_empty() {
        return Err(bad_request("No image selected"));
    }

    let mime = form::resolve_image_mime(&data, form.content_type.as_deref())
        .ok_or_else(|| bad_request("Invalid image"))?;

    let text = {
        let _permit = acquire_generation_permit(state).await?;
        state.gemini.extract_text(&data, mime).await.map_err(|e| {
            error!("OCR failed: {}", e);
            service_error_response(&e)
        })?
    };

    let text = normalize::collapse_whitespace(&text);
    if text.is_empty() {
        return Err(bad_request("No text detected"));
    }

    info!(
        "Image upload {:?} ({}): {} OCR chars",
        form.file_name.as_deref().unwrap_or("unnamed"),
        mime,
        text.len()
    );
    index_text(state, text, session_id, "Image text indexed").await
}

/// Query a session's index and extract the requested value
///
/// POST /api/v1/query
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, ErrorResponse> {
    let start = Instant::now();
    let result = query_inner(&state, request).await;
    METRICS.record_query(result.is_ok());
    METRICS
        .request_duration
        .with_label_values(&["query"])
        .observe(start.elapsed().as_secs_f64());
    result
}

async fn query_inner(
    state: &AppState,
    request: QueryRequest,
) -> Result<Json<serde_json::Value>, ErrorResponse> {
    let query = request.query.trim().to_lowercase();
    if query.is_empty() {
        return Err(bad_request("Query cannot be empty"));
    }

    let top_k = request.top_k.unwrap_or(state.config.retrieval.top_k);
    if top_k == 0 {
        return Err(bad_request("top_k must be positive"));
    }
    if top_k > MAX_TOP_K {
        return Err(bad_request(format!("top_k cannot exceed {}", MAX_TOP_K)));
    }

    let index = state
        .sessions
        .get(&request.session_id)
        .ok_or_else(|| not_found("Unknown session: upload a document first"))?;

    let results = index
        .search(state.gemini.as_ref(), &query, top_k)
        .await
        .map_err(|e| {
            error!("Search failed: {}", e);
            service_error_response(&e)
        })?;

    if results.is_empty() {
        return Err(not_found("No relevant text found"));
    }

    let context = results.join("\n");
    let prompt = build_value_prompt(&context, &query);

    let answer = {
        let _permit = acquire_generation_permit(state).await?;
        state
            .gemini
            .generate(vec![Part::text(prompt)])
            .await
            .map_err(|e| {
                error!("Value extraction failed: {}", e);
                service_error_response(&e)
            })?
    };

    // Unparseable model output is surfaced explicitly, not masked.
    let body = match ModelJson::parse(&answer) {
        ModelJson::Parsed(value) => value,
        ModelJson::Raw(raw) => json!({ "field": query, "raw_output": raw }),
    };

    Ok(Json(body))
}

fn parse_session_id(raw: Option<&str>) -> Result<Option<SessionId>, ErrorResponse> {
    match raw {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| bad_request("Invalid session_id")),
    }
}

/// Chunk, embed, and register `text` under a session. A provided session id
/// replaces that session's index wholesale; otherwise a new session is made.
async fn index_text(
    state: &AppState,
    text: String,
    session_id: Option<SessionId>,
    status: &str,
) -> Result<Json<UploadResponse>, ErrorResponse> {
    let retrieval = &state.config.retrieval;

    let chunks = chunk(&text, retrieval.chunk_size, retrieval.chunk_overlap).map_err(|e| {
        error!("Chunking failed: {}", e);
        service_error_response(&e)
    })?;

    let index = ChunkIndex::build(state.gemini.as_ref(), chunks)
        .await
        .map_err(|e| {
            error!("Index build failed: {}", e);
            service_error_response(&e)
        })?;
    let chunk_count = index.len();

    let (session_id, created_at) = match session_id {
        Some(id) => {
            let created_at = state
                .sessions
                .replace(id, index)
                .ok_or_else(|| not_found("Unknown session: upload a document first"))?;
            METRICS.record_index_built(chunk_count, false);
            (id, created_at)
        }
        None => {
            let (id, created_at) = state.sessions.create(index);
            METRICS.record_index_built(chunk_count, true);
            (id, created_at)
        }
    };

    Ok(Json(UploadResponse {
        session_id,
        chunks: chunk_count,
        status: status.to_string(),
        created_at,
    }))
}

pub(crate) async fn acquire_generation_permit(
    state: &AppState,
) -> Result<tokio::sync::SemaphorePermit<'_>, ErrorResponse> {
    state.generation_semaphore.acquire().await.map_err(|_| {
        service_error_response(&crate::error::ServiceError::Internal(
            "generation semaphore closed".to_string(),
        ))
    })
}

fn build_value_prompt(context: &str, query: &str) -> String {
    format!(
        "Extract the exact value for \"{query}\" from the text below.\n\n\
         Return JSON only:\n\
         {{\n\"field\":\"{query}\",\n\"value\":\"\"\n}}\n\n\
         Text:\n{context}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_id_absent() {
        assert_eq!(parse_session_id(None).unwrap(), None);
    }

    #[test]
    fn test_parse_session_id_valid() {
        let id = Uuid::new_v4();
        let parsed = parse_session_id(Some(&id.to_string())).unwrap();
        assert_eq!(parsed, Some(id));
    }

    #[test]
    fn test_parse_session_id_invalid() {
        assert!(parse_session_id(Some("not-a-uuid")).is_err());
    }

    #[test]
    fn test_value_prompt_includes_query_and_context() {
        let prompt = build_value_prompt("Employee Name : Jane", "employee name");
        assert!(prompt.contains("\"employee name\""));
        assert!(prompt.contains("Employee Name : Jane"));
        assert!(prompt.contains("Return JSON only"));
    }
}
