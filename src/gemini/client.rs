//! HTTP client for the Generative Language API

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::pin::Pin;
use tracing::{debug, error};

use crate::config::GeminiConfig;
use crate::error::{Result, ServiceError};
use crate::gemini::models::{
    BatchEmbedRequest, Content, EmbedRequest, GenerateContentRequest, GenerateContentResponse,
    Part,
};
use crate::metrics::METRICS;
use crate::retrieval::Embedder;

/// Finite, non-restartable stream of generated text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

const OCR_PROMPT: &str =
    "Extract ALL visible text from this image. Return only the text content, \
     no additional commentary.";

/// Maximum texts per `:batchEmbedContents` call (API limit is 100).
const EMBED_BATCH_SIZE: usize = 100;

/// Generative Language API client
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(Self { http, config })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.post(url);
        if let Some(api_key) = &self.config.api_key {
            req = req.header("x-goog-api-key", api_key.expose_secret());
        }
        req
    }

    /// Single-shot generation; returns the first candidate's text.
    pub async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        self.generate_labeled(parts, "generate").await
    }

    /// One `:generateContent` call, recorded once under `operation`.
    async fn generate_labeled(&self, parts: Vec<Part>, operation: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_url, self.config.generation_model
        );
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        debug!("Calling generateContent: model={}", self.config.generation_model);

        let response = self.post(&url).json(&body).send().await.map_err(|e| {
            METRICS.record_gemini(operation, false);
            map_transport_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            METRICS.record_gemini(operation, false);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("generateContent failed: status {}", status);
            return Err(ServiceError::Upstream(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                METRICS.record_gemini(operation, false);
                ServiceError::InvalidResponse(e.to_string())
            })?;

        if parsed.candidates.is_empty() {
            METRICS.record_gemini(operation, false);
            return Err(ServiceError::InvalidResponse(
                "no candidates in response".to_string(),
            ));
        }

        METRICS.record_gemini(operation, true);
        Ok(parsed.text())
    }

    /// Streaming generation over SSE frames.
    ///
    /// The returned stream yields text fragments in arrival order and ends
    /// when the upstream closes; it cannot be restarted.
    pub async fn generate_stream(&self, parts: Vec<Part>) -> Result<TextStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.api_url, self.config.generation_model
        );
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        debug!(
            "Calling streamGenerateContent: model={}",
            self.config.generation_model
        );

        let response = self.post(&url).json(&body).send().await.map_err(|e| {
            METRICS.record_gemini("stream", false);
            map_transport_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            METRICS.record_gemini("stream", false);
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::Upstream(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        METRICS.record_gemini("stream", true);

        let stream = stream_lines(response.bytes_stream()).filter_map(|line_result| async move {
            match line_result {
                Ok(line) => parse_sse_line(&line),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(stream))
    }

    /// OCR an image: inline image bytes plus the extraction prompt.
    pub async fn extract_text(&self, image: &[u8], mime_type: &str) -> Result<String> {
        self.generate_labeled(
            vec![Part::text(OCR_PROMPT), Part::inline_data(mime_type, image)],
            "ocr",
        )
        .await
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/models/{}:batchEmbedContents",
            self.config.api_url, self.config.embedding_model
        );
        let model = format!("models/{}", self.config.embedding_model);

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let body = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedRequest {
                        model: model.clone(),
                        content: Content {
                            parts: vec![Part::text(text.clone())],
                        },
                    })
                    .collect(),
            };

            debug!("Calling batchEmbedContents: {} texts", batch.len());

            let response = self.post(&url).json(&body).send().await.map_err(|e| {
                METRICS.record_gemini("embed", false);
                map_transport_error(e)
            })?;

            let status = response.status();
            if !status.is_success() {
                METRICS.record_gemini("embed", false);
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(ServiceError::Upstream(format!(
                    "Status {}: {}",
                    status, error_text
                )));
            }

            let parsed: crate::gemini::models::BatchEmbedResponse =
                response.json().await.map_err(|e| {
                    METRICS.record_gemini("embed", false);
                    ServiceError::InvalidResponse(e.to_string())
                })?;

            if parsed.embeddings.len() != batch.len() {
                METRICS.record_gemini("embed", false);
                return Err(ServiceError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    parsed.embeddings.len()
                )));
            }

            METRICS.record_gemini("embed", true);
            all_embeddings.extend(parsed.embeddings.into_iter().map(|e| e.values));
        }

        Ok(all_embeddings)
    }
}

fn map_transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(e.to_string())
    } else {
        ServiceError::RequestFailed(e.to_string())
    }
}

/// Parse a single SSE line from `:streamGenerateContent`. Returns:
/// - `Some(Ok(text))` for non-empty text fragments
/// - `Some(Err(e))` for malformed frames
/// - `None` to skip (comments, empty frames, non-data lines)
fn parse_sse_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(chunk) => {
            let text = chunk.text();
            if text.is_empty() {
                None
            } else {
                Some(Ok(text))
            }
        }
        Err(e) => Some(Err(ServiceError::InvalidResponse(format!(
            "malformed stream frame: {}",
            e
        )))),
    }
}

/// Convert a byte stream into a stream of complete lines.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    futures::stream::unfold(
        (Box::pin(byte_stream), String::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].to_string();
                    buffer = buffer[newline_pos + 1..].to_string();
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(ServiceError::RequestFailed(format!(
                                "stream read error: {}",
                                e
                            ))),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        if !buffer.trim().is_empty() {
                            let remaining = std::mem::take(&mut buffer);
                            return Some((Ok(remaining), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_line_extracts_text() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#;
        let result = parse_sse_line(line).unwrap().unwrap();
        assert_eq!(result, "Hi");
    }

    #[test]
    fn test_parse_sse_line_skips_non_data() {
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line("event: done").is_none());
    }

    #[test]
    fn test_parse_sse_line_skips_empty_text() {
        let line = r#"data: {"candidates":[{"content":{"parts":[]}}]}"#;
        assert!(parse_sse_line(line).is_none());
    }

    #[test]
    fn test_parse_sse_line_malformed_is_error() {
        let result = parse_sse_line("data: {not json").unwrap();
        assert!(matches!(result, Err(ServiceError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_stream_lines_splits_on_newlines() {
        let bytes = vec![
            Ok(bytes::Bytes::from("data: one\nda")),
            Ok(bytes::Bytes::from("ta: two\n\ndata: three")),
        ];
        let stream = stream_lines(futures::stream::iter(bytes));
        let lines: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(lines, vec!["data: one", "data: two", "data: three"]);
    }
}
