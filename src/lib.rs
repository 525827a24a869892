//! doc-gateway: HTTP services over a hosted generative language model
//!
//! Accepts HTML documents and screenshots, normalizes or OCRs them into
//! plain text, chunks and embeds that text into per-session in-memory
//! indexes, and answers value-extraction queries over the retrieved
//! context. Also exposes one-shot field extraction and a streamed
//! question-answering endpoint over images.

pub mod api;
pub mod config;
pub mod error;
pub mod gemini;
pub mod metrics;
pub mod normalize;
pub mod retrieval;
pub mod state;

pub use config::GatewayConfig;
pub use error::{Result, ServiceError};
pub use state::AppState;
