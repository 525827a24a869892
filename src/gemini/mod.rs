//! Client for the hosted Generative Language API
//!
//! Covers the three consumed interfaces: text generation (plus a streaming
//! variant), image OCR via inline image parts, and batch embeddings.

pub mod client;
pub mod models;

pub use client::{GeminiClient, TextStream};
pub use models::{ModelJson, Part};
